use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("upstream timeout: {0}")]
    UpstreamTimeout(String),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let code = match &self {
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        };
        (code, self.to_string()).into_response()
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;
