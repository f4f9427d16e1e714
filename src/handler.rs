use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_TYPE, USER_AGENT,
};
use axum::http::{HeaderMap, Response, StatusCode};
use tracing::debug;

use crate::config::AppConfig;
use crate::error::ProxyResult;
use crate::upstream::{FetchedImage, Upstream};

const NOT_FOUND_BODY: &str = "Not Found";
const IMAGE_NOT_FOUND_BODY: &str = "Image not found";

/// Shared application state injected into every request handler.
#[derive(Clone)]
pub struct ProxyState {
    pub config: Arc<AppConfig>,
    pub upstream: Arc<dyn Upstream>,
}

/// Single entry point for every inbound request.
///
/// Paths under the configured prefix are stripped and forwarded to the
/// upstream image host; everything else gets a plain 404. Only the request
/// path participates in routing and forwarding; method is reused as-is and
/// the inbound body is never read.
pub async fn handle_proxy(
    State(state): State<ProxyState>,
    request: Request,
) -> ProxyResult<Response<Body>> {
    let path = request.uri().path();
    let Some(remainder) = path.strip_prefix(state.config.path_prefix.as_str())
    else {
        return Ok(plain_text(StatusCode::NOT_FOUND, NOT_FOUND_BODY));
    };
    let remainder = remainder.to_owned();
    let user_agent =
        request_user_agent(request.headers(), &state.config.fallback_user_agent)
            .to_owned();

    debug!(remainder, "forwarding image request");
    let fetched = state
        .upstream
        .fetch_image(request.method().clone(), &remainder, &user_agent)
        .await?;

    if fetched.status.is_success() {
        Ok(build_image_response(&state.config, fetched))
    } else {
        debug!(status = %fetched.status, remainder, "upstream refused image request");
        Ok(plain_text(fetched.status, IMAGE_NOT_FOUND_BODY))
    }
}

/// Inbound `User-Agent` if present and non-empty, else the configured fallback.
fn request_user_agent<'a>(headers: &'a HeaderMap, fallback: &'a str) -> &'a str {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .filter(|ua| !ua.is_empty())
        .unwrap_or(fallback)
}

/// Success response: upstream status, piped body, and exactly the three
/// rewritten headers. The upstream's other headers are dropped.
fn build_image_response(config: &AppConfig, fetched: FetchedImage) -> Response<Body> {
    let content_type = fetched
        .content_type
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| config.fallback_content_type.clone());

    Response::builder()
        .status(fetched.status)
        .header(CONTENT_TYPE, content_type)
        .header(CACHE_CONTROL, config.cache_control.as_str())
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, config.allow_origin.as_str())
        .body(Body::from_stream(fetched.body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn plain_text(status: StatusCode, body: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .body(Body::from(body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}
