use axum::Router;

use crate::handler::{handle_proxy, ProxyState};

/// Build the axum router. A single fallback handler owns every path and
/// method; matching on the image prefix happens inside the handler so the
/// prefix stays a plain configuration value.
pub fn build_router(state: ProxyState) -> Router {
    Router::new().fallback(handle_proxy).with_state(state)
}
