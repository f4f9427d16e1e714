use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use imgrelay::config::{AppConfig, CliArgs};
use imgrelay::handler::ProxyState;
use imgrelay::server::build_router;
use imgrelay::upstream::HttpUpstream;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = CliArgs::parse();
    let config = Arc::new(AppConfig::try_from(args)?);

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(10))
        .timeout(Duration::from_secs(config.upstream_timeout_seconds))
        .build()?;
    let upstream = Arc::new(HttpUpstream::new(client, config.upstream_url.clone()));
    info!(
        upstream = %config.upstream_url,
        prefix = %config.path_prefix,
        "forwarding image requests"
    );

    let state = ProxyState {
        config: config.clone(),
        upstream,
    };

    let app = build_router(state).layer(TraceLayer::new_for_http());
    let addr = SocketAddr::new(config.bind_ip, config.port);
    let listener = TcpListener::bind(addr).await?;
    info!("imgrelay listening on http://{addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "imgrelay=info,tower_http=info".into()
            }),
        )
        .with_target(false)
        .compact()
        .init();
}
