use std::net::IpAddr;

use axum::http::HeaderValue;
use clap::Parser;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPSTREAM_URL: &str = "https://i2.chuimg.com/";
const DEFAULT_PATH_PREFIX: &str = "/proxy-image/";
const DEFAULT_FALLBACK_USER_AGENT: &str = "Mozilla/5.0";
const DEFAULT_FALLBACK_CONTENT_TYPE: &str = "image/jpeg";
const DEFAULT_CACHE_CONTROL: &str = "public, max-age=31536000";
const DEFAULT_ALLOW_ORIGIN: &str = "*";
const DEFAULT_UPSTREAM_TIMEOUT: u64 = 30;

/// Streaming reverse proxy that serves images from a fixed upstream host
/// under a local path prefix, with long-lived caching headers and open CORS.
#[derive(Debug, Clone, Parser)]
#[command(name = "imgrelay", version, about, long_about = None)]
pub struct CliArgs {
    /// IP address to bind on. Omit to bind all interfaces.
    #[arg(long, env = "IMGRELAY_BIND_IP", help = "Bind IP address [default: 0.0.0.0]")]
    pub bind_ip: Option<IpAddr>,

    /// TCP port to listen on.
    #[arg(long, env = "IMGRELAY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Base URL of the image host. Must be http(s) and end with '/'.
    #[arg(long, env = "IMGRELAY_UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    /// Local path prefix that selects proxying. Must start and end with '/'.
    /// The part of the path after the prefix is appended to the upstream URL.
    #[arg(long, env = "IMGRELAY_PATH_PREFIX", default_value = DEFAULT_PATH_PREFIX)]
    pub path_prefix: String,

    /// User-Agent sent upstream when the inbound request carries none.
    #[arg(
        long,
        env = "IMGRELAY_FALLBACK_USER_AGENT",
        default_value = DEFAULT_FALLBACK_USER_AGENT
    )]
    pub fallback_user_agent: String,

    /// Content-Type returned when the upstream response carries none.
    #[arg(
        long,
        env = "IMGRELAY_FALLBACK_CONTENT_TYPE",
        default_value = DEFAULT_FALLBACK_CONTENT_TYPE
    )]
    pub fallback_content_type: String,

    /// Cache-Control value set on every successful response, replacing
    /// whatever the upstream sent.
    #[arg(long, env = "IMGRELAY_CACHE_CONTROL", default_value = DEFAULT_CACHE_CONTROL)]
    pub cache_control: String,

    /// Access-Control-Allow-Origin value set on every successful response.
    #[arg(long, env = "IMGRELAY_ALLOW_ORIGIN", default_value = DEFAULT_ALLOW_ORIGIN)]
    pub allow_origin: String,

    /// Total per-request timeout for the upstream fetch, in seconds.
    #[arg(
        long,
        env = "IMGRELAY_UPSTREAM_TIMEOUT_SECONDS",
        default_value_t = DEFAULT_UPSTREAM_TIMEOUT
    )]
    pub upstream_timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_ip: IpAddr,
    pub port: u16,
    pub upstream_url: String,
    pub path_prefix: String,
    pub fallback_user_agent: String,
    pub fallback_content_type: String,
    pub cache_control: String,
    pub allow_origin: String,
    pub upstream_timeout_seconds: u64,
}

impl TryFrom<CliArgs> for AppConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let parsed = url::Url::parse(&args.upstream_url)
            .map_err(|e| anyhow::anyhow!("invalid upstream-url: {e}"))?;
        anyhow::ensure!(
            matches!(parsed.scheme(), "http" | "https"),
            "upstream-url must be http or https"
        );
        anyhow::ensure!(
            args.upstream_url.ends_with('/'),
            "upstream-url must end with '/'"
        );
        anyhow::ensure!(
            args.path_prefix.len() > 1
                && args.path_prefix.starts_with('/')
                && args.path_prefix.ends_with('/'),
            "path-prefix must start and end with '/'"
        );
        anyhow::ensure!(
            args.upstream_timeout_seconds >= 1,
            "upstream-timeout-seconds must be >= 1"
        );
        for (name, value) in [
            ("fallback-user-agent", &args.fallback_user_agent),
            ("fallback-content-type", &args.fallback_content_type),
            ("cache-control", &args.cache_control),
            ("allow-origin", &args.allow_origin),
        ] {
            anyhow::ensure!(
                HeaderValue::from_str(value).is_ok(),
                "{name} is not a valid header value"
            );
        }

        Ok(Self {
            bind_ip: args.bind_ip.unwrap_or_else(|| IpAddr::from([0, 0, 0, 0])),
            port: args.port,
            upstream_url: args.upstream_url,
            path_prefix: args.path_prefix,
            fallback_user_agent: args.fallback_user_agent,
            fallback_content_type: args.fallback_content_type,
            cache_control: args.cache_control,
            allow_origin: args.allow_origin,
            upstream_timeout_seconds: args.upstream_timeout_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_args() -> CliArgs {
        CliArgs::parse_from(["imgrelay"])
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::try_from(default_args()).unwrap();
        assert_eq!(config.upstream_url, "https://i2.chuimg.com/");
        assert_eq!(config.path_prefix, "/proxy-image/");
        assert_eq!(config.fallback_user_agent, "Mozilla/5.0");
        assert_eq!(config.fallback_content_type, "image/jpeg");
        assert_eq!(config.cache_control, "public, max-age=31536000");
        assert_eq!(config.allow_origin, "*");
        assert_eq!(config.bind_ip, IpAddr::from([0, 0, 0, 0]));
    }

    #[test]
    fn rejects_upstream_without_trailing_slash() {
        let mut args = default_args();
        args.upstream_url = "https://images.example.com".into();
        assert!(AppConfig::try_from(args).is_err());
    }

    #[test]
    fn rejects_non_http_upstream() {
        let mut args = default_args();
        args.upstream_url = "ftp://images.example.com/".into();
        assert!(AppConfig::try_from(args).is_err());
    }

    #[test]
    fn rejects_unparseable_upstream() {
        let mut args = default_args();
        args.upstream_url = "not a url".into();
        assert!(AppConfig::try_from(args).is_err());
    }

    #[test]
    fn rejects_prefix_without_slashes() {
        for bad in ["proxy-image/", "/proxy-image", "/"] {
            let mut args = default_args();
            args.path_prefix = bad.into();
            assert!(AppConfig::try_from(args).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn rejects_header_values_with_control_chars() {
        let mut args = default_args();
        args.cache_control = "public\r\nX-Injected: 1".into();
        assert!(AppConfig::try_from(args).is_err());
    }
}
