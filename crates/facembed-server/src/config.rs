use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use facembed_core::ModelPaths;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_MAX_BODY_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_INTRA_THREADS: usize = 2;

/// Server configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Interface to bind (default: 0.0.0.0).
    pub host: IpAddr,
    /// TCP port (default: 8000).
    pub port: u16,
    /// Directory containing `det_10g.onnx` and `w600k_r50.onnx`.
    pub model_dir: PathBuf,
    /// Origins allowed by the CORS layer. The default `null` origin admits no
    /// real site.
    pub cors_origins: Vec<String>,
    /// Request body limit, covering both JSON and multipart uploads.
    pub max_body_bytes: usize,
    /// ONNX Runtime intra-op thread count per session.
    pub intra_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            model_dir: facembed_core::default_model_dir(),
            cors_origins: vec!["null".to_string()],
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            intra_threads: DEFAULT_INTRA_THREADS,
        }
    }
}

impl Config {
    /// Load configuration from `FACEMBED_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: parse_or(&lookup, "FACEMBED_HOST", defaults.host),
            port: parse_or(&lookup, "FACEMBED_PORT", defaults.port),
            model_dir: lookup("FACEMBED_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            cors_origins: lookup("FACEMBED_CORS_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or(defaults.cors_origins),
            max_body_bytes: parse_or(&lookup, "FACEMBED_MAX_BODY_BYTES", defaults.max_body_bytes),
            intra_threads: parse_or(&lookup, "FACEMBED_INTRA_THREADS", defaults.intra_threads),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn model_paths(&self) -> ModelPaths {
        ModelPaths::in_dir(&self.model_dir)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> T {
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "unparseable config value, using default");
            default
        }),
        None => default,
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.bind_addr(), "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.cors_origins, vec!["null"]);
        assert_eq!(config.max_body_bytes, 20 * 1024 * 1024);
        assert_eq!(config.intra_threads, 2);
        assert!(config.model_dir.ends_with(".insightface/models/buffalo_l"));
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("FACEMBED_HOST", "127.0.0.1"),
            ("FACEMBED_PORT", "9090"),
            ("FACEMBED_MODEL_DIR", "/opt/models"),
            ("FACEMBED_CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("FACEMBED_MAX_BODY_BYTES", "1024"),
            ("FACEMBED_INTRA_THREADS", "4"),
        ]);
        assert_eq!(config.bind_addr(), "127.0.0.1:9090".parse::<SocketAddr>().unwrap());
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.max_body_bytes, 1024);
        assert_eq!(config.intra_threads, 4);
        assert_eq!(
            config.model_paths().detection,
            PathBuf::from("/opt/models/det_10g.onnx")
        );
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[("FACEMBED_PORT", "eighty"), ("FACEMBED_HOST", "nowhere")]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    }
}
