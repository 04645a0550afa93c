use serde::{Deserialize, Serialize};

fn default_target_service_urls() -> Vec<String> {
    vec!["http://mock-backend:5000".to_string()]
}

fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}

fn default_redis_port() -> u16 {
    6379
}

fn default_true() -> bool {
    true
}

fn default_rate_limit_per_minute() -> u32 {
    60
}

fn default_rate_limit_window_seconds() -> u64 {
    60
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_secs() -> u64 {
    1
}

fn default_timeframe_secs() -> u64 {
    60
}

fn default_upstream_timeout_secs() -> u64 {
    5
}

/// Deserializes a JSON/TOML `null` into `T::default()` instead of erroring.
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    T: Default + Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    let opt = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// Process-wide immutable configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    #[serde(default = "default_target_service_urls")]
    pub target_service_urls: Vec<String>,

    #[serde(default = "default_redis_host")]
    pub redis_host: String,
    #[serde(default = "default_redis_port")]
    pub redis_port: u16,

    #[serde(default = "default_true")]
    pub rate_limit_enabled: bool,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_rate_limit_window_seconds")]
    pub rate_limit_window_seconds: u64,

    #[serde(default = "default_true")]
    pub circuit_breaker_enabled: bool,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_timeframe_secs")]
    pub timeframe_secs: u64,

    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,

    /// Unused by the core pipeline; retained only so a deployment can carry
    /// the value through to the external admin collaborator without a
    /// separate config file.
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub admin_api_key: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            target_service_urls: default_target_service_urls(),
            redis_host: default_redis_host(),
            redis_port: default_redis_port(),
            rate_limit_enabled: true,
            rate_limit_per_minute: default_rate_limit_per_minute(),
            rate_limit_window_seconds: default_rate_limit_window_seconds(),
            circuit_breaker_enabled: true,
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            timeframe_secs: default_timeframe_secs(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            admin_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = GatewayConfig::default();
        assert_eq!(cfg.target_service_urls, vec!["http://mock-backend:5000"]);
        assert_eq!(cfg.redis_port, 6379);
        assert!(cfg.rate_limit_enabled);
        assert_eq!(cfg.rate_limit_per_minute, 60);
        assert!(cfg.circuit_breaker_enabled);
        assert_eq!(cfg.failure_threshold, 5);
        assert_eq!(cfg.timeframe_secs, 60);
    }

    #[test]
    fn test_deserialize_partial_json_fills_defaults() {
        let json = r#"{"target_service_urls": ["http://a", "http://b"], "failure_threshold": 3}"#;
        let cfg: GatewayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.target_service_urls, vec!["http://a", "http://b"]);
        assert_eq!(cfg.failure_threshold, 3);
        assert_eq!(cfg.redis_port, 6379);
        assert_eq!(cfg.max_retries, 2);
    }

    #[test]
    fn test_deserialize_null_admin_key() {
        let json = r#"{"admin_api_key": null}"#;
        let cfg: GatewayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.admin_api_key, None);
    }

    #[test]
    fn test_roundtrip_serialize() {
        let cfg = GatewayConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: GatewayConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.target_service_urls, cfg.target_service_urls);
        assert_eq!(back.redis_port, cfg.redis_port);
    }
}
