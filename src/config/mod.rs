pub mod types;

pub use types::*;

use anyhow::Result;
use std::path::Path;
use tracing::info;

impl GatewayConfig {
    /// Load config from `path` if it exists (TOML or JSON by extension),
    /// falling back to defaults; then layer environment overrides; then
    /// validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                serde_json::from_str(&raw)?
            } else {
                toml::from_str(&raw)?
            }
        } else {
            info!("config: {} not found, using defaults", path.display());
            GatewayConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Override fields from environment variables. Env always wins over file
    /// config, matching the reference deployment's container-driven config.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TARGET_SERVICE_URLS") {
            self.target_service_urls = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = std::env::var("REDIS_HOST") {
            self.redis_host = v;
        }
        if let Ok(v) = std::env::var("REDIS_PORT") {
            if let Ok(port) = v.parse() {
                self.redis_port = port;
            }
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_ENABLED") {
            self.rate_limit_enabled = is_truthy(&v);
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_PER_MINUTE") {
            if let Ok(n) = v.parse() {
                self.rate_limit_per_minute = n;
            }
        }
        if let Ok(v) = std::env::var("RATE_LIMIT_WINDOW_SECONDS") {
            if let Ok(n) = v.parse() {
                self.rate_limit_window_seconds = n;
            }
        }
        if let Ok(v) = std::env::var("ADMIN_API_KEY") {
            self.admin_api_key = Some(v);
        }
        if let Ok(v) = std::env::var("CIRCUIT_BREAKER_ENABLED") {
            self.circuit_breaker_enabled = is_truthy(&v);
        }
        if let Ok(v) = std::env::var("FAILURE_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.failure_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("RESET_TIMEOUT") {
            if let Ok(n) = v.parse() {
                self.reset_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("MAX_RETRIES") {
            if let Ok(n) = v.parse() {
                self.max_retries = n;
            }
        }
        if let Ok(v) = std::env::var("RETRY_DELAY_SECONDS") {
            if let Ok(n) = v.parse() {
                self.retry_delay_secs = n;
            }
        }
        if let Ok(v) = std::env::var("TIMEFRAME") {
            if let Ok(n) = v.parse() {
                self.timeframe_secs = n;
            }
        }
    }

    /// Validate invariants that can't be expressed as serde defaults.
    pub fn validate(&self) -> Result<()> {
        if self.target_service_urls.is_empty() {
            anyhow::bail!("target_service_urls must not be empty");
        }
        for url in &self.target_service_urls {
            if url.parse::<http::Uri>().is_err() {
                anyhow::bail!("invalid upstream url: {}", url);
            }
        }
        if self.rate_limit_enabled && self.rate_limit_per_minute == 0 {
            anyhow::bail!("rate_limit_per_minute must be > 0 when rate limiting is enabled");
        }
        Ok(())
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "true" | "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = GatewayConfig::load(Path::new("/nonexistent/pathhelm.toml")).unwrap();
        assert_eq!(cfg.target_service_urls, vec!["http://mock-backend:5000"]);
    }

    #[test]
    fn test_validate_rejects_empty_roster() {
        let mut cfg = GatewayConfig::default();
        cfg.target_service_urls.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut cfg = GatewayConfig::default();
        cfg.target_service_urls = vec!["not a url".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_is_truthy() {
        assert!(is_truthy("true"));
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(!is_truthy("false"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }
}
