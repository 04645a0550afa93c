use crate::classifier::{Classifier, ThresholdClassifier};
use crate::config::GatewayConfig;
use crate::dispatcher::Dispatcher;
use crate::metrics::Metrics;
use crate::pipeline::PipelineConfig;
use crate::store::Store;
use anyhow::Result;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;

/// Shared gateway state, cheaply cloneable, handed to every request task.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<ArcSwap<GatewayConfig>>,
    pub metrics: Metrics,
    pub store: Arc<Store>,
    pub dispatcher: Arc<Dispatcher>,
    pub classifier: Arc<dyn Classifier>,
}

impl GatewayState {
    pub async fn new(config: GatewayConfig) -> Result<Self> {
        let store = Store::connect_redis(&config.redis_host, config.redis_port).await?;

        let dispatcher = Dispatcher::new(
            config.target_service_urls.clone(),
            config.circuit_breaker_enabled,
            config.failure_threshold,
            Duration::from_secs(config.reset_timeout_secs),
            config.max_retries,
            Duration::from_secs(config.retry_delay_secs),
            Duration::from_secs(config.upstream_timeout_secs),
        );

        let classifier: Arc<dyn Classifier> = Arc::new(ThresholdClassifier::new(100));

        let metrics = Metrics::install();

        Ok(Self {
            config: Arc::new(ArcSwap::new(Arc::new(config))),
            metrics,
            store: Arc::new(store),
            dispatcher: Arc::new(dispatcher),
            classifier,
        })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let cfg = self.config.load();
        PipelineConfig {
            rate_limit_enabled: cfg.rate_limit_enabled,
            rate_limit_per_minute: cfg.rate_limit_per_minute,
            rate_limit_window_seconds: cfg.rate_limit_window_seconds,
            timeframe_secs: cfg.timeframe_secs,
        }
    }
}
