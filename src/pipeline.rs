use crate::access_list::{self, GateResult};
use crate::auth::{self, AuthResult};
use crate::classifier::{Classifier, Verdict};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::features::{self, FeatureVector};
use crate::proxy::context::{empty_body, full_body, BoxBody, RequestContext};
use crate::rate_limiter::{self, RateLimitResult};
use crate::store::Store;
use hyper::{Response, StatusCode};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

const TOTAL_REQUESTS_KEY: &str = "analytics:total_requests";
const TOTAL_BLOCKED_KEY: &str = "analytics:total_requests_blocked";

/// Tunables the Orchestrator needs that aren't owned by any one stage.
pub struct PipelineConfig {
    pub rate_limit_enabled: bool,
    pub rate_limit_per_minute: u32,
    pub rate_limit_window_seconds: u64,
    pub timeframe_secs: u64,
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn respond(status: StatusCode, body: &'static str) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .body(full_body(body))
        .expect("static response is well-formed")
}

/// Runs one request through the full decision pipeline (§4.1): access list,
/// authentication, rate limiting, anomaly scoring, dispatch, and the
/// feature-tracker write-back. Exactly one response is produced per call.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    mut ctx: RequestContext,
    store: &Store,
    dispatcher: &Dispatcher,
    classifier: &dyn Classifier,
    cfg: &PipelineConfig,
) -> Response<BoxBody> {
    let num_headers = ctx.headers.len() as u32;

    match access_list::check(store, &ctx.client_ip).await {
        GateResult::Deny => {
            return terminal(&ctx, StatusCode::FORBIDDEN, "blacklisted", empty_body());
        }
        GateResult::AllowBypass => {
            let _ = store.incr(TOTAL_REQUESTS_KEY).await;
            let outcome = dispatcher
                .dispatch(&ctx.method, &ctx.uri, &ctx.headers, &ctx.body)
                .await;
            let upstream_status = upstream_status(&outcome);
            let resp = render_dispatch_outcome(outcome);
            let _ = features::record_observation(
                store,
                &ctx.client_ip,
                ctx.path(),
                now_secs(),
                upstream_status,
                cfg.timeframe_secs,
            )
            .await;
            return terminal_response(&ctx, "whitelisted", resp);
        }
        GateResult::Continue => {}
    }

    let client_id = match auth::authenticate(store, ctx.api_key.as_deref()).await {
        AuthResult::MissingKey => {
            return terminal(&ctx, StatusCode::UNAUTHORIZED, "unauthenticated", empty_body());
        }
        AuthResult::UnknownKey => {
            return terminal(&ctx, StatusCode::FORBIDDEN, "forbidden", empty_body());
        }
        AuthResult::StoreUnavailable => {
            return terminal(&ctx, StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable", empty_body());
        }
        AuthResult::Accepted(client_id) => client_id,
    };
    ctx.client_id = Some(client_id);

    if cfg.rate_limit_enabled {
        match rate_limiter::check(
            store,
            ctx.rate_limit_key(),
            cfg.rate_limit_per_minute,
            cfg.rate_limit_window_seconds,
        )
        .await
        {
            Ok(RateLimitResult::Exceeded) => {
                let _ = store.incr(TOTAL_BLOCKED_KEY).await;
                return terminal(&ctx, StatusCode::TOO_MANY_REQUESTS, "rate_limited", empty_body());
            }
            Ok(RateLimitResult::Allowed) => {}
            Err(_) => {
                return terminal(&ctx, StatusCode::INTERNAL_SERVER_ERROR, "store_unavailable", empty_body());
            }
        }
    }

    let _ = store.incr(TOTAL_REQUESTS_KEY).await;

    let now = now_secs();
    if let Ok((request_frequency, error_rate, unique_paths_accessed)) =
        features::read_ip_features(store, &ctx.client_ip, now, cfg.timeframe_secs).await
    {
        let fv: FeatureVector = features::build_feature_vector(
            request_frequency,
            error_rate,
            unique_paths_accessed,
            ctx.user_agent(),
            ctx.body_size_for_features(),
            ctx.content_type(),
            num_headers,
        );

        if classifier.classify(&fv) == Verdict::Anomaly {
            let _ = store.incr(TOTAL_BLOCKED_KEY).await;
            return terminal(&ctx, StatusCode::FORBIDDEN, "anomaly", empty_body());
        }
    }

    let outcome = dispatcher
        .dispatch(&ctx.method, &ctx.uri, &ctx.headers, &ctx.body)
        .await;
    let status = upstream_status(&outcome);
    let resp = render_dispatch_outcome(outcome);

    let _ =
        features::record_observation(store, &ctx.client_ip, ctx.path(), now, status, cfg.timeframe_secs).await;

    let outcome_label = match status {
        Some(s) if s >= 500 => "upstream_error",
        Some(_) => "proxied",
        None => "upstream_error",
    };
    terminal_response(&ctx, outcome_label, resp)
}

/// The status an upstream actually returned, or `None` when the response was
/// synthesized by the gateway itself (breaker open, unreachable, no
/// upstream) rather than received from one.
fn upstream_status(outcome: &DispatchOutcome) -> Option<u16> {
    match outcome {
        DispatchOutcome::Proxied(resp) => Some(resp.status().as_u16()),
        DispatchOutcome::BreakerOpen | DispatchOutcome::Unreachable(_) | DispatchOutcome::NoUpstream => None,
    }
}

fn render_dispatch_outcome(outcome: DispatchOutcome) -> Response<BoxBody> {
    match outcome {
        DispatchOutcome::Proxied(resp) => resp,
        DispatchOutcome::BreakerOpen => respond(StatusCode::SERVICE_UNAVAILABLE, "circuit breaker open"),
        DispatchOutcome::Unreachable(_) => respond(StatusCode::BAD_GATEWAY, "upstream unreachable"),
        DispatchOutcome::NoUpstream => respond(StatusCode::BAD_GATEWAY, "no upstream configured"),
    }
}

fn terminal(ctx: &RequestContext, status: StatusCode, outcome: &str, body: BoxBody) -> Response<BoxBody> {
    let resp = Response::builder()
        .status(status)
        .body(body)
        .expect("static response is well-formed");
    terminal_response(ctx, outcome, resp)
}

fn terminal_response(ctx: &RequestContext, outcome: &str, resp: Response<BoxBody>) -> Response<BoxBody> {
    let status = resp.status().as_u16();
    let elapsed = ctx.start.elapsed();

    info!(
        client_ip = %ctx.client_ip,
        method = %ctx.method,
        path = ctx.path(),
        status,
        outcome,
        "access"
    );

    metrics::counter!(
        "gateway_http_requests_total",
        "outcome" => outcome.to_string(),
    )
    .increment(1);

    if outcome == "proxied" || outcome == "upstream_error" {
        metrics::histogram!("gateway_http_request_duration_seconds").record(elapsed.as_secs_f64());
    }

    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http::{HeaderMap, Method};

    fn ctx(ip: &str, api_key: Option<&str>) -> RequestContext {
        let mut headers = HeaderMap::new();
        if let Some(k) = api_key {
            headers.insert("x-api-key", k.parse().unwrap());
        }
        RequestContext::new(
            ip.to_string(),
            Method::GET,
            "/foo".parse().unwrap(),
            headers,
            Bytes::new(),
        )
    }

    fn pcfg() -> PipelineConfig {
        PipelineConfig {
            rate_limit_enabled: true,
            rate_limit_per_minute: 3,
            rate_limit_window_seconds: 60,
            timeframe_secs: 60,
        }
    }

    fn dispatcher(upstream: &str) -> Dispatcher {
        Dispatcher::new(
            vec![upstream.to_string()],
            true,
            5,
            std::time::Duration::from_secs(30),
            0,
            std::time::Duration::from_millis(1),
            std::time::Duration::from_secs(1),
        )
    }

    struct AlwaysNormal;
    impl Classifier for AlwaysNormal {
        fn classify(&self, _features: &FeatureVector) -> Verdict {
            Verdict::Normal
        }
    }

    #[tokio::test]
    async fn test_blacklisted_short_circuits_before_auth() {
        let store = Store::in_memory();
        store.sadd("ip_blacklist", "9.9.9.9").await.unwrap();
        let d = dispatcher("http://127.0.0.1:1");
        let resp = run(ctx("9.9.9.9", None), &store, &d, &AlwaysNormal, &pcfg()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_key_is_unauthenticated() {
        let store = Store::in_memory();
        let d = dispatcher("http://127.0.0.1:1");
        let resp = run(ctx("1.1.1.1", None), &store, &d, &AlwaysNormal, &pcfg()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_key_is_forbidden() {
        let store = Store::in_memory();
        let d = dispatcher("http://127.0.0.1:1");
        let resp = run(ctx("1.1.1.1", Some("nope")), &store, &d, &AlwaysNormal, &pcfg()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_whitelisted_bypasses_auth_and_dispatches() {
        let store = Store::in_memory();
        store.sadd("ip_whitelist", "2.2.2.2").await.unwrap();
        // no upstream reachable; expect a 502, not a 401, proving auth was bypassed.
        let d = dispatcher("http://127.0.0.1:1");
        let resp = run(ctx("2.2.2.2", None), &store, &d, &AlwaysNormal, &pcfg()).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(store.get(TOTAL_REQUESTS_KEY).await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_after_threshold_and_increments_blocked_counter() {
        let store = Store::in_memory();
        store.test_set_string("api_key:k1", "c1");
        let d = dispatcher("http://127.0.0.1:1");
        for _ in 0..3 {
            run(ctx("3.3.3.3", Some("k1")), &store, &d, &AlwaysNormal, &pcfg()).await;
        }
        let resp = run(ctx("3.3.3.3", Some("k1")), &store, &d, &AlwaysNormal, &pcfg()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(store.get(TOTAL_BLOCKED_KEY).await.unwrap(), Some("1".to_string()));
    }

    struct AlwaysAnomaly;
    impl Classifier for AlwaysAnomaly {
        fn classify(&self, _features: &FeatureVector) -> Verdict {
            Verdict::Anomaly
        }
    }

    #[tokio::test]
    async fn test_anomaly_verdict_blocks_and_increments_blocked_counter() {
        let store = Store::in_memory();
        store.test_set_string("api_key:k1", "c1");
        let d = dispatcher("http://127.0.0.1:1");
        let resp = run(ctx("4.4.4.4", Some("k1")), &store, &d, &AlwaysAnomaly, &pcfg()).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert_eq!(store.get(TOTAL_BLOCKED_KEY).await.unwrap(), Some("1".to_string()));
    }
}
