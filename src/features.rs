use crate::error::GatewayError;
use crate::store::Store;

/// The eight-dimensional input to the anomaly classifier (§4.3). Field order
/// is the compatibility contract with the training pipeline — do not
/// reorder.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub request_frequency: u32,
    pub error_rate: f64,
    pub unique_paths_accessed: u32,
    pub is_empty_user_agent: bool,
    pub user_agent_length: u32,
    pub request_body_size: u64,
    pub is_json_content_type: bool,
    pub num_headers: u32,
}

fn timestamps_key(ip: &str) -> String {
    format!("{ip}:timestamps")
}

fn errors_key(ip: &str) -> String {
    format!("{ip}:errors")
}

fn paths_key(ip: &str) -> String {
    format!("{ip}:paths")
}

/// Read phase (§4.3): evict timestamps older than `now - timeframe`, then
/// read `request_frequency`, `error_rate`, and `unique_paths_accessed` off
/// the evicted state. Called before dispatch.
pub async fn read_ip_features(
    store: &Store,
    ip: &str,
    now_secs: f64,
    timeframe_secs: u64,
) -> Result<(u32, f64, u32), GatewayError> {
    let cutoff = now_secs - timeframe_secs as f64;
    store
        .zremrangebyscore(&timestamps_key(ip), f64::NEG_INFINITY, cutoff)
        .await?;

    let request_frequency = store.zcard(&timestamps_key(ip)).await? as u32;

    let errors: u32 = store
        .get(&errors_key(ip))
        .await?
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);

    // Guard against division by zero and against a spuriously high rate
    // when the window is nearly empty: only compute a ratio once there is
    // more than one observation to divide by.
    let error_rate = if request_frequency > 1 {
        errors as f64 / request_frequency as f64
    } else {
        0.0
    };

    let unique_paths_accessed = store.scard(&paths_key(ip)).await? as u32;

    Ok((request_frequency, error_rate, unique_paths_accessed))
}

/// Write phase (§4.3): append the current timestamp, record the path,
/// conditionally bump the error counter, and refresh all three keys' TTLs
/// to `timeframe_secs`. Runs after dispatch.
///
/// `upstream_status` is `Some(status)` only when an upstream actually
/// responded (the error counter is scoped to upstream responses, not
/// gateway-synthesized statuses); pass `None` to record the timestamp/path
/// without ever touching the error counter.
pub async fn record_observation(
    store: &Store,
    ip: &str,
    path: &str,
    now_secs: f64,
    upstream_status: Option<u16>,
    timeframe_secs: u64,
) -> Result<(), GatewayError> {
    store
        .zadd(&timestamps_key(ip), now_secs, &now_secs.to_string())
        .await?;
    store.sadd(&paths_key(ip), path).await?;

    if upstream_status.is_some_and(|status| status >= 400) {
        store.incr_with_expiry(&errors_key(ip), timeframe_secs).await?;
    }

    store.expire(&timestamps_key(ip), timeframe_secs).await?;
    store.expire(&paths_key(ip), timeframe_secs).await?;
    store.expire(&errors_key(ip), timeframe_secs).await?;

    Ok(())
}

/// Build the classifier's feature row from the store-derived IP counters
/// plus the request's own headers/body — everything that doesn't require a
/// round trip to the store.
#[allow(clippy::too_many_arguments)]
pub fn build_feature_vector(
    request_frequency: u32,
    error_rate: f64,
    unique_paths_accessed: u32,
    user_agent: Option<&str>,
    request_body_size: u64,
    content_type: Option<&str>,
    num_headers: u32,
) -> FeatureVector {
    let user_agent_length = user_agent.map(|ua| ua.len() as u32).unwrap_or(0);
    let is_empty_user_agent = user_agent.map(|ua| ua.is_empty()).unwrap_or(true);
    let is_json_content_type = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
        .unwrap_or(false);

    FeatureVector {
        request_frequency,
        error_rate,
        unique_paths_accessed,
        is_empty_user_agent,
        user_agent_length,
        request_body_size,
        is_json_content_type,
        num_headers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_features_empty_ip() {
        let store = Store::in_memory();
        let (freq, rate, paths) = read_ip_features(&store, "1.1.1.1", 1000.0, 60).await.unwrap();
        assert_eq!(freq, 0);
        assert_eq!(rate, 0.0);
        assert_eq!(paths, 0);
    }

    #[tokio::test]
    async fn test_write_then_read_reflects_observation() {
        let store = Store::in_memory();
        record_observation(&store, "1.1.1.1", "/foo", 1000.0, Some(200), 60).await.unwrap();
        let (freq, rate, paths) = read_ip_features(&store, "1.1.1.1", 1000.5, 60).await.unwrap();
        assert_eq!(freq, 1);
        assert_eq!(rate, 0.0);
        assert_eq!(paths, 1);
    }

    #[tokio::test]
    async fn test_eviction_drops_stale_timestamps() {
        let store = Store::in_memory();
        record_observation(&store, "1.1.1.1", "/foo", 0.0, Some(200), 60).await.unwrap();
        // 61 seconds later, outside the 60s timeframe
        let (freq, _, _) = read_ip_features(&store, "1.1.1.1", 61.0, 60).await.unwrap();
        assert_eq!(freq, 0);
    }

    #[tokio::test]
    async fn test_error_rate_guard_on_single_request() {
        let store = Store::in_memory();
        // one request, it errors -- frequency is 1, guard keeps rate at 0
        record_observation(&store, "1.1.1.1", "/foo", 1000.0, Some(500), 60).await.unwrap();
        let (freq, rate, _) = read_ip_features(&store, "1.1.1.1", 1000.5, 60).await.unwrap();
        assert_eq!(freq, 1);
        assert_eq!(rate, 0.0);
    }

    #[tokio::test]
    async fn test_error_rate_computed_above_guard() {
        let store = Store::in_memory();
        record_observation(&store, "1.1.1.1", "/a", 1000.0, Some(500), 60).await.unwrap();
        record_observation(&store, "1.1.1.1", "/b", 1001.0, Some(200), 60).await.unwrap();
        let (freq, rate, paths) = read_ip_features(&store, "1.1.1.1", 1002.0, 60).await.unwrap();
        assert_eq!(freq, 2);
        assert_eq!(paths, 2);
        assert_eq!(rate, 0.5);
    }

    #[tokio::test]
    async fn test_none_status_records_timestamp_but_never_bumps_errors() {
        let store = Store::in_memory();
        record_observation(&store, "1.1.1.1", "/foo", 1000.0, None, 60).await.unwrap();
        let (freq, rate, _) = read_ip_features(&store, "1.1.1.1", 1000.5, 60).await.unwrap();
        assert_eq!(freq, 1);
        assert_eq!(rate, 0.0);
    }

    #[test]
    fn test_build_feature_vector_defaults_for_absent_headers() {
        let fv = build_feature_vector(0, 0.0, 0, None, 0, None, 0);
        assert!(fv.is_empty_user_agent);
        assert_eq!(fv.user_agent_length, 0);
        assert!(!fv.is_json_content_type);
    }

    #[test]
    fn test_build_feature_vector_json_content_type_case_insensitive() {
        let fv = build_feature_vector(0, 0.0, 0, Some("curl/8"), 12, Some("Application/JSON; charset=utf-8"), 3);
        assert!(fv.is_json_content_type);
        assert!(!fv.is_empty_user_agent);
        assert_eq!(fv.user_agent_length, 7);
    }
}
