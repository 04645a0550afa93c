use crate::error::GatewayError;
use crate::store::Store;

/// Outcome of the Rate Limiter (§4.4).
#[derive(Debug, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    Exceeded,
}

/// Fixed-window counter, keyed by `rate_limit:{key}`. The window boundary is
/// set by whichever request creates the key (`Store::incr_with_expiry`);
/// subsequent requests in the same window only increment. This is
/// deliberately NOT a sliding window or token bucket — see SPEC_FULL.md
/// §4.4/§9.
pub async fn check(
    store: &Store,
    key: &str,
    limit: u32,
    window_secs: u64,
) -> Result<RateLimitResult, GatewayError> {
    let count = store
        .incr_with_expiry(&format!("rate_limit:{key}"), window_secs)
        .await?;
    if count > limit as i64 {
        Ok(RateLimitResult::Exceeded)
    } else {
        Ok(RateLimitResult::Allowed)
    }
}
