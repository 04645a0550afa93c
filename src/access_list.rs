use crate::store::Store;
use tracing::warn;

/// Outcome of the Access List Gate (§4.2): deny-then-allow check against the
/// `ip_blacklist` and `ip_whitelist` sets.
#[derive(Debug, PartialEq, Eq)]
pub enum GateResult {
    /// IP is blacklisted — terminate with 403.
    Deny,
    /// IP is whitelisted — bypass auth/rate-limit/anomaly scoring.
    AllowBypass,
    /// Not on either list (or store unavailable) — continue to auth.
    Continue,
}

const BLACKLIST_KEY: &str = "ip_blacklist";
const WHITELIST_KEY: &str = "ip_whitelist";

/// Blacklist takes precedence over whitelist. If the store is unreachable
/// the gate degrades open — skipped entirely, leaving the decision to
/// authentication — rather than failing the request itself.
pub async fn check(store: &Store, client_ip: &str) -> GateResult {
    match store.sismember(BLACKLIST_KEY, client_ip).await {
        Ok(true) => return GateResult::Deny,
        Ok(false) => {}
        Err(e) => {
            warn!("access_list: store error on blacklist check, degrading open: {}", e);
            return GateResult::Continue;
        }
    }

    match store.sismember(WHITELIST_KEY, client_ip).await {
        Ok(true) => GateResult::AllowBypass,
        Ok(false) => GateResult::Continue,
        Err(e) => {
            warn!("access_list: store error on whitelist check, degrading open: {}", e);
            GateResult::Continue
        }
    }
}
