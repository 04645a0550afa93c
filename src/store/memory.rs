use crate::error::GatewayError;
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

struct Expiring<T> {
    value: T,
    expires_at: Option<Instant>,
}

impl<T> Expiring<T> {
    fn fresh(value: T, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|d| Instant::now() + d),
        }
    }

    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }
}

/// In-process test double for `Store`, backed by `DashMap`s keyed like the
/// Redis keyspace. Expiry is checked lazily on access rather than via a
/// background sweep — adequate for unit tests, not a substitute for Redis
/// TTL semantics in production.
pub struct InMemoryStore {
    /// Redis strings are untyped byte strings; INCR just requires the
    /// current value to parse as an integer. Storing `String` here (rather
    /// than `i64`) lets the same map back both numeric counters and
    /// arbitrary values like `api_key:{key} -> client_id`.
    strings: DashMap<String, Expiring<String>>,
    sets: DashMap<String, Expiring<HashSet<String>>>,
    zsets: DashMap<String, Expiring<Vec<(String, f64)>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            strings: DashMap::new(),
            sets: DashMap::new(),
            zsets: DashMap::new(),
        }
    }

    pub fn incr(&self, key: &str) -> Result<i64, GatewayError> {
        let mut entry = self
            .strings
            .entry(key.to_string())
            .or_insert_with(|| Expiring::fresh("0".to_string(), None));
        let count: i64 = entry.value.parse().unwrap_or(0) + 1;
        entry.value = count.to_string();
        Ok(count)
    }

    pub fn incr_with_expiry(&self, key: &str, window_secs: u64) -> Result<i64, GatewayError> {
        let expired = self.strings.get(key).map(|e| !e.is_live()).unwrap_or(false);
        if expired {
            self.strings.remove(key);
        }
        let created = !self.strings.contains_key(key);
        let mut entry = self
            .strings
            .entry(key.to_string())
            .or_insert_with(|| Expiring::fresh("0".to_string(), None));
        let count: i64 = entry.value.parse().unwrap_or(0) + 1;
        entry.value = count.to_string();
        if created {
            entry.expires_at = Some(Instant::now() + Duration::from_secs(window_secs));
        }
        Ok(count)
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        match self.strings.get(key) {
            Some(e) if e.is_live() => Ok(Some(e.value.clone())),
            _ => Ok(None),
        }
    }

    /// Test-only seeding hook — production code never writes an arbitrary
    /// string value, only `INCR`s counters; the API-key table is populated
    /// by the external admin component.
    #[cfg(test)]
    pub fn set_string(&self, key: &str, value: &str) {
        self.strings
            .insert(key.to_string(), Expiring::fresh(value.to_string(), None));
    }

    pub fn sadd(&self, key: &str, member: &str) -> Result<(), GatewayError> {
        let mut entry = self
            .sets
            .entry(key.to_string())
            .or_insert_with(|| Expiring::fresh(HashSet::new(), None));
        entry.value.insert(member.to_string());
        Ok(())
    }

    pub fn srem(&self, key: &str, member: &str) -> Result<(), GatewayError> {
        if let Some(mut entry) = self.sets.get_mut(key) {
            entry.value.remove(member);
        }
        Ok(())
    }

    pub fn sismember(&self, key: &str, member: &str) -> Result<bool, GatewayError> {
        Ok(self
            .sets
            .get(key)
            .filter(|e| e.is_live())
            .map(|e| e.value.contains(member))
            .unwrap_or(false))
    }

    pub fn smembers(&self, key: &str) -> Result<Vec<String>, GatewayError> {
        Ok(self
            .sets
            .get(key)
            .filter(|e| e.is_live())
            .map(|e| e.value.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn scard(&self, key: &str) -> Result<i64, GatewayError> {
        Ok(self
            .sets
            .get(key)
            .filter(|e| e.is_live())
            .map(|e| e.value.len() as i64)
            .unwrap_or(0))
    }

    pub fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), GatewayError> {
        let ttl = Some(Instant::now() + Duration::from_secs(ttl_secs));
        if let Some(mut e) = self.strings.get_mut(key) {
            e.expires_at = ttl;
        }
        if let Some(mut e) = self.sets.get_mut(key) {
            e.expires_at = ttl;
        }
        if let Some(mut e) = self.zsets.get_mut(key) {
            e.expires_at = ttl;
        }
        Ok(())
    }

    pub fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), GatewayError> {
        let mut entry = self
            .zsets
            .entry(key.to_string())
            .or_insert_with(|| Expiring::fresh(Vec::new(), None));
        entry.value.retain(|(m, _)| m != member);
        entry.value.push((member.to_string(), score));
        Ok(())
    }

    pub fn zcard(&self, key: &str) -> Result<i64, GatewayError> {
        Ok(self
            .zsets
            .get(key)
            .filter(|e| e.is_live())
            .map(|e| e.value.len() as i64)
            .unwrap_or(0))
    }

    pub fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<(), GatewayError> {
        if let Some(mut entry) = self.zsets.get_mut(key) {
            entry.value.retain(|(_, score)| *score < min || *score > max);
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incr_has_no_expiry_and_increments_monotonically() {
        let store = InMemoryStore::new();
        assert_eq!(store.incr("analytics:total_requests").unwrap(), 1);
        assert_eq!(store.incr("analytics:total_requests").unwrap(), 2);
        assert!(store
            .strings
            .get("analytics:total_requests")
            .unwrap()
            .expires_at
            .is_none());
    }

    #[test]
    fn test_incr_with_expiry_creates_and_increments() {
        let store = InMemoryStore::new();
        assert_eq!(store.incr_with_expiry("k", 60).unwrap(), 1);
        assert_eq!(store.incr_with_expiry("k", 60).unwrap(), 2);
        assert_eq!(store.incr_with_expiry("k", 60).unwrap(), 3);
    }

    #[test]
    fn test_sadd_sismember_scard() {
        let store = InMemoryStore::new();
        store.sadd("s", "a").unwrap();
        store.sadd("s", "b").unwrap();
        assert!(store.sismember("s", "a").unwrap());
        assert!(!store.sismember("s", "z").unwrap());
        assert_eq!(store.scard("s").unwrap(), 2);
        store.srem("s", "a").unwrap();
        assert!(!store.sismember("s", "a").unwrap());
        assert_eq!(store.scard("s").unwrap(), 1);
    }

    #[test]
    fn test_zadd_zcard_zremrangebyscore() {
        let store = InMemoryStore::new();
        store.zadd("z", 10.0, "t10").unwrap();
        store.zadd("z", 20.0, "t20").unwrap();
        store.zadd("z", 30.0, "t30").unwrap();
        assert_eq!(store.zcard("z").unwrap(), 3);
        // evict everything with score < 15
        store.zremrangebyscore("z", f64::MIN, 15.0).unwrap();
        assert_eq!(store.zcard("z").unwrap(), 2);
    }

    #[test]
    fn test_zadd_same_member_updates_score_not_duplicates() {
        let store = InMemoryStore::new();
        store.zadd("z", 1.0, "m").unwrap();
        store.zadd("z", 2.0, "m").unwrap();
        assert_eq!(store.zcard("z").unwrap(), 1);
    }

    #[test]
    fn test_get_missing_key_is_none() {
        let store = InMemoryStore::new();
        assert_eq!(store.get("missing").unwrap(), None);
    }
}
