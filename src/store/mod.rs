mod memory;
mod redis_store;

pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

use crate::error::GatewayError;

/// Abstraction over the networked key-value store backing cross-process
/// state: analytics counters, access lists, per-IP sliding-window data, rate
/// limit counters, and the API-key lookup table.
///
/// Two implementations: `RedisStore` for production, `InMemoryStore` as a
/// test double. Dispatch is a plain enum rather than a trait object — there
/// are exactly two backends and both are known at compile time.
pub enum Store {
    Redis(RedisStore),
    InMemory(InMemoryStore),
}

impl Store {
    pub async fn connect_redis(host: &str, port: u16) -> Result<Self, GatewayError> {
        Ok(Store::Redis(RedisStore::connect(host, port).await?))
    }

    pub fn in_memory() -> Self {
        Store::InMemory(InMemoryStore::new())
    }

    /// Atomically increment a no-TTL counter (the `analytics:*` keys — they
    /// grow monotonically forever, unlike the windowed counters).
    pub async fn incr(&self, key: &str) -> Result<i64, GatewayError> {
        match self {
            Store::Redis(s) => s.incr(key).await,
            Store::InMemory(s) => s.incr(key),
        }
    }

    /// Atomically increment `key` and, only if this increment created the
    /// key (fixed-window semantics — the first request in the window sets
    /// the boundary), set its expiry to `window_secs`. Returns the
    /// post-increment counter value.
    pub async fn incr_with_expiry(&self, key: &str, window_secs: u64) -> Result<i64, GatewayError> {
        match self {
            Store::Redis(s) => s.incr_with_expiry(key, window_secs).await,
            Store::InMemory(s) => s.incr_with_expiry(key, window_secs),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        match self {
            Store::Redis(s) => s.get(key).await,
            Store::InMemory(s) => s.get(key),
        }
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<(), GatewayError> {
        match self {
            Store::Redis(s) => s.sadd(key, member).await,
            Store::InMemory(s) => s.sadd(key, member),
        }
    }

    #[allow(dead_code)]
    pub async fn srem(&self, key: &str, member: &str) -> Result<(), GatewayError> {
        match self {
            Store::Redis(s) => s.srem(key, member).await,
            Store::InMemory(s) => s.srem(key, member),
        }
    }

    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool, GatewayError> {
        match self {
            Store::Redis(s) => s.sismember(key, member).await,
            Store::InMemory(s) => s.sismember(key, member),
        }
    }

    #[allow(dead_code)]
    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, GatewayError> {
        match self {
            Store::Redis(s) => s.smembers(key).await,
            Store::InMemory(s) => s.smembers(key),
        }
    }

    pub async fn scard(&self, key: &str) -> Result<i64, GatewayError> {
        match self {
            Store::Redis(s) => s.scard(key).await,
            Store::InMemory(s) => s.scard(key),
        }
    }

    pub async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), GatewayError> {
        match self {
            Store::Redis(s) => s.expire(key, ttl_secs).await,
            Store::InMemory(s) => s.expire(key, ttl_secs),
        }
    }

    pub async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), GatewayError> {
        match self {
            Store::Redis(s) => s.zadd(key, score, member).await,
            Store::InMemory(s) => s.zadd(key, score, member),
        }
    }

    pub async fn zcard(&self, key: &str) -> Result<i64, GatewayError> {
        match self {
            Store::Redis(s) => s.zcard(key).await,
            Store::InMemory(s) => s.zcard(key),
        }
    }

    pub async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<(), GatewayError> {
        match self {
            Store::Redis(s) => s.zremrangebyscore(key, min, max).await,
            Store::InMemory(s) => s.zremrangebyscore(key, min, max),
        }
    }

    /// Seed a raw string value directly, bypassing `INCR` semantics. Only
    /// meaningful against the in-memory test double — real deployments
    /// never have the gateway write `api_key:*` entries itself.
    #[cfg(test)]
    pub fn test_set_string(&self, key: &str, value: &str) {
        match self {
            Store::InMemory(s) => s.set_string(key, value),
            Store::Redis(_) => panic!("test_set_string is only supported on the in-memory store"),
        }
    }
}
