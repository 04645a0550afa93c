use crate::error::GatewayError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

/// Redis-backed implementation of the Shared State Store adapter.
///
/// Grounded on the `redis::aio::ConnectionManager` + `AsyncCommands` usage
/// in the reference rate-limit middleware: `ConnectionManager` reconnects
/// transparently, so a clone is cheap to hand to every request task.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(host: &str, port: u16) -> Result<Self, GatewayError> {
        let url = format!("redis://{host}:{port}");
        let client = redis::Client::open(url)
            .map_err(|e| GatewayError::StoreUnavailable(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| GatewayError::StoreUnavailable(e.to_string()))?;
        Ok(Self { conn })
    }

    fn err(e: redis::RedisError) -> GatewayError {
        GatewayError::StoreUnavailable(e.to_string())
    }

    /// Plain `INCR`, no expiry — used for the monotonic `analytics:*`
    /// counters.
    pub async fn incr(&self, key: &str) -> Result<i64, GatewayError> {
        let mut conn = self.conn.clone();
        conn.incr(key, 1).await.map_err(Self::err)
    }

    /// `INCR key` is pipelined so the command itself never costs more than
    /// one round trip; the conditional `EXPIRE` on first-increment cannot be
    /// folded into the same pipeline without server-side scripting, so it is
    /// a second call issued only when `count == 1` — the fixed-window
    /// boundary is still set exactly once, by the request that creates the
    /// key.
    pub async fn incr_with_expiry(&self, key: &str, window_secs: u64) -> Result<i64, GatewayError> {
        let mut conn = self.conn.clone();
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .query_async(&mut conn)
            .await
            .map_err(Self::err)?;
        if count == 1 {
            let _: () = conn
                .expire(key, window_secs as i64)
                .await
                .map_err(Self::err)?;
        }
        Ok(count)
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(Self::err)
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.sadd(key, member).await.map_err(Self::err)?;
        Ok(())
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.srem(key, member).await.map_err(Self::err)?;
        Ok(())
    }

    pub async fn sismember(&self, key: &str, member: &str) -> Result<bool, GatewayError> {
        let mut conn = self.conn.clone();
        conn.sismember(key, member).await.map_err(Self::err)
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, GatewayError> {
        let mut conn = self.conn.clone();
        conn.smembers(key).await.map_err(Self::err)
    }

    pub async fn scard(&self, key: &str) -> Result<i64, GatewayError> {
        let mut conn = self.conn.clone();
        conn.scard(key).await.map_err(Self::err)
    }

    pub async fn expire(&self, key: &str, ttl_secs: u64) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        let _: bool = conn.expire(key, ttl_secs as i64).await.map_err(Self::err)?;
        Ok(())
    }

    pub async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.zadd(key, member, score).await.map_err(Self::err)?;
        Ok(())
    }

    pub async fn zcard(&self, key: &str) -> Result<i64, GatewayError> {
        let mut conn = self.conn.clone();
        conn.zcard(key).await.map_err(Self::err)
    }

    pub async fn zremrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .zrembyscore(key, min, max)
            .await
            .map_err(Self::err)?;
        Ok(())
    }
}
