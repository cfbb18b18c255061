//! Redis-backed throttle store.
//!
//! Shared by every instance pointed at the same Redis. Each mutating
//! primitive is one Lua script evaluation, which Redis runs atomically.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::throttling::error::{ThrottleError, ThrottleResult};
use crate::throttling::store::{BucketKeys, BucketOutcome, BucketSpec, BucketState, ThrottleStore, WindowHit};

const INCREMENT: &str = r#"
local count = redis.call("incr", KEYS[1])
if count == 1 then
  redis.call("expire", KEYS[1], tonumber(ARGV[1]))
end
return count
"#;

const HIT: &str = r#"
local max = tonumber(ARGV[1])
local ttl = tonumber(ARGV[2])
local count = tonumber(redis.call("get", KEYS[1]) or "0")
if count >= max then
  return {0, count}
end
count = redis.call("incr", KEYS[1])
if count == 1 then
  redis.call("expire", KEYS[1], ttl)
end
return {1, count}
"#;

const TOKEN_BUCKET: &str = r#"
local tokens_key = KEYS[1]
local timestamp_key = KEYS[2]

local rate = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local requested = tonumber(ARGV[4])

local ttl = math.floor((capacity / rate) * 2)

local last_tokens = tonumber(redis.call("get", tokens_key))
if last_tokens == nil then
  last_tokens = capacity
end

local last_refreshed = tonumber(redis.call("get", timestamp_key))
if last_refreshed == nil then
  last_refreshed = 0
end

local delta = math.max(0, now - last_refreshed)
local filled = math.min(capacity, last_tokens + (delta * rate))
local allowed = filled >= requested
local new_tokens = filled
if allowed then
  new_tokens = filled - requested
end

redis.call("setex", tokens_key, ttl, new_tokens)
redis.call("setex", timestamp_key, ttl, now)

return { allowed and 1 or 0, new_tokens }
"#;

#[derive(Clone)]
pub struct RedisThrottleStore {
    manager: ConnectionManager,
    increment: Script,
    hit: Script,
    token_bucket: Script,
}

impl RedisThrottleStore {
    pub async fn connect(url: &str) -> ThrottleResult<Self> {
        let client = redis::Client::open(url).map_err(|err| store_error("redis client", err))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|err| store_error("redis connect", err))?;

        Ok(Self {
            manager,
            increment: Script::new(INCREMENT),
            hit: Script::new(HIT),
            token_bucket: Script::new(TOKEN_BUCKET),
        })
    }
}

fn store_error(context: &str, err: redis::RedisError) -> ThrottleError {
    ThrottleError::Store(format!("{context}: {err}"))
}

#[async_trait]
impl ThrottleStore for RedisThrottleStore {
    async fn counter(&self, key: &str) -> ThrottleResult<u64> {
        let mut conn = self.manager.clone();
        let count: Option<u64> = conn.get(key).await.map_err(|err| store_error("redis get", err))?;
        Ok(count.unwrap_or(0))
    }

    async fn increment(&self, key: &str, ttl_secs: u64) -> ThrottleResult<u64> {
        let mut conn = self.manager.clone();
        self.increment
            .key(key)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|err| store_error("redis increment", err))
    }

    async fn hit(&self, key: &str, max: u64, ttl_secs: u64) -> ThrottleResult<WindowHit> {
        let mut conn = self.manager.clone();
        let (allowed, count): (u8, u64) = self
            .hit
            .key(key)
            .arg(max)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|err| store_error("redis hit", err))?;

        Ok(WindowHit {
            allowed: allowed == 1,
            count,
        })
    }

    async fn take_token(&self, keys: &BucketKeys, spec: BucketSpec, now: u64) -> ThrottleResult<BucketOutcome> {
        let mut conn = self.manager.clone();
        let (allowed, remaining): (u8, u64) = self
            .token_bucket
            .key(&keys.tokens)
            .key(&keys.timestamp)
            .arg(spec.rate)
            .arg(spec.capacity)
            .arg(now)
            .arg(1)
            .invoke_async(&mut conn)
            .await
            .map_err(|err| store_error("redis token bucket", err))?;

        Ok(BucketOutcome {
            allowed: allowed == 1,
            remaining,
        })
    }

    async fn peek_bucket(&self, keys: &BucketKeys) -> ThrottleResult<Option<BucketState>> {
        let mut conn = self.manager.clone();
        let (tokens, last_refreshed): (Option<u64>, Option<u64>) = redis::cmd("MGET")
            .arg(&keys.tokens)
            .arg(&keys.timestamp)
            .query_async(&mut conn)
            .await
            .map_err(|err| store_error("redis mget", err))?;

        Ok(match (tokens, last_refreshed) {
            (Some(tokens), Some(last_refreshed)) => Some(BucketState { tokens, last_refreshed }),
            _ => None,
        })
    }
}
