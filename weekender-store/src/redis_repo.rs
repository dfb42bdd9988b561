use redis::RedisResult;
use tracing::{debug, info};

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    /// Claims the scan lock for `owner`. Returns false if another agent
    /// already holds it.
    pub async fn acquire_scan_lock(&self, name: &str, owner: &str, ttl_seconds: u64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("scan-lock:{}", name);

        // SET NX: Only set if key does not exist
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(owner)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await?;

        let acquired = result.is_some();
        if acquired {
            info!("Scan lock {} acquired by {}", key, owner);
        } else {
            debug!("Scan lock {} is held elsewhere", key);
        }
        Ok(acquired)
    }

    /// Releases the lock only while `owner` still holds it.
    pub async fn release_scan_lock(&self, name: &str, owner: &str) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("scan-lock:{}", name);
        let script = redis::Script::new(r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            else
                return 0
            end
        "#);

        let deleted: i64 = script.key(&key).arg(owner).invoke_async(&mut conn).await?;
        Ok(deleted == 1)
    }
}
