// service/deletion_tokens.rs
//
// Account deletion tokens are JWTs carrying a `jti`. A jti may be redeemed
// once; the burn list lives in Redis when available so it survives restarts
// and is shared between instances.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use redis::aio::ConnectionManager;

const KEY_PREFIX: &str = "deletion:jti:";
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct DeletionTokenStore {
    redis: Option<ConnectionManager>,
    // jti -> exp (unix seconds)
    local: Arc<Mutex<HashMap<String, i64>>>,
}

impl DeletionTokenStore {
    pub fn new(redis: Option<ConnectionManager>) -> Self {
        if redis.is_none() {
            tracing::warn!(
                "Redis unavailable: deletion tokens are tracked in process memory and reset on restart"
            );
        }

        Self {
            redis,
            local: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records `jti` as used. Returns `false` when it was already used.
    pub async fn consume(&self, jti: &str, exp: i64) -> bool {
        let ttl = (exp - Utc::now().timestamp()).max(1);

        if let Some(mut conn) = self.redis.clone() {
            let result = redis::cmd("SET")
                .arg(format!("{}{}", KEY_PREFIX, jti))
                .arg(1)
                .arg("NX")
                .arg("EX")
                .arg(ttl)
                .query_async::<_, Option<String>>(&mut conn)
                .await;

            match result {
                Ok(reply) => return reply.is_some(),
                Err(e) => {
                    tracing::warn!("deletion token store: redis SET failed, using memory: {}", e);
                }
            }
        }

        self.consume_local(jti, exp)
    }

    /// Gives a consumed jti back when the deletion it guarded did not happen.
    pub async fn release(&self, jti: &str) {
        if let Some(mut conn) = self.redis.clone() {
            let result = redis::cmd("DEL")
                .arg(format!("{}{}", KEY_PREFIX, jti))
                .query_async::<_, i64>(&mut conn)
                .await;

            if let Err(e) = result {
                tracing::warn!("deletion token store: redis DEL failed: {}", e);
            }
        }

        let mut used = self.local.lock().unwrap_or_else(|e| e.into_inner());
        used.remove(jti);
    }

    fn consume_local(&self, jti: &str, exp: i64) -> bool {
        let mut used = self.local.lock().unwrap_or_else(|e| e.into_inner());
        if used.contains_key(jti) {
            return false;
        }
        used.insert(jti.to_string(), exp);
        true
    }

    /// Drops entries whose token has expired anyway.
    pub fn sweep(&self) -> usize {
        let now = Utc::now().timestamp();
        let mut used = self.local.lock().unwrap_or_else(|e| e.into_inner());
        let before = used.len();
        used.retain(|_, exp| *exp > now);
        before - used.len()
    }

    pub fn spawn_sweeper(&self) {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                let removed = store.sweep();
                if removed > 0 {
                    tracing::debug!("deletion token sweep removed {} entries", removed);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn jti_is_single_use_without_redis() {
        let store = DeletionTokenStore::new(None);
        let exp = Utc::now().timestamp() + 900;

        assert!(store.consume("abc", exp).await);
        assert!(!store.consume("abc", exp).await);
        assert!(store.consume("def", exp).await);
    }

    #[tokio::test]
    async fn released_jti_can_be_redeemed_again() {
        let store = DeletionTokenStore::new(None);
        let exp = Utc::now().timestamp() + 900;

        assert!(store.consume("abc", exp).await);
        store.release("abc").await;
        assert!(store.consume("abc", exp).await);
        assert!(!store.consume("abc", exp).await);
    }

    #[tokio::test]
    async fn sweep_forgets_only_expired_entries() {
        let store = DeletionTokenStore::new(None);
        let now = Utc::now().timestamp();

        assert!(store.consume("old", now - 10).await);
        assert!(store.consume("fresh", now + 900).await);

        assert_eq!(store.sweep(), 1);
        assert!(!store.consume("fresh", now + 900).await);
    }
}
