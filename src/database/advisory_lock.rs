//! # Advisory Lock
//!
//! A distributed mutex built on PostgreSQL session-level advisory locks.
//! The string key is digested to a 63-bit integer, so any two processes
//! deriving the key from the same string contend on the same lock.
//!
//! Session locks belong to the connection that took them, so the handle
//! checks out a dedicated connection on acquisition and holds it until the
//! lock is released; unlock on a different pooled connection would silently
//! fail to release.

use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{QuarryError, Result};

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// A handle on one named advisory lock.
pub struct AdvisoryLock {
    pool: PgPool,
    key: String,
    lock_key: i64,
    timeout: Duration,
    conn: Option<PoolConnection<Postgres>>,
    locked: bool,
}

impl AdvisoryLock {
    pub fn new(pool: PgPool, key: impl Into<String>, timeout: Duration) -> Self {
        let key = key.into();
        let lock_key = Self::derive_key(&key);
        Self {
            pool,
            key,
            lock_key,
            timeout,
            conn: None,
            locked: false,
        }
    }

    /// Map an arbitrary string key into the non-negative `i64` range.
    /// SHA-256 keeps the mapping deterministic and stable across processes
    /// and releases, which distributed coordination depends on.
    pub fn derive_key(key: &str) -> i64 {
        let digest = Sha256::digest(key.as_bytes());
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(raw) & (i64::MAX as u64)) as i64
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn lock_key(&self) -> i64 {
        self.lock_key
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Non-blocking acquire. Calling while already held is a usage error.
    pub async fn try_lock(&mut self) -> Result<bool> {
        if self.locked {
            return Err(QuarryError::usage(format!(
                "advisory lock {:?} is already held by this handle",
                self.key
            )));
        }

        let mut conn = match self.conn.take() {
            Some(conn) => conn,
            None => self.pool.acquire().await?,
        };
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(self.lock_key)
            .fetch_one(conn.as_mut())
            .await?;

        if acquired {
            debug!(key = %self.key, lock_key = self.lock_key, "advisory lock acquired");
            self.conn = Some(conn);
            self.locked = true;
        }
        // On failure the connection drops back to the pool.
        Ok(acquired)
    }

    /// Blocking acquire: polls [`try_lock`](Self::try_lock) with doubling
    /// backoff (0.1s start, 1s cap) until acquired, or fails with
    /// [`QuarryError::Unavailable`] once the next sleep would overrun the
    /// timeout.
    pub async fn lock(&mut self) -> Result<()> {
        if self.locked {
            return Err(QuarryError::usage(format!(
                "advisory lock {:?} is already held by this handle",
                self.key
            )));
        }

        let started = Instant::now();
        let mut backoff = INITIAL_BACKOFF;
        loop {
            if self.try_lock().await? {
                return Ok(());
            }
            if started.elapsed() + backoff > self.timeout {
                return Err(QuarryError::unavailable(format!(
                    "advisory lock {:?} not acquired within {:?}",
                    self.key, self.timeout
                )));
            }
            sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// Release the lock. Calling while not held is a usage error.
    pub async fn unlock(&mut self) -> Result<()> {
        if !self.locked {
            return Err(QuarryError::usage(format!(
                "advisory lock {:?} is not held by this handle",
                self.key
            )));
        }
        let mut conn = self.conn.take().ok_or_else(|| {
            QuarryError::usage("advisory lock handle lost its connection while held")
        })?;

        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(self.lock_key)
            .fetch_one(conn.as_mut())
            .await?;
        self.locked = false;
        if released {
            debug!(key = %self.key, "advisory lock released");
        } else {
            warn!(key = %self.key, "advisory unlock reported no lock held on this session");
        }
        Ok(())
    }

    /// Acquire, run `f`, release on every exit path.
    pub async fn synchronize<F, Fut, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.lock().await?;
        let result = f().await;
        let unlock_result = self.unlock().await;
        match (result, unlock_result) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(unlock_error)) => Err(unlock_error),
            (Err(error), _) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_derivation_is_deterministic() {
        assert_eq!(
            AdvisoryLock::derive_key("jobs:nightly"),
            AdvisoryLock::derive_key("jobs:nightly")
        );
    }

    #[test]
    fn key_derivation_stays_in_the_signed_positive_range() {
        for key in ["a", "b", "jobs:nightly", "", "quarry/locks/42"] {
            assert!(AdvisoryLock::derive_key(key) >= 0);
        }
    }

    #[test]
    fn distinct_keys_derive_distinct_integers() {
        assert_ne!(
            AdvisoryLock::derive_key("jobs:nightly"),
            AdvisoryLock::derive_key("jobs:hourly")
        );
    }
}
