//! # Execution Context Manager
//!
//! Tracks, per execution context, one checked-out pool connection and a
//! stack of transactions (top-level plus savepoint-nested). A context is an
//! explicit [`ContextId`] handle passed by the caller; each map entry is
//! owned exclusively by its context, so statements issued sequentially by
//! one context never interleave with another context's transaction.
//!
//! Statement execution is routed through the manager by context id: a
//! context holding a connection runs on it, a context without one gets a
//! fresh pooled connection for just that statement.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres};
use tracing::{debug, warn};

use crate::error::{QuarryError, Result};
use crate::value::{bind_values, Value};

/// Opaque handle identifying one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

#[derive(Debug)]
struct ContextState {
    conn: PoolConnection<Postgres>,
    tx_depth: usize,
    /// Set when a transaction checked the connection out itself; it then
    /// also returns it to the pool on outermost exit.
    implicit_checkout: bool,
}

/// Owns the pool and the per-context connection/transaction map.
pub struct ConnectionManager {
    pool: PgPool,
    contexts: DashMap<ContextId, ContextState>,
    next_context: AtomicU64,
}

impl ConnectionManager {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            contexts: DashMap::new(),
            next_context: AtomicU64::new(1),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Issue a fresh execution-context handle.
    pub fn context(&self) -> ContextId {
        ContextId(self.next_context.fetch_add(1, Ordering::Relaxed))
    }

    /// Check a connection out of the pool for this context. Idempotent: a
    /// context already holding a connection keeps it.
    pub async fn checkout(&self, ctx: ContextId) -> Result<()> {
        if self.contexts.contains_key(&ctx) {
            return Ok(());
        }
        let conn = self.pool.acquire().await?;
        self.contexts.insert(
            ctx,
            ContextState {
                conn,
                tx_depth: 0,
                implicit_checkout: false,
            },
        );
        Ok(())
    }

    pub fn is_checked_out(&self, ctx: ContextId) -> bool {
        self.contexts.contains_key(&ctx)
    }

    /// Current transaction nesting depth for this context.
    pub fn transaction_depth(&self, ctx: ContextId) -> usize {
        self.contexts.get(&ctx).map(|s| s.tx_depth).unwrap_or(0)
    }

    /// Return this context's connection to the pool. Releasing inside an
    /// open transaction is a usage error; use the transaction block's exit.
    pub fn release(&self, ctx: ContextId) -> Result<()> {
        let open_tx = self
            .contexts
            .get(&ctx)
            .map(|s| s.tx_depth > 0)
            .unwrap_or(false);
        if open_tx {
            return Err(QuarryError::usage(
                "cannot release a connection with an open transaction",
            ));
        }
        self.contexts.remove(&ctx);
        Ok(())
    }

    /// Unconditional release; rolls back any open transaction first.
    async fn force_release(&self, ctx: ContextId) {
        if let Some((_, mut state)) = self.contexts.remove(&ctx) {
            if state.tx_depth > 0 {
                warn!(depth = state.tx_depth, "releasing context with open transaction");
                let _ = sqlx::query("ROLLBACK").execute(state.conn.as_mut()).await;
            }
        }
    }

    fn set_depth(&self, ctx: ContextId, depth: usize) {
        if let Some(mut state) = self.contexts.get_mut(&ctx) {
            state.tx_depth = depth;
        }
    }

    /// Execute a statement on this context's connection (or a one-shot
    /// pooled connection when none is held) and return the affected-row
    /// count.
    pub async fn execute(&self, ctx: ContextId, sql: &str, args: &[Value]) -> Result<u64> {
        debug!(sql = %sql, params = args.len(), "execute");
        if let Some((_, mut state)) = self.contexts.remove(&ctx) {
            let result = bind_values(sqlx::query(sql), args)
                .execute(state.conn.as_mut())
                .await;
            self.contexts.insert(ctx, state);
            Ok(result?.rows_affected())
        } else {
            let mut conn = self.pool.acquire().await?;
            let result = bind_values(sqlx::query(sql), args)
                .execute(conn.as_mut())
                .await?;
            Ok(result.rows_affected())
        }
    }

    pub async fn fetch_all(&self, ctx: ContextId, sql: &str, args: &[Value]) -> Result<Vec<PgRow>> {
        debug!(sql = %sql, params = args.len(), "fetch_all");
        if let Some((_, mut state)) = self.contexts.remove(&ctx) {
            let result = bind_values(sqlx::query(sql), args)
                .fetch_all(state.conn.as_mut())
                .await;
            self.contexts.insert(ctx, state);
            Ok(result?)
        } else {
            let mut conn = self.pool.acquire().await?;
            let rows = bind_values(sqlx::query(sql), args)
                .fetch_all(conn.as_mut())
                .await?;
            Ok(rows)
        }
    }

    pub async fn fetch_optional(
        &self,
        ctx: ContextId,
        sql: &str,
        args: &[Value],
    ) -> Result<Option<PgRow>> {
        debug!(sql = %sql, params = args.len(), "fetch_optional");
        if let Some((_, mut state)) = self.contexts.remove(&ctx) {
            let result = bind_values(sqlx::query(sql), args)
                .fetch_optional(state.conn.as_mut())
                .await;
            self.contexts.insert(ctx, state);
            Ok(result?)
        } else {
            let mut conn = self.pool.acquire().await?;
            let row = bind_values(sqlx::query(sql), args)
                .fetch_optional(conn.as_mut())
                .await?;
            Ok(row)
        }
    }

    /// Stream rows to a callback without materializing the result set.
    pub async fn fetch_each<F>(
        &self,
        ctx: ContextId,
        sql: &str,
        args: &[Value],
        mut f: F,
    ) -> Result<()>
    where
        F: FnMut(&PgRow) -> Result<()>,
    {
        debug!(sql = %sql, params = args.len(), "fetch_each");
        if let Some((_, mut state)) = self.contexts.remove(&ctx) {
            let result = async {
                let mut stream = bind_values(sqlx::query(sql), args).fetch(state.conn.as_mut());
                while let Some(row) = stream.try_next().await? {
                    f(&row)?;
                }
                Ok(())
            }
            .await;
            self.contexts.insert(ctx, state);
            result
        } else {
            let mut conn = self.pool.acquire().await?;
            let mut stream = bind_values(sqlx::query(sql), args).fetch(conn.as_mut());
            while let Some(row) = stream.try_next().await? {
                f(&row)?;
            }
            Ok(())
        }
    }

    /// Run `f` with a connection pinned to this context. An already-held
    /// connection is reused and kept; a connection acquired here is
    /// released when the scope exits, on every exit path.
    pub async fn with_connection<F, Fut, T>(&self, ctx: ContextId, f: F) -> Result<T>
    where
        F: FnOnce(ContextId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let had_connection = self.contexts.contains_key(&ctx);
        if !had_connection {
            self.checkout(ctx).await?;
        }
        let result = f(ctx).await;
        if !had_connection {
            self.force_release(ctx).await;
        }
        result
    }

    /// Run `f` on a fresh pooled connection under a new ephemeral context,
    /// released when the call returns.
    pub async fn connection<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(ContextId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let ctx = self.context();
        self.checkout(ctx).await?;
        let result = f(ctx).await;
        self.force_release(ctx).await;
        result
    }

    /// Run `f` inside a transaction on this context.
    ///
    /// Depth 0 begins a top-level transaction (checking out a connection if
    /// none is held); depth >= 1 pushes a savepoint. On success the level
    /// commits (`Ok(Some(value))`). On [`QuarryError::Rollback`] the level
    /// rolls back silently (`Ok(None)`). Any other error rolls back and
    /// propagates. A savepoint rollback never disturbs work already done at
    /// an outer level; an outer rollback unwinds all nested savepoints.
    pub async fn transaction<F, Fut, T>(&self, ctx: ContextId, f: F) -> Result<Option<T>>
    where
        F: FnOnce(ContextId) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let implicit = !self.contexts.contains_key(&ctx);
        self.checkout(ctx).await?;
        if implicit {
            if let Some(mut state) = self.contexts.get_mut(&ctx) {
                state.implicit_checkout = true;
            }
        }

        let depth = self.transaction_depth(ctx);
        let begin = if depth == 0 {
            "BEGIN".to_string()
        } else {
            format!("SAVEPOINT quarry_sp_{depth}")
        };
        if let Err(error) = self.execute(ctx, &begin, &[]).await {
            if implicit {
                self.force_release(ctx).await;
            }
            return Err(error);
        }
        self.set_depth(ctx, depth + 1);

        let outcome = f(ctx).await;

        let result = match outcome {
            Ok(value) => {
                let end = if depth == 0 {
                    "COMMIT".to_string()
                } else {
                    format!("RELEASE SAVEPOINT quarry_sp_{depth}")
                };
                self.execute(ctx, &end, &[]).await.map(|_| Some(value))
            }
            Err(error) => {
                let end = if depth == 0 {
                    "ROLLBACK".to_string()
                } else {
                    format!("ROLLBACK TO SAVEPOINT quarry_sp_{depth}")
                };
                // The original failure wins over a failed rollback.
                if let Err(rollback_error) = self.execute(ctx, &end, &[]).await {
                    warn!(error = %rollback_error, "rollback failed");
                }
                if error.is_rollback() {
                    Ok(None)
                } else {
                    Err(error)
                }
            }
        };

        self.set_depth(ctx, depth);
        if depth == 0 {
            let implicit_checkout = self
                .contexts
                .get(&ctx)
                .map(|s| s.implicit_checkout)
                .unwrap_or(false);
            if implicit_checkout {
                self.force_release(ctx).await;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConnectionManager {
        // A lazy pool never connects until a statement runs, so handle
        // bookkeeping is testable without a database.
        let pool = PgPool::connect_lazy("postgresql://localhost/quarry_unit_test")
            .expect("lazy pool construction");
        ConnectionManager::new(pool)
    }

    #[tokio::test]
    async fn context_handles_are_unique() {
        let manager = manager();
        let a = manager.context();
        let b = manager.context();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn depth_defaults_to_zero() {
        let manager = manager();
        let ctx = manager.context();
        assert_eq!(manager.transaction_depth(ctx), 0);
        assert!(!manager.is_checked_out(ctx));
    }

    #[tokio::test]
    async fn releasing_an_unknown_context_is_a_no_op() {
        let manager = manager();
        let ctx = manager.context();
        assert!(manager.release(ctx).is_ok());
    }
}
