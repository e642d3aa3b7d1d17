#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Quarry Core
//!
//! Query compilation and connection/transaction core for a PostgreSQL ORM.
//!
//! ## Overview
//!
//! Quarry Core represents a database query as an immutable, composable
//! descriptor, compiles it into injection-safe parameterized SQL with a
//! positional argument list, and manages per-execution-context connection
//! checkout and savepoint-nested transactions so SQL issued by unrelated
//! operations never interleaves incorrectly. A distributed mutex over
//! PostgreSQL advisory locks rounds out the concurrency toolkit.
//!
//! ## Module Organization
//!
//! - [`query_builder`] - Descriptors, conditions, joins, full-text search,
//!   SQL compilation, pagination envelopes
//! - [`collection`] - Lazy result collections with cached materialization,
//!   streaming iteration, aggregates, and batched reads
//! - [`database`] - Pooling, execution contexts, transactions, advisory
//!   locks, change-notification plumbing
//! - [`value`] - The closed domain value type bound to every statement
//! - [`schema`] - Runtime schema registry consulted by persistence
//! - [`config`] - Environment-driven database and pool configuration
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarry_core::collection::Collection;
//! use quarry_core::database::{ConnectionManager, DatabaseConnection};
//! use quarry_core::query_builder::QueryDescriptor;
//!
//! # async fn example() -> quarry_core::error::Result<()> {
//! let db = DatabaseConnection::from_env().await?;
//! let manager = Arc::new(ConnectionManager::new(db.pool().clone()));
//! let ctx = manager.context();
//!
//! let descriptor = QueryDescriptor::new("users")
//!     .where_eq("active", true)
//!     .order_desc("created_at")
//!     .limit(10);
//! let mut recent = Collection::new(manager.clone(), ctx, descriptor);
//! let rows = recent.to_list().await?;
//! println!("{} active users", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod collection;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod query_builder;
pub mod schema;
pub mod value;

pub use collection::Collection;
pub use config::{DatabaseConfig, PoolSettings};
pub use database::{
    AdvisoryLock, ChangeNotification, ConnectionManager, ContextId, DatabaseConnection,
    TableListener,
};
pub use error::{QuarryError, Result};
pub use query_builder::{
    AggregateFunction, Clause, CompiledQuery, Condition, CursorPage, CursorParams, Join, JoinKind,
    OrderDirection, PageMeta, PaginatedResult, QueryDescriptor, RankFunction, SearchQuery,
    SqlCompiler,
};
pub use schema::{ColumnDescriptor, SchemaRegistry};
pub use value::{Value, ValueKind};
