//! # Database Operations
//!
//! Connection pooling, per-context connection and transaction management,
//! advisory locking, and the change-notification boundary.
//!
//! ## Key Components
//!
//! - [`connection`] - Pool construction and health checks
//! - [`context`] - Per-execution-context connection checkout and the
//!   savepoint-nested transaction stack
//! - [`advisory_lock`] - Distributed mutex over session advisory locks
//! - [`listener`] - listen/unlisten plumbing for change notifications

pub mod advisory_lock;
pub mod connection;
pub mod context;
pub mod listener;

pub use advisory_lock::AdvisoryLock;
pub use connection::DatabaseConnection;
pub use context::{ConnectionManager, ContextId};
pub use listener::{ChangeNotification, TableListener};
