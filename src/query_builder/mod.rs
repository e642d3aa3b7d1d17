//! # Query Builder System
//!
//! Immutable query descriptors and their compilation into parameterized
//! PostgreSQL statements.
//!
//! ## Key Components
//!
//! - [`descriptor`] - Immutable, structurally-shared query representation
//! - [`conditions`] - WHERE condition variants (equality, membership,
//!   regex, raw fragments, full-text, OR trees)
//! - [`joins`] - JOIN clause descriptors
//! - [`search`] - Full-text search predicates with optional ranking
//! - [`compiler`] - SQL generation with positional `$n` placeholders
//! - [`pagination`] - Offset and keyset pagination envelopes
//!
//! ## Example
//!
//! ```rust
//! use quarry_core::query_builder::{QueryDescriptor, SqlCompiler};
//!
//! let descriptor = QueryDescriptor::new("users")
//!     .where_eq("active", true)
//!     .order_desc("created_at")
//!     .limit(10);
//! let compiled = SqlCompiler::new(&descriptor).compile_select().unwrap();
//! assert_eq!(
//!     compiled.sql,
//!     "SELECT * FROM \"users\" WHERE \"active\" = $1 ORDER BY \"created_at\" DESC LIMIT 10"
//! );
//! ```

pub mod compiler;
pub mod conditions;
pub mod descriptor;
pub mod joins;
pub mod pagination;
pub mod search;

pub use compiler::{AggregateFunction, CompiledQuery, SqlCompiler, RANK_ALIAS};
pub use conditions::Condition;
pub use descriptor::{Clause, OrderClause, OrderDirection, QueryDescriptor};
pub use joins::{Join, JoinKind, JoinOn};
pub use pagination::{CursorMeta, CursorPage, CursorParams, PageMeta, PaginatedResult};
pub use search::{RankFunction, SearchQuery};
