//! State and feedback persistence for Hybrid VCS.
//!
//! A SQLite database (`state.db`) holds two kinds of record:
//!
//! - **state**: `key -> StateValue`, upserted by [`StateStore::save_state`]
//!   and size-capped
//! - **feedback**: append-only [`FeedbackRecord`]s linked to a commit hash
//!
//! Connections come from a fixed-size [`ConnectionPool`]; callers block
//! until one is free or the acquire timeout passes. `SQLITE_BUSY` and
//! `SQLITE_LOCKED` are retried with jittered exponential backoff
//! ([`RetryPolicy`]) before surfacing.

pub mod error;
pub mod feedback;
pub mod pool;
pub mod retry;
pub mod schema;
pub mod store;
pub mod value;

pub use error::{StateError, StateResult};
pub use feedback::{FeedbackRecord, MAX_CATEGORY_LEN, MAX_SEVERITY};
pub use pool::{ConnectionPool, PoolConfig, PooledConnection};
pub use retry::RetryPolicy;
pub use store::{validate_key, StateConfig, StateStore};
pub use value::StateValue;
