//! Database module for Pulseboard.
//!
//! Provides SQLite storage for endpoints and probe metrics, plus the
//! read-side query engine.

mod models;
mod query;
mod seed;
mod store;

pub use models::*;
pub use query::*;
pub use seed::*;
pub use store::*;
