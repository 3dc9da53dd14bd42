//! User record storage for Authgate.
//!
//! This crate provides the credential store behind the sign-in flows. It
//! ships an in-memory store and, with the `sqlx` feature, SQLite and
//! PostgreSQL stores selected from a database URL.

mod error;
mod memory;
#[cfg(feature = "sqlx")]
mod sql;
mod traits;

pub use error::*;
pub use memory::*;
#[cfg(feature = "sqlx")]
pub use sql::*;
pub use traits::*;
