//! Core entity definitions for Authgate.
//!
//! This crate defines the user records and provider profiles shared by the
//! store and authentication crates.

mod user;

pub use user::*;
