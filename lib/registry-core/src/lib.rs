//! Core user registry functionality
//!
//! This library provides:
//! - The `User` record carried by both transports
//! - `UserRegistry`, the process-local store keyed by user id
//! - The error type raised by registry lookups

pub mod registry;
pub mod user;
pub mod error;

pub use registry::UserRegistry;
pub use user::{User, UserId};
pub use error::{CoreError, Result};
