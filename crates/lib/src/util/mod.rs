//! Shared utilities.
//!
//! Hashing and filesystem helpers used across the lifecycle steps.

pub mod fs;
pub mod hash;
