//! Lifecycle and use-case orchestration.
//!
//! # Responsibility
//! - Wire provider, schema management and backup into the process
//!   lifecycle.
//! - Keep callers decoupled from per-request connection handling.

pub mod food_log;
