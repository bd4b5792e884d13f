//! Repository layer: CRUD contracts over the dialect-neutral store.
//!
//! # Responsibility
//! - Define the record-access contract the HTTP collaborator consumes.
//! - Keep SQL text and row decoding inside the persistence boundary.
//!
//! # Invariants
//! - Write paths validate payloads before SQL mutations.
//! - Every meal lookup scopes by `(id, user_id)`; an ownership mismatch is
//!   reported as not-found.

pub mod record_repo;
