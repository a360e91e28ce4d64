//! # lanca-session
//!
//! Per-user session state for lanca: conversation context, the pending
//! password-protected PDF, and pending corrections, all short-lived and
//! TTL'd.
//!
//! The production store is Redis ([`RedisSessionStore`]); tests and offline
//! development use [`InMemorySessionStore`]. Both implement
//! `lanca_core::SessionStore` and the same per-key, last-write-wins
//! semantics — cross-job coordination happens in the store, never via
//! in-process locks.

pub mod memory;
pub mod store;

pub use memory::InMemorySessionStore;
pub use store::RedisSessionStore;
