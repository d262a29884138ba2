//! Mooring Storage
//!
//! Per-project KV persistence for the Mooring agent memory engine.
//!
//! # Overview
//!
//! Provides the transactional key-value contract the checkpoint store
//! and memory tier cache are written against, plus an in-memory
//! backend:
//! - In-memory (for tests and single-process agents)
//!
//! Durable backends implement [`SessionKV`] out of tree; the engine
//! only ever sees the trait.

pub mod kv;
pub mod memory;

pub use kv::{KvTransaction, SessionKV};
pub use memory::MemoryKV;
