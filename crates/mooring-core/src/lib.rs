//! Mooring Core
//!
//! Core types, errors, and constants for the Mooring agent memory engine.
//!
//! # Overview
//!
//! Mooring gives a multi-step AI agent a persistent working memory:
//! checkpointed plan execution that survives process restarts, and a
//! token-budgeted hot working set backed by warm and cold tiers with
//! relevance-driven recall.
//!
//! This crate holds the pieces every other crate depends on:
//! - The error taxonomy and `Result` alias
//! - Validated `ProjectId` / `SessionId` identifiers
//! - Explicit limit constants
//! - Telemetry bootstrap

pub mod constants;
pub mod error;
pub mod ids;
pub mod telemetry;

pub use constants::*;
pub use error::{Error, Result};
pub use ids::{ProjectId, SessionId};
pub use telemetry::{init_telemetry, TelemetryConfig};
