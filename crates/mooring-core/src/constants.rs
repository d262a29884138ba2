//! Limit constants for Mooring
//!
//! All limits are explicit, use big-endian naming (most significant first),
//! and include units in the name.

// =============================================================================
// Identifier Limits
// =============================================================================

/// Maximum length of a project id in bytes
pub const PROJECT_ID_LENGTH_BYTES_MAX: usize = 128;

/// Maximum length of a session id in bytes
pub const SESSION_ID_LENGTH_BYTES_MAX: usize = 256;

// =============================================================================
// Checkpoint Limits
// =============================================================================

/// Default number of checkpoints retained per session
pub const CHECKPOINTS_PER_SESSION_COUNT_DEFAULT: usize = 10;

/// Maximum serialized agent state size in bytes (10 MB)
pub const AGENT_STATE_SIZE_BYTES_MAX: usize = 10 * 1024 * 1024;

// =============================================================================
// Plan Limits
// =============================================================================

/// Maximum number of steps in a plan
pub const PLAN_STEPS_COUNT_MAX: usize = 1000;

// =============================================================================
// Memory Tier Limits
// =============================================================================

/// Default hot tier token budget
pub const MEMORY_HOT_TOKENS_LIMIT_DEFAULT: usize = 4000;

/// Default access count required to land in the warm tier on spill
pub const MEMORY_WARM_ACCESS_THRESHOLD_DEFAULT: u64 = 2;

/// Default recall relevance at or above which an item is promoted
pub const MEMORY_PROMOTE_THRESHOLD_DEFAULT: f64 = 0.7;

/// Default maximum number of cold tier items per session
pub const MEMORY_COLD_ITEMS_COUNT_MAX_DEFAULT: usize = 100;

/// Number of hot items spilled by default when none are named
pub const MEMORY_SPILL_ITEMS_COUNT_DEFAULT: usize = 4;

/// Default number of items returned by recall
pub const MEMORY_RECALL_RESULTS_COUNT_DEFAULT: usize = 3;

/// Hot tier utilization above which a spill is suggested
pub const MEMORY_HOT_UTILIZATION_SPILL_ADVISORY: f64 = 0.9;

// =============================================================================
// Transaction Limits
// =============================================================================

/// Maximum number of keys in a single transaction
pub const TRANSACTION_KEYS_COUNT_MAX: usize = 10_000;
