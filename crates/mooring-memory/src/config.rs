//! Memory cache configuration

use mooring_core::{
    Error, Result, MEMORY_COLD_ITEMS_COUNT_MAX_DEFAULT, MEMORY_HOT_TOKENS_LIMIT_DEFAULT,
    MEMORY_PROMOTE_THRESHOLD_DEFAULT, MEMORY_WARM_ACCESS_THRESHOLD_DEFAULT,
};
use serde::{Deserialize, Serialize};

/// Configuration for a [`TierCache`](crate::cache::TierCache)
///
/// Built once, immutable afterwards. Unset fields take the defaults
/// from `mooring_core::constants`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Token budget of the hot tier
    pub hot_token_limit: usize,
    /// Access count at or above which a spilled item lands in warm
    /// instead of cold
    pub warm_access_threshold: u64,
    /// Recall relevance at or above which an item is auto-promoted
    pub promote_threshold: f64,
    /// Item cap of the cold tier, enforced by `prune_cold`
    pub max_cold_items: usize,
    /// Spill automatically when an insert would exceed the hot budget
    pub auto_spill_enabled: bool,
    /// Promote automatically on high-relevance recall hits
    pub auto_promote_enabled: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            hot_token_limit: MEMORY_HOT_TOKENS_LIMIT_DEFAULT,
            warm_access_threshold: MEMORY_WARM_ACCESS_THRESHOLD_DEFAULT,
            promote_threshold: MEMORY_PROMOTE_THRESHOLD_DEFAULT,
            max_cold_items: MEMORY_COLD_ITEMS_COUNT_MAX_DEFAULT,
            auto_spill_enabled: true,
            auto_promote_enabled: true,
        }
    }
}

impl MemoryConfig {
    /// Create with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hot tier token budget
    pub fn with_hot_token_limit(mut self, limit: usize) -> Self {
        self.hot_token_limit = limit;
        self
    }

    /// Set the warm access threshold
    pub fn with_warm_access_threshold(mut self, threshold: u64) -> Self {
        self.warm_access_threshold = threshold;
        self
    }

    /// Set the auto-promotion threshold
    pub fn with_promote_threshold(mut self, threshold: f64) -> Self {
        self.promote_threshold = threshold;
        self
    }

    /// Set the cold tier item cap
    pub fn with_max_cold_items(mut self, max: usize) -> Self {
        self.max_cold_items = max;
        self
    }

    /// Enable or disable automatic spilling
    pub fn with_auto_spill(mut self, enabled: bool) -> Self {
        self.auto_spill_enabled = enabled;
        self
    }

    /// Enable or disable automatic promotion
    pub fn with_auto_promote(mut self, enabled: bool) -> Self {
        self.auto_promote_enabled = enabled;
        self
    }

    /// Validate field ranges
    pub fn validate(&self) -> Result<()> {
        if self.hot_token_limit == 0 {
            return Err(Error::InvalidConfiguration {
                field: "hot_token_limit".into(),
                reason: "must be positive".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.promote_threshold) {
            return Err(Error::InvalidConfiguration {
                field: "promote_threshold".into(),
                reason: format!("{} is outside 0.0..=1.0", self.promote_threshold),
            });
        }
        if self.max_cold_items == 0 {
            return Err(Error::InvalidConfiguration {
                field: "max_cold_items".into(),
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MemoryConfig::new();
        assert_eq!(config.hot_token_limit, 4000);
        assert_eq!(config.warm_access_threshold, 2);
        assert!(config.auto_spill_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = MemoryConfig::new()
            .with_hot_token_limit(100)
            .with_auto_spill(false);
        assert_eq!(config.hot_token_limit, 100);
        assert!(!config.auto_spill_enabled);
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let config = MemoryConfig::new().with_promote_threshold(1.5);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let config = MemoryConfig::new().with_hot_token_limit(0);
        assert!(config.validate().is_err());
    }
}
