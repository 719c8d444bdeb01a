//! Retrieval configuration.
//!
//! Mirrors the `SubcogConfig`/`GraphRAGConfig::from_env()` pattern: a plain
//! struct with a sensible [`Default`] and an `from_env()` constructor that
//! overrides individual fields from environment variables, falling back to
//! the default on parse failure.

use crate::{Error, Result};

/// Default maximum hop count for any single path.
pub const DEFAULT_MAX_DEPTH: usize = 5;
/// Default strict lower bound for retained transfer energy.
pub const DEFAULT_MIN_ACTIVATION: f64 = 0.005;
/// Default tag-similarity floor (see [`crate::tag_sim`]).
pub const DEFAULT_TAG_SIM_FLOOR: f64 = 0.15;
/// Default per-parent, per-depth fan-out cap.
pub const DEFAULT_MAX_BRANCHES: usize = 3;
/// Default retry budget for transient graph-store failures.
///
/// The source material used values between 2 and 5 in different places;
/// 3 is the single, documented value this crate standardizes on.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default on-disk database file for the `SQLite` connector.
pub const DEFAULT_STORE_DATABASE: &str = "hippocampus.db";

/// Configuration for a retrieval run.
///
/// All fields have documented defaults and may be overridden individually;
/// the whole struct is immutable once handed to a
/// [`crate::orchestrator::RetrieverOrchestrator`].
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalConfig {
    /// Maximum hop count for any single path (`MAX_DEPTH`).
    pub max_depth: usize,
    /// Strict lower bound for retained transfer energy (`MIN_ACTIVATION`).
    pub min_activation: f64,
    /// Tag-similarity floor used when edge tags are empty (`TAG_SIM_FLOOR`).
    pub tag_sim_floor: f64,
    /// Per-parent, per-depth fan-out cap (`MAX_BRANCHES`).
    pub max_branches: usize,
    /// Maximum retry attempts for a transient graph-store failure.
    pub max_retries: u32,
    /// Database identifier/path handed to the graph-store connector.
    pub store_database: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            min_activation: DEFAULT_MIN_ACTIVATION,
            tag_sim_floor: DEFAULT_TAG_SIM_FLOOR,
            max_branches: DEFAULT_MAX_BRANCHES,
            max_retries: DEFAULT_MAX_RETRIES,
            store_database: DEFAULT_STORE_DATABASE.to_string(),
        }
    }
}

impl RetrievalConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("HIPPOCAMPUS_MAX_DEPTH")
            && let Ok(parsed) = val.parse()
        {
            config.max_depth = parsed;
        }

        if let Ok(val) = std::env::var("HIPPOCAMPUS_MIN_ACTIVATION")
            && let Ok(parsed) = val.parse()
        {
            config.min_activation = parsed;
        }

        if let Ok(val) = std::env::var("HIPPOCAMPUS_TAG_SIM_FLOOR")
            && let Ok(parsed) = val.parse()
        {
            config.tag_sim_floor = parsed;
        }

        if let Ok(val) = std::env::var("HIPPOCAMPUS_MAX_BRANCHES")
            && let Ok(parsed) = val.parse()
        {
            config.max_branches = parsed;
        }

        if let Ok(val) = std::env::var("HIPPOCAMPUS_MAX_RETRIES")
            && let Ok(parsed) = val.parse()
        {
            config.max_retries = parsed;
        }

        if let Ok(val) = std::env::var("HIPPOCAMPUS_STORE_DATABASE") {
            config.store_database = val;
        }

        config
    }

    /// Sets the maximum traversal depth.
    #[must_use]
    pub const fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the per-parent branch cap.
    #[must_use]
    pub const fn with_max_branches(mut self, branches: usize) -> Self {
        self.max_branches = branches;
        self
    }

    /// Validates the configuration, failing synchronously on a precondition
    /// violation per spec §7 point 4.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if any field is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::InvalidInput(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if !(self.min_activation > 0.0) {
            return Err(Error::InvalidInput(
                "min_activation must be strictly positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tag_sim_floor) {
            return Err(Error::InvalidInput(
                "tag_sim_floor must be in [0, 1]".to_string(),
            ));
        }
        if self.max_branches == 0 {
            return Err(Error::InvalidInput(
                "max_branches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
