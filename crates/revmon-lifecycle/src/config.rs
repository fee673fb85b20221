//! Review configuration
//!
//! Passed explicitly into the controller. Missing keys take the defaults
//! below; a missing file is the caller's choice to fall back to `Default`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Agent profile used for reviews
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewProfile {
    /// Executor name, e.g. `CLAUDE_CODE`
    pub executor: String,
    /// Executor variant
    #[serde(default)]
    pub variant: Option<String>,
}

/// Review preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Start a review automatically when a task enters review
    pub auto_review_enabled: bool,
    /// Review agent; `None` reuses the coding agent
    pub review_profile: Option<ReviewProfile>,
    /// Custom review prompt
    pub prompt_template: Option<String>,
    /// Retries allowed after the first failed attempt
    pub max_retries: u32,
    /// Include review feedback in follow-up prompts
    pub include_in_follow_up: bool,
}

impl ReviewConfig {
    /// Default retry budget
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Largest accepted retry budget
    pub const MAX_RETRIES_LIMIT: u32 = 5;

    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With retry budget
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// With auto review
    #[inline]
    #[must_use]
    pub fn with_auto_review(mut self, enabled: bool) -> Self {
        self.auto_review_enabled = enabled;
        self
    }

    /// With review profile
    #[inline]
    #[must_use]
    pub fn with_profile(mut self, profile: ReviewProfile) -> Self {
        self.review_profile = Some(profile);
        self
    }

    /// Parse and validate a TOML document
    ///
    /// # Errors
    /// - `ConfigError::Parse` if the document is not a review config
    /// - `ConfigError::MaxRetriesOutOfRange` if the budget exceeds the limit
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`ReviewConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), max_retries = config.max_retries, "review config loaded");
        Ok(config)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns `ConfigError::MaxRetriesOutOfRange` if `max_retries` exceeds the limit
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries > Self::MAX_RETRIES_LIMIT {
            return Err(ConfigError::MaxRetriesOutOfRange {
                value: self.max_retries,
                max: Self::MAX_RETRIES_LIMIT,
            });
        }
        Ok(())
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            auto_review_enabled: false,
            review_profile: None,
            prompt_template: None,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            include_in_follow_up: true,
        }
    }
}
