//! Configuration for the reporting workflow
//!
//! This module contains the configuration types and loading functionality.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::CoreError;

/// Limits applied by the stage validators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    /// Maximum number of accident photos
    #[serde(default = "default_max_images")]
    pub max_images: usize,

    /// Maximum size of a single photo, in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    /// Minimum description length (trimmed, in characters)
    #[serde(default = "default_description_min")]
    pub description_min_chars: usize,

    /// Maximum description length (trimmed, in characters)
    #[serde(default = "default_description_max")]
    pub description_max_chars: usize,

    /// Number of trailing social security digits requested
    #[serde(default = "default_ssn_digits")]
    pub ssn_digits: usize,
}

fn default_max_images() -> usize {
    4
}

fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_description_min() -> usize {
    10
}

fn default_description_max() -> usize {
    500
}

fn default_ssn_digits() -> usize {
    4
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_images: default_max_images(),
            max_image_bytes: default_max_image_bytes(),
            description_min_chars: default_description_min(),
            description_max_chars: default_description_max(),
            ssn_digits: default_ssn_digits(),
        }
    }
}

/// Workflow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Validation limits
    #[serde(default)]
    pub validation: ValidationRules,

    /// How long to wait for a GPS fix, in milliseconds
    #[serde(default = "default_geolocation_timeout_ms")]
    pub geolocation_timeout_ms: u64,

    /// How old a cached GPS fix may be before a fresh one is requested, in seconds
    #[serde(default = "default_position_max_age_secs")]
    pub position_max_age_secs: u64,

    /// Diagrams that open the infraction attribution sub-decision
    #[serde(default = "default_infraction_diagrams")]
    pub infraction_diagrams: Vec<String>,

    /// Out-of-band remedy shown when the other vehicle is not in the registry
    #[serde(default = "default_escalation_phone")]
    pub escalation_phone: String,

    /// URL of the session store
    #[serde(default = "default_session_store_url")]
    pub session_store_url: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_geolocation_timeout_ms() -> u64 {
    10_000
}

fn default_position_max_age_secs() -> u64 {
    300 // 5 minutes
}

fn default_infraction_diagrams() -> Vec<String> {
    vec!["IV-2".to_string()]
}

fn default_escalation_phone() -> String {
    "Policía de Puerto Rico: 787.343.2020".to_string()
}

fn default_session_store_url() -> String {
    "memory://local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            validation: ValidationRules::default(),
            geolocation_timeout_ms: default_geolocation_timeout_ms(),
            position_max_age_secs: default_position_max_age_secs(),
            infraction_diagrams: default_infraction_diagrams(),
            escalation_phone: default_escalation_phone(),
            session_store_url: default_session_store_url(),
            log_level: default_log_level(),
        }
    }
}

impl WorkflowConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn load() -> Result<Self, CoreError> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        info!("Workflow configuration loaded");
        Ok(config)
    }

    /// Load configuration from a YAML file, then apply environment overrides
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigurationError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let mut config: Self = serde_yaml::from_str(&raw)?;
        config.apply_env();
        config.validate()?;
        info!(path = %path.display(), "Workflow configuration loaded from file");
        Ok(config)
    }

    /// Override fields from `SINQUERELLA_*` environment variables
    fn apply_env(&mut self) {
        if let Ok(value) = env::var("SINQUERELLA_MAX_IMAGES") {
            match value.parse::<usize>() {
                Ok(parsed) => self.validation.max_images = parsed,
                Err(_) => warn!("Invalid SINQUERELLA_MAX_IMAGES value: {}", value),
            }
        }

        if let Ok(value) = env::var("SINQUERELLA_MAX_IMAGE_BYTES") {
            match value.parse::<u64>() {
                Ok(parsed) => self.validation.max_image_bytes = parsed,
                Err(_) => warn!("Invalid SINQUERELLA_MAX_IMAGE_BYTES value: {}", value),
            }
        }

        if let Ok(value) = env::var("SINQUERELLA_GEOLOCATION_TIMEOUT_MS") {
            match value.parse::<u64>() {
                Ok(parsed) => self.geolocation_timeout_ms = parsed,
                Err(_) => warn!("Invalid SINQUERELLA_GEOLOCATION_TIMEOUT_MS value: {}", value),
            }
        }

        if let Ok(value) = env::var("SINQUERELLA_POSITION_MAX_AGE_SECS") {
            match value.parse::<u64>() {
                Ok(parsed) => self.position_max_age_secs = parsed,
                Err(_) => warn!("Invalid SINQUERELLA_POSITION_MAX_AGE_SECS value: {}", value),
            }
        }

        if let Ok(value) = env::var("SINQUERELLA_INFRACTION_DIAGRAMS") {
            self.infraction_diagrams = value
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Ok(value) = env::var("SINQUERELLA_ESCALATION_PHONE") {
            self.escalation_phone = value;
        }

        if let Ok(value) = env::var("SINQUERELLA_SESSION_STORE_URL") {
            self.session_store_url = value;
        }

        if let Ok(value) = env::var("SINQUERELLA_LOG_LEVEL") {
            self.log_level = value;
        }
    }

    /// Check that the values are usable
    pub fn validate(&self) -> Result<(), CoreError> {
        let rules = &self.validation;
        if rules.max_images == 0 {
            return Err(CoreError::ConfigurationError(
                "max_images must be at least 1".to_string(),
            ));
        }
        if rules.description_min_chars > rules.description_max_chars {
            return Err(CoreError::ConfigurationError(format!(
                "description_min_chars ({}) exceeds description_max_chars ({})",
                rules.description_min_chars, rules.description_max_chars
            )));
        }
        if rules.ssn_digits == 0 {
            return Err(CoreError::ConfigurationError(
                "ssn_digits must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Bounded wait for a GPS fix
    #[inline]
    pub fn geolocation_timeout(&self) -> Duration {
        Duration::from_millis(self.geolocation_timeout_ms)
    }

    /// Acceptable age of a cached GPS fix
    #[inline]
    pub fn position_max_age(&self) -> Duration {
        Duration::from_secs(self.position_max_age_secs)
    }
}
