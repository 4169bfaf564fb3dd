//! Configuration types
//!
//! Hosts hand configuration over either as a TOML file or as a JSON
//! string on the FFI boundary; both deserialize into [`UncapConfig`].
//! The console variables themselves live on the host side — this crate
//! only receives their values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::patch::Platform;

/// Default minimum range for a pounce to be worth bonus damage
pub const DEFAULT_MIN_RANGE: f32 = 300.0;
/// Default range at which a pounce is worth the maximum bonus damage
pub const DEFAULT_MAX_RANGE: f32 = 1000.0;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must be non-negative, got {value}")]
    NegativeBound { field: &'static str, value: f32 },
    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),
}

/// Range uncap configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UncapConfig {
    /// Minimum range for a pounce to be worth bonus damage
    #[serde(default = "default_min_range")]
    pub min_range: f32,
    /// Range at which a pounce is worth the maximum bonus damage
    #[serde(default = "default_max_range")]
    pub max_range: f32,
    /// Layout override ("windows" / "linux"); auto-detected when absent
    #[serde(default)]
    pub platform: Option<String>,
}

fn default_min_range() -> f32 {
    DEFAULT_MIN_RANGE
}

fn default_max_range() -> f32 {
    DEFAULT_MAX_RANGE
}

impl Default for UncapConfig {
    fn default() -> Self {
        Self {
            min_range: DEFAULT_MIN_RANGE,
            max_range: DEFAULT_MAX_RANGE,
            platform: None,
        }
    }
}

impl UncapConfig {
    /// Parse and validate a TOML config
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the declared valid ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_range < 0.0 {
            return Err(ConfigError::NegativeBound {
                field: "min_range",
                value: self.min_range,
            });
        }
        if self.max_range < 0.0 {
            return Err(ConfigError::NegativeBound {
                field: "max_range",
                value: self.max_range,
            });
        }
        if let Some(id) = &self.platform {
            if Platform::from_id(id).is_none() {
                return Err(ConfigError::UnknownPlatform(id.clone()));
            }
        }
        Ok(())
    }

    /// The platform override, if one is configured
    pub fn platform_override(&self) -> Option<Platform> {
        self.platform.as_deref().and_then(Platform::from_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = UncapConfig::from_toml_str("").unwrap();
        assert_eq!(config, UncapConfig::default());
        assert_eq!(config.min_range, 300.0);
        assert_eq!(config.max_range, 1000.0);
        assert_eq!(config.platform_override(), None);
    }

    #[test]
    fn test_toml_round() {
        let config = UncapConfig::from_toml_str(
            "min_range = 250.0\nmax_range = 1500.0\nplatform = \"linux\"\n",
        )
        .unwrap();
        assert_eq!(config.min_range, 250.0);
        assert_eq!(config.max_range, 1500.0);
        assert_eq!(config.platform_override(), Some(Platform::Linux));
    }

    #[test]
    fn test_json_round() {
        let config =
            UncapConfig::from_json_str(r#"{"min_range": 100.0, "max_range": 2000.0}"#).unwrap();
        assert_eq!(config.min_range, 100.0);
        assert_eq!(config.max_range, 2000.0);
    }

    #[test]
    fn test_negative_bound_rejected() {
        let err = UncapConfig::from_toml_str("min_range = -1.0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NegativeBound {
                field: "min_range",
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_platform_rejected() {
        let err = UncapConfig::from_json_str(r#"{"platform": "solaris"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPlatform(_)));
    }
}
