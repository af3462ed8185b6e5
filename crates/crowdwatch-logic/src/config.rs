//! Engine tuning and venue definitions.
//!
//! Threshold constants were tuned experimentally across dashboard
//! iterations, so none of them are hard-coded: [`EngineConfig`] carries the
//! canonical defaults and can be overridden from JSON. [`VenueConfig`]
//! describes the zones and movement groups of a single event.
//!
//! ```
//! use crowdwatch_logic::config::EngineConfig;
//!
//! let config = EngineConfig::from_json_str(r#"{ "approachingThresholdRatio": 0.75 }"#).unwrap();
//! assert_eq!(config.approaching_threshold_ratio, 0.75);
//! assert_eq!(config.tick_minutes, 5);
//! ```

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flow::MovementGroup;
use crate::zones::{Zone, ZoneCatalog};

/// Environment variable naming an engine config file to load instead of the defaults.
pub const CONFIG_ENV_VAR: &str = "CROWDWATCH_CONFIG";

/// Recognized engine options with their canonical defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Fraction of the safe limit at which a zone becomes `Approaching`.
    pub approaching_threshold_ratio: f64,
    /// Zones below this fraction of their limit may receive overflow.
    pub candidate_utilization_ceiling: f64,
    /// Destination zones proposed per breached zone.
    pub max_suggestions_per_breach: usize,
    /// Real-time minutes per movement-group step.
    pub tick_minutes: u32,
    /// People moved per group per step when a group does not set its own.
    pub transfer_quantity: u32,
    /// Horizons evaluated when the caller does not ask for specific ones.
    pub default_horizons_minutes: Vec<u32>,
    /// Seconds between occupancy polls.
    pub poll_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approaching_threshold_ratio: 0.8,
            candidate_utilization_ceiling: 0.7,
            max_suggestions_per_breach: 2,
            tick_minutes: 5,
            transfer_quantity: 10,
            default_horizons_minutes: vec![5, 10, 15, 20, 25],
            poll_interval_secs: 15,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Load from the file named by [`CONFIG_ENV_VAR`], falling back to defaults.
    ///
    /// A missing or broken override file is logged and ignored.
    pub fn load_from_env() -> Self {
        let Some(path) = env::var_os(CONFIG_ENV_VAR).map(PathBuf::from) else {
            log::info!("engine config: using built-in defaults");
            return Self::default();
        };
        match Self::from_file(&path) {
            Ok(config) => {
                log::info!("engine config: loaded {}", path.display());
                config
            }
            Err(err) => {
                log::warn!(
                    "engine config: {} unusable ({}), using built-in defaults",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_ratio(
            "approachingThresholdRatio",
            self.approaching_threshold_ratio,
        )?;
        check_ratio(
            "candidateUtilizationCeiling",
            self.candidate_utilization_ceiling,
        )?;
        if self.tick_minutes == 0 {
            return Err(ConfigError::Invalid {
                field: "tickMinutes",
                reason: "must be at least 1".into(),
            });
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "pollIntervalSecs",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

fn check_ratio(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is outside (0, 1]"),
        })
    }
}

/// A movement group as written in a venue file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDef {
    pub label: String,
    pub path: Vec<String>,
    /// Overrides [`EngineConfig::transfer_quantity`] for this group.
    #[serde(default)]
    pub transfer: Option<u32>,
}

/// Zones and movement groups for one monitored event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zones: Vec<Zone>,
    #[serde(default)]
    pub groups: Vec<GroupDef>,
}

impl VenueConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let venue: VenueConfig = serde_json::from_str(json)?;
        venue.validate()?;
        Ok(venue)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Groups must walk a non-empty path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(group) = self.groups.iter().find(|g| g.path.is_empty()) {
            return Err(ConfigError::Invalid {
                field: "groups",
                reason: format!("group '{}' has an empty path", group.label),
            });
        }
        Ok(())
    }

    pub fn catalog(&self) -> ZoneCatalog {
        ZoneCatalog::from_zones(self.zones.iter().cloned())
    }

    /// Movement groups at position 0, using the engine default transfer where unset.
    pub fn movement_groups(&self, engine: &EngineConfig) -> Vec<MovementGroup> {
        self.groups
            .iter()
            .map(|g| {
                MovementGroup::new(
                    g.label.clone(),
                    g.path.clone(),
                    g.transfer.unwrap_or(engine.transfer_quantity),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_canonical() {
        let config = EngineConfig::default();
        assert_eq!(config.approaching_threshold_ratio, 0.8);
        assert_eq!(config.candidate_utilization_ceiling, 0.7);
        assert_eq!(config.max_suggestions_per_breach, 2);
        assert_eq!(config.tick_minutes, 5);
        assert_eq!(config.transfer_quantity, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{"maxSuggestionsPerBreach": 3}"#).unwrap();
        assert_eq!(config.max_suggestions_per_breach, 3);
        assert_eq!(config.candidate_utilization_ceiling, 0.7);
    }

    #[test]
    fn test_rejects_zero_tick() {
        let err = EngineConfig::from_json_str(r#"{"tickMinutes": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "tickMinutes",
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_out_of_range_ratio() {
        assert!(EngineConfig::from_json_str(r#"{"approachingThresholdRatio": 1.5}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"candidateUtilizationCeiling": 0}"#).is_err());
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = EngineConfig::from_file(Path::new("/nonexistent/crowdwatch.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_venue_groups_inherit_transfer() {
        let venue = VenueConfig::from_json_str(
            r#"{
                "name": "Test Event",
                "zones": [{"id": "A", "safeLimit": 100}, {"id": "B", "safeLimit": 80}],
                "groups": [
                    {"label": "Group 1", "path": ["A", "B"]},
                    {"label": "Group 2", "path": ["B", "A"], "transfer": 4}
                ]
            }"#,
        )
        .unwrap();
        let groups = venue.movement_groups(&EngineConfig::default());
        assert_eq!(groups[0].transfer, 10);
        assert_eq!(groups[1].transfer, 4);
        assert_eq!(venue.catalog().limit("B"), Some(80));
    }

    #[test]
    fn test_venue_rejects_empty_path() {
        let err = VenueConfig::from_json_str(r#"{"groups": [{"label": "g", "path": []}]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "groups", .. }));
    }
}
