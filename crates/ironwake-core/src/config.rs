//! Rules configuration.
//!
//! Every value has a default so a partial YAML document (or none at all)
//! yields a playable configuration. Ladder-indexed tables are ordered by rung:
//! position `[controlled, risky, desperate, impossible]`, effect
//! `[limited, standard, great, spectacular]`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating a [`RulesConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read rules config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document is not valid YAML for this schema.
    #[error("failed to parse rules config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The configuration parsed but violates a rule.
    #[error("invalid rules config: {0}")]
    Invalid(String),
}

/// Clock sizes per rarity tier for consumable clocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaritySizes {
    /// Common supplies.
    pub common: u8,
    /// Uncommon supplies.
    pub uncommon: u8,
    /// Rare supplies.
    pub rare: u8,
}

impl Default for RaritySizes {
    fn default() -> Self {
        Self {
            common: 8,
            uncommon: 6,
            rare: 4,
        }
    }
}

/// Capacity and sizing rules for clocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockRules {
    /// Segment count of every harm clock.
    pub harm_max: u8,
    /// Maximum number of harm clocks a single owner may hold.
    pub max_harm_clocks: usize,
    /// Segment count of the crew addiction clock.
    pub addiction_max: u8,
    /// Allowed sizes for progress clocks.
    pub progress_sizes: Vec<u8>,
    /// Consumable clock sizes by rarity.
    pub rarity_sizes: RaritySizes,
}

impl Default for ClockRules {
    fn default() -> Self {
        Self {
            harm_max: 6,
            max_harm_clocks: 3,
            addiction_max: 8,
            progress_sizes: vec![4, 6, 8, 12],
            rarity_sizes: RaritySizes::default(),
        }
    }
}

/// Crew momentum economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumRules {
    /// Momentum cap per crew.
    pub max: u8,
    /// Momentum a newly registered crew starts with.
    pub starting: u8,
    /// Momentum awarded on an accepted consequence, by original position.
    pub award_by_position: [u8; 4],
    /// Momentum spent to push.
    pub push_cost: u8,
    /// Momentum spent on a flashback trait.
    pub flashback_cost: u8,
}

impl Default for MomentumRules {
    fn default() -> Self {
        Self {
            max: 10,
            starting: 2,
            award_by_position: [1, 2, 4, 6],
            push_cost: 1,
            flashback_cost: 1,
        }
    }
}

/// Action resolution tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionRules {
    /// Faces on an action die; the highest face is a full success.
    pub die_faces: u8,
    /// Lowest face that counts as a partial success.
    pub partial_threshold: u8,
    /// Consequence severity in segments, by effective position.
    pub severity_by_position: [u8; 4],
    /// Segments granted to a progress clock on success, by effective effect.
    pub success_segments_by_effect: [u8; 4],
    /// Extra success segments when acting from desperate or worse.
    pub desperate_bonus_segments: u8,
    /// Faces on the die rolled for addiction when using a stimulant.
    pub stimulant_die_faces: u8,
}

impl Default for ResolutionRules {
    fn default() -> Self {
        Self {
            die_faces: 6,
            partial_threshold: 4,
            severity_by_position: [1, 2, 3, 4],
            success_segments_by_effect: [1, 2, 3, 5],
            desperate_bonus_segments: 1,
            stimulant_die_faces: 6,
        }
    }
}

/// Complete rules configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Clock rules.
    pub clocks: ClockRules,
    /// Momentum rules.
    pub momentum: MomentumRules,
    /// Resolution rules.
    pub resolution: ResolutionRules,
}

impl RulesConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed YAML and
    /// `ConfigError::Invalid` if validation fails.
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`RulesConfig::from_yaml_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&source)
    }

    /// Check cross-field rules.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let clocks = &self.clocks;
        if clocks.harm_max == 0 || clocks.addiction_max == 0 {
            return Err(ConfigError::Invalid(
                "harm_max and addiction_max must be positive".to_owned(),
            ));
        }
        if clocks.max_harm_clocks == 0 {
            return Err(ConfigError::Invalid(
                "max_harm_clocks must be positive".to_owned(),
            ));
        }
        if clocks.progress_sizes.is_empty() || clocks.progress_sizes.contains(&0) {
            return Err(ConfigError::Invalid(
                "progress_sizes must be non-empty and positive".to_owned(),
            ));
        }
        let rarity = &clocks.rarity_sizes;
        if rarity.common == 0 || rarity.uncommon == 0 || rarity.rare == 0 {
            return Err(ConfigError::Invalid(
                "rarity sizes must be positive".to_owned(),
            ));
        }

        let awards = self.momentum.award_by_position;
        if !awards.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(ConfigError::Invalid(
                "momentum awards must strictly increase as position worsens".to_owned(),
            ));
        }
        if self.momentum.starting > self.momentum.max {
            return Err(ConfigError::Invalid(
                "starting momentum exceeds the momentum cap".to_owned(),
            ));
        }

        let resolution = &self.resolution;
        if resolution.die_faces < 2 {
            return Err(ConfigError::Invalid("die_faces must be at least 2".to_owned()));
        }
        if resolution.partial_threshold < 2 || resolution.partial_threshold >= resolution.die_faces
        {
            return Err(ConfigError::Invalid(
                "partial_threshold must lie between 2 and die_faces - 1".to_owned(),
            ));
        }
        if resolution.stimulant_die_faces == 0 {
            return Err(ConfigError::Invalid(
                "stimulant_die_faces must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RulesConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = RulesConfig::from_yaml_str("clocks:\n  harm_max: 4\n").unwrap();
        assert_eq!(config.clocks.harm_max, 4);
        assert_eq!(config.clocks.addiction_max, 8);
        assert_eq!(config.momentum.max, 10);
    }

    #[test]
    fn test_non_increasing_momentum_awards_are_rejected() {
        let yaml = "momentum:\n  award_by_position: [1, 2, 2, 6]\n";
        match RulesConfig::from_yaml_str(yaml) {
            Err(ConfigError::Invalid(msg)) => assert!(msg.contains("strictly increase")),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_yaml_is_a_parse_error() {
        assert!(matches!(
            RulesConfig::from_yaml_str("clocks: [unterminated"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_partial_threshold_must_be_below_top_face() {
        let yaml = "resolution:\n  partial_threshold: 6\n";
        assert!(matches!(
            RulesConfig::from_yaml_str(yaml),
            Err(ConfigError::Invalid(_))
        ));
    }
}
