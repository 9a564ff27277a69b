//! # Generator and Scenario Configuration
//!
//! One TOML file describes a generator setup and the motion to plan with it.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [generator]
//! delta_time = 0.001
//! synchronization = "time"
//!
//! [limits]
//! max_velocity = [2.0, 2.0, 2.0]
//! max_acceleration = [2.0, 2.0, 2.0]
//! max_jerk = [1.0, 1.0, 1.0]
//!
//! [motion]
//! target_position = [0.5, 2.0, -1.0]
//! ```
//!
//! - The length of the limit vectors sets the number of DoFs.
//! - Missing current and target vectors default to zeros.
//! - A `[path]` table with `waypoints` switches to path following.

// src/config.rs - Single configuration file
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::OtgError;
use crate::generator::Otg;
use crate::input::{DurationDiscretization, InputParameter, Interface};
use crate::motion::path::{Path, PathWaypoint, Reference};
use crate::motion::synchronizer::Synchronization;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl From<OtgError> for ConfigError {
    fn from(err: OtgError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

/// Main configuration struct: generator settings, limits, motion and an optional path.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub generator: GeneratorConfig,
    pub limits: LimitsConfig,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub path: Option<PathConfig>,
}

/// Generator-level settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_delta_time")]
    pub delta_time: f64,
    #[serde(default)]
    pub interface: Interface,
    #[serde(default)]
    pub synchronization: Synchronization,
    #[serde(default)]
    pub duration_discretization: DurationDiscretization,
    #[serde(default)]
    pub minimum_duration: Option<f64>,
    #[serde(default)]
    pub calculation_budget_us: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            delta_time: default_delta_time(),
            interface: Interface::default(),
            synchronization: Synchronization::default(),
            duration_discretization: DurationDiscretization::default(),
            minimum_duration: None,
            calculation_budget_us: None,
        }
    }
}

/// Per-DoF kinematic limits.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LimitsConfig {
    pub max_velocity: Vec<f64>,
    pub max_acceleration: Vec<f64>,
    pub max_jerk: Vec<f64>,
    #[serde(default)]
    pub min_velocity: Option<Vec<f64>>,
    #[serde(default)]
    pub min_acceleration: Option<Vec<f64>>,
}

/// Current and target states; missing vectors are zeros.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MotionConfig {
    #[serde(default)]
    pub current_position: Option<Vec<f64>>,
    #[serde(default)]
    pub current_velocity: Option<Vec<f64>>,
    #[serde(default)]
    pub current_acceleration: Option<Vec<f64>>,
    #[serde(default)]
    pub target_position: Option<Vec<f64>>,
    #[serde(default)]
    pub target_velocity: Option<Vec<f64>>,
    #[serde(default)]
    pub target_acceleration: Option<Vec<f64>>,
    #[serde(default)]
    pub enabled: Option<Vec<bool>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathConfig {
    pub waypoints: Vec<WaypointConfig>,
    #[serde(default = "default_max_blend_distance")]
    pub max_blend_distance: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaypointConfig {
    pub position: Vec<f64>,
    #[serde(default)]
    pub relative: bool,
    #[serde(default)]
    pub max_blend_distance: Option<f64>,
}

impl Config {
    pub fn degrees_of_freedom(&self) -> usize {
        self.limits.max_velocity.len()
    }

    /// Validate vector lengths and positivity before anything is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dofs = self.degrees_of_freedom();
        if dofs == 0 {
            return Err(ConfigError::Invalid("limits.max_velocity must not be empty".into()));
        }
        if !self.generator.delta_time.is_finite() || self.generator.delta_time <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "generator.delta_time must be > 0, got {}",
                self.generator.delta_time
            )));
        }
        if let Some(t) = self.generator.minimum_duration {
            if t < 0.0 {
                return Err(ConfigError::Invalid("generator.minimum_duration must be >= 0".into()));
            }
        }

        let limits = [
            ("max_velocity", &self.limits.max_velocity),
            ("max_acceleration", &self.limits.max_acceleration),
            ("max_jerk", &self.limits.max_jerk),
        ];
        for (name, values) in limits {
            if values.len() != dofs {
                return Err(ConfigError::Invalid(format!("limits.{name} has {} entries, expected {dofs}", values.len())));
            }
            if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err(ConfigError::Invalid(format!("limits.{name} must be > 0")));
            }
        }
        let minimums = [
            ("min_velocity", &self.limits.min_velocity),
            ("min_acceleration", &self.limits.min_acceleration),
        ];
        for (name, values) in minimums {
            if let Some(values) = values {
                if values.len() != dofs {
                    return Err(ConfigError::Invalid(format!("limits.{name} has {} entries, expected {dofs}", values.len())));
                }
                if values.iter().any(|v| !v.is_finite() || *v >= 0.0) {
                    return Err(ConfigError::Invalid(format!("limits.{name} must be < 0")));
                }
            }
        }

        let m = &self.motion;
        let states = [
            ("current_position", &m.current_position),
            ("current_velocity", &m.current_velocity),
            ("current_acceleration", &m.current_acceleration),
            ("target_position", &m.target_position),
            ("target_velocity", &m.target_velocity),
            ("target_acceleration", &m.target_acceleration),
        ];
        for (name, values) in states {
            if let Some(values) = values {
                if values.len() != dofs {
                    return Err(ConfigError::Invalid(format!("motion.{name} has {} entries, expected {dofs}", values.len())));
                }
            }
        }
        if let Some(enabled) = &m.enabled {
            if enabled.len() != dofs {
                return Err(ConfigError::Invalid(format!("motion.enabled has {} entries, expected {dofs}", enabled.len())));
            }
        }

        if let Some(path) = &self.path {
            if path.waypoints.is_empty() {
                return Err(ConfigError::Invalid("path.waypoints must not be empty".into()));
            }
            if path.max_blend_distance < 0.0 {
                return Err(ConfigError::Invalid("path.max_blend_distance must be >= 0".into()));
            }
            for (i, waypoint) in path.waypoints.iter().enumerate() {
                if waypoint.position.len() != dofs {
                    return Err(ConfigError::Invalid(format!(
                        "path.waypoints[{i}] has {} coordinates, expected {dofs}",
                        waypoint.position.len()
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn build_generator(&self) -> Result<Otg, ConfigError> {
        self.validate()?;
        let otg = Otg::new(self.degrees_of_freedom(), self.generator.delta_time)?;
        Ok(match self.generator.calculation_budget_us {
            Some(us) => otg.with_calculation_budget(Duration::from_micros(us)),
            None => otg,
        })
    }

    /// Path described by `[path]`, starting at the current position.
    pub fn build_path(&self) -> Result<Option<Path>, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(None);
        };
        let dofs = self.degrees_of_freedom();
        let waypoints = path
            .waypoints
            .iter()
            .map(|w| PathWaypoint {
                position: w.position.clone(),
                reference: if w.relative { Reference::Relative } else { Reference::Absolute },
                max_blend_distance: w.max_blend_distance,
            })
            .collect();
        let start = or_zeros(&self.motion.current_position, dofs);
        Ok(Some(Path::new(start, waypoints, path.max_blend_distance)?))
    }

    pub fn input_parameter(&self) -> Result<InputParameter, ConfigError> {
        self.validate()?;
        let dofs = self.degrees_of_freedom();
        let m = &self.motion;
        let mut input = InputParameter::new(dofs);
        input.interface = self.generator.interface;
        input.synchronization = self.generator.synchronization;
        input.duration_discretization = self.generator.duration_discretization;
        input.minimum_duration = self.generator.minimum_duration;

        input.current_position = or_zeros(&m.current_position, dofs);
        input.current_velocity = or_zeros(&m.current_velocity, dofs);
        input.current_acceleration = or_zeros(&m.current_acceleration, dofs);
        input.target_position = or_zeros(&m.target_position, dofs);
        input.target_velocity = or_zeros(&m.target_velocity, dofs);
        input.target_acceleration = or_zeros(&m.target_acceleration, dofs);

        input.max_velocity = self.limits.max_velocity.clone();
        input.max_acceleration = self.limits.max_acceleration.clone();
        input.max_jerk = self.limits.max_jerk.clone();
        input.min_velocity = self.limits.min_velocity.clone();
        input.min_acceleration = self.limits.min_acceleration.clone();
        if let Some(enabled) = &m.enabled {
            input.enabled = enabled.clone();
        }
        input.path = self.build_path()?;
        Ok(input)
    }
}

fn or_zeros(values: &Option<Vec<f64>>, dofs: usize) -> Vec<f64> {
    values.clone().unwrap_or_else(|| vec![0.0; dofs])
}

// Default value functions
fn default_delta_time() -> f64 { 0.001 }
fn default_max_blend_distance() -> f64 { 0.0 }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_B: &str = r#"
        [generator]
        delta_time = 0.01

        [limits]
        max_velocity = [2.0, 2.0, 2.0]
        max_acceleration = [2.0, 2.0, 2.0]
        max_jerk = [1.0, 1.0, 1.0]

        [motion]
        target_position = [0.5, 2.0, -1.0]
    "#;

    #[test]
    fn test_default_values() {
        let config: Config = toml::from_str(SCENARIO_B).unwrap();
        assert_eq!(config.generator.synchronization, Synchronization::Time);
        assert_eq!(config.generator.interface, Interface::Position);
        assert!(config.limits.min_velocity.is_none());
        assert!(config.path.is_none());
        assert_eq!(GeneratorConfig::default().delta_time, 0.001);
    }

    #[test]
    fn test_input_parameter_from_config() {
        let config: Config = toml::from_str(SCENARIO_B).unwrap();
        let input = config.input_parameter().unwrap();
        assert_eq!(input.degrees_of_freedom, 3);
        assert_eq!(input.current_position, vec![0.0; 3]);
        assert_eq!(input.target_position, vec![0.5, 2.0, -1.0]);
        assert_eq!(config.build_generator().unwrap().delta_time(), 0.01);
    }

    #[test]
    fn test_enum_names() {
        let toml = r#"
        [generator]
        interface = "velocity"
        synchronization = "time_if_necessary"
        duration_discretization = "discrete"

        [limits]
        max_velocity = [1.0]
        max_acceleration = [1.0]
        max_jerk = [1.0]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.generator.interface, Interface::Velocity);
        assert_eq!(config.generator.synchronization, Synchronization::TimeIfNecessary);
        assert_eq!(config.generator.duration_discretization, DurationDiscretization::Discrete);
    }

    #[test]
    fn test_validation_rejects_mismatched_lengths() {
        let mut config: Config = toml::from_str(SCENARIO_B).unwrap();
        config.limits.max_jerk.pop();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config: Config = toml::from_str(SCENARIO_B).unwrap();
        config.limits.min_velocity = Some(vec![1.0, -1.0, -1.0]);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_path_from_config() {
        let toml = r#"
        [limits]
        max_velocity = [1.0, 1.0, 1.0]
        max_acceleration = [1.0, 1.0, 1.0]
        max_jerk = [1.0, 1.0, 1.0]

        [path]
        max_blend_distance = 0.1

        [[path.waypoints]]
        position = [1.0, 0.0, 0.0]

        [[path.waypoints]]
        position = [0.0, 1.0, -3.0]
        relative = true

        [[path.waypoints]]
        position = [0.0, 0.0, 0.0]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        let path = config.build_path().unwrap().unwrap();
        assert_eq!(path.waypoints()[1].reference, Reference::Relative);
        assert_eq!(path.q(path.length()), vec![0.0, 0.0, 0.0]);
    }
}
