// src/output.rs
use std::sync::Arc;

use serde::Serialize;

use crate::motion::trajectory::Trajectory;

/// Result of one control cycle.
#[derive(Debug, Clone, Default)]
pub struct OutputParameter {
    pub new_position: Vec<f64>,
    pub new_velocity: Vec<f64>,
    pub new_acceleration: Vec<f64>,
    /// Time since the active trajectory started (s)
    pub time: f64,
    pub trajectory: Option<Arc<Trajectory>>,
    /// Whether this cycle planned a new trajectory
    pub new_calculation: bool,
    /// Wall-clock time of the last planning pass (µs)
    pub calculation_duration: f64,
}

impl OutputParameter {
    pub fn new(dofs: usize) -> Self {
        Self {
            new_position: vec![0.0; dofs],
            new_velocity: vec![0.0; dofs],
            new_acceleration: vec![0.0; dofs],
            ..Self::default()
        }
    }

    /// Sample without the trajectory reference, for logging and export.
    pub fn sample(&self) -> Sample {
        Sample {
            time: self.time,
            position: self.new_position.clone(),
            velocity: self.new_velocity.clone(),
            acceleration: self.new_acceleration.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub acceleration: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_exports_state_without_trajectory() {
        let mut output = OutputParameter::new(2);
        output.time = 0.5;
        output.new_position = vec![1.0, -2.0];
        output.new_calculation = true;
        let json = serde_json::to_value(output.sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "time": 0.5,
                "position": [1.0, -2.0],
                "velocity": [0.0, 0.0],
                "acceleration": [0.0, 0.0],
            })
        );
    }
}
