// src/input.rs
use serde::{Deserialize, Serialize};

use crate::error::OtgError;
use crate::motion::path::Path;
use crate::motion::profile::Limits;
use crate::motion::segment::KinematicState;
use crate::motion::synchronizer::{DofSolver, PositionSolver, Synchronization, VelocitySolver};

/// Which part of the target state is controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interface {
    /// Position, velocity and acceleration
    #[default]
    Position,
    /// Velocity and acceleration only
    Velocity,
}

/// Whether the trajectory duration is rounded to the control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DurationDiscretization {
    #[default]
    Continuous,
    /// Round the duration up to a multiple of the cycle time
    Discrete,
}

/// Everything one `update` call plans from.
///
/// Compared by value between cycles: any change triggers a new plan.
#[derive(Debug, Clone, PartialEq)]
pub struct InputParameter {
    pub degrees_of_freedom: usize,
    pub interface: Interface,
    pub synchronization: Synchronization,
    pub duration_discretization: DurationDiscretization,

    pub current_position: Vec<f64>,
    pub current_velocity: Vec<f64>,
    pub current_acceleration: Vec<f64>,

    pub target_position: Vec<f64>,
    pub target_velocity: Vec<f64>,
    pub target_acceleration: Vec<f64>,

    pub max_velocity: Vec<f64>,
    pub max_acceleration: Vec<f64>,
    pub max_jerk: Vec<f64>,
    /// Defaults to `-max_velocity`
    pub min_velocity: Option<Vec<f64>>,
    /// Defaults to `-max_acceleration`
    pub min_acceleration: Option<Vec<f64>>,

    pub enabled: Vec<bool>,
    /// Lower bound on the trajectory duration (s)
    pub minimum_duration: Option<f64>,
    /// Follow this path instead of moving point to point
    pub path: Option<Path>,
}

impl InputParameter {
    /// Input for `dofs` DoFs at rest at the origin. Limits start at zero and must be set.
    pub fn new(dofs: usize) -> Self {
        Self {
            degrees_of_freedom: dofs,
            interface: Interface::default(),
            synchronization: Synchronization::default(),
            duration_discretization: DurationDiscretization::default(),
            current_position: vec![0.0; dofs],
            current_velocity: vec![0.0; dofs],
            current_acceleration: vec![0.0; dofs],
            target_position: vec![0.0; dofs],
            target_velocity: vec![0.0; dofs],
            target_acceleration: vec![0.0; dofs],
            max_velocity: vec![0.0; dofs],
            max_acceleration: vec![0.0; dofs],
            max_jerk: vec![0.0; dofs],
            min_velocity: None,
            min_acceleration: None,
            enabled: vec![true; dofs],
            minimum_duration: None,
            path: None,
        }
    }

    pub fn limits(&self, dof: usize) -> Limits {
        Limits::new(
            self.max_velocity[dof],
            self.min_velocity.as_ref().map(|v| v[dof]),
            self.max_acceleration[dof],
            self.min_acceleration.as_ref().map(|a| a[dof]),
            self.max_jerk[dof],
        )
    }

    pub fn current_state(&self, dof: usize) -> KinematicState {
        KinematicState::new(
            self.current_position[dof],
            self.current_velocity[dof],
            self.current_acceleration[dof],
        )
    }

    pub fn target_state(&self, dof: usize) -> KinematicState {
        KinematicState::new(
            self.target_position[dof],
            self.target_velocity[dof],
            self.target_acceleration[dof],
        )
    }

    /// Checks vector lengths, finiteness and limits for a generator with `dofs` DoFs.
    ///
    /// Whether the states fit the limits is checked per DoF during synthesis.
    pub fn validate(&self, dofs: usize) -> Result<(), OtgError> {
        if self.degrees_of_freedom != dofs {
            return Err(OtgError::InvalidInput(format!(
                "input has {} DoFs, generator has {dofs}",
                self.degrees_of_freedom
            )));
        }
        let vectors: [(&str, Option<usize>); 12] = [
            ("current_position", Some(self.current_position.len())),
            ("current_velocity", Some(self.current_velocity.len())),
            ("current_acceleration", Some(self.current_acceleration.len())),
            ("target_position", Some(self.target_position.len())),
            ("target_velocity", Some(self.target_velocity.len())),
            ("target_acceleration", Some(self.target_acceleration.len())),
            ("max_velocity", Some(self.max_velocity.len())),
            ("max_acceleration", Some(self.max_acceleration.len())),
            ("max_jerk", Some(self.max_jerk.len())),
            ("min_velocity", self.min_velocity.as_ref().map(Vec::len)),
            ("min_acceleration", self.min_acceleration.as_ref().map(Vec::len)),
            ("enabled", Some(self.enabled.len())),
        ];
        for (name, len) in vectors {
            if let Some(len) = len {
                if len != dofs {
                    return Err(OtgError::InvalidInput(format!("{name} has {len} entries, expected {dofs}")));
                }
            }
        }
        for dof in 0..dofs {
            self.limits(dof).validate().map_err(|e| e.for_dof(dof))?;
        }
        if let Some(t) = self.minimum_duration {
            if !t.is_finite() || t < 0.0 {
                return Err(OtgError::InvalidInput(format!("minimum duration {t} must be non-negative")));
            }
        }
        if let Some(path) = &self.path {
            if self.interface != Interface::Position {
                return Err(OtgError::InvalidInput("paths need the position interface".into()));
            }
            if path.degrees_of_freedom() != dofs {
                return Err(OtgError::InvalidInput(format!(
                    "path has {} DoFs, expected {dofs}",
                    path.degrees_of_freedom()
                )));
            }
            for dof in 0..dofs {
                let limits = self.limits(dof);
                let (current, target) = (self.current_state(dof), self.target_state(dof));
                for state in [current, target] {
                    if !limits.contains_velocity(state.velocity) || !limits.contains_acceleration(state.acceleration) {
                        return Err(OtgError::InvalidInput(format!("DoF {dof}: path boundary state outside the limits")));
                    }
                }
            }
        }
        Ok(())
    }

    /// Per-DoF solver for point-to-point planning.
    pub fn solver(&self, dof: usize) -> DofSolver {
        let (current, target, limits) = (self.current_state(dof), self.target_state(dof), self.limits(dof));
        if !self.enabled[dof] {
            return DofSolver::Disabled(current);
        }
        match self.interface {
            Interface::Position => DofSolver::Position(PositionSolver::new(current, target, limits)),
            Interface::Velocity => DofSolver::Velocity(VelocitySolver::new(current, target, limits)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> InputParameter {
        let mut input = InputParameter::new(2);
        input.max_velocity = vec![1.0, 2.0];
        input.max_acceleration = vec![1.0, 2.0];
        input.max_jerk = vec![1.0, 2.0];
        input
    }

    #[test]
    fn test_limits_default_to_symmetric() {
        let mut input = input();
        assert_eq!(input.limits(1).min_velocity, -2.0);
        input.min_velocity = Some(vec![-0.5, -0.5]);
        assert_eq!(input.limits(0).min_velocity, -0.5);
        assert!(input.validate(2).is_ok());
    }

    #[test]
    fn test_validation_errors() {
        let input = input();
        assert!(matches!(input.validate(3), Err(OtgError::InvalidInput(_))));

        let mut short = input.clone();
        short.target_position = vec![1.0];
        let err = short.validate(2).unwrap_err();
        assert!(err.to_string().contains("target_position"));

        let mut zero_jerk = input.clone();
        zero_jerk.max_jerk[1] = 0.0;
        let err = zero_jerk.validate(2).unwrap_err();
        assert!(err.to_string().contains("DoF 1"));
    }

    #[test]
    fn test_solver_selection() {
        let mut input = input();
        assert!(matches!(input.solver(0), DofSolver::Position(_)));
        input.interface = Interface::Velocity;
        assert!(matches!(input.solver(0), DofSolver::Velocity(_)));
        input.enabled[1] = false;
        assert!(matches!(input.solver(1), DofSolver::Disabled(_)));
    }
}
