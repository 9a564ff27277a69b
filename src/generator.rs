// src/generator.rs - Per-cycle driver
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::OtgError;
use crate::input::{DurationDiscretization, InputParameter};
use crate::motion::synchronizer::{DofSolver, SyncOptions, synchronize};
use crate::motion::trajectory::Trajectory;
use crate::output::OutputParameter;

/// Longest trajectory the generator accepts (s).
pub const MAX_TRAJECTORY_DURATION: f64 = 7.6e3;

/// Outcome of one `update` call.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateResult {
    Working,
    /// The trajectory has reached its target
    Finished,
    Error(OtgError),
}

impl UpdateResult {
    /// 0 for working, 1 for finished, the error's negative code otherwise.
    pub fn code(&self) -> i32 {
        match self {
            UpdateResult::Working => 0,
            UpdateResult::Finished => 1,
            UpdateResult::Error(err) => err.code(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, UpdateResult::Error(_))
    }
}

/// State kept between cycles while a trajectory is active.
#[derive(Debug)]
struct Session {
    trajectory: Arc<Trajectory>,
    /// Time since the trajectory started (s)
    time: f64,
    /// Input of the last cycle, with the current state replaced by the output
    input: InputParameter,
}

/// Online trajectory generator for a fixed number of DoFs and cycle time.
#[derive(Debug)]
pub struct Otg {
    dofs: usize,
    delta_time: f64,
    calculation_budget: Option<Duration>,
    session: Option<Session>,
    calculations: u64,
}

impl Otg {
    pub fn new(dofs: usize, delta_time: f64) -> Result<Self, OtgError> {
        if dofs == 0 {
            return Err(OtgError::InvalidInput("at least one DoF is required".into()));
        }
        if !delta_time.is_finite() || delta_time <= 0.0 {
            return Err(OtgError::InvalidInput(format!("cycle time {delta_time} must be positive")));
        }
        Ok(Self {
            dofs,
            delta_time,
            calculation_budget: None,
            session: None,
            calculations: 0,
        })
    }

    /// Rejects plans whose calculation takes longer than `budget`.
    pub fn with_calculation_budget(mut self, budget: Duration) -> Self {
        self.calculation_budget = Some(budget);
        self
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.dofs
    }

    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    /// Number of trajectories planned by `update` so far.
    pub fn calculations(&self) -> u64 {
        self.calculations
    }

    /// Active trajectory, if any.
    pub fn trajectory(&self) -> Option<&Arc<Trajectory>> {
        self.session.as_ref().map(|s| &s.trajectory)
    }

    /// Drops the active trajectory; the next `update` plans from scratch.
    pub fn reset(&mut self) {
        self.session = None;
    }

    /// Plans a trajectory for `input` without touching the active one.
    pub fn calculate(&self, input: &InputParameter) -> Result<Trajectory, OtgError> {
        input.validate(self.dofs)?;
        let options = SyncOptions {
            synchronization: input.synchronization,
            minimum_duration: input.minimum_duration,
            duration_step: (input.duration_discretization == DurationDiscretization::Discrete)
                .then_some(self.delta_time),
        };

        let trajectory = match &input.path {
            Some(path) => {
                let current: Vec<_> = (0..self.dofs).map(|d| input.current_state(d)).collect();
                let target: Vec<_> = (0..self.dofs).map(|d| input.target_state(d)).collect();
                let limits: Vec<_> = (0..self.dofs).map(|d| input.limits(d)).collect();
                Trajectory::from_path(path.clone(), &current, &target, &limits, &options)?
            }
            None => {
                let solvers: Vec<DofSolver> = (0..self.dofs).map(|d| input.solver(d)).collect();
                Trajectory::from_profiles(synchronize(&solvers, &options)?)
            }
        };

        if trajectory.duration() > MAX_TRAJECTORY_DURATION {
            return Err(OtgError::TrajectoryDuration {
                duration: trajectory.duration(),
                max: MAX_TRAJECTORY_DURATION,
            });
        }
        Ok(trajectory)
    }

    /// Plans and times one calculation, applying the calculation budget.
    fn plan(&self, input: &InputParameter) -> Result<(Trajectory, f64), OtgError> {
        let started = Instant::now();
        let trajectory = self.calculate(input)?;
        let elapsed = started.elapsed();
        let elapsed_us = elapsed.as_secs_f64() * 1e6;
        if let Some(budget) = self.calculation_budget {
            if elapsed > budget {
                return Err(OtgError::ExecutionTimeExceeded {
                    elapsed_us,
                    budget_us: budget.as_secs_f64() * 1e6,
                });
            }
        }
        Ok((trajectory, elapsed_us))
    }

    /// Advances one cycle and writes the new state into `output`.
    ///
    /// A new trajectory is planned whenever `input` differs from the last
    /// cycle's input with its current state replaced by the last output.
    /// On error the session is dropped and `output` keeps its last sample.
    pub fn update(&mut self, input: &InputParameter, output: &mut OutputParameter) -> UpdateResult {
        let replan = self.session.as_ref().is_none_or(|s| s.input != *input);
        if replan {
            match self.plan(input) {
                Ok((trajectory, elapsed_us)) => {
                    debug!(
                        duration = trajectory.duration(),
                        limiting_dof = ?trajectory.limiting_dof(),
                        elapsed_us,
                        "planned new trajectory"
                    );
                    self.calculations += 1;
                    self.session = Some(Session {
                        trajectory: Arc::new(trajectory),
                        time: 0.0,
                        input: input.clone(),
                    });
                    output.calculation_duration = elapsed_us;
                }
                Err(err) => {
                    warn!(code = err.code(), %err, "trajectory calculation failed");
                    self.session = None;
                    return UpdateResult::Error(err);
                }
            }
        }
        output.new_calculation = replan;

        let Some(session) = self.session.as_mut() else {
            return UpdateResult::Error(OtgError::InvalidInput("no active trajectory".into()));
        };
        session.time += self.delta_time;
        for buffer in [&mut output.new_position, &mut output.new_velocity, &mut output.new_acceleration] {
            buffer.resize(self.dofs, 0.0);
        }
        session.trajectory.at_time(
            session.time,
            &mut output.new_position,
            &mut output.new_velocity,
            &mut output.new_acceleration,
        );
        output.time = session.time;
        output.trajectory = Some(Arc::clone(&session.trajectory));

        session.input.current_position.clone_from(&output.new_position);
        session.input.current_velocity.clone_from(&output.new_velocity);
        session.input.current_acceleration.clone_from(&output.new_acceleration);

        if session.time >= session.trajectory.duration() {
            UpdateResult::Finished
        } else {
            UpdateResult::Working
        }
    }
}
