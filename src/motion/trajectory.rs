// src/motion/trajectory.rs
//! Synchronized multi-DoF trajectories, sampled at any time.

use tracing::debug;

use crate::error::OtgError;
use crate::motion::path::Path;
use crate::motion::profile::{Limits, PositionExtrema, Profile};
use crate::motion::segment::KinematicState;
use crate::motion::synchronizer::{
    DofSolver, PositionSolver, SyncOptions, Synchronization, Synchronized, synchronize,
};

/// Path following: one profile drives the path parameter `s`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTrajectory {
    pub path: Path,
    pub profile: Profile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrajectoryKind {
    /// One profile per DoF
    Profiles(Vec<Profile>),
    Path(PathTrajectory),
}

/// Immutable result of one planning pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    duration: f64,
    degrees_of_freedom: usize,
    independent_min_durations: Vec<f64>,
    limiting_dof: Option<usize>,
    kind: TrajectoryKind,
}

impl Trajectory {
    pub fn from_profiles(synced: Synchronized) -> Self {
        Self {
            duration: synced.duration,
            degrees_of_freedom: synced.profiles.len(),
            independent_min_durations: synced.independent_min_durations,
            limiting_dof: synced.limiting_dof,
            kind: TrajectoryKind::Profiles(synced.profiles),
        }
    }

    /// Plans along `path` from `current` to its end, arriving with the
    /// velocity and acceleration of `target`.
    ///
    /// The current position must be the path start, and both boundary
    /// velocities and accelerations must be tangent to the path.
    pub fn from_path(
        path: Path,
        current: &[KinematicState],
        target: &[KinematicState],
        limits: &[Limits],
        options: &SyncOptions,
    ) -> Result<Self, OtgError> {
        let dofs = path.degrees_of_freedom();
        if current.len() != dofs || target.len() != dofs || limits.len() != dofs {
            return Err(OtgError::InvalidInput(format!(
                "path has {dofs} DoFs, input has {}",
                current.len()
            )));
        }
        if path.length() <= 0.0 {
            return Err(OtgError::DegeneratePath("path has zero length".into()));
        }
        for (i, (state, start)) in current.iter().zip(path.start()).enumerate() {
            if (state.position - start).abs() > 1e-8 * (1.0 + start.abs()) {
                return Err(OtgError::InvalidInput(format!(
                    "DoF {i}: current position {} is not the path start {start}",
                    state.position
                )));
            }
        }

        let split = |states: &[KinematicState]| -> (Vec<f64>, Vec<f64>) {
            states.iter().map(|s| (s.velocity, s.acceleration)).unzip()
        };
        let (v0, a0) = split(current);
        let (vf, af) = split(target);
        let s_limits = path.parameter_limits(limits)?;
        let s_current = path.parameter_state(0.0, &v0, &a0)?;
        let s_target = path.parameter_state(path.length(), &vf, &af)?;

        let solver = DofSolver::Position(PositionSolver::new(s_current, s_target, s_limits));
        let options = SyncOptions {
            synchronization: Synchronization::Time,
            ..*options
        };
        let mut synced = synchronize(&[solver], &options)?;
        let profile = synced.profiles.remove(0);
        debug!(length = path.length(), duration = synced.duration, "planned path");

        Ok(Self {
            duration: synced.duration,
            degrees_of_freedom: dofs,
            independent_min_durations: vec![synced.independent_min_durations[0]; dofs],
            limiting_dof: None,
            kind: TrajectoryKind::Path(PathTrajectory { path, profile }),
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.degrees_of_freedom
    }

    /// Time-optimal duration of each DoF on its own
    pub fn independent_min_durations(&self) -> &[f64] {
        &self.independent_min_durations
    }

    /// DoF whose own minimum duration set the trajectory duration
    pub fn limiting_dof(&self) -> Option<usize> {
        self.limiting_dof
    }

    pub fn kind(&self) -> &TrajectoryKind {
        &self.kind
    }

    pub fn profiles(&self) -> Option<&[Profile]> {
        match &self.kind {
            TrajectoryKind::Profiles(profiles) => Some(profiles),
            TrajectoryKind::Path(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.kind {
            TrajectoryKind::Path(p) => Some(&p.path),
            TrajectoryKind::Profiles(_) => None,
        }
    }

    /// Writes the state at `t` into the per-DoF slices, clamping `t` to
    /// `[0, duration]`.
    pub fn at_time(&self, t: f64, position: &mut [f64], velocity: &mut [f64], acceleration: &mut [f64]) {
        let t = t.clamp(0.0, self.duration);
        match &self.kind {
            TrajectoryKind::Profiles(profiles) => {
                for (i, profile) in profiles.iter().enumerate() {
                    let state = profile.state_after(t);
                    position[i] = state.position;
                    velocity[i] = state.velocity;
                    acceleration[i] = state.acceleration;
                }
            }
            TrajectoryKind::Path(PathTrajectory { path, profile }) => {
                let s = profile.state_at(t);
                path.q_into(s.position, position);
                path.pdq_into(s.position, velocity);
                path.pddq_into(s.position, acceleration);
                for (v, a) in velocity.iter_mut().zip(acceleration.iter_mut()) {
                    *a = *a * s.velocity * s.velocity + *v * s.acceleration;
                    *v *= s.velocity;
                }
            }
        }
    }

    /// State of every DoF at `t`
    pub fn at(&self, t: f64) -> Vec<KinematicState> {
        let n = self.degrees_of_freedom;
        let (mut p, mut v, mut a) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
        self.at_time(t, &mut p, &mut v, &mut a);
        (0..n).map(|i| KinematicState::new(p[i], v[i], a[i])).collect()
    }

    /// Minimum and maximum position of each DoF over the trajectory.
    ///
    /// `None` for path trajectories.
    pub fn position_extrema(&self) -> Option<Vec<PositionExtrema>> {
        let profiles = self.profiles()?;
        Some(
            profiles
                .iter()
                .map(|profile| with_extrapolation(profile, self.duration))
                .collect(),
        )
    }
}

/// Extrema of `profile` including its constant-acceleration continuation up to `duration`.
fn with_extrapolation(profile: &Profile, duration: f64) -> PositionExtrema {
    let mut extrema = profile.position_extrema();
    let end = profile.duration();
    let tail = duration - end;
    if tail <= 0.0 {
        return extrema;
    }
    let state = profile.end();
    let mut instants = vec![tail];
    if state.acceleration != 0.0 {
        let t_stop = -state.velocity / state.acceleration;
        if t_stop > 0.0 && t_stop < tail {
            instants.push(t_stop);
        }
    }
    for t in instants {
        let p = state.integrate(t, 0.0).position;
        if p < extrema.min {
            extrema.min = p;
            extrema.t_min = end + t;
        }
        if p > extrema.max {
            extrema.max = p;
            extrema.t_max = end + t;
        }
    }
    extrema
}
