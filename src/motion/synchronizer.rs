// src/motion/synchronizer.rs
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::OtgError;
use crate::motion::profile::{Limits, Profile, ProfileShape};
use crate::motion::s_curve;
use crate::motion::segment::KinematicState;
use crate::motion::stretch;
use crate::motion::velocity;

/// Relative tolerance when matching a duration to a known profile.
const KNOWN_DURATION: f64 = 1e-10;

/// How DoFs share a common duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Synchronization {
    /// All DoFs finish together
    #[default]
    Time,
    /// Only DoFs with a moving target finish together
    TimeIfNecessary,
    /// Every DoF finishes as fast as it can
    None,
}

/// Options controlling how the common duration is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SyncOptions {
    pub synchronization: Synchronization,
    /// Lower bound on the common duration (s)
    pub minimum_duration: Option<f64>,
    /// Round the common duration up to a multiple of this step (s)
    pub duration_step: Option<f64>,
}

/// Time-optimal profile of one DoF together with the longer candidate
/// profiles from the other shape families.
///
/// Durations strictly between the minimum and a longer candidate may have
/// no valid profile at all; the candidates' durations are where such
/// blocked intervals end.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub p_min: Profile,
    pub t_min: f64,
    pub alternatives: Vec<Profile>,
}

impl Block {
    pub fn single(profile: Profile) -> Self {
        Self {
            t_min: profile.duration(),
            p_min: profile,
            alternatives: Vec::new(),
        }
    }

    /// Builds a block from candidates sorted shortest first.
    pub fn from_candidates(mut candidates: Vec<Profile>) -> Option<Self> {
        if candidates.is_empty() {
            return None;
        }
        let p_min = candidates.remove(0);
        Some(Self {
            t_min: p_min.duration(),
            p_min,
            alternatives: candidates,
        })
    }

    /// A profile of this block that lasts `duration`, if one is known.
    pub fn known_profile(&self, duration: f64) -> Option<&Profile> {
        std::iter::once(&self.p_min)
            .chain(self.alternatives.iter())
            .find(|p| (p.duration() - duration).abs() <= KNOWN_DURATION * (1.0 + duration))
    }
}

/// Seam between the synchronizer and the per-DoF profile math.
pub trait ProfileSolver {
    /// Time-optimal profile and the other candidate durations.
    fn time_optimal(&self) -> Result<Block, OtgError>;

    /// Profile lasting exactly `duration`.
    fn with_duration(&self, duration: f64) -> Result<Profile, OtgError>;

    /// Whether the DoF takes part in the common duration.
    fn is_enabled(&self) -> bool {
        true
    }

    /// Whether the target has zero velocity and acceleration.
    fn ends_at_rest(&self) -> bool;
}

/// Reach a target position, velocity and acceleration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSolver {
    pub current: KinematicState,
    pub target: KinematicState,
    pub limits: Limits,
}

impl PositionSolver {
    pub fn new(current: KinematicState, target: KinematicState, limits: Limits) -> Self {
        Self { current, target, limits }
    }
}

impl ProfileSolver for PositionSolver {
    fn time_optimal(&self) -> Result<Block, OtgError> {
        let candidates = s_curve::candidates(&self.current, &self.target, &self.limits)?;
        Block::from_candidates(candidates).ok_or(OtgError::Unreachable { dof: 0 })
    }

    fn with_duration(&self, duration: f64) -> Result<Profile, OtgError> {
        stretch::with_duration(&self.current, &self.target, &self.limits, duration)
    }

    fn ends_at_rest(&self) -> bool {
        self.target.velocity == 0.0 && self.target.acceleration == 0.0
    }
}

/// Reach a target velocity and acceleration; position is free and only
/// acceleration and jerk are limited.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocitySolver {
    pub current: KinematicState,
    pub target: KinematicState,
    pub limits: Limits,
}

impl VelocitySolver {
    pub fn new(current: KinematicState, target: KinematicState, limits: Limits) -> Self {
        Self { current, target, limits }
    }

    fn validate(&self) -> Result<(), OtgError> {
        self.limits.validate()?;
        for (name, a) in [("current", self.current.acceleration), ("target", self.target.acceleration)] {
            if !a.is_finite() || !self.limits.contains_acceleration(a) {
                return Err(OtgError::InvalidInput(format!(
                    "{name} acceleration {a} outside [{}, {}]",
                    self.limits.min_acceleration, self.limits.max_acceleration
                )));
            }
        }
        if !self.current.velocity.is_finite() || !self.target.velocity.is_finite() {
            return Err(OtgError::InvalidInput("velocities must be finite".into()));
        }
        Ok(())
    }

    fn build(&self, change: velocity::VelocityChange) -> Option<Profile> {
        let profile = Profile::from_phases(self.current, &[], &change.phases, ProfileShape::STANDSTILL)?;
        profile
            .reaches_velocity(&self.target, &self.limits)
            .then(|| profile.snapped_to_velocity(self.target))
    }
}

impl ProfileSolver for VelocitySolver {
    fn time_optimal(&self) -> Result<Block, OtgError> {
        self.validate()?;
        let (c, t) = (self.current, self.target);
        if (c.velocity - t.velocity).abs() <= 1e-12 && (c.acceleration - t.acceleration).abs() <= 1e-12 {
            return Ok(Block::single(Profile::standstill(c).snapped_to_velocity(t)));
        }
        velocity::time_optimal(c.velocity, c.acceleration, t.velocity, t.acceleration, &self.limits)
            .and_then(|change| self.build(change))
            .map(Block::single)
            .ok_or(OtgError::Unreachable { dof: 0 })
    }

    fn with_duration(&self, duration: f64) -> Result<Profile, OtgError> {
        self.validate()?;
        let (c, t) = (self.current, self.target);
        velocity::fixed_duration(duration, c.velocity, c.acceleration, t.velocity, t.acceleration, &self.limits)
            .and_then(|change| self.build(change))
            .ok_or(OtgError::SynchronizationInfeasible { duration })
    }

    fn ends_at_rest(&self) -> bool {
        self.target.velocity == 0.0 && self.target.acceleration == 0.0
    }
}

/// Per-DoF solver, dispatched without trait objects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DofSolver {
    Position(PositionSolver),
    Velocity(VelocitySolver),
    /// Keeps its current state and continues with constant acceleration.
    Disabled(KinematicState),
}

impl ProfileSolver for DofSolver {
    fn time_optimal(&self) -> Result<Block, OtgError> {
        match self {
            DofSolver::Position(s) => s.time_optimal(),
            DofSolver::Velocity(s) => s.time_optimal(),
            DofSolver::Disabled(state) => Ok(Block::single(Profile::standstill(*state))),
        }
    }

    fn with_duration(&self, duration: f64) -> Result<Profile, OtgError> {
        match self {
            DofSolver::Position(s) => s.with_duration(duration),
            DofSolver::Velocity(s) => s.with_duration(duration),
            DofSolver::Disabled(state) => Ok(Profile::standstill(*state)),
        }
    }

    fn is_enabled(&self) -> bool {
        !matches!(self, DofSolver::Disabled(_))
    }

    fn ends_at_rest(&self) -> bool {
        match self {
            DofSolver::Position(s) => s.ends_at_rest(),
            DofSolver::Velocity(s) => s.ends_at_rest(),
            DofSolver::Disabled(state) => state.velocity == 0.0 && state.acceleration == 0.0,
        }
    }
}

/// Profiles of all DoFs after synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct Synchronized {
    /// Length of the longest profile (s)
    pub duration: f64,
    pub profiles: Vec<Profile>,
    /// Time-optimal duration of each DoF on its own (s)
    pub independent_min_durations: Vec<f64>,
    /// DoF whose own minimum duration set the common duration
    pub limiting_dof: Option<usize>,
}

fn round_up(duration: f64, step: Option<f64>) -> f64 {
    match step {
        Some(dt) if dt > 0.0 => (duration / dt - 1e-9).ceil().max(0.0) * dt,
        _ => duration,
    }
}

/// Finds the shortest common duration at least `lower` for which every DoF
/// in `dofs` has a valid profile.
fn fit<S: ProfileSolver>(
    solvers: &[S],
    blocks: &[Block],
    dofs: &[usize],
    lower: f64,
    step: Option<f64>,
) -> Result<Vec<Profile>, OtgError> {
    let t_sync = dofs.iter().map(|&d| blocks[d].t_min).fold(lower, f64::max);
    let mut candidates = vec![round_up(t_sync, step)];
    for &d in dofs {
        candidates.extend(
            blocks[d]
                .alternatives
                .iter()
                .map(Profile::duration)
                .filter(|&t| t > t_sync)
                .map(|t| round_up(t, step)),
        );
    }
    candidates.sort_by(f64::total_cmp);
    candidates.dedup_by(|a, b| (*a - *b).abs() <= KNOWN_DURATION * (1.0 + *b));

    for &duration in &candidates {
        let attempt: Result<Vec<Profile>, OtgError> = dofs
            .iter()
            .map(|&d| match blocks[d].known_profile(duration) {
                Some(profile) => Ok(profile.clone()),
                None => solvers[d].with_duration(duration).map_err(|e| e.for_dof(d)),
            })
            .collect();
        match attempt {
            Ok(profiles) => return Ok(profiles),
            Err(err) => trace!(duration, %err, "candidate duration rejected"),
        }
    }
    Err(OtgError::SynchronizationInfeasible { duration: t_sync })
}

/// Brings every DoF to its target, sharing a common duration as far as
/// `options` ask for it.
///
/// The common duration starts at the largest time-optimal duration; when a
/// DoF cannot be stretched to it, the next longer candidate duration is
/// tried.
pub fn synchronize<S: ProfileSolver>(solvers: &[S], options: &SyncOptions) -> Result<Synchronized, OtgError> {
    let blocks = solvers
        .iter()
        .enumerate()
        .map(|(dof, s)| s.time_optimal().map_err(|e| e.for_dof(dof)))
        .collect::<Result<Vec<_>, _>>()?;
    let independent_min_durations: Vec<f64> = blocks.iter().map(|b| b.t_min).collect();
    let lower = options.minimum_duration.unwrap_or(0.0);

    let joint: Vec<usize> = (0..solvers.len())
        .filter(|&d| {
            solvers[d].is_enabled()
                && match options.synchronization {
                    Synchronization::Time => true,
                    Synchronization::TimeIfNecessary => !solvers[d].ends_at_rest(),
                    Synchronization::None => false,
                }
        })
        .collect();

    let mut profiles: Vec<Option<Profile>> = vec![None; solvers.len()];
    if !joint.is_empty() {
        for (d, profile) in joint.iter().zip(fit(solvers, &blocks, &joint, lower, options.duration_step)?) {
            profiles[*d] = Some(profile);
        }
    }
    for d in 0..solvers.len() {
        if profiles[d].is_some() {
            continue;
        }
        let profile = if !solvers[d].is_enabled() || lower <= blocks[d].t_min {
            blocks[d].p_min.clone()
        } else {
            fit(solvers, &blocks, &[d], lower, None)?.remove(0)
        };
        profiles[d] = Some(profile);
    }
    let profiles: Vec<Profile> = profiles.into_iter().flatten().collect();

    let duration = profiles.iter().map(Profile::duration).fold(0.0, f64::max);
    let limiting_dof = joint
        .iter()
        .copied()
        .filter(|&d| (blocks[d].t_min - duration).abs() <= KNOWN_DURATION * (1.0 + duration))
        .max_by(|&a, &b| blocks[a].t_min.total_cmp(&blocks[b].t_min));
    debug!(duration, ?limiting_dof, dofs = solvers.len(), "synchronized profiles");

    Ok(Synchronized {
        duration,
        profiles,
        independent_min_durations,
        limiting_dof,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver(target: f64) -> DofSolver {
        DofSolver::Position(PositionSolver::new(
            KinematicState::at_rest(0.0),
            KinematicState::at_rest(target),
            Limits::symmetric(2.0, 2.0, 1.0),
        ))
    }

    #[test]
    fn test_all_durations_match_the_slowest() {
        let solvers = [solver(0.5), solver(2.0), solver(-1.0)];
        let synced = synchronize(&solvers, &SyncOptions::default()).unwrap();
        let t_max = synced.independent_min_durations.iter().copied().fold(0.0, f64::max);
        assert!((synced.duration - t_max).abs() < 1e-9);
        for profile in &synced.profiles {
            assert!((profile.duration() - t_max).abs() < 1e-8);
        }
        assert_eq!(synced.limiting_dof, Some(1));
    }

    #[test]
    fn test_no_synchronization_keeps_own_durations() {
        let solvers = [solver(0.5), solver(2.0)];
        let options = SyncOptions {
            synchronization: Synchronization::None,
            ..SyncOptions::default()
        };
        let synced = synchronize(&solvers, &options).unwrap();
        assert!((synced.profiles[0].duration() - synced.independent_min_durations[0]).abs() < 1e-12);
        assert!(synced.profiles[0].duration() < synced.profiles[1].duration());
    }

    #[test]
    fn test_minimum_duration_and_discretization() {
        let solvers = [solver(0.5)];
        let options = SyncOptions {
            minimum_duration: Some(3.3),
            duration_step: Some(0.25),
            ..SyncOptions::default()
        };
        let synced = synchronize(&solvers, &options).unwrap();
        assert!((synced.duration - 3.5).abs() < 1e-8);
    }

    #[test]
    fn test_disabled_dof_is_left_alone() {
        let solvers = [solver(1.0), DofSolver::Disabled(KinematicState::new(0.2, 0.1, 0.0))];
        let synced = synchronize(&solvers, &SyncOptions::default()).unwrap();
        assert_eq!(synced.profiles[1].duration(), 0.0);
        assert!((synced.profiles[1].state_after(2.0).position - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_velocity_solver_synchronizes() {
        let limits = Limits::symmetric(1.0, 1.0, 1.0);
        let solvers = [
            DofSolver::Velocity(VelocitySolver::new(KinematicState::default(), KinematicState::new(0.0, 1.0, 0.0), limits)),
            DofSolver::Velocity(VelocitySolver::new(KinematicState::default(), KinematicState::new(0.0, 0.2, 0.0), limits)),
        ];
        let synced = synchronize(&solvers, &SyncOptions::default()).unwrap();
        assert!((synced.duration - 2.0).abs() < 1e-9);
        let end = synced.profiles[1].state_at(synced.duration);
        assert!((end.velocity - 0.2).abs() < 1e-12);
        assert!((synced.profiles[1].duration() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_known_profile_lookup() {
        let block = solver(1.0).time_optimal().unwrap();
        assert!(block.known_profile(block.t_min).is_some());
        assert!(block.known_profile(block.t_min + 0.1).is_none());
    }
}
