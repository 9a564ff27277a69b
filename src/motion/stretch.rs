// src/motion/stretch.rs
//! Profiles that reach the target after exactly a given duration.
//!
//! The extra time is absorbed in this order: a cruise at a lowered
//! velocity, holds at the acceleration limits, holds at lowered
//! acceleration peaks, and finally four ramps with lowered peaks.

use tracing::trace;

use crate::error::OtgError;
use crate::motion::brake::Brake;
use crate::motion::profile::{DURATION_SLACK, Direction, Limits, Profile, ProfileShape};
use crate::motion::roots;
use crate::motion::s_curve::{Frame, Phases, SAMPLES, at_target, validate_states};
use crate::motion::segment::KinematicState;

/// Relative tolerance on hitting the requested duration.
const DURATION_PRECISION: f64 = 1e-8;

fn total(phases: &Phases) -> f64 {
    phases.iter().map(|p| p.0).sum()
}

impl Frame {
    /// Cruise at a free velocity `vp`, including standing still at `vp = 0`.
    fn stretch_cruise<F: FnMut(Phases)>(&self, duration: f64, emit: &mut F) {
        let residual = |vp: f64| self.cruise(vp).map_or(f64::NAN, |p| total(&p) - duration);
        let eps = 1e-9 * (1.0 + self.limits.max_velocity);
        let ranges = [(self.limits.min_velocity, -eps), (eps, self.limits.max_velocity)];
        for (lo, hi) in ranges {
            for vp in roots::bracketed(&residual, lo, hi, SAMPLES) {
                if let Some(phases) = self.cruise(vp) {
                    emit(phases);
                }
            }
        }
        if let Some((first, second, gap)) = self.cruise_halves(0.0) {
            if gap.abs() <= 1e-8 * (1.0 + self.target.position.abs()) {
                let hold = duration - first.duration() - second.duration();
                emit(Frame::join_cruise(&first, hold, &second));
            }
        }
    }

    /// Holds at both peaks with the first peak at the acceleration limit.
    fn stretch_acc0<F: FnMut(Phases)>(&self, duration: f64, emit: &mut F) {
        let j = self.jerk();
        let (a_max, a_min) = (self.limits.max_acceleration, self.limits.min_acceleration);
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        let dv = self.velocity_change();
        let (lo, hi) = (a_min, af.min(a_max));
        let phases = |a2: f64| -> Option<Phases> {
            let a2 = a2.clamp(lo, hi.max(lo));
            if a_max - a2 <= 0.0 {
                return None;
            }
            let rt = duration - (2.0 * a_max - a0 - 2.0 * a2 + af) / j;
            let rv = dv - (2.0 * a_max * a_max - a0 * a0 - 2.0 * a2 * a2 + af * af) / (2.0 * j);
            let h1 = (rv - a2 * rt) / (a_max - a2);
            Some(self.uddu(a_max, h1, a2, rt - h1))
        };
        self.solve_family(&phases, lo, hi, emit);
    }

    /// Holds at both peaks with the second peak at the acceleration limit.
    fn stretch_acc1<F: FnMut(Phases)>(&self, duration: f64, emit: &mut F) {
        let j = self.jerk();
        let (a_max, a_min) = (self.limits.max_acceleration, self.limits.min_acceleration);
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        let dv = self.velocity_change();
        let (lo, hi) = (a0.max(a_min), a_max);
        let phases = |a1: f64| -> Option<Phases> {
            let a1 = a1.clamp(lo, hi.max(lo));
            if a1 - a_min <= 0.0 {
                return None;
            }
            let rt = duration - (2.0 * a1 - a0 - 2.0 * a_min + af) / j;
            let rv = dv - (2.0 * a1 * a1 - a0 * a0 - 2.0 * a_min * a_min + af * af) / (2.0 * j);
            let h1 = (rv - a_min * rt) / (a1 - a_min);
            Some(self.uddu(a1, h1, a_min, rt - h1))
        };
        self.solve_family(&phases, lo, hi, emit);
    }

    /// Hold only at a lowered first peak; `a1` from the duration and velocity equations.
    fn stretch_hold_first<F: FnMut(Phases)>(&self, duration: f64, emit: &mut F) {
        let j = self.jerk();
        let (a_max, a_min) = (self.limits.max_acceleration, self.limits.min_acceleration);
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        let dv = self.velocity_change();
        let (lo, hi) = (a_min, af.min(a_max));
        for branch in [0, 1] {
            let phases = |a2: f64| -> Option<Phases> {
                let a2 = a2.clamp(lo, hi.max(lo));
                let b = -(j * duration + a0 + 2.0 * a2 - af);
                let c = j * dv - (af * af - a0 * a0 - 2.0 * a2 * a2) / 2.0;
                let peaks = roots::quadratic(1.0, b, c);
                let a1 = *peaks.get(branch).or(peaks.first())?;
                let h1 = duration - (2.0 * a1 - a0 - 2.0 * a2 + af) / j;
                Some(self.uddu(a1, h1, a2, 0.0))
            };
            self.solve_family(&phases, lo, hi, emit);
        }
    }

    /// Hold only at a lowered second peak; `a2` from the duration and velocity equations.
    fn stretch_hold_second<F: FnMut(Phases)>(&self, duration: f64, emit: &mut F) {
        let j = self.jerk();
        let (a_max, a_min) = (self.limits.max_acceleration, self.limits.min_acceleration);
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        let dv = self.velocity_change();
        let (lo, hi) = (a0.max(a_min), a_max);
        for branch in [0, 1] {
            let phases = |a1: f64| -> Option<Phases> {
                let a1 = a1.clamp(lo, hi.max(lo));
                let b = j * duration - 2.0 * a1 + a0 - af;
                let c = (2.0 * a1 * a1 - a0 * a0 + af * af) / 2.0 - j * dv;
                let peaks = roots::quadratic(1.0, b, c);
                let a2 = *peaks.get(branch).or(peaks.first())?;
                let h2 = duration - (2.0 * a1 - a0 - 2.0 * a2 + af) / j;
                Some(self.uddu(a1, 0.0, a2, h2))
            };
            self.solve_family(&phases, lo, hi, emit);
        }
    }

    /// Four ramps without holds, free middle acceleration `a3`.
    fn stretch_udud<F: FnMut(Phases)>(&self, duration: f64, emit: &mut F) {
        let j = self.jerk();
        let (a_max, a_min) = (self.limits.max_acceleration, self.limits.min_acceleration);
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        let dv = self.velocity_change();
        for branch in [1.0, -1.0] {
            let phases = |a3: f64| -> Option<Phases> {
                let a3 = a3.clamp(a_min, a_max);
                let sum = (j * duration + a0 + 2.0 * a3 + af) / 2.0;
                let squares = j * dv + (a0 * a0 + 2.0 * a3 * a3 + af * af) / 2.0;
                let disc = 2.0 * squares - sum * sum;
                if disc < -1e-12 * (1.0 + sum * sum) {
                    return None;
                }
                let a1 = (sum + branch * disc.max(0.0).sqrt()) / 2.0;
                Some(self.udud(a1, a3, sum - a1))
            };
            self.solve_family(&phases, a_min, a_max, emit);
        }
    }
}

/// Profile from `current` to `target` lasting exactly `duration`.
///
/// Fails with [`OtgError::SynchronizationInfeasible`] when no shape family
/// produces a valid profile of that length.
pub fn with_duration(
    current: &KinematicState,
    target: &KinematicState,
    limits: &Limits,
    duration: f64,
) -> Result<Profile, OtgError> {
    validate_states(current, target, limits)?;
    let infeasible = OtgError::SynchronizationInfeasible { duration };
    let brake = Brake::for_state(current, limits);
    let main = duration - brake.duration();
    if main < -DURATION_SLACK {
        return Err(infeasible);
    }
    let start = brake.end(*current);
    let tolerance = DURATION_PRECISION * (1.0 + duration);

    if main <= tolerance && at_target(&start, target) {
        let profile = Profile::from_phases(*current, &brake.phases, &[], ProfileShape::STANDSTILL).ok_or(infeasible.clone())?;
        return Ok(profile.snapped_to(*target));
    }

    let mut found: Option<Profile> = None;
    let mut accept = |phases: Phases, direction: Direction, frame: &Frame| {
        if found.is_some() {
            return;
        }
        let shape = ProfileShape::classify(&phases, direction);
        let Some(profile) = Profile::from_phases(*current, &brake.phases, &frame.to_world(phases), shape) else {
            return;
        };
        if (profile.duration() - duration).abs() <= tolerance && profile.reaches(target, limits) {
            trace!(?shape, duration, "stretched profile");
            found = Some(profile.snapped_to(*target));
        }
    };

    let up = Frame::new(&start, target, limits, Direction::Up);
    up.stretch_cruise(main, &mut |p| accept(p, Direction::Up, &up));
    for direction in [Direction::Up, Direction::Down] {
        let frame = Frame::new(&start, target, limits, direction);
        let mut emit = |p: Phases| accept(p, direction, &frame);
        frame.stretch_acc0(main, &mut emit);
        frame.stretch_acc1(main, &mut emit);
        frame.stretch_hold_first(main, &mut emit);
        frame.stretch_hold_second(main, &mut emit);
        frame.stretch_udud(main, &mut emit);
    }
    found.ok_or(infeasible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::s_curve::synthesize;

    #[test]
    fn test_rest_to_rest_is_stretched_with_cruise() {
        let limits = Limits::symmetric(2.0, 2.0, 1.0);
        let current = KinematicState::at_rest(0.0);
        let target = KinematicState::at_rest(0.5);
        let profile = with_duration(&current, &target, &limits, 4.0).unwrap();
        assert!((profile.duration() - 4.0).abs() < 1e-8);
        assert!(profile.reaches(&target, &limits));
    }

    #[test]
    fn test_minimum_duration_reproduces_time_optimal() {
        let limits = Limits::symmetric(2.0, 2.0, 1.0);
        let current = KinematicState::new(0.0, 0.5, -0.2);
        let target = KinematicState::at_rest(-1.0);
        let optimal = synthesize(&current, &target, &limits).unwrap();
        let profile = with_duration(&current, &target, &limits, optimal.duration() * 1.5).unwrap();
        assert!((profile.duration() - optimal.duration() * 1.5).abs() < 1e-8);
        assert!(profile.reaches(&target, &limits));
    }

    #[test]
    fn test_shorter_than_optimal_is_infeasible() {
        let limits = Limits::symmetric(2.0, 2.0, 1.0);
        let current = KinematicState::at_rest(0.0);
        let target = KinematicState::at_rest(2.0);
        let optimal = synthesize(&current, &target, &limits).unwrap();
        let err = with_duration(&current, &target, &limits, optimal.duration() * 0.95).unwrap_err();
        assert!(matches!(err, OtgError::SynchronizationInfeasible { .. }));
    }

    #[test]
    fn test_standstill_can_wait() {
        let limits = Limits::symmetric(1.0, 1.0, 1.0);
        let state = KinematicState::at_rest(0.25);
        let profile = with_duration(&state, &state, &limits, 3.0).unwrap();
        assert!((profile.duration() - 3.0).abs() < 1e-8);
        assert_eq!(profile.state_at(1.5).position, 0.25);
    }
}
