// src/motion/velocity.rs
//! Jerk-limited velocity changes with free position.
//!
//! A change is ramp, hold, ramp: the acceleration moves linearly to a peak,
//! stays there, then moves linearly to the final acceleration. These are
//! the halves of every cruising position profile and the whole profile of
//! the velocity interface.

use crate::motion::profile::{DURATION_SLACK, Limits};
use crate::motion::segment::{KinematicState, integrate_phases};

/// Ramp, hold, ramp as `(duration, jerk)` phases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityChange {
    pub phases: [(f64, f64); 3],
}

impl VelocityChange {
    pub fn duration(&self) -> f64 {
        self.phases.iter().map(|p| p.0).sum()
    }

    pub fn end(&self, start: KinematicState) -> KinematicState {
        integrate_phases(start, &self.phases)
    }

    fn mirrored(self) -> Self {
        let [p0, p1, p2] = self.phases;
        Self {
            phases: [(p0.0, -p0.1), (p1.0, -p1.1), (p2.0, -p2.1)],
        }
    }
}

fn slack(scale: f64) -> f64 {
    1e-12 * (1.0 + scale)
}

/// Fastest change from `(v0, a0)` to `(vf, af)`.
pub fn time_optimal(v0: f64, a0: f64, vf: f64, af: f64, limits: &Limits) -> Option<VelocityChange> {
    let j = limits.max_jerk;
    let up = time_optimal_up(v0, a0, vf, af, limits.max_acceleration, j);
    let down = time_optimal_up(-v0, -a0, -vf, -af, -limits.min_acceleration, j).map(VelocityChange::mirrored);
    match (up, down) {
        (Some(u), Some(d)) => Some(if d.duration() < u.duration() { d } else { u }),
        (u, d) => u.or(d),
    }
}

fn time_optimal_up(v0: f64, a0: f64, vf: f64, af: f64, a_max: f64, j: f64) -> Option<VelocityChange> {
    let mut x = j * (vf - v0) + (a0 * a0 + af * af) / 2.0;
    if x < 0.0 {
        if x < -slack(a0 * a0 + af * af) {
            return None;
        }
        x = 0.0;
    }
    let lower = a0.max(af);
    for peak in [-x.sqrt(), x.sqrt()] {
        if peak < lower - slack(a_max) {
            continue;
        }
        let peak = peak.max(lower);
        if peak <= a_max {
            return Some(VelocityChange {
                phases: [((peak - a0) / j, j), (0.0, 0.0), ((peak - af) / j, -j)],
            });
        }
        let hold = (vf - v0 - (2.0 * a_max * a_max - a0 * a0 - af * af) / (2.0 * j)) / a_max;
        return Some(VelocityChange {
            phases: [((a_max - a0) / j, j), (hold.max(0.0), 0.0), ((a_max - af) / j, -j)],
        });
    }
    None
}

/// Change from `(v0, a0)` to `(vf, af)` taking exactly `duration`.
///
/// The hold level is lowered until the ramps and the hold fill the
/// duration; `None` if no level inside the acceleration bounds does.
pub fn fixed_duration(
    duration: f64,
    v0: f64,
    a0: f64,
    vf: f64,
    af: f64,
    limits: &Limits,
) -> Option<VelocityChange> {
    let j = limits.max_jerk;
    fixed_duration_up(duration, v0, a0, vf, af, limits.max_acceleration, j).or_else(|| {
        fixed_duration_up(duration, -v0, -a0, -vf, -af, -limits.min_acceleration, j)
            .map(VelocityChange::mirrored)
    })
}

fn fixed_duration_up(
    duration: f64,
    v0: f64,
    a0: f64,
    vf: f64,
    af: f64,
    a_max: f64,
    j: f64,
) -> Option<VelocityChange> {
    let lower = a0.max(af);
    let b = -(j * duration + a0 + af);
    let c = (a0 * a0 + af * af) / 2.0 + j * (vf - v0);
    for peak in super::roots::quadratic(1.0, b, c) {
        if peak < lower - slack(a_max) || peak > a_max + slack(a_max) {
            continue;
        }
        let peak = peak.clamp(lower, a_max.max(lower));
        let t0 = (peak - a0) / j;
        let t2 = (peak - af) / j;
        let hold = duration - t0 - t2;
        if hold < -DURATION_SLACK {
            continue;
        }
        return Some(VelocityChange {
            phases: [(t0, j), (hold.max(0.0), 0.0), (t2, -j)],
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> Limits {
        Limits::symmetric(10.0, 2.0, 1.0)
    }

    #[test]
    fn test_time_optimal_without_plateau() {
        let change = time_optimal(0.0, 0.0, 1.0, 0.0, &limits()).unwrap();
        assert!((change.duration() - 2.0).abs() < 1e-12);
        let end = change.end(KinematicState::default());
        assert!((end.velocity - 1.0).abs() < 1e-12);
        assert!(end.acceleration.abs() < 1e-12);
    }

    #[test]
    fn test_time_optimal_with_plateau() {
        let change = time_optimal(0.0, 0.0, 8.0, 0.0, &limits()).unwrap();
        assert!((change.phases[1].0 - 2.0).abs() < 1e-12);
        assert!((change.duration() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_time_optimal_decelerates_with_negative_jerk_first() {
        let change = time_optimal(1.0, 0.0, -1.0, 0.0, &limits()).unwrap();
        assert!(change.phases[0].1 < 0.0);
        let end = change.end(KinematicState::new(0.0, 1.0, 0.0));
        assert!((end.velocity + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_time_optimal_keeps_initial_acceleration() {
        // already accelerating towards the target: a single ramp down suffices
        let change = time_optimal(0.0, 1.0, 0.5, 0.0, &limits()).unwrap();
        assert!(change.phases[0].0.abs() < 1e-12);
        assert!((change.duration() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fixed_duration_lowers_hold() {
        let change = fixed_duration(4.0, 0.0, 0.0, 1.0, 0.0, &limits()).unwrap();
        assert!((change.duration() - 4.0).abs() < 1e-12);
        let peak = 2.0 - 3.0_f64.sqrt();
        assert!((change.phases[0].0 - peak).abs() < 1e-12);
        let end = change.end(KinematicState::default());
        assert!((end.velocity - 1.0).abs() < 1e-12);
        assert!(end.acceleration.abs() < 1e-12);
    }

    #[test]
    fn test_fixed_duration_too_short_fails() {
        assert!(fixed_duration(1.0, 0.0, 0.0, 8.0, 0.0, &limits()).is_none());
    }
}
