// src/motion/brake.rs
use crate::motion::profile::Limits;
use crate::motion::segment::{KinematicState, integrate_phases};

/// Pre-trajectory that pulls a state back inside the velocity bounds.
///
/// Needed when the current acceleration will carry the velocity past a
/// bound even under maximal opposing jerk. Limits only hold after the brake.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Brake {
    pub phases: [(f64, f64); 2],
}

impl Brake {
    pub fn duration(&self) -> f64 {
        self.phases[0].0 + self.phases[1].0
    }

    pub fn is_active(&self) -> bool {
        self.duration() > 0.0
    }

    pub fn end(&self, start: KinematicState) -> KinematicState {
        integrate_phases(start, &self.phases)
    }

    /// Brake phases for `start` under `limits`, empty if no brake is needed.
    pub fn for_state(start: &KinematicState, limits: &Limits) -> Self {
        let (v0, a0) = (start.velocity, start.acceleration);
        let j = limits.max_jerk;
        let overshoot = a0 * a0 / (2.0 * j);
        let slack = limits.velocity_slack();
        if a0 > 0.0 && v0 + overshoot > limits.max_velocity + slack {
            Self {
                phases: velocity_brake(v0, a0, limits.max_velocity, limits.min_velocity, limits.min_acceleration, j),
            }
        } else if a0 < 0.0 && v0 - overshoot < limits.min_velocity - slack {
            let [p0, p1] =
                velocity_brake(-v0, -a0, -limits.min_velocity, -limits.max_velocity, -limits.max_acceleration, j);
            Self {
                phases: [(p0.0, -p0.1), (p1.0, -p1.1)],
            }
        } else {
            Self::default()
        }
    }
}

/// Brake with negative jerk from `(v0, a0)` where `a0 > 0` overshoots `v_max`.
fn velocity_brake(v0: f64, a0: f64, v_max: f64, v_min: f64, a_min: f64, j: f64) -> [(f64, f64); 2] {
    let t_to_a_min = (a0 - a_min) / j;
    let t_to_v_max = a0 / j + (a0 * a0 + 2.0 * j * (v0 - v_max)).max(0.0).sqrt() / j;
    let t_to_v_min = a0 / j + (a0 * a0 / 2.0 + j * (v0 - v_min)).max(0.0).sqrt() / j;
    let t_ramp = t_to_v_max.min(t_to_v_min);

    if t_to_a_min < t_ramp {
        let v_at_a_min = v0 + a0 * t_to_a_min - j * t_to_a_min * t_to_a_min / 2.0;
        let t_hold_to_v_max = -(v_at_a_min - v_max) / a_min;
        let t_hold_to_v_min = a_min / (2.0 * j) - (v_at_a_min - v_min) / a_min;
        [(t_to_a_min, -j), (t_hold_to_v_max.min(t_hold_to_v_min).max(0.0), 0.0)]
    } else {
        [(t_ramp, -j), (0.0, 0.0)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_brake_inside_limits() {
        let limits = Limits::symmetric(1.0, 2.0, 1.0);
        let brake = Brake::for_state(&KinematicState::new(0.0, 0.5, 0.5), &limits);
        assert!(!brake.is_active());
    }

    #[test]
    fn test_brake_ends_at_velocity_limit() {
        let limits = Limits::symmetric(1.0, 2.0, 1.0);
        let start = KinematicState::new(0.0, 0.9, 1.0);
        let brake = Brake::for_state(&start, &limits);
        assert!(brake.is_active());
        assert!((brake.duration() - (1.0 + 0.8_f64.sqrt())).abs() < 1e-12);
        let end = brake.end(start);
        assert!((end.velocity - 1.0).abs() < 1e-12);
        assert!(end.acceleration < 0.0);
    }

    #[test]
    fn test_brake_holds_minimum_acceleration() {
        // weak positive acceleration bound forces a hold after the jerk ramp
        let limits = Limits::new(1.0, None, 0.5, Some(-2.0), 1.0);
        let start = KinematicState::new(0.0, -0.9, -2.0);
        let brake = Brake::for_state(&start, &limits);
        assert!(brake.phases[0].1 > 0.0);
        assert!(brake.phases[1].0 > 0.0);
        let end = brake.end(start);
        assert!((end.velocity - limits.min_velocity).abs() < 1e-9);
        assert!((end.acceleration - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_brake_stops_before_crossing_the_far_bound() {
        // ramping all the way down to -v_max would swing past +v_max on the way back
        let limits = Limits::symmetric(0.604, 2.816, 1.007);
        let start = KinematicState::new(-2.07, 0.47, -2.536);
        let brake = Brake::for_state(&start, &limits);
        assert!(brake.is_active());
        assert!(brake.phases[0].1 > 0.0);
        assert_eq!(brake.phases[1].0, 0.0);
        assert!((brake.duration() - 4.336107842873029).abs() < 1e-9);

        let end = brake.end(start);
        assert!(end.velocity < limits.min_velocity);
        assert!(end.acceleration > 0.0);
        // full positive acceleration released at max jerk peaks exactly at +v_max
        let peak = end.velocity + end.acceleration * end.acceleration / (2.0 * limits.max_jerk);
        assert!((peak - limits.max_velocity).abs() < 1e-9);
    }
}
