// src/motion/segment.rs

/// Position, velocity and acceleration of one DoF at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicState {
    /// Position (units)
    pub position: f64,
    /// Velocity (units/s)
    pub velocity: f64,
    /// Acceleration (units/s²)
    pub acceleration: f64,
}

impl KinematicState {
    pub fn new(position: f64, velocity: f64, acceleration: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
        }
    }

    pub fn at_rest(position: f64) -> Self {
        Self::new(position, 0.0, 0.0)
    }

    /// State after `t` seconds under constant `jerk`.
    pub fn integrate(&self, t: f64, jerk: f64) -> Self {
        Self {
            position: self.position
                + t * (self.velocity + t * (self.acceleration / 2.0 + t * jerk / 6.0)),
            velocity: self.velocity + t * (self.acceleration + t * jerk / 2.0),
            acceleration: self.acceleration + t * jerk,
        }
    }

    pub fn negated(&self) -> Self {
        Self::new(-self.position, -self.velocity, -self.acceleration)
    }

    /// Component-wise comparison with an absolute tolerance per derivative.
    pub fn approx_eq(&self, other: &Self, position_tol: f64, velocity_tol: f64, acceleration_tol: f64) -> bool {
        (self.position - other.position).abs() <= position_tol
            && (self.velocity - other.velocity).abs() <= velocity_tol
            && (self.acceleration - other.acceleration).abs() <= acceleration_tol
    }
}

/// Integrates `(duration, jerk)` phases starting from `start`.
pub(crate) fn integrate_phases(start: KinematicState, phases: &[(f64, f64)]) -> KinematicState {
    phases
        .iter()
        .fold(start, |state, &(duration, jerk)| state.integrate(duration, jerk))
}

/// One constant-jerk piece of a profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Length of the piece (s), never negative
    pub duration: f64,
    /// Jerk applied for the whole piece (units/s³)
    pub jerk: f64,
    /// State at the beginning of the piece
    pub start: KinematicState,
}

impl Segment {
    pub fn new(start: KinematicState, duration: f64, jerk: f64) -> Self {
        Self {
            duration: duration.max(0.0),
            jerk,
            start,
        }
    }

    /// State at offset `t` into the segment, `t` clamped to `[0, duration]`.
    pub fn state_at(&self, t: f64) -> KinematicState {
        self.start.integrate(t.clamp(0.0, self.duration), self.jerk)
    }

    pub fn end(&self) -> KinematicState {
        self.start.integrate(self.duration, self.jerk)
    }

    /// Offset and value of a velocity extremum strictly inside the segment.
    ///
    /// Exists only where the acceleration crosses zero.
    pub fn velocity_extremum(&self) -> Option<(f64, f64)> {
        if self.jerk == 0.0 {
            return None;
        }
        let t = -self.start.acceleration / self.jerk;
        (t > 0.0 && t < self.duration).then(|| (t, self.start.integrate(t, self.jerk).velocity))
    }

    /// Offsets strictly inside the segment where the velocity crosses zero.
    pub fn velocity_roots(&self) -> impl Iterator<Item = f64> + '_ {
        let KinematicState { velocity: v, acceleration: a, .. } = self.start;
        let j = self.jerk;
        let roots: [Option<f64>; 2] = if j == 0.0 {
            [(a != 0.0).then(|| -v / a), None]
        } else {
            // j/2 t² + a t + v = 0
            let disc = a * a - 2.0 * j * v;
            if disc < 0.0 {
                [None, None]
            } else {
                let sq = disc.sqrt();
                [Some((-a - sq) / j), Some((-a + sq) / j)]
            }
        };
        roots
            .into_iter()
            .flatten()
            .filter(move |&t| t > 0.0 && t < self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrate_matches_closed_form() {
        let s = KinematicState::new(1.0, 2.0, -0.5);
        let next = s.integrate(2.0, 0.75);
        assert!((next.acceleration - (-0.5 + 1.5)).abs() < 1e-12);
        assert!((next.velocity - (2.0 - 1.0 + 0.75 * 2.0)).abs() < 1e-12);
        let expected = 1.0 + 2.0 * 2.0 - 0.5 * 4.0 / 2.0 + 0.75 * 8.0 / 6.0;
        assert!((next.position - expected).abs() < 1e-12);
    }

    #[test]
    fn test_state_at_clamps_offset() {
        let seg = Segment::new(KinematicState::at_rest(0.0), 1.0, 2.0);
        assert_eq!(seg.state_at(-1.0), seg.start);
        assert_eq!(seg.state_at(5.0), seg.end());
    }

    #[test]
    fn test_velocity_extremum_inside_segment() {
        let seg = Segment::new(KinematicState::new(0.0, 0.0, 1.0), 2.0, -1.0);
        let (t, v) = seg.velocity_extremum().unwrap();
        assert!((t - 1.0).abs() < 1e-12);
        assert!((v - 0.5).abs() < 1e-12);
        let flat = Segment::new(KinematicState::new(0.0, 0.0, 1.0), 2.0, 0.0);
        assert!(flat.velocity_extremum().is_none());
    }

    #[test]
    fn test_velocity_roots() {
        // v(t) = 1 - t for a = -1, j = 0
        let seg = Segment::new(KinematicState::new(0.0, 1.0, -1.0), 3.0, 0.0);
        let roots: Vec<f64> = seg.velocity_roots().collect();
        assert_eq!(roots.len(), 1);
        assert!((roots[0] - 1.0).abs() < 1e-12);
    }
}
