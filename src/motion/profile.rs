// src/motion/profile.rs
use crate::error::OtgError;
use crate::motion::segment::{KinematicState, Segment};

/// Absolute tolerance on reaching the target position and velocity.
pub const STATE_PRECISION: f64 = 1e-8;
/// Absolute tolerance on reaching the target acceleration.
pub const ACCELERATION_PRECISION: f64 = 1e-10;
/// Relative slack applied to velocity and acceleration bounds.
pub const LIMIT_SLACK: f64 = 1e-9;
/// Phase durations above `-DURATION_SLACK` are clamped to zero rather than rejected.
pub const DURATION_SLACK: f64 = 1e-10;

/// Kinematic bounds of one DoF.
///
/// The minimum bounds are negative numbers; symmetric limits use
/// `min = -max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Limits {
    /// Maximum velocity (units/s)
    pub max_velocity: f64,
    /// Minimum velocity (units/s), negative
    pub min_velocity: f64,
    /// Maximum acceleration (units/s²)
    pub max_acceleration: f64,
    /// Minimum acceleration (units/s²), negative
    pub min_acceleration: f64,
    /// Maximum jerk magnitude (units/s³)
    pub max_jerk: f64,
}

impl Limits {
    pub fn new(
        max_velocity: f64,
        min_velocity: Option<f64>,
        max_acceleration: f64,
        min_acceleration: Option<f64>,
        max_jerk: f64,
    ) -> Self {
        Self {
            max_velocity,
            min_velocity: min_velocity.unwrap_or(-max_velocity),
            max_acceleration,
            min_acceleration: min_acceleration.unwrap_or(-max_acceleration),
            max_jerk,
        }
    }

    pub fn symmetric(max_velocity: f64, max_acceleration: f64, max_jerk: f64) -> Self {
        Self::new(max_velocity, None, max_acceleration, None, max_jerk)
    }

    pub fn validate(&self) -> Result<(), OtgError> {
        let all = [
            self.max_velocity,
            self.min_velocity,
            self.max_acceleration,
            self.min_acceleration,
            self.max_jerk,
        ];
        if all.iter().any(|x| !x.is_finite()) {
            return Err(OtgError::InvalidInput("limits must be finite".into()));
        }
        if self.max_velocity <= 0.0 || self.max_acceleration <= 0.0 || self.max_jerk <= 0.0 {
            return Err(OtgError::InvalidInput(format!(
                "maximum limits must be positive (v={}, a={}, j={})",
                self.max_velocity, self.max_acceleration, self.max_jerk
            )));
        }
        if self.min_velocity >= 0.0 || self.min_acceleration >= 0.0 {
            return Err(OtgError::InvalidInput(format!(
                "minimum limits must be negative (v={}, a={})",
                self.min_velocity, self.min_acceleration
            )));
        }
        Ok(())
    }

    /// Limits seen from a frame where every quantity is negated.
    pub fn mirrored(&self) -> Self {
        Self {
            max_velocity: -self.min_velocity,
            min_velocity: -self.max_velocity,
            max_acceleration: -self.min_acceleration,
            min_acceleration: -self.max_acceleration,
            max_jerk: self.max_jerk,
        }
    }

    pub(crate) fn velocity_slack(&self) -> f64 {
        LIMIT_SLACK * (1.0 + self.max_velocity.max(-self.min_velocity))
    }

    pub(crate) fn acceleration_slack(&self) -> f64 {
        LIMIT_SLACK * (1.0 + self.max_acceleration.max(-self.min_acceleration))
    }

    pub(crate) fn contains_velocity(&self, v: f64) -> bool {
        let slack = self.velocity_slack();
        v <= self.max_velocity + slack && v >= self.min_velocity - slack
    }

    pub(crate) fn contains_acceleration(&self, a: f64) -> bool {
        let slack = self.acceleration_slack();
        a <= self.max_acceleration + slack && a >= self.min_acceleration - slack
    }
}

/// Which bounds a profile runs into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReachedLimits {
    Acc0Acc1Vel,
    Acc0Vel,
    Acc1Vel,
    Vel,
    Acc0Acc1,
    Acc0,
    Acc1,
    None,
}

impl ReachedLimits {
    pub fn from_plateaus(acc0: bool, vel: bool, acc1: bool) -> Self {
        match (acc0, vel, acc1) {
            (true, true, true) => ReachedLimits::Acc0Acc1Vel,
            (true, true, false) => ReachedLimits::Acc0Vel,
            (false, true, true) => ReachedLimits::Acc1Vel,
            (false, true, false) => ReachedLimits::Vel,
            (true, false, true) => ReachedLimits::Acc0Acc1,
            (true, false, false) => ReachedLimits::Acc0,
            (false, false, true) => ReachedLimits::Acc1,
            (false, false, false) => ReachedLimits::None,
        }
    }
}

/// Jerk sign pattern of the four ramps: up-down-down-up or up-down-up-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlSigns {
    Uddu,
    Udud,
}

/// Whether the pattern starts with positive jerk (`Up`) or is mirrored (`Down`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => 1.0,
            Direction::Down => -1.0,
        }
    }
}

/// Tag of the canonical seven-phase shape a profile was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileShape {
    pub limits: ReachedLimits,
    pub control: ControlSigns,
    pub direction: Direction,
}

impl ProfileShape {
    pub const STANDSTILL: ProfileShape = ProfileShape {
        limits: ReachedLimits::None,
        control: ControlSigns::Uddu,
        direction: Direction::Up,
    };

    /// Classifies seven canonical phases by which holds have non-zero length.
    pub fn classify(phases: &[(f64, f64); 7], direction: Direction) -> Self {
        let held = |i: usize| phases[i].0 > DURATION_SLACK;
        let control = if phases[2].1.signum() == phases[4].1.signum() {
            ControlSigns::Uddu
        } else {
            ControlSigns::Udud
        };
        Self {
            limits: ReachedLimits::from_plateaus(held(1), held(3), held(5)),
            control,
            direction,
        }
    }
}

/// Minimum and maximum position of one DoF over a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionExtrema {
    pub min: f64,
    pub max: f64,
    /// Time at which `min` is attained (s)
    pub t_min: f64,
    /// Time at which `max` is attained (s)
    pub t_max: f64,
}

/// Ordered constant-jerk segments of one DoF.
///
/// The leading `brake_segments` pieces form the brake pre-trajectory, where
/// velocity may still exceed its bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    segments: Vec<Segment>,
    ends: Vec<f64>,
    brake_segments: usize,
    start: KinematicState,
    end: KinematicState,
    shape: ProfileShape,
}

impl Profile {
    /// Zero-duration profile resting in `state`.
    pub fn standstill(state: KinematicState) -> Self {
        Self {
            segments: Vec::new(),
            ends: Vec::new(),
            brake_segments: 0,
            start: state,
            end: state,
            shape: ProfileShape::STANDSTILL,
        }
    }

    /// Builds a profile by integrating `brake` then `phases` from `start`.
    ///
    /// Returns `None` for non-finite or clearly negative durations. Tiny
    /// negative durations are clamped and zero-length phases are elided.
    pub fn from_phases(
        start: KinematicState,
        brake: &[(f64, f64)],
        phases: &[(f64, f64)],
        shape: ProfileShape,
    ) -> Option<Self> {
        let mut segments = Vec::with_capacity(brake.len() + phases.len());
        let mut ends = Vec::with_capacity(brake.len() + phases.len());
        let mut brake_segments = 0;
        let mut state = start;
        let mut elapsed = 0.0;
        for (i, &(duration, jerk)) in brake.iter().chain(phases.iter()).enumerate() {
            if !duration.is_finite() || !jerk.is_finite() || duration < -DURATION_SLACK {
                return None;
            }
            if duration <= 0.0 {
                continue;
            }
            let segment = Segment::new(state, duration, jerk);
            state = segment.end();
            elapsed += duration;
            segments.push(segment);
            ends.push(elapsed);
            if i < brake.len() {
                brake_segments += 1;
            }
        }
        Some(Self {
            segments,
            ends,
            brake_segments,
            start,
            end: state,
            shape,
        })
    }

    pub fn duration(&self) -> f64 {
        self.ends.last().copied().unwrap_or(0.0)
    }

    pub fn brake_duration(&self) -> f64 {
        match self.brake_segments {
            0 => 0.0,
            n => self.ends[n - 1],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn shape(&self) -> ProfileShape {
        self.shape
    }

    pub fn start(&self) -> KinematicState {
        self.start
    }

    pub fn end(&self) -> KinematicState {
        self.end
    }

    /// Number of segments with a non-negligible duration.
    pub fn active_segments(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.duration > DURATION_SLACK)
            .count()
    }

    /// State at time `t`, clamped to the profile's boundary states.
    pub fn state_at(&self, t: f64) -> KinematicState {
        if t <= 0.0 || self.segments.is_empty() {
            return if t >= self.duration() { self.end } else { self.start };
        }
        if t >= self.duration() {
            return self.end;
        }
        let index = self.ends.partition_point(|&end| end <= t);
        let offset = if index == 0 { 0.0 } else { self.ends[index - 1] };
        self.segments[index].state_at(t - offset)
    }

    /// State at time `t`, continuing with constant acceleration after the end.
    pub fn state_after(&self, t: f64) -> KinematicState {
        let duration = self.duration();
        if t <= duration {
            self.state_at(t)
        } else {
            self.end.integrate(t - duration, 0.0)
        }
    }

    /// Replaces the integrated end state by the exact target.
    pub(crate) fn snapped_to(mut self, target: KinematicState) -> Self {
        self.end = target;
        self
    }

    /// Replaces velocity and acceleration of the end state, keeping the integrated position.
    pub(crate) fn snapped_to_velocity(mut self, target: KinematicState) -> Self {
        self.end.velocity = target.velocity;
        self.end.acceleration = target.acceleration;
        self
    }

    /// Whether the profile reaches `target` and stays within `limits` after the brake.
    pub fn reaches(&self, target: &KinematicState, limits: &Limits) -> bool {
        let position_tol = STATE_PRECISION * (1.0 + target.position.abs());
        (self.end.position - target.position).abs() <= position_tol
            && self.reaches_velocity(target, limits)
            && self.within_velocity_limits(limits)
    }

    /// Whether the profile reaches the velocity and acceleration of `target`
    /// with accelerations inside `limits`. Position is not checked.
    pub fn reaches_velocity(&self, target: &KinematicState, limits: &Limits) -> bool {
        let velocity_tol = STATE_PRECISION * (1.0 + target.velocity.abs());
        let acceleration_tol = ACCELERATION_PRECISION * (1.0 + limits.max_acceleration);
        (self.end.velocity - target.velocity).abs() <= velocity_tol
            && (self.end.acceleration - target.acceleration).abs() <= acceleration_tol
            && self.segments[self.brake_segments..]
                .iter()
                .all(|s| {
                    s.jerk.abs() <= limits.max_jerk * (1.0 + LIMIT_SLACK)
                        && limits.contains_acceleration(s.start.acceleration)
                        && limits.contains_acceleration(s.end().acceleration)
                })
    }

    /// Velocity bounds after the brake.
    ///
    /// A brake that stops early hands over a velocity still outside the
    /// bounds. Until the velocity is back inside, a segment only has to head
    /// back and must not pass the opposite bound.
    fn within_velocity_limits(&self, limits: &Limits) -> bool {
        let slack = limits.velocity_slack();
        let mut returning = true;
        self.segments[self.brake_segments..].iter().all(|s| {
            let (start, end) = (s.start.velocity, s.end().velocity);
            let extremum = s.velocity_extremum().map(|(_, v)| v);
            returning = returning && !limits.contains_velocity(start);
            if !returning {
                return limits.contains_velocity(start)
                    && limits.contains_velocity(end)
                    && extremum.is_none_or(|v| limits.contains_velocity(v));
            }
            if start > limits.max_velocity {
                let floor = limits.min_velocity - slack;
                end >= floor
                    && match extremum {
                        None => end <= start,
                        Some(v) => v >= floor && v < start && end <= limits.max_velocity + slack,
                    }
            } else {
                let ceiling = limits.max_velocity + slack;
                end <= ceiling
                    && match extremum {
                        None => end >= start,
                        Some(v) => v <= ceiling && v > start && end >= limits.min_velocity - slack,
                    }
            }
        })
    }

    /// Extreme positions over the profile, checking segment boundaries and
    /// the instants where velocity crosses zero.
    pub fn position_extrema(&self) -> PositionExtrema {
        let mut extrema = PositionExtrema {
            min: self.start.position,
            max: self.start.position,
            t_min: 0.0,
            t_max: 0.0,
        };
        let mut visit = |t: f64, p: f64| {
            if p < extrema.min {
                extrema.min = p;
                extrema.t_min = t;
            }
            if p > extrema.max {
                extrema.max = p;
                extrema.t_max = t;
            }
        };
        let mut offset = 0.0;
        for segment in &self.segments {
            for t in segment.velocity_roots() {
                visit(offset + t, segment.state_at(t).position);
            }
            offset += segment.duration;
            visit(offset, segment.end().position);
        }
        extrema
    }
}
