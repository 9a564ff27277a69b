// src/motion/s_curve.rs
//! Time-optimal jerk-limited profiles for a single DoF.
//!
//! Every candidate is one of the canonical seven-phase shapes: four jerk
//! ramps, holds at the first and second acceleration peak, and a cruise
//! between them. Each shape family has one free parameter that is fixed by
//! the target position; the remaining phases follow in closed form. All
//! candidates are integrated and checked against the boundary conditions
//! and limits, and the shortest one wins.

use tracing::trace;

use crate::error::OtgError;
use crate::motion::brake::Brake;
use crate::motion::profile::{Direction, Limits, Profile, ProfileShape, STATE_PRECISION, ACCELERATION_PRECISION};
use crate::motion::roots;
use crate::motion::segment::{KinematicState, integrate_phases};
use crate::motion::velocity::{self, VelocityChange};

/// Sample count used to bracket the roots of each family's residual.
pub(crate) const SAMPLES: usize = 64;

/// Profile durations closer than this are the same candidate.
const SAME_DURATION: f64 = 1e-9;

pub(crate) type Phases = [(f64, f64); 7];

/// Boundary problem of one DoF, expressed in a frame where the profile
/// starts with positive jerk. The `Down` frame negates every quantity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Frame {
    pub direction: Direction,
    pub start: KinematicState,
    pub target: KinematicState,
    pub limits: Limits,
}

impl Frame {
    pub fn new(start: &KinematicState, target: &KinematicState, limits: &Limits, direction: Direction) -> Self {
        match direction {
            Direction::Up => Self {
                direction,
                start: *start,
                target: *target,
                limits: *limits,
            },
            Direction::Down => Self {
                direction,
                start: start.negated(),
                target: target.negated(),
                limits: limits.mirrored(),
            },
        }
    }

    pub fn jerk(&self) -> f64 {
        self.limits.max_jerk
    }

    pub fn velocity_change(&self) -> f64 {
        self.target.velocity - self.start.velocity
    }

    /// Margin added to parameter domains so roots on their edges still bracket.
    pub fn domain_margin(&self) -> f64 {
        1e-9 * (1.0 + self.limits.max_acceleration - self.limits.min_acceleration)
    }

    /// Up, hold at `a1`, down to `a2`, hold at `a2`, up to the target acceleration.
    pub fn uddu(&self, a1: f64, h1: f64, a2: f64, h2: f64) -> Phases {
        let j = self.jerk();
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        [
            ((a1 - a0) / j, j),
            (h1, 0.0),
            ((a1 - a2) / j, -j),
            (0.0, 0.0),
            (0.0, -j),
            (h2, 0.0),
            ((af - a2) / j, j),
        ]
    }

    /// Up to `a1`, down to `a3`, up to `a5`, down to the target acceleration.
    pub fn udud(&self, a1: f64, a3: f64, a5: f64) -> Phases {
        let j = self.jerk();
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        [
            ((a1 - a0) / j, j),
            (0.0, 0.0),
            ((a1 - a3) / j, -j),
            (0.0, 0.0),
            ((a5 - a3) / j, j),
            (0.0, 0.0),
            ((a5 - af) / j, -j),
        ]
    }

    /// Time-optimal halves into and out of a cruise at `vp`, with the
    /// position the cruise still has to cover.
    pub fn cruise_halves(&self, vp: f64) -> Option<(VelocityChange, VelocityChange, f64)> {
        let (v0, a0) = (self.start.velocity, self.start.acceleration);
        let (vf, af) = (self.target.velocity, self.target.acceleration);
        let first = velocity::time_optimal(v0, a0, vp, 0.0, &self.limits)?;
        let second = velocity::time_optimal(vp, 0.0, vf, af, &self.limits)?;
        let entry = first.end(self.start).position;
        let exit = second.end(KinematicState::new(0.0, vp, 0.0)).position;
        Some((first, second, self.target.position - entry - exit))
    }

    pub fn join_cruise(first: &VelocityChange, cruise: f64, second: &VelocityChange) -> Phases {
        let [f0, f1, f2] = first.phases;
        let [s0, s1, s2] = second.phases;
        [f0, f1, f2, (cruise, 0.0), s0, s1, s2]
    }

    /// Phases cruising at `vp` for as long as the remaining distance needs.
    pub fn cruise(&self, vp: f64) -> Option<Phases> {
        let (first, second, gap) = self.cruise_halves(vp)?;
        Some(Self::join_cruise(&first, gap / vp, &second))
    }

    pub fn position_error(&self, phases: &[(f64, f64)]) -> f64 {
        integrate_phases(self.start, phases).position - self.target.position
    }

    /// Jerks of `phases` in the caller's frame.
    pub fn to_world(&self, mut phases: Phases) -> Phases {
        let sign = self.direction.sign();
        for phase in phases.iter_mut() {
            phase.1 *= sign;
        }
        phases
    }

    /// Family with a velocity plateau at the velocity limit.
    fn time_all_vel<F: FnMut(Phases)>(&self, emit: &mut F) {
        if let Some(phases) = self.cruise(self.limits.max_velocity) {
            emit(phases);
        }
    }

    /// Both acceleration peaks at their limits, no cruise.
    ///
    /// With both peaks fixed the holds are tied by the velocity equation and
    /// the position error is exactly quadratic in the first hold.
    fn time_acc0_acc1<F: FnMut(Phases)>(&self, emit: &mut F) {
        let j = self.jerk();
        let (a_max, a_min) = (self.limits.max_acceleration, self.limits.min_acceleration);
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        let rest = self.velocity_change()
            - (2.0 * a_max * a_max - a0 * a0 - 2.0 * a_min * a_min + af * af) / (2.0 * j);
        let phases = |h1: f64| self.uddu(a_max, h1, a_min, (rest - a_max * h1) / a_min);
        let error = |h1: f64| self.position_error(&phases(h1));

        let scale = 1.0 + rest.abs() / a_max;
        let (e0, e1, e2) = (error(0.0), error(scale), error(2.0 * scale));
        let c2 = (e2 - 2.0 * e1 + e0) / (2.0 * scale * scale);
        let c1 = (e1 - e0) / scale - c2 * scale;
        for mut h1 in roots::quadratic(c2, c1, e0) {
            for _ in 0..3 {
                let slope = 2.0 * c2 * h1 + c1;
                if slope == 0.0 {
                    break;
                }
                h1 -= error(h1) / slope;
            }
            emit(phases(h1));
        }
    }

    /// First acceleration peak at its limit, free second peak `a2`.
    fn time_acc0<F: FnMut(Phases)>(&self, emit: &mut F) {
        let j = self.jerk();
        let (a_max, a_min) = (self.limits.max_acceleration, self.limits.min_acceleration);
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        let dv = self.velocity_change();
        let (lo, hi) = (a_min, af.min(a_max));
        let phases = |a2: f64| {
            let a2 = a2.clamp(lo, hi.max(lo));
            let h1 = (dv - (2.0 * a_max * a_max - a0 * a0 - 2.0 * a2 * a2 + af * af) / (2.0 * j)) / a_max;
            Some(self.uddu(a_max, h1, a2, 0.0))
        };
        self.solve_family(phases, lo, hi, emit);
    }

    /// Second acceleration peak at its limit, free first peak `a1`.
    fn time_acc1<F: FnMut(Phases)>(&self, emit: &mut F) {
        let j = self.jerk();
        let (a_max, a_min) = (self.limits.max_acceleration, self.limits.min_acceleration);
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        let dv = self.velocity_change();
        let (lo, hi) = (a0.max(a_min), a_max);
        let phases = |a1: f64| {
            let a1 = a1.clamp(lo, hi.max(lo));
            let h2 = (dv - (2.0 * a1 * a1 - a0 * a0 - 2.0 * a_min * a_min + af * af) / (2.0 * j)) / a_min;
            Some(self.uddu(a1, 0.0, a_min, h2))
        };
        self.solve_family(phases, lo, hi, emit);
    }

    /// No limit reached: three ramps with free peaks, tied by the velocity
    /// equation `a1² - a2² = spread`.
    ///
    /// Solved over `a2` and again over `a1`. Each parametrization has a
    /// square-root branch point where its residual turns undefined, and a
    /// root close to it is not bracketed; the other parametrization is
    /// regular there.
    fn time_none<F: FnMut(Phases)>(&self, emit: &mut F) {
        let j = self.jerk();
        let (a_max, a_min) = (self.limits.max_acceleration, self.limits.min_acceleration);
        let (a0, af) = (self.start.acceleration, self.target.acceleration);
        let spread = j * self.velocity_change() + (a0 * a0 - af * af) / 2.0;
        let slack = |x: f64| 1e-12 * (1.0 + a0 * a0 + x * x + af * af);
        for branch in [1.0, -1.0] {
            let (lo, hi) = (a_min, af.min(a_max));
            let over_second = |a2: f64| {
                let a2 = a2.clamp(lo, hi.max(lo));
                let square = spread + a2 * a2;
                (square >= -slack(a2)).then(|| self.uddu(branch * square.max(0.0).sqrt(), 0.0, a2, 0.0))
            };
            self.solve_family(over_second, lo, hi, emit);

            let (lo, hi) = (a0.max(a_min), a_max);
            let over_first = |a1: f64| {
                let a1 = a1.clamp(lo, hi.max(lo));
                let square = a1 * a1 - spread;
                (square >= -slack(a1)).then(|| self.uddu(a1, 0.0, branch * square.max(0.0).sqrt(), 0.0))
            };
            self.solve_family(over_first, lo, hi, emit);
        }
    }

    /// Emits the phases at every root of the position error over `[lo, hi]`.
    /// `phases` returns `None` outside the family's domain.
    pub fn solve_family<P, F>(&self, phases: P, lo: f64, hi: f64, emit: &mut F)
    where
        P: Fn(f64) -> Option<Phases>,
        F: FnMut(Phases),
    {
        let margin = self.domain_margin();
        let residual = |x: f64| phases(x).map_or(f64::NAN, |p| self.position_error(&p));
        for x in roots::bracketed(residual, lo - margin, hi + margin, SAMPLES) {
            if let Some(p) = phases(x) {
                emit(p);
            }
        }
    }
}

/// Checks that one DoF's boundary states are admissible under `limits`.
pub(crate) fn validate_states(current: &KinematicState, target: &KinematicState, limits: &Limits) -> Result<(), OtgError> {
    limits.validate()?;
    let values = [
        current.position,
        current.velocity,
        current.acceleration,
        target.position,
        target.velocity,
        target.acceleration,
    ];
    if values.iter().any(|x| !x.is_finite()) {
        return Err(OtgError::InvalidInput("states must be finite".into()));
    }
    if !limits.contains_velocity(current.velocity) {
        return Err(OtgError::InvalidInput(format!(
            "current velocity {} outside [{}, {}]",
            current.velocity, limits.min_velocity, limits.max_velocity
        )));
    }
    if !limits.contains_acceleration(current.acceleration) {
        return Err(OtgError::InvalidInput(format!(
            "current acceleration {} outside [{}, {}]",
            current.acceleration, limits.min_acceleration, limits.max_acceleration
        )));
    }
    if !limits.contains_velocity(target.velocity) || !limits.contains_acceleration(target.acceleration) {
        return Err(OtgError::InvalidInput(format!(
            "target state (v={}, a={}) outside the limits",
            target.velocity, target.acceleration
        )));
    }
    let (vf, af) = (target.velocity, target.acceleration);
    let carried = af * af / (2.0 * limits.max_jerk);
    let slack = limits.velocity_slack();
    if (af > 0.0 && vf - carried < limits.min_velocity - slack) || (af < 0.0 && vf + carried > limits.max_velocity + slack) {
        return Err(OtgError::InvalidInput(format!(
            "target acceleration {af} cannot be reached at velocity {vf} within the velocity limits"
        )));
    }
    Ok(())
}

pub(crate) fn at_target(state: &KinematicState, target: &KinematicState) -> bool {
    state.approx_eq(
        target,
        STATE_PRECISION * (1.0 + target.position.abs()),
        STATE_PRECISION * (1.0 + target.velocity.abs()),
        ACCELERATION_PRECISION * (1.0 + target.acceleration.abs()),
    )
}

/// Shortest candidates first; among equal durations, fewer segments first.
pub(crate) fn sort_candidates(profiles: &mut Vec<Profile>) {
    profiles.sort_by(|a, b| {
        a.duration()
            .total_cmp(&b.duration())
            .then(a.active_segments().cmp(&b.active_segments()))
    });
    profiles.dedup_by(|later, earlier| (later.duration() - earlier.duration()).abs() <= SAME_DURATION * (1.0 + earlier.duration()));
}

/// Every valid profile from the canonical shape families, shortest first.
///
/// The first entry is the time-optimal profile. Later entries bound the
/// durations that other profile shapes can still reach.
pub fn candidates(current: &KinematicState, target: &KinematicState, limits: &Limits) -> Result<Vec<Profile>, OtgError> {
    validate_states(current, target, limits)?;
    let brake = Brake::for_state(current, limits);
    let start = brake.end(*current);

    if at_target(&start, target) {
        let profile = Profile::from_phases(*current, &brake.phases, &[], ProfileShape::STANDSTILL)
            .ok_or(OtgError::Unreachable { dof: 0 })?;
        return Ok(vec![profile.snapped_to(*target)]);
    }

    let mut profiles = Vec::new();
    for direction in [Direction::Up, Direction::Down] {
        let frame = Frame::new(&start, target, limits, direction);
        let mut emit = |phases: Phases| {
            let shape = ProfileShape::classify(&phases, direction);
            let Some(profile) = Profile::from_phases(*current, &brake.phases, &frame.to_world(phases), shape) else {
                return;
            };
            if profile.reaches(target, limits) {
                trace!(?shape, duration = profile.duration(), "valid candidate profile");
                profiles.push(profile.snapped_to(*target));
            }
        };
        frame.time_all_vel(&mut emit);
        frame.time_acc0_acc1(&mut emit);
        frame.time_acc0(&mut emit);
        frame.time_acc1(&mut emit);
        frame.time_none(&mut emit);
    }

    if profiles.is_empty() {
        return Err(OtgError::Unreachable { dof: 0 });
    }
    sort_candidates(&mut profiles);
    Ok(profiles)
}

/// Minimum-duration profile from `current` to `target` under `limits`.
pub fn synthesize(current: &KinematicState, target: &KinematicState, limits: &Limits) -> Result<Profile, OtgError> {
    let mut profiles = candidates(current, target, limits)?;
    Ok(profiles.swap_remove(0))
}
