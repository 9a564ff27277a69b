// src/motion/path/mod.rs
//! Geometric paths through waypoints.
//!
//! A path is a chain of straight lines whose interior corners are replaced
//! by quartic blends. The parameter `s` runs from 0 at the start position to
//! `length` at the last waypoint and equals arc length on the lines.

pub mod segment;

pub use segment::{Curve, LinearSegment, PathSegment, QuarticBlendSegment};

use tracing::trace;

use crate::error::OtgError;
use crate::motion::profile::Limits;
use crate::motion::segment::KinematicState;
use segment::distance;

/// Corners whose directions differ by less than this stay sharp.
const STRAIGHT: f64 = 1e-12;

/// How a waypoint's position is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reference {
    #[default]
    Absolute,
    /// Offset from the previous waypoint
    Relative,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathWaypoint {
    pub position: Vec<f64>,
    pub reference: Reference,
    /// Overrides the path's blend distance at this corner
    pub max_blend_distance: Option<f64>,
}

impl PathWaypoint {
    pub fn absolute(position: Vec<f64>) -> Self {
        Self {
            position,
            reference: Reference::Absolute,
            max_blend_distance: None,
        }
    }

    pub fn relative(position: Vec<f64>) -> Self {
        Self {
            position,
            reference: Reference::Relative,
            max_blend_distance: None,
        }
    }

    pub fn with_blend(mut self, max_blend_distance: f64) -> Self {
        self.max_blend_distance = Some(max_blend_distance);
        self
    }
}

/// Immutable curve `q(s)` with closed-form derivatives.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    start: Vec<f64>,
    waypoints: Vec<PathWaypoint>,
    segments: Vec<PathSegment>,
    /// Path parameter where each segment starts
    offsets: Vec<f64>,
    length: f64,
    max_pdq: Vec<f64>,
    max_pddq: Vec<f64>,
    max_pdddq: Vec<f64>,
}

impl Path {
    /// Builds a path from `start` through `waypoints`.
    ///
    /// `max_blend_distance` bounds, per DoF, how far a blend may pass from
    /// its corner. Zero keeps the corners sharp.
    pub fn new(start: Vec<f64>, waypoints: Vec<PathWaypoint>, max_blend_distance: f64) -> Result<Self, OtgError> {
        let dofs = start.len();
        if dofs == 0 {
            return Err(OtgError::DegeneratePath("start position is empty".into()));
        }
        if waypoints.is_empty() {
            return Err(OtgError::DegeneratePath("no waypoints".into()));
        }
        if !max_blend_distance.is_finite() || max_blend_distance < 0.0 {
            return Err(OtgError::DegeneratePath(format!(
                "blend distance {max_blend_distance} must be finite and non-negative"
            )));
        }
        if start.iter().any(|p| !p.is_finite()) {
            return Err(OtgError::DegeneratePath("start position must be finite".into()));
        }

        // resolved corners with their blend distance
        let mut points: Vec<(Vec<f64>, f64)> = vec![(start.clone(), 0.0)];
        for (i, waypoint) in waypoints.iter().enumerate() {
            if waypoint.position.len() != dofs {
                return Err(OtgError::DegeneratePath(format!(
                    "waypoint {i} has {} coordinates, expected {dofs}",
                    waypoint.position.len()
                )));
            }
            let blend = waypoint.max_blend_distance.unwrap_or(max_blend_distance);
            if waypoint.position.iter().any(|p| !p.is_finite()) || !blend.is_finite() || blend < 0.0 {
                return Err(OtgError::DegeneratePath(format!("waypoint {i} is not finite")));
            }
            let previous = &points[points.len() - 1].0;
            let position: Vec<f64> = match waypoint.reference {
                Reference::Absolute => waypoint.position.clone(),
                Reference::Relative => previous.iter().zip(&waypoint.position).map(|(p, d)| p + d).collect(),
            };
            if distance(previous, &position) > 0.0 {
                points.push((position, blend));
            }
        }

        let lines: Vec<LinearSegment> = points
            .windows(2)
            .filter_map(|w| LinearSegment::new(w[0].0.clone(), w[1].0.clone()))
            .collect();

        // half widths of the blends at each interior corner
        let mut half_widths = vec![0.0; points.len()];
        for k in 1..lines.len() {
            let (incoming, outgoing) = (&lines[k - 1], &lines[k]);
            let turn = incoming
                .direction()
                .iter()
                .zip(outgoing.direction())
                .map(|(l, r)| (r - l).abs())
                .fold(0.0, f64::max);
            let blend = points[k].1;
            if turn <= STRAIGHT || blend <= 0.0 {
                continue;
            }
            half_widths[k] = (16.0 * blend / (3.0 * turn))
                .min(incoming.length() / 2.0)
                .min(outgoing.length() / 2.0);
        }

        let mut segments = Vec::with_capacity(2 * lines.len());
        for (k, line) in lines.iter().enumerate() {
            let trimmed_start = shifted(line.start(), line.direction(), half_widths[k]);
            let trimmed_end = shifted(line.end(), line.direction(), -half_widths[k + 1]);
            if let Some(trimmed) = LinearSegment::new(trimmed_start, trimmed_end) {
                segments.push(PathSegment::Linear(trimmed));
            }
            if k + 1 < lines.len() && half_widths[k + 1] > 0.0 {
                let next = &lines[k + 1];
                let blend = QuarticBlendSegment::new(
                    line.end(),
                    line.direction(),
                    next.direction(),
                    half_widths[k + 1],
                );
                let deviation = (0..dofs).map(|dof| blend.deviation(dof)).fold(0.0, f64::max);
                trace!(corner = k + 1, deviation, "blended corner");
                segments.push(PathSegment::Blend(blend));
            }
        }

        let mut offsets = Vec::with_capacity(segments.len());
        let mut length = 0.0;
        for segment in &segments {
            offsets.push(length);
            length += segment.length();
        }
        let bound = |f: fn(&PathSegment, usize) -> f64| -> Vec<f64> {
            (0..dofs)
                .map(|dof| segments.iter().map(|s| f(s, dof)).fold(0.0, f64::max))
                .collect()
        };
        let (max_pdq, max_pddq, max_pdddq) = (
            bound(PathSegment::max_pdq),
            bound(PathSegment::max_pddq),
            bound(PathSegment::max_pdddq),
        );
        trace!(length, segments = segments.len(), "built path");

        Ok(Self {
            start,
            waypoints,
            segments,
            offsets,
            length,
            max_pdq,
            max_pddq,
            max_pdddq,
        })
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.start.len()
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn start(&self) -> &[f64] {
        &self.start
    }

    pub fn waypoints(&self) -> &[PathWaypoint] {
        &self.waypoints
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Per-DoF bound of `|q'|` over the path
    pub fn max_pdq(&self) -> &[f64] {
        &self.max_pdq
    }

    /// Per-DoF bound of `|q''|` over the path
    pub fn max_pddq(&self) -> &[f64] {
        &self.max_pddq
    }

    /// Per-DoF bound of `|q'''|` over the path
    pub fn max_pdddq(&self) -> &[f64] {
        &self.max_pdddq
    }

    /// Segment containing `s` and the offset into it.
    fn locate(&self, s: f64) -> Option<(&PathSegment, f64)> {
        if s >= self.length {
            let last = self.segments.last()?;
            return Some((last, last.length()));
        }
        let s = s.max(0.0);
        let index = self.offsets.partition_point(|&o| o <= s).checked_sub(1)?;
        Some((&self.segments[index], s - self.offsets[index]))
    }

    pub fn q_into(&self, s: f64, out: &mut [f64]) {
        match self.locate(s) {
            Some((segment, local)) => segment.q_into(local, out),
            None => out.copy_from_slice(&self.start),
        }
    }

    pub fn pdq_into(&self, s: f64, out: &mut [f64]) {
        match self.locate(s) {
            Some((segment, local)) => segment.pdq_into(local, out),
            None => out.fill(0.0),
        }
    }

    pub fn pddq_into(&self, s: f64, out: &mut [f64]) {
        match self.locate(s) {
            Some((segment, local)) => segment.pddq_into(local, out),
            None => out.fill(0.0),
        }
    }

    pub fn pdddq_into(&self, s: f64, out: &mut [f64]) {
        match self.locate(s) {
            Some((segment, local)) => segment.pdddq_into(local, out),
            None => out.fill(0.0),
        }
    }

    pub fn q(&self, s: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.degrees_of_freedom()];
        self.q_into(s, &mut out);
        out
    }

    pub fn pdq(&self, s: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.degrees_of_freedom()];
        self.pdq_into(s, &mut out);
        out
    }

    pub fn pddq(&self, s: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.degrees_of_freedom()];
        self.pddq_into(s, &mut out);
        out
    }

    pub fn pdddq(&self, s: f64) -> Vec<f64> {
        let mut out = vec![0.0; self.degrees_of_freedom()];
        self.pdddq_into(s, &mut out);
        out
    }

    /// Limits on the path parameter that keep every DoF inside `limits`.
    ///
    /// Half of each acceleration bound is left to the curvature term and
    /// half of each jerk bound to the terms of `q'''` and `q''`.
    pub fn parameter_limits(&self, limits: &[Limits]) -> Result<Limits, OtgError> {
        if limits.len() != self.degrees_of_freedom() {
            return Err(OtgError::InvalidInput(format!(
                "{} limits for a path with {} DoFs",
                limits.len(),
                self.degrees_of_freedom()
            )));
        }
        let conservative: Vec<(f64, f64, f64)> = limits
            .iter()
            .map(|l| {
                (
                    l.max_velocity.min(-l.min_velocity),
                    l.max_acceleration.min(-l.min_acceleration),
                    l.max_jerk,
                )
            })
            .collect();
        let dofs = 0..self.degrees_of_freedom();
        let (g1, g2, g3) = (&self.max_pdq, &self.max_pddq, &self.max_pdddq);

        let mut ds = f64::INFINITY;
        for i in dofs.clone() {
            let (v, a, _) = conservative[i];
            if g1[i] > 0.0 {
                ds = ds.min(v / g1[i]);
            }
            if g2[i] > 0.0 {
                ds = ds.min((a / (2.0 * g2[i])).sqrt());
            }
        }
        let mut dds = f64::INFINITY;
        for i in dofs.clone().filter(|&i| g1[i] > 0.0) {
            dds = dds.min((conservative[i].1 - g2[i] * ds * ds) / g1[i]);
        }

        let mut scale: f64 = 1.0;
        for i in dofs.clone() {
            let curvature_jerk = g3[i] * ds.powi(3) + 3.0 * g2[i] * ds * dds;
            if curvature_jerk > 0.0 {
                scale = scale.min((conservative[i].2 / 2.0 / curvature_jerk).sqrt());
            }
        }
        ds *= scale;
        dds *= scale;

        let mut ddds = f64::INFINITY;
        for i in dofs.filter(|&i| g1[i] > 0.0) {
            let remaining = conservative[i].2 - g3[i] * ds.powi(3) - 3.0 * g2[i] * ds * dds;
            ddds = ddds.min(remaining / g1[i]);
        }

        if ![ds, dds, ddds].iter().all(|x| x.is_finite() && *x > 0.0) {
            return Err(OtgError::DegeneratePath(
                "path has no direction to move along".into(),
            ));
        }
        Ok(Limits::symmetric(ds, dds, ddds))
    }

    /// Path parameter state at `s` matching the DoF `velocity` and
    /// `acceleration`, which must be tangent to the path there.
    pub fn parameter_state(&self, s: f64, velocity: &[f64], acceleration: &[f64]) -> Result<KinematicState, OtgError> {
        let pdq = self.pdq(s);
        let pddq = self.pddq(s);
        let Some(k) = (0..pdq.len()).max_by(|&a, &b| pdq[a].abs().total_cmp(&pdq[b].abs())) else {
            return Err(OtgError::DegeneratePath("path has no DoFs".into()));
        };
        if pdq[k] == 0.0 {
            return if velocity.iter().chain(acceleration).all(|x| *x == 0.0) {
                Ok(KinematicState::at_rest(s))
            } else {
                Err(OtgError::DegeneratePath("path has no tangent".into()))
            };
        }
        let ds = velocity[k] / pdq[k];
        let dds = (acceleration[k] - pddq[k] * ds * ds) / pdq[k];
        for i in 0..pdq.len() {
            let v = pdq[i] * ds;
            let a = pddq[i] * ds * ds + pdq[i] * dds;
            if (v - velocity[i]).abs() > 1e-8 * (1.0 + velocity[i].abs())
                || (a - acceleration[i]).abs() > 1e-8 * (1.0 + acceleration[i].abs())
            {
                return Err(OtgError::InvalidInput(format!(
                    "velocity and acceleration of DoF {i} are not tangent to the path at s = {s}"
                )));
            }
        }
        Ok(KinematicState::new(s, ds, dds))
    }
}

fn shifted(point: &[f64], direction: &[f64], distance: f64) -> Vec<f64> {
    if distance == 0.0 {
        return point.to_vec();
    }
    point.iter().zip(direction).map(|(p, d)| p + distance * d).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_path() -> Path {
        let waypoints = vec![
            PathWaypoint::absolute(vec![1.0, 0.0, 0.0]),
            PathWaypoint::absolute(vec![1.0, 1.0, -3.0]),
            PathWaypoint::absolute(vec![0.0, 0.0, 0.0]),
        ];
        Path::new(vec![0.0; 3], waypoints, 0.1).unwrap()
    }

    #[test]
    fn test_closed_path_endpoints() {
        let path = closed_path();
        assert!(path.length() > 0.0);
        assert_eq!(path.q(0.0), vec![0.0, 0.0, 0.0]);
        assert_eq!(path.q(path.length()), vec![0.0, 0.0, 0.0]);
        assert_eq!(path.q(path.length() + 1.0), vec![0.0, 0.0, 0.0]);
        // two lines, blend, line, blend, line
        assert_eq!(path.segments().len(), 5);
    }

    #[test]
    fn test_tangent_is_continuous() {
        let path = closed_path();
        for &offset in &path.offsets[1..] {
            let before = path.pdq(offset - 1e-9);
            let after = path.pdq(offset + 1e-9);
            for (b, a) in before.iter().zip(&after) {
                assert!((b - a).abs() < 1e-6, "tangent jumps at s = {offset}");
            }
        }
    }

    #[test]
    fn test_blend_stays_within_distance() {
        let path = closed_path();
        let corner = [1.0, 0.0, 0.0];
        let steps = 2000;
        let closest = (0..=steps)
            .map(|k| path.q(path.length() * k as f64 / steps as f64))
            .map(|q| q.iter().zip(&corner).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max))
            .fold(f64::INFINITY, f64::min);
        assert!(closest <= 0.1 + 1e-9);
    }

    #[test]
    fn test_blend_deviation_matches_blend_distance() {
        let path = closed_path();
        let deviations: Vec<f64> = path
            .segments()
            .iter()
            .filter_map(|s| match s {
                PathSegment::Blend(blend) => Some((0..3).map(|dof| blend.deviation(dof)).fold(0.0, f64::max)),
                PathSegment::Linear(_) => None,
            })
            .collect();
        assert_eq!(deviations.len(), 2);
        // the unit first leg caps the first blend at half its length
        assert!((deviations[0] - 3.0 * 0.5 / 16.0).abs() < 1e-12);
        assert!((deviations[1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_relative_waypoints_and_duplicates() {
        let waypoints = vec![
            PathWaypoint::relative(vec![1.0, 0.0]).with_blend(0.0),
            PathWaypoint::relative(vec![0.0, 0.0]),
            PathWaypoint::relative(vec![0.0, 2.0]),
        ];
        let path = Path::new(vec![1.0, 1.0], waypoints, 0.1).unwrap();
        assert_eq!(path.q(path.length()), vec![2.0, 3.0]);
        assert!((path.length() - 3.0).abs() < 1e-12);
        assert_eq!(path.segments().len(), 2);
    }

    #[test]
    fn test_degenerate_paths() {
        assert!(matches!(Path::new(vec![0.0], vec![], 0.1), Err(OtgError::DegeneratePath(_))));
        let mismatched = vec![PathWaypoint::absolute(vec![1.0, 2.0])];
        assert!(matches!(Path::new(vec![0.0], mismatched, 0.1), Err(OtgError::DegeneratePath(_))));

        let single = Path::new(vec![0.5], vec![PathWaypoint::absolute(vec![0.5])], 0.1).unwrap();
        assert_eq!(single.length(), 0.0);
        assert_eq!(single.q(0.0), vec![0.5]);
    }

    #[test]
    fn test_parameter_limits_on_a_line() {
        let path = Path::new(vec![0.0, 0.0], vec![PathWaypoint::absolute(vec![3.0, 4.0])], 0.0).unwrap();
        let limits = [Limits::symmetric(1.0, 2.0, 3.0), Limits::symmetric(1.0, 2.0, 3.0)];
        let s_limits = path.parameter_limits(&limits).unwrap();
        assert!((s_limits.max_velocity - 1.25).abs() < 1e-12);
        assert!((s_limits.max_acceleration - 2.5).abs() < 1e-12);
        assert!((s_limits.max_jerk - 3.75).abs() < 1e-12);
    }

    #[test]
    fn test_parameter_state_requires_tangency() {
        let path = Path::new(vec![0.0, 0.0], vec![PathWaypoint::absolute(vec![3.0, 4.0])], 0.0).unwrap();
        let state = path.parameter_state(0.0, &[0.6, 0.8], &[0.0, 0.0]).unwrap();
        assert!((state.velocity - 1.0).abs() < 1e-12);
        let err = path.parameter_state(0.0, &[0.6, 0.0], &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, OtgError::InvalidInput(_)));
    }
}
