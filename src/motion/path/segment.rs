// src/motion/path/segment.rs
//! Pieces of a geometric path: straight lines between waypoints and quartic
//! blends around the corners.

/// Geometry of one path piece over its local parameter `s ∈ [0, length]`.
pub trait Curve {
    fn length(&self) -> f64;

    /// Position at `s`
    fn q_into(&self, s: f64, out: &mut [f64]);

    /// First derivative with respect to `s`
    fn pdq_into(&self, s: f64, out: &mut [f64]);

    /// Second derivative with respect to `s`
    fn pddq_into(&self, s: f64, out: &mut [f64]);

    /// Third derivative with respect to `s`
    fn pdddq_into(&self, s: f64, out: &mut [f64]);

    /// Per-DoF bound of `|q'|` over the piece
    fn max_pdq(&self, dof: usize) -> f64;

    /// Per-DoF bound of `|q''|` over the piece
    fn max_pddq(&self, dof: usize) -> f64;

    /// Per-DoF bound of `|q'''|` over the piece
    fn max_pdddq(&self, dof: usize) -> f64;
}

/// Straight line with unit direction.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSegment {
    start: Vec<f64>,
    end: Vec<f64>,
    direction: Vec<f64>,
    length: f64,
}

impl LinearSegment {
    /// Line from `start` to `end`; `None` if they coincide.
    pub fn new(start: Vec<f64>, end: Vec<f64>) -> Option<Self> {
        let length = distance(&start, &end);
        if length <= 0.0 || !length.is_finite() {
            return None;
        }
        let direction = start.iter().zip(&end).map(|(a, b)| (b - a) / length).collect();
        Some(Self {
            start,
            end,
            direction,
            length,
        })
    }

    pub fn direction(&self) -> &[f64] {
        &self.direction
    }

    pub fn start(&self) -> &[f64] {
        &self.start
    }

    pub fn end(&self) -> &[f64] {
        &self.end
    }
}

impl Curve for LinearSegment {
    fn length(&self) -> f64 {
        self.length
    }

    fn q_into(&self, s: f64, out: &mut [f64]) {
        if s >= self.length {
            out.copy_from_slice(&self.end);
            return;
        }
        for ((o, p), d) in out.iter_mut().zip(&self.start).zip(&self.direction) {
            *o = p + s * d;
        }
    }

    fn pdq_into(&self, _s: f64, out: &mut [f64]) {
        out.copy_from_slice(&self.direction);
    }

    fn pddq_into(&self, _s: f64, out: &mut [f64]) {
        out.fill(0.0);
    }

    fn pdddq_into(&self, _s: f64, out: &mut [f64]) {
        out.fill(0.0);
    }

    fn max_pdq(&self, dof: usize) -> f64 {
        self.direction[dof].abs()
    }

    fn max_pddq(&self, _dof: usize) -> f64 {
        0.0
    }

    fn max_pdddq(&self, _dof: usize) -> f64 {
        0.0
    }
}

/// Quartic `q(s) = f + e·s + c·s³ + b·s⁴` replacing a corner between two
/// lines with unit directions `lm` (incoming) and `rm` (outgoing).
///
/// The blend starts `half_width` before the corner on the incoming line and
/// ends `half_width` after it on the outgoing line. Position, first and
/// second derivative match the lines at both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct QuarticBlendSegment {
    b: Vec<f64>,
    c: Vec<f64>,
    e: Vec<f64>,
    f: Vec<f64>,
    half_width: f64,
    max_pdq: Vec<f64>,
    max_pddq: Vec<f64>,
    max_pdddq: Vec<f64>,
}

impl QuarticBlendSegment {
    pub fn new(corner: &[f64], lm: &[f64], rm: &[f64], half_width: f64) -> Self {
        let sa = half_width;
        let mut blend = Self {
            b: Vec::with_capacity(corner.len()),
            c: Vec::with_capacity(corner.len()),
            e: Vec::with_capacity(corner.len()),
            f: Vec::with_capacity(corner.len()),
            half_width,
            max_pdq: Vec::with_capacity(corner.len()),
            max_pddq: Vec::with_capacity(corner.len()),
            max_pdddq: Vec::with_capacity(corner.len()),
        };
        for ((&p, &l), &r) in corner.iter().zip(lm).zip(rm) {
            let turn = r - l;
            blend.b.push(-turn / (16.0 * sa.powi(3)));
            blend.c.push(turn / (4.0 * sa * sa));
            blend.e.push(l);
            blend.f.push(p - sa * l);
            blend.max_pdq.push(l.abs().max(r.abs()));
            blend.max_pddq.push(0.75 * turn.abs() / sa);
            blend.max_pdddq.push(1.5 * turn.abs() / (sa * sa));
        }
        blend
    }

    /// Largest distance of the blend from its corner along one DoF.
    pub fn deviation(&self, dof: usize) -> f64 {
        // at the middle of the blend
        3.0 * self.half_width * (4.0 * self.c[dof] * self.half_width * self.half_width).abs() / 16.0
    }
}

impl Curve for QuarticBlendSegment {
    fn length(&self) -> f64 {
        2.0 * self.half_width
    }

    fn q_into(&self, s: f64, out: &mut [f64]) {
        let s = s.clamp(0.0, self.length());
        let (s3, s4) = (s * s * s, s * s * s * s);
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.f[i] + self.e[i] * s + self.c[i] * s3 + self.b[i] * s4;
        }
    }

    fn pdq_into(&self, s: f64, out: &mut [f64]) {
        let s = s.clamp(0.0, self.length());
        for (i, o) in out.iter_mut().enumerate() {
            *o = self.e[i] + 3.0 * self.c[i] * s * s + 4.0 * self.b[i] * s * s * s;
        }
    }

    fn pddq_into(&self, s: f64, out: &mut [f64]) {
        let s = s.clamp(0.0, self.length());
        for (i, o) in out.iter_mut().enumerate() {
            *o = 6.0 * self.c[i] * s + 12.0 * self.b[i] * s * s;
        }
    }

    fn pdddq_into(&self, s: f64, out: &mut [f64]) {
        let s = s.clamp(0.0, self.length());
        for (i, o) in out.iter_mut().enumerate() {
            *o = 6.0 * self.c[i] + 24.0 * self.b[i] * s;
        }
    }

    fn max_pdq(&self, dof: usize) -> f64 {
        self.max_pdq[dof]
    }

    fn max_pddq(&self, dof: usize) -> f64 {
        self.max_pddq[dof]
    }

    fn max_pdddq(&self, dof: usize) -> f64 {
        self.max_pdddq[dof]
    }
}

/// Stored path piece, evaluated by index without trait objects.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    Linear(LinearSegment),
    Blend(QuarticBlendSegment),
}

impl PathSegment {
    fn curve(&self) -> &dyn Curve {
        match self {
            PathSegment::Linear(s) => s,
            PathSegment::Blend(s) => s,
        }
    }
}

impl Curve for PathSegment {
    fn length(&self) -> f64 {
        self.curve().length()
    }

    fn q_into(&self, s: f64, out: &mut [f64]) {
        self.curve().q_into(s, out)
    }

    fn pdq_into(&self, s: f64, out: &mut [f64]) {
        self.curve().pdq_into(s, out)
    }

    fn pddq_into(&self, s: f64, out: &mut [f64]) {
        self.curve().pddq_into(s, out)
    }

    fn pdddq_into(&self, s: f64, out: &mut [f64]) {
        self.curve().pdddq_into(s, out)
    }

    fn max_pdq(&self, dof: usize) -> f64 {
        self.curve().max_pdq(dof)
    }

    fn max_pddq(&self, dof: usize) -> f64 {
        self.curve().max_pddq(dof)
    }

    fn max_pdddq(&self, dof: usize) -> f64 {
        self.curve().max_pdddq(dof)
    }
}

pub(crate) fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (y - x) * (y - x)).sum::<f64>().sqrt()
}
