// src/motion/roots.rs
//! Scalar root finding used by the profile families.
//!
//! Residuals may return NaN where a parameter value is outside the
//! family's domain; such samples never form a bracket.

const BISECTION_STEPS: usize = 200;

/// Real roots of `a x² + b x + c`, smaller first.
pub(crate) fn quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    let scale = a.abs().max(b.abs()).max(c.abs());
    if scale == 0.0 {
        return Vec::new();
    }
    if a.abs() <= 1e-14 * scale {
        return if b == 0.0 { Vec::new() } else { vec![-c / b] };
    }
    let mut disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        if disc > -1e-12 * (b * b + (4.0 * a * c).abs()) {
            disc = 0.0;
        } else {
            return Vec::new();
        }
    }
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    if q == 0.0 {
        return vec![0.0];
    }
    let (r0, r1) = (q / a, c / q);
    if r0 <= r1 { vec![r0, r1] } else { vec![r1, r0] }
}

/// Roots of `f` on `[lo, hi]`, isolated on `samples` equal intervals and
/// refined by bisection.
pub(crate) fn bracketed<F>(f: F, lo: f64, hi: f64, samples: usize) -> Vec<f64>
where
    F: Fn(f64) -> f64,
{
    let mut roots = Vec::new();
    if !(hi > lo) {
        return roots;
    }
    let n = samples.max(2);
    let step = (hi - lo) / n as f64;
    let mut x_prev = lo;
    let mut f_prev = f(lo);
    if f_prev == 0.0 {
        roots.push(lo);
    }
    for i in 1..=n {
        let x = if i == n { hi } else { lo + step * i as f64 };
        let fx = f(x);
        if fx == 0.0 {
            roots.push(x);
        } else if f_prev.is_finite() && fx.is_finite() && f_prev != 0.0 && (f_prev < 0.0) != (fx < 0.0) {
            roots.push(bisect(&f, x_prev, x, f_prev));
        }
        x_prev = x;
        f_prev = fx;
    }
    roots
}

fn bisect<F>(f: &F, mut lo: f64, mut hi: f64, mut f_lo: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
            break;
        }
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return mid;
        }
        if !f_mid.is_finite() {
            break;
        }
        if (f_mid < 0.0) == (f_lo < 0.0) {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}
