//! Real roots of low-degree polynomials.
//!
//! Closed-form solvers used by the surface intercept code: the quadratic
//! for ray/line conic intersections and Cardano's cubic for the
//! characteristic polynomial of a conic pencil.

use std::f64::consts::PI;

/// Coefficients below this fraction of the largest one are treated as zero.
const NEGLIGIBLE: f64 = f64::EPSILON;

/// Discriminant tolerance of the depressed cubic, relative to its root scale.
const CUBIC_DISCRIMINANT: f64 = 1e-12;

/// Largest coefficient magnitude, or `None` when every coefficient is zero
/// or one is not finite.
fn coefficient_scale(coefficients: &[f64]) -> Option<f64> {
    let scale = coefficients.iter().fold(0.0_f64, |m, c| m.max(c.abs()));
    (scale > 0.0 && scale.is_finite()).then_some(scale)
}

/// Solve a quadratic equation: a*x^2 + b*x + c = 0
///
/// Roots are returned in ascending order. A double root is returned twice so
/// that callers counting intersections see tangencies with multiplicity two.
/// The coefficients may have any common scale; the equation falls back to
/// linear only when `a` is negligible next to `b` and `c`.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    let Some(scale) = coefficient_scale(&[a, b, c]) else {
        return Vec::new();
    };
    let (a, b, c) = (a / scale, b / scale, c / scale);

    if a.abs() <= NEGLIGIBLE {
        if b.abs() <= NEGLIGIBLE {
            return Vec::new();
        }
        return vec![-c / b];
    }

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }

    // q keeps the sign of b so that the two roots never subtract close values
    let q = -0.5 * (b + b.signum() * disc.sqrt());
    let (r1, r2) = if q == 0.0 { (0.0, 0.0) } else { (q / a, c / q) };
    if r1 <= r2 {
        vec![r1, r2]
    } else {
        vec![r2, r1]
    }
}

/// Solve a cubic equation: a*x^3 + b*x^2 + c*x + d = 0
///
/// Roots are returned in ascending order; a double root is reported twice.
/// Coefficients are first scaled by their largest magnitude, and the
/// discriminant is compared against the scale of the roots, so the result
/// does not depend on the units the coefficients carry. Determinants of
/// conic pencils span many decades with the surface curvatures.
pub fn solve_cubic(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
    let Some(scale) = coefficient_scale(&[a, b, c, d]) else {
        return Vec::new();
    };
    let (a, b, c, d) = (a / scale, b / scale, c / scale, d / scale);
    if a.abs() <= NEGLIGIBLE {
        return solve_quadratic(b, c, d);
    }

    // monic x^3 + p x^2 + q x + r, then x = t - p/3 gives t^3 + e t + f
    let (p, q, r) = (b / a, c / a, d / a);
    let shift = p / 3.0;
    let e = q - p * shift;
    let f = r - shift * q + 2.0 * shift * shift * shift;

    let root_scale = e.abs().sqrt().max(f.abs().cbrt());
    if root_scale == 0.0 {
        return vec![-shift];
    }

    let half_f = 0.5 * f;
    let third_e = e / 3.0;
    let h = half_f * half_f + third_e * third_e * third_e;
    let tolerance = CUBIC_DISCRIMINANT * root_scale.powi(6);

    let mut roots = if h > tolerance {
        // one real root; the larger cube root is formed without cancellation
        let u = (-half_f - half_f.signum() * h.sqrt()).cbrt();
        let v = if u == 0.0 { 0.0 } else { -third_e / u };
        vec![u + v - shift]
    } else if h >= -tolerance {
        let u = (-half_f).cbrt();
        vec![2.0 * u - shift, -u - shift, -u - shift]
    } else {
        let m = 2.0 * (-third_e).sqrt();
        let theta = (3.0 * f / (e * m)).clamp(-1.0, 1.0).acos() / 3.0;
        (0..3)
            .map(|k| m * (theta - 2.0 * PI * k as f64 / 3.0).cos() - shift)
            .collect()
    };
    roots.sort_by(f64::total_cmp);
    roots
}
