//! Real intersection points of two plane conics.
//!
//! Conics are symmetric 3x3 matrices acting on homogeneous points
//! `p = (u, v, 1)`; the conic is the set `pᵀ C p = 0`.
//!
//! If either conic is degenerate it factors into two lines, each met by the
//! other conic in at most two points. Otherwise some member `A - λB` of the
//! pencil spanned by the two conics is degenerate (`λ` is a root of the cubic
//! `det(A - λB) = 0`); all common points lie on its lines.

use nalgebra::SymmetricEigen;
use tracing::warn;
use xoptics_math::{solve_cubic, solve_quadratic, Mat3, Vec2, Vec3};

use crate::error::{Result, TraceError};

/// A normalized conic with a determinant below this is treated as degenerate.
pub const DEGENERATE_DETERMINANT: f64 = 1e-12;

/// Eigenvalue ratio below which a degenerate conic is a double line.
const DOUBLE_LINE_RATIO: f64 = 1e-9;

/// A line `(a, b, c)` with `hypot(a, b) <= LINE_AT_INFINITY * |c|` is the line at infinity.
const LINE_AT_INFINITY: f64 = 1e-12;

/// Newton steps used to polish roots and intersection points.
const POLISH_STEPS: usize = 3;

/// Real intersections of the conics `a` and `b`.
///
/// Tangent contacts are reported twice. When neither conic is degenerate the
/// number of points is 0, 2 or 4; any other count means the factorization
/// went wrong numerically and is reported as [`TraceError::Geometry`].
pub fn intersect_conics(a: &Mat3, b: &Mat3) -> Result<Vec<Vec2>> {
    let a = normalized(a)?;
    let b = normalized(b)?;

    let points = if a.determinant().abs() < DEGENERATE_DETERMINANT {
        intersect_lines(&split_degenerate(&a), &b)
    } else if b.determinant().abs() < DEGENERATE_DETERMINANT {
        intersect_lines(&split_degenerate(&b), &a)
    } else {
        let points = intersect_regular(&a, &b);
        if !matches!(points.len(), 0 | 2 | 4) {
            warn!(count = points.len(), "abnormal conic intersection count");
            return Err(TraceError::Geometry(format!(
                "conic intersection produced {} solutions",
                points.len()
            )));
        }
        points
    };

    Ok(points.into_iter().map(|p| polish_point(&a, &b, p)).collect())
}

fn normalized(m: &Mat3) -> Result<Mat3> {
    let scale = m.amax();
    if scale == 0.0 || !scale.is_finite() {
        return Err(TraceError::Geometry("null or non-finite conic".into()));
    }
    Ok(m / scale)
}

fn intersect_regular(a: &Mat3, b: &Mat3) -> Vec<Vec2> {
    // det(A - λB) = det A - λ tr(adj(A) B) + λ² tr(A adj(B)) - λ³ det B
    let cubic = [
        -b.determinant(),
        (a * adjugate(b)).trace(),
        -(adjugate(a) * b).trace(),
        a.determinant(),
    ];

    // the member closest to rank two gives the best conditioned lines
    let mut best: Option<(f64, Vec<Vec3>)> = None;
    for lambda in pencil_roots(&cubic) {
        let member = a - b * lambda;
        let lines = split_degenerate(&member);
        if lines.is_empty() {
            continue;
        }
        let ratio = degeneracy(&member);
        if best.as_ref().map_or(true, |(r, _)| ratio < *r) {
            best = Some((ratio, lines));
        }
    }
    match best {
        Some((_, lines)) => intersect_lines(&lines, b),
        None => Vec::new(),
    }
}

/// Real roots of the pencil cubic, polished and completed by deflation when
/// the closed form reports a single root.
fn pencil_roots(c: &[f64; 4]) -> Vec<f64> {
    let mut roots: Vec<f64> = solve_cubic(c[0], c[1], c[2], c[3])
        .into_iter()
        .map(|r| polish_root(c, r))
        .collect();
    let scale = c.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    if roots.len() == 1 && c[0].abs() > f64::EPSILON * scale {
        let r = roots[0];
        let b1 = c[1] + r * c[0];
        let b0 = c[2] + r * b1;
        roots.extend(solve_quadratic(c[0], b1, b0).into_iter().map(|x| polish_root(c, x)));
    }
    roots
}

fn cubic_value(c: &[f64; 4], x: f64) -> f64 {
    ((c[0] * x + c[1]) * x + c[2]) * x + c[3]
}

fn polish_root(c: &[f64; 4], mut x: f64) -> f64 {
    for _ in 0..POLISH_STEPS {
        let slope = (3.0 * c[0] * x + 2.0 * c[1]) * x + c[2];
        if slope == 0.0 {
            break;
        }
        let next = x - cubic_value(c, x) / slope;
        if cubic_value(c, next).abs() >= cubic_value(c, x).abs() {
            break;
        }
        x = next;
    }
    x
}

/// Smallest over largest eigenvalue magnitude.
fn degeneracy(m: &Mat3) -> f64 {
    let eigen = SymmetricEigen::new(*m);
    let abs = eigen.eigenvalues.map(f64::abs);
    let max = abs.max();
    if max == 0.0 {
        f64::INFINITY
    } else {
        abs.min() / max
    }
}

/// Splits a degenerate conic into its real lines.
///
/// The smallest eigenvalue is dropped; the conic is then
/// `λ1 v1 v1ᵀ + λ2 v2 v2ᵀ`, a pair of real lines when `λ1 λ2 < 0`, a double
/// line when `λ1` vanishes, and a single real point otherwise.
fn split_degenerate(m: &Mat3) -> Vec<Vec3> {
    let eigen = SymmetricEigen::new(*m);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&i, &j| eigen.eigenvalues[i].abs().total_cmp(&eigen.eigenvalues[j].abs()));
    let (l1, l2) = (eigen.eigenvalues[order[1]], eigen.eigenvalues[order[2]]);
    let v1 = eigen.eigenvectors.column(order[1]).into_owned();
    let v2 = eigen.eigenvectors.column(order[2]).into_owned();

    if l2 == 0.0 {
        return Vec::new();
    }
    if l1.abs() <= DOUBLE_LINE_RATIO * l2.abs() {
        return vec![v2, v2];
    }
    if l1 * l2 > 0.0 {
        return Vec::new();
    }
    let p = v1 * l1.abs().sqrt();
    let q = v2 * l2.abs().sqrt();
    vec![p + q, p - q]
}

fn intersect_lines(lines: &[Vec3], conic: &Mat3) -> Vec<Vec2> {
    lines.iter().flat_map(|line| intersect_line(line, conic)).collect()
}

/// Points of `conic` on the line `a u + b v + c = 0`.
fn intersect_line(line: &Vec3, conic: &Mat3) -> Vec<Vec2> {
    let n = line.x.hypot(line.y);
    if n == 0.0 || n <= LINE_AT_INFINITY * line.z.abs() {
        return Vec::new();
    }
    let (a, b, c) = (line.x / n, line.y / n, line.z / n);
    let foot = Vec3::new(-a * c, -b * c, 1.0);
    let dir = Vec3::new(-b, a, 0.0);

    let qa = dir.dot(&(conic * dir));
    let qb = 2.0 * dir.dot(&(conic * foot));
    let qc = foot.dot(&(conic * foot));
    solve_quadratic(qa, qb, qc)
        .into_iter()
        .map(|s| Vec2::new(foot.x + s * dir.x, foot.y + s * dir.y))
        .collect()
}

/// Newton refinement of a common point on both conic equations.
fn polish_point(a: &Mat3, b: &Mat3, start: Vec2) -> Vec2 {
    let residual = |p: &Vec2| {
        let h = Vec3::new(p.x, p.y, 1.0);
        (h.dot(&(a * h)), h.dot(&(b * h)))
    };
    let mut p = start;
    for _ in 0..POLISH_STEPS {
        let h = Vec3::new(p.x, p.y, 1.0);
        let (ga, gb) = (a * h, b * h);
        let (fa, fb) = residual(&p);
        let (j11, j12, j21, j22) = (2.0 * ga.x, 2.0 * ga.y, 2.0 * gb.x, 2.0 * gb.y);
        let det = j11 * j22 - j12 * j21;
        if det == 0.0 {
            break;
        }
        let next = Vec2::new(
            p.x + (-fa * j22 + fb * j12) / det,
            p.y + (-fb * j11 + fa * j21) / det,
        );
        let (na, nb) = residual(&next);
        if na.abs() + nb.abs() >= fa.abs() + fb.abs() {
            break;
        }
        p = next;
    }
    p
}

/// Adjugate of a 3x3 matrix; its rows are cross products of the columns.
fn adjugate(m: &Mat3) -> Mat3 {
    let c0 = m.column(0).into_owned();
    let c1 = m.column(1).into_owned();
    let c2 = m.column(2).into_owned();
    Mat3::from_rows(&[
        c1.cross(&c2).transpose(),
        c2.cross(&c0).transpose(),
        c0.cross(&c1).transpose(),
    ])
}
