//! Polygonal aperture regions.
//!
//! A polygon keeps, next to its vertices, the side vectors and one
//! normalized line equation `a*x + b*y + c` per side, oriented so that the
//! interior is on the positive side. Convex polygons are classified with the
//! line equations alone; non-convex ones fall back to a crossing-parity test
//! along a half-line aimed at the vertex barycenter.

use nalgebra::{Matrix2, Vector3};
use xoptics_math::{Point2, Vec2};

use crate::error::{ApertureError, Result};
use crate::region::Location;

/// Multiple of machine epsilon, relative to the magnitude of the terms of a
/// side equation, under which a point is reported on the border.
const BORDER_ULPS: f64 = 16.0;

#[inline]
fn cross(a: &Vec2, b: &Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// A closed polygon with a transparency flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    vertices: Vec<Point2>,
    /// `sides[i] = vertices[i + 1] - vertices[i]`, cyclically.
    sides: Vec<Vec2>,
    /// Unit inward normal `(a, b)` and offset `c` of each side.
    lines: Vec<Vector3<f64>>,
    convex: bool,
    counter_clockwise: bool,
    reference: Point2,
    transparent: bool,
}

impl Polygon {
    /// Builds a polygon from at least three vertices.
    ///
    /// Fails when two consecutive vertices coincide or when two consecutive
    /// sides are collinear, since the orientation and convexity tests are
    /// undefined there. Self-intersection is not checked.
    pub fn new(vertices: Vec<Point2>, transparent: bool) -> Result<Self> {
        let n = vertices.len();
        if n < 3 {
            return Err(ApertureError::Geometry(format!(
                "a polygon needs at least 3 vertices, got {n}"
            )));
        }

        let sides: Vec<Vec2> = (0..n)
            .map(|i| vertices[(i + 1) % n] - vertices[i])
            .collect();
        if let Some(i) = sides.iter().position(|s| s.norm() == 0.0) {
            return Err(ApertureError::Geometry(format!(
                "vertices {i} and {} coincide",
                (i + 1) % n
            )));
        }

        let turns: Vec<f64> = (0..n)
            .map(|i| cross(&sides[i], &sides[(i + 1) % n]))
            .collect();
        for (i, turn) in turns.iter().enumerate() {
            let scale = sides[i].norm() * sides[(i + 1) % n].norm();
            if turn.abs() <= f64::EPSILON * scale {
                return Err(ApertureError::Geometry(format!(
                    "sides {i} and {} are collinear (zero-area corner at vertex {})",
                    (i + 1) % n,
                    (i + 1) % n
                )));
            }
        }

        let area = signed_area(&vertices);
        if area == 0.0 {
            return Err(ApertureError::Geometry("polygon has zero area".into()));
        }
        let counter_clockwise = area > 0.0;
        let convex = turns.iter().all(|t| (*t > 0.0) == counter_clockwise);

        let lines = vertices
            .iter()
            .zip(&sides)
            .map(|(v, s)| {
                let u = s.normalize();
                let normal = if counter_clockwise {
                    Vec2::new(-u.y, u.x)
                } else {
                    Vec2::new(u.y, -u.x)
                };
                Vector3::new(normal.x, normal.y, -normal.dot(&v.coords))
            })
            .collect();

        let sum = vertices
            .iter()
            .fold(Vec2::zeros(), |acc, v| acc + v.coords);
        let reference = Point2::from(sum / n as f64);

        Ok(Self {
            vertices,
            sides,
            lines,
            convex,
            counter_clockwise,
            reference,
            transparent,
        })
    }

    /// Axis-aligned rectangle of size `xsize` x `ysize` centered on `(xcenter, ycenter)`.
    pub fn rectangle(
        xsize: f64,
        ysize: f64,
        xcenter: f64,
        ycenter: f64,
        transparent: bool,
    ) -> Result<Self> {
        Self::new(rectangle_vertices(xsize, ysize, xcenter, ycenter)?, transparent)
    }

    /// The vertices in boundary order.
    pub fn vertices(&self) -> &[Point2] {
        &self.vertices
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Always false: a polygon has at least three vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Whether every corner turns the same way.
    pub fn is_convex(&self) -> bool {
        self.convex
    }

    /// Whether the vertices run counter-clockwise.
    pub fn is_counter_clockwise(&self) -> bool {
        self.counter_clockwise
    }

    /// Interior reference point used by the non-convex locate algorithm.
    pub fn reference_point(&self) -> Point2 {
        self.reference
    }

    /// Signed area, positive for counter-clockwise polygons.
    pub fn signed_area(&self) -> f64 {
        signed_area(&self.vertices)
    }

    /// Whether the inside of the polygon transmits.
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    /// Sets the transparency flag.
    pub fn set_transparent(&mut self, transparent: bool) {
        self.transparent = transparent;
    }

    /// Classifies a point against the polygon boundary.
    pub fn locate(&self, point: &Point2) -> Location {
        if self.convex {
            self.locate_convex(point)
        } else {
            self.locate_by_crossings(point)
        }
    }

    fn side_value(&self, i: usize, point: &Point2) -> (f64, f64) {
        let line = &self.lines[i];
        let (ax, by) = (line.x * point.x, line.y * point.y);
        let value = ax + by + line.z;
        let tolerance = BORDER_ULPS * f64::EPSILON * (ax.abs() + by.abs() + line.z.abs());
        (value, tolerance)
    }

    fn locate_convex(&self, point: &Point2) -> Location {
        let (value, tolerance) = (0..self.lines.len())
            .map(|i| self.side_value(i, point))
            .fold((f64::INFINITY, 0.0), |best, cur| if cur.0 < best.0 { cur } else { best });
        if value.abs() <= tolerance {
            Location::Border
        } else if value > 0.0 {
            Location::Inside
        } else {
            Location::Outside
        }
    }

    fn locate_by_crossings(&self, point: &Point2) -> Location {
        let n = self.vertices.len();

        for i in 0..n {
            let (value, tolerance) = self.side_value(i, point);
            if value.abs() <= tolerance {
                let along = (point - self.vertices[i]).dot(&self.sides[i]);
                if (0.0..=self.sides[i].norm_squared()).contains(&along) {
                    return Location::Border;
                }
            }
        }

        // half-line from the point through the reference point, expressed in a
        // frame where it is the positive x axis
        let toward = self.reference - point;
        let dir = if toward.norm() > f64::EPSILON {
            toward.normalize()
        } else {
            Vec2::new(0.0, 1.0)
        };
        let local: Vec<(f64, f64)> = self
            .vertices
            .iter()
            .map(|v| {
                let w = v - point;
                (w.dot(&dir), cross(&dir, &w))
            })
            .collect();

        let mut crossings = 0usize;
        for i in 0..n {
            let (xi, yi) = local[i];
            let (xj, yj) = local[(i + 1) % n];
            if (yi > 0.0) != (yj > 0.0) {
                let x = xi - yi * (xj - xi) / (yj - yi);
                if x > 0.0 {
                    crossings += 1;
                }
            }
        }

        if crossings % 2 == 1 {
            Location::Inside
        } else {
            Location::Outside
        }
    }

    /// Moves vertex `index` to `point`.
    pub fn change_vertex(&mut self, index: usize, point: Point2) -> Result<()> {
        self.check_index(index)?;
        let mut vertices = self.vertices.clone();
        vertices[index] = point;
        self.set_vertices(vertices)
    }

    /// Inserts a new vertex right after vertex `previous`.
    pub fn insert_vertex(&mut self, previous: usize, point: Point2) -> Result<()> {
        self.check_index(previous)?;
        let mut vertices = self.vertices.clone();
        vertices.insert(previous + 1, point);
        self.set_vertices(vertices)
    }

    /// Removes vertex `index`. The polygon must keep at least three vertices.
    pub fn delete_vertex(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        let mut vertices = self.vertices.clone();
        vertices.remove(index);
        self.set_vertices(vertices)
    }

    /// Replaces all vertices. On error the polygon is left unchanged.
    pub fn set_vertices(&mut self, vertices: Vec<Point2>) -> Result<()> {
        *self = Self::new(vertices, self.transparent)?;
        Ok(())
    }

    /// Turns the polygon into an axis-aligned rectangle.
    pub fn set_rectangle(&mut self, xsize: f64, ysize: f64, xcenter: f64, ycenter: f64) -> Result<()> {
        self.set_vertices(rectangle_vertices(xsize, ysize, xcenter, ycenter)?)
    }

    /// Applies the rotation by `angle` followed by `translation`.
    pub fn move_by(&mut self, angle: f64, translation: &Vec2) {
        let (s, c) = angle.sin_cos();
        let rotation = Matrix2::new(c, -s, s, c);
        self.apply_affine(&rotation, translation);
    }

    /// Mirrors the polygon across the line through `point` along `direction`.
    pub fn set_symmetric(&mut self, point: &Point2, direction: &Vec2) -> Result<()> {
        let (mirror, translation) = line_mirror(point, direction)?;
        self.apply_affine(&mirror, &translation);
        self.counter_clockwise = !self.counter_clockwise;
        Ok(())
    }

    /// Point reflection through `point` (a half turn, orientation preserved).
    pub fn set_symmetric_about(&mut self, point: &Point2) {
        self.apply_affine(&(-Matrix2::identity()), &(2.0 * point.coords));
    }

    /// Maps every stored quantity through `x -> linear * x + translation`,
    /// where `linear` is orthogonal.
    fn apply_affine(&mut self, linear: &Matrix2<f64>, translation: &Vec2) {
        for v in &mut self.vertices {
            *v = Point2::from(linear * v.coords + translation);
        }
        for s in &mut self.sides {
            *s = linear * *s;
        }
        for line in &mut self.lines {
            let normal = linear * Vec2::new(line.x, line.y);
            *line = Vector3::new(normal.x, normal.y, line.z - normal.dot(translation));
        }
        self.reference = Point2::from(linear * self.reference.coords + translation);
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.vertices.len() {
            return Err(ApertureError::IndexOutOfRange {
                index,
                len: self.vertices.len(),
            });
        }
        Ok(())
    }
}

/// Reflection across the line through `point` along `direction`, as an
/// orthogonal matrix and a translation.
pub(crate) fn line_mirror(point: &Point2, direction: &Vec2) -> Result<(Matrix2<f64>, Vec2)> {
    let norm = direction.norm();
    if norm == 0.0 || !norm.is_finite() {
        return Err(ApertureError::InvalidParameter(
            "mirror direction must be a non-zero vector".into(),
        ));
    }
    let u = direction / norm;
    let mirror = Matrix2::new(
        u.x * u.x - u.y * u.y,
        2.0 * u.x * u.y,
        2.0 * u.x * u.y,
        u.y * u.y - u.x * u.x,
    );
    let translation = point.coords - mirror * point.coords;
    Ok((mirror, translation))
}

fn rectangle_vertices(xsize: f64, ysize: f64, xcenter: f64, ycenter: f64) -> Result<Vec<Point2>> {
    if !(xsize > 0.0 && ysize > 0.0) {
        return Err(ApertureError::InvalidParameter(format!(
            "rectangle sizes must be positive, got {xsize} x {ysize}"
        )));
    }
    let (hx, hy) = (xsize / 2.0, ysize / 2.0);
    Ok(vec![
        Point2::new(xcenter - hx, ycenter - hy),
        Point2::new(xcenter + hx, ycenter - hy),
        Point2::new(xcenter + hx, ycenter + hy),
        Point2::new(xcenter - hx, ycenter + hy),
    ])
}

fn signed_area(vertices: &[Point2]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += vertices[i].x * vertices[j].y;
        area -= vertices[j].x * vertices[i].y;
    }
    area / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f64::consts::PI;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point2> {
        coords.iter().map(|&(x, y)| Point2::new(x, y)).collect()
    }

    /// An L shape: the square [0,2]x[0,2] minus the quadrant [1,2]x[1,2].
    fn l_shape() -> Polygon {
        Polygon::new(
            pts(&[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)]),
            true,
        )
        .unwrap()
    }

    #[test]
    fn test_square_locate() {
        let square = Polygon::new(pts(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]), true).unwrap();
        assert!(square.is_convex());
        assert!(square.is_counter_clockwise());
        assert_eq!(square.locate(&Point2::new(0.5, 0.5)), Location::Inside);
        assert_eq!(square.locate(&Point2::new(1.5, 0.5)), Location::Outside);
        assert_eq!(square.locate(&Point2::new(1.0, 0.5)), Location::Border);
        assert_eq!(square.locate(&Point2::new(0.0, 0.0)), Location::Border);
    }

    #[test]
    fn test_clockwise_square_locate() {
        let square = Polygon::new(pts(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]), true).unwrap();
        assert!(!square.is_counter_clockwise());
        assert!(square.is_convex());
        assert_eq!(square.locate(&Point2::new(0.25, 0.75)), Location::Inside);
        assert_eq!(square.locate(&Point2::new(-0.25, 0.75)), Location::Outside);
    }

    #[test]
    fn test_rectangle_edge_midpoints_are_border() {
        let rect = Polygon::rectangle(4.0, 2.0, 1.0, 1.0, true).unwrap();
        for p in [(1.0, 0.0), (3.0, 1.0), (1.0, 2.0), (-1.0, 1.0)] {
            assert_eq!(rect.locate(&Point2::new(p.0, p.1)), Location::Border, "{p:?}");
        }
        assert_eq!(rect.locate(&Point2::new(1.0, 1.0)), Location::Inside);
        assert!((rect.signed_area() - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_convex_locate() {
        let l = l_shape();
        assert!(!l.is_convex());
        assert_eq!(l.locate(&Point2::new(0.5, 0.5)), Location::Inside);
        assert_eq!(l.locate(&Point2::new(1.5, 0.5)), Location::Inside);
        assert_eq!(l.locate(&Point2::new(0.5, 1.5)), Location::Inside);
        // the notch
        assert_eq!(l.locate(&Point2::new(1.5, 1.5)), Location::Outside);
        assert_eq!(l.locate(&Point2::new(3.0, 0.5)), Location::Outside);
        assert_eq!(l.locate(&Point2::new(-1.0, -1.0)), Location::Outside);
    }

    #[test]
    fn test_non_convex_border() {
        let l = l_shape();
        assert_eq!(l.locate(&Point2::new(1.5, 1.0)), Location::Border);
        assert_eq!(l.locate(&Point2::new(1.0, 1.5)), Location::Border);
        // on the supporting line of a side but beyond its end: not border
        assert_eq!(l.locate(&Point2::new(2.5, 1.0)), Location::Outside);
    }

    #[test]
    fn test_non_convex_half_line_through_vertex() {
        // the barycenter is the reflex vertex (1,1), so both half-lines below
        // pass exactly through vertices
        let l = l_shape();
        assert!((l.reference_point() - Point2::new(1.0, 1.0)).norm() < 1e-15);
        assert_eq!(l.locate(&Point2::new(3.0, 3.0)), Location::Outside);
        assert_eq!(l.locate(&Point2::new(0.5, 0.5)), Location::Inside);
    }

    #[test]
    fn test_too_few_vertices() {
        let err = Polygon::new(pts(&[(0.0, 0.0), (1.0, 0.0)]), true).unwrap_err();
        assert!(matches!(err, ApertureError::Geometry(_)));
    }

    #[test]
    fn test_collinear_sides_rejected() {
        let err = Polygon::new(pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (1.0, 1.0)]), true).unwrap_err();
        assert!(matches!(err, ApertureError::Geometry(_)));
    }

    #[test]
    fn test_vertex_mutators_recompute_convexity() {
        let mut poly = Polygon::rectangle(2.0, 2.0, 0.0, 0.0, true).unwrap();
        assert!(poly.is_convex());

        // push a dent into the top side
        poly.insert_vertex(2, Point2::new(0.0, 0.0)).unwrap();
        assert_eq!(poly.len(), 5);
        assert!(!poly.is_convex());
        assert_eq!(poly.locate(&Point2::new(0.0, 0.5)), Location::Outside);

        poly.change_vertex(3, Point2::new(0.0, 2.0)).unwrap();
        assert!(poly.is_convex());
        assert_eq!(poly.locate(&Point2::new(0.0, 1.5)), Location::Inside);

        poly.delete_vertex(3).unwrap();
        assert_eq!(poly.len(), 4);
        assert!(poly.is_convex());
    }

    #[test]
    fn test_mutator_errors_leave_polygon_unchanged() {
        let mut poly = Polygon::rectangle(2.0, 2.0, 0.0, 0.0, false).unwrap();
        let before = poly.clone();
        assert_eq!(
            poly.change_vertex(7, Point2::origin()),
            Err(ApertureError::IndexOutOfRange { index: 7, len: 4 })
        );
        assert!(poly.delete_vertex(0).is_ok());
        assert!(poly.delete_vertex(0).is_err());
        assert_eq!(poly.len(), 3);
        poly.set_vertices(before.vertices().to_vec()).unwrap();
        assert_eq!(poly, before);
        assert!(!poly.is_transparent());
    }

    #[test]
    fn test_set_rectangle() {
        let mut poly = l_shape();
        poly.set_rectangle(1.0, 3.0, 5.0, 5.0).unwrap();
        assert!(poly.is_convex());
        assert_eq!(poly.locate(&Point2::new(5.0, 6.4)), Location::Inside);
        assert_eq!(poly.locate(&Point2::new(5.6, 5.0)), Location::Outside);
        assert!(poly.set_rectangle(0.0, 1.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_move_rotates_then_translates() {
        let mut rect = Polygon::rectangle(4.0, 2.0, 0.0, 0.0, true).unwrap();
        rect.move_by(PI / 2.0, &Vec2::new(10.0, 0.0));
        // now 2 wide and 4 tall around (10, 0)
        assert_eq!(rect.locate(&Point2::new(10.0, 1.9)), Location::Inside);
        assert_eq!(rect.locate(&Point2::new(11.5, 0.0)), Location::Outside);
        assert_eq!(rect.locate(&Point2::new(11.0, 0.0)), Location::Border);
        assert!((rect.reference_point() - Point2::new(10.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_moved_non_convex_keeps_side_equations_consistent() {
        let mut l = l_shape();
        l.move_by(0.7, &Vec2::new(-3.0, 2.0));
        let rebuilt = Polygon::new(l.vertices().to_vec(), true).unwrap();
        for (a, b) in l.lines.iter().zip(&rebuilt.lines) {
            assert!((a - b).norm() < 1e-12);
        }
    }

    #[test]
    fn test_mirror_flips_orientation() {
        let mut l = l_shape();
        l.set_symmetric(&Point2::new(0.0, 0.0), &Vec2::new(0.0, 1.0)).unwrap();
        assert!(!l.is_counter_clockwise());
        // mirrored across the y axis
        assert_eq!(l.locate(&Point2::new(-1.5, 0.5)), Location::Inside);
        assert_eq!(l.locate(&Point2::new(-1.5, 1.5)), Location::Outside);
        assert_eq!(l.locate(&Point2::new(1.5, 0.5)), Location::Outside);
        let rebuilt = Polygon::new(l.vertices().to_vec(), true).unwrap();
        assert_eq!(rebuilt.is_counter_clockwise(), l.is_counter_clockwise());
    }

    #[test]
    fn test_mirror_rejects_null_direction() {
        let mut l = l_shape();
        assert!(l.set_symmetric(&Point2::origin(), &Vec2::zeros()).is_err());
    }

    #[test]
    fn test_point_symmetry() {
        let mut rect = Polygon::rectangle(2.0, 1.0, 3.0, 0.0, true).unwrap();
        rect.set_symmetric_about(&Point2::origin());
        assert!(rect.is_counter_clockwise());
        assert_eq!(rect.locate(&Point2::new(-3.0, 0.0)), Location::Inside);
        assert_eq!(rect.locate(&Point2::new(3.0, 0.0)), Location::Outside);
    }

    fn regular_polygon(n: usize, radius: f64, cx: f64, cy: f64, phase: f64) -> Polygon {
        let vertices = (0..n)
            .map(|k| {
                let a = phase + 2.0 * PI * k as f64 / n as f64;
                Point2::new(cx + radius * a.cos(), cy + radius * a.sin())
            })
            .collect();
        Polygon::new(vertices, true).unwrap()
    }

    proptest! {
        #[test]
        fn convex_polygon_classification(
            n in 3usize..12,
            radius in 0.1f64..100.0,
            cx in -50.0f64..50.0,
            cy in -50.0f64..50.0,
            phase in 0.0f64..6.28,
        ) {
            let poly = regular_polygon(n, radius, cx, cy, phase);
            prop_assert!(poly.is_convex());
            prop_assert_eq!(poly.locate(&Point2::new(cx, cy)), Location::Inside);

            let v = poly.vertices();
            for i in 0..n {
                let a = v[i];
                let b = v[(i + 1) % n];
                let mid = Point2::from((a.coords + b.coords) / 2.0);
                prop_assert_eq!(poly.locate(&mid), Location::Border);
                let beyond = Point2::new(cx, cy) + (mid - Point2::new(cx, cy)) * 1.01;
                prop_assert_eq!(poly.locate(&beyond), Location::Outside);
                let within = Point2::new(cx, cy) + (mid - Point2::new(cx, cy)) * 0.99;
                prop_assert_eq!(poly.locate(&within), Location::Inside);
            }
        }
    }
}
