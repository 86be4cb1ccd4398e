//! # Geometry — Shapes and Their Predicates
//!
//! Every collision-aware part of the runtime talks to shapes through one
//! enum, [`Shape`], which answers the same four questions for every kind:
//!
//! | query            | meaning                                              |
//! |------------------|------------------------------------------------------|
//! | `collides(b)`    | closed sets intersect (touching edges count)         |
//! | `overlaps(b)`    | interiors intersect (touching edges do not count)    |
//! | `contains(p)`    | point inside or on the boundary                      |
//! | `raycast(o, d)`  | first hit along the segment `o → o + d`              |
//!
//! ## Symmetry
//!
//! Pairwise tests are implemented once per *unordered* pair. Before a test
//! runs, the two shapes are sorted by kind rank, so `a.collides(b)` and
//! `b.collides(a)` execute exactly the same code with the same arguments:
//!
//! ```text
//! rank:  Point(0) < Line(1) < Rect(2) < Circle(3) < Polygon(4) < Ellipse(5)
//!
//! (Circle, Rect) ──sort──► (Rect, Circle) ──► collides_ordered(rect, circle)
//! (Rect, Circle) ─────────────────────────► collides_ordered(rect, circle)
//! ```
//!
//! Rotated ellipses are tested as a fine polygon approximation, except when
//! both radii are equal, in which case they become an exact circle.
//!
//! ## Separating Axis Displacement
//!
//! [`sat`] returns the minimum translation that pushes one convex polygon
//! out of another. Areas use it to fill in `Collision::displacement`.

use crate::math::{Mat4, Vec2, mat4_mul_vec2, rad2deg, vec2_from_angle};

const EPSILON: f32 = 1e-5;

/// Segments used when an ellipse is approximated by a polygon.
const ELLIPSE_SEGMENTS: usize = 32;

// ── Shape kinds ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub p1: Vec2,
    pub p2: Vec2,
}

impl Line {
    pub fn new(p1: Vec2, p2: Vec2) -> Self {
        Self { p1, p2 }
    }
}

/// Axis-aligned rectangle, `pos` being the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub pos: Vec2,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(pos: Vec2, width: f32, height: f32) -> Self {
        Self { pos, width, height }
    }

    /// Smallest rect containing both points.
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        let min = a.min(b);
        let max = a.max(b);
        Self::new(min, max.x - min.x, max.y - min.y)
    }

    pub fn min(&self) -> Vec2 {
        self.pos
    }

    pub fn max(&self) -> Vec2 {
        self.pos + Vec2::new(self.width, self.height)
    }

    pub fn center(&self) -> Vec2 {
        self.pos + Vec2::new(self.width, self.height) * 0.5
    }

    /// Corners in clockwise order (screen space), starting top-left.
    pub fn points(&self) -> [Vec2; 4] {
        let (min, max) = (self.min(), self.max());
        [min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)]
    }

    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(self.points().to_vec())
    }

    pub fn contains(&self, p: Vec2) -> bool {
        let (min, max) = (self.min(), self.max());
        p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
    }

    fn contains_strict(&self, p: Vec2) -> bool {
        let (min, max) = (self.min(), self.max());
        p.x > min.x && p.x < max.x && p.y > min.y && p.y < max.y
    }

    fn closest_point(&self, p: Vec2) -> Vec2 {
        p.clamp(self.min(), self.max())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Ellipse with its own rotation (degrees).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub center: Vec2,
    pub radius_x: f32,
    pub radius_y: f32,
    pub angle: f32,
}

impl Ellipse {
    pub fn new(center: Vec2, radius_x: f32, radius_y: f32, angle: f32) -> Self {
        Self { center, radius_x, radius_y, angle }
    }

    fn is_circle(&self) -> bool {
        (self.radius_x - self.radius_y).abs() < EPSILON
    }

    /// Point expressed in the ellipse's unrotated, unit-circle space.
    fn to_unit_space(&self, p: Vec2) -> Vec2 {
        let d = Vec2::from_angle(-self.angle.to_radians()).rotate(p - self.center);
        Vec2::new(d.x / self.radius_x, d.y / self.radius_y)
    }

    fn from_unit_space(&self, p: Vec2) -> Vec2 {
        let d = Vec2::new(p.x * self.radius_x, p.y * self.radius_y);
        self.center + Vec2::from_angle(self.angle.to_radians()).rotate(d)
    }

    pub fn contains(&self, p: Vec2) -> bool {
        self.to_unit_space(p).length_squared() <= 1.0 + EPSILON
    }

    fn contains_strict(&self, p: Vec2) -> bool {
        self.to_unit_space(p).length_squared() < 1.0 - EPSILON
    }

    pub fn to_polygon(&self) -> Polygon {
        let pts = (0..ELLIPSE_SEGMENTS)
            .map(|i| {
                let a = 360.0 * i as f32 / ELLIPSE_SEGMENTS as f32;
                self.from_unit_space(vec2_from_angle(a))
            })
            .collect();
        Polygon::new(pts)
    }

    fn bbox(&self) -> Rect {
        let (s, c) = self.angle.to_radians().sin_cos();
        let hx = ((self.radius_x * c).powi(2) + (self.radius_y * s).powi(2)).sqrt();
        let hy = ((self.radius_x * s).powi(2) + (self.radius_y * c).powi(2)).sqrt();
        Rect::new(self.center - Vec2::new(hx, hy), hx * 2.0, hy * 2.0)
    }
}

/// Arbitrary (convex or concave) closed polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub pts: Vec<Vec2>,
}

impl Polygon {
    pub fn new(pts: Vec<Vec2>) -> Self {
        Self { pts }
    }

    fn edges(&self) -> impl Iterator<Item = (Vec2, Vec2)> + '_ {
        let n = self.pts.len();
        (0..n).map(move |i| (self.pts[i], self.pts[(i + 1) % n]))
    }

    /// Even-odd point test; points on an edge count as inside.
    pub fn contains(&self, p: Vec2) -> bool {
        if self.pts.len() < 3 {
            return false;
        }
        if self.edges().any(|(a, b)| point_segment_distance(p, a, b) <= EPSILON) {
            return true;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
                if p.x < x {
                    inside = !inside;
                }
            }
        }
        inside
    }

    fn contains_strict(&self, p: Vec2) -> bool {
        self.contains(p) && self.edges().all(|(a, b)| point_segment_distance(p, a, b) > EPSILON)
    }

    fn centroid(&self) -> Vec2 {
        if self.pts.is_empty() {
            return Vec2::ZERO;
        }
        self.pts.iter().copied().sum::<Vec2>() / self.pts.len() as f32
    }

    fn bbox(&self) -> Rect {
        let Some(&first) = self.pts.first() else {
            return Rect::new(Vec2::ZERO, 0.0, 0.0);
        };
        let (min, max) = self.pts.iter().fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));
        Rect::from_points(min, max)
    }
}

// ── Shape enum ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Vec2),
    Line(Line),
    Rect(Rect),
    Circle(Circle),
    Polygon(Polygon),
    Ellipse(Ellipse),
}

/// Result of a successful [`Shape::raycast`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub point: Vec2,
    pub normal: Vec2,
    /// Distance along the ray, `0.0` at the origin and `1.0` at its end.
    pub fraction: f32,
}

impl Shape {
    fn rank(&self) -> u8 {
        match self {
            Shape::Point(_) => 0,
            Shape::Line(_) => 1,
            Shape::Rect(_) => 2,
            Shape::Circle(_) => 3,
            Shape::Polygon(_) => 4,
            Shape::Ellipse(_) => 5,
        }
    }

    /// Closed intersection test. Symmetric for every pair of kinds.
    pub fn collides(&self, other: &Shape) -> bool {
        if self.rank() <= other.rank() {
            collides_ordered(self, other)
        } else {
            collides_ordered(other, self)
        }
    }

    /// Open intersection test: shapes that only share boundary points do
    /// not overlap.
    pub fn overlaps(&self, other: &Shape) -> bool {
        if self.rank() <= other.rank() {
            overlaps_ordered(self, other)
        } else {
            overlaps_ordered(other, self)
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        match self {
            Shape::Point(q) => q.distance_squared(p) <= EPSILON * EPSILON,
            Shape::Line(l) => point_segment_distance(p, l.p1, l.p2) <= EPSILON,
            Shape::Rect(r) => r.contains(p),
            Shape::Circle(c) => c.center.distance_squared(p) <= c.radius * c.radius,
            Shape::Polygon(poly) => poly.contains(p),
            Shape::Ellipse(e) => e.contains(p),
        }
    }

    fn contains_strict(&self, p: Vec2) -> bool {
        match self {
            Shape::Point(_) | Shape::Line(_) => false,
            Shape::Rect(r) => r.contains_strict(p),
            Shape::Circle(c) => c.center.distance_squared(p) < c.radius * c.radius,
            Shape::Polygon(poly) => poly.contains_strict(p),
            Shape::Ellipse(e) => e.contains_strict(p),
        }
    }

    /// Cast the segment `origin → origin + direction` against this shape.
    pub fn raycast(&self, origin: Vec2, direction: Vec2) -> Option<RaycastHit> {
        if direction.length_squared() <= EPSILON * EPSILON {
            return None;
        }
        match self {
            Shape::Point(_) => None,
            Shape::Line(l) => raycast_segment(origin, direction, l.p1, l.p2),
            Shape::Rect(r) => raycast_polygon(origin, direction, &r.to_polygon()),
            Shape::Polygon(poly) => raycast_polygon(origin, direction, poly),
            Shape::Circle(c) => raycast_circle(origin, direction, c.center, c.radius),
            Shape::Ellipse(e) => {
                let o = e.to_unit_space(origin);
                let d = e.to_unit_space(origin + direction) - o;
                let hit = raycast_circle(o, d, Vec2::ZERO, 1.0)?;
                let point = e.from_unit_space(hit.point);
                let local = Vec2::new(hit.point.x / e.radius_x, hit.point.y / e.radius_y);
                let normal = Vec2::from_angle(e.angle.to_radians()).rotate(local).normalize_or_zero();
                Some(RaycastHit { point, normal, fraction: hit.fraction })
            }
        }
    }

    /// Axis-aligned bounding box.
    pub fn bbox(&self) -> Rect {
        match self {
            Shape::Point(p) => Rect::new(*p, 0.0, 0.0),
            Shape::Line(l) => Rect::from_points(l.p1, l.p2),
            Shape::Rect(r) => *r,
            Shape::Circle(c) => {
                Rect::new(c.center - Vec2::splat(c.radius), c.radius * 2.0, c.radius * 2.0)
            }
            Shape::Polygon(poly) => poly.bbox(),
            Shape::Ellipse(e) => e.bbox(),
        }
    }

    /// Apply a 2D affine matrix. Rects become polygons (the matrix may
    /// rotate them); circles become ellipses when scaled unevenly.
    pub fn transform(&self, m: &Mat4) -> Shape {
        match self {
            Shape::Point(p) => Shape::Point(mat4_mul_vec2(m, *p)),
            Shape::Line(l) => Shape::Line(Line::new(mat4_mul_vec2(m, l.p1), mat4_mul_vec2(m, l.p2))),
            Shape::Rect(r) => {
                Shape::Polygon(Polygon::new(r.points().iter().map(|p| mat4_mul_vec2(m, *p)).collect()))
            }
            Shape::Polygon(poly) => {
                Shape::Polygon(Polygon::new(poly.pts.iter().map(|p| mat4_mul_vec2(m, *p)).collect()))
            }
            Shape::Circle(c) => {
                transform_ellipse(m, &Ellipse::new(c.center, c.radius, c.radius, 0.0))
            }
            Shape::Ellipse(e) => transform_ellipse(m, e),
        }
    }

    /// Outline points, used by polygon tests and the debug inspector.
    pub fn to_polygon(&self) -> Polygon {
        match self {
            Shape::Point(p) => Polygon::new(vec![*p]),
            Shape::Line(l) => Polygon::new(vec![l.p1, l.p2]),
            Shape::Rect(r) => r.to_polygon(),
            Shape::Circle(c) => Ellipse::new(c.center, c.radius, c.radius, 0.0).to_polygon(),
            Shape::Polygon(poly) => poly.clone(),
            Shape::Ellipse(e) => e.to_polygon(),
        }
    }
}

fn transform_ellipse(m: &Mat4, e: &Ellipse) -> Shape {
    let center = mat4_mul_vec2(m, e.center);
    let rot = Vec2::from_angle(e.angle.to_radians());
    let ax = mat4_mul_vec2(m, e.center + rot.rotate(Vec2::new(e.radius_x, 0.0))) - center;
    let ay = mat4_mul_vec2(m, e.center + rot.rotate(Vec2::new(0.0, e.radius_y))) - center;
    let (rx, ry) = (ax.length(), ay.length());
    if (rx - ry).abs() < EPSILON {
        Shape::Circle(Circle::new(center, rx))
    } else {
        Shape::Ellipse(Ellipse::new(center, rx, ry, rad2deg(ax.y.atan2(ax.x))))
    }
}

// ── Pair tests ──────────────────────────────────────────────────────────

fn collides_ordered(a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::Point(p), Shape::Point(q)) => p.distance_squared(*q) <= EPSILON * EPSILON,
        (Shape::Point(p), s) => s.contains(*p),
        (Shape::Line(l), Shape::Line(m)) => segments_intersect(l.p1, l.p2, m.p1, m.p2),
        (Shape::Line(l), Shape::Rect(r)) => line_polygon(l, &r.to_polygon()),
        (Shape::Line(l), Shape::Circle(c)) => point_segment_distance(c.center, l.p1, l.p2) <= c.radius,
        (Shape::Line(l), Shape::Polygon(poly)) => line_polygon(l, poly),
        (Shape::Rect(r1), Shape::Rect(r2)) => {
            let (a1, a2, b1, b2) = (r1.min(), r1.max(), r2.min(), r2.max());
            a2.x >= b1.x && b2.x >= a1.x && a2.y >= b1.y && b2.y >= a1.y
        }
        (Shape::Rect(r), Shape::Circle(c)) => r.closest_point(c.center).distance_squared(c.center) <= c.radius * c.radius,
        (Shape::Rect(r), Shape::Polygon(poly)) => polygon_polygon(&r.to_polygon(), poly),
        (Shape::Circle(c1), Shape::Circle(c2)) => {
            let rr = c1.radius + c2.radius;
            c1.center.distance_squared(c2.center) <= rr * rr
        }
        (Shape::Circle(c), Shape::Polygon(poly)) => {
            poly.contains(c.center)
                || poly.edges().any(|(p, q)| point_segment_distance(c.center, p, q) <= c.radius)
        }
        (Shape::Polygon(p1), Shape::Polygon(p2)) => polygon_polygon(p1, p2),
        (Shape::Ellipse(e1), Shape::Ellipse(e2)) => polygon_polygon(&e1.to_polygon(), &e2.to_polygon()),
        (s, Shape::Ellipse(e)) => {
            if e.is_circle() {
                s.collides(&Shape::Circle(Circle::new(e.center, e.radius_x)))
            } else {
                s.collides(&Shape::Polygon(e.to_polygon()))
            }
        }
        (a, b) => collides_ordered(b, a),
    }
}

fn overlaps_ordered(a: &Shape, b: &Shape) -> bool {
    match (a, b) {
        (Shape::Point(_), Shape::Point(_)) => false,
        (Shape::Point(p), s) => s.contains_strict(*p),
        (Shape::Line(l), Shape::Line(m)) => segments_cross(l.p1, l.p2, m.p1, m.p2),
        (Shape::Line(l), Shape::Rect(r)) => match clip_segment(l, r) {
            Some((t0, t1)) if t1 - t0 > EPSILON => {
                let mid = l.p1 + (l.p2 - l.p1) * ((t0 + t1) * 0.5);
                r.contains_strict(mid)
            }
            _ => false,
        },
        (Shape::Line(l), Shape::Circle(c)) => point_segment_distance(c.center, l.p1, l.p2) < c.radius,
        (Shape::Line(l), Shape::Polygon(poly)) => {
            poly.edges().any(|(p, q)| segments_cross(l.p1, l.p2, p, q))
                || poly.contains_strict(l.p1)
                || poly.contains_strict(l.p2)
                || poly.contains_strict((l.p1 + l.p2) * 0.5)
        }
        (Shape::Rect(r1), Shape::Rect(r2)) => {
            let (a1, a2, b1, b2) = (r1.min(), r1.max(), r2.min(), r2.max());
            a2.x > b1.x && b2.x > a1.x && a2.y > b1.y && b2.y > a1.y
        }
        (Shape::Rect(r), Shape::Circle(c)) => r.closest_point(c.center).distance_squared(c.center) < c.radius * c.radius,
        (Shape::Rect(r), Shape::Polygon(poly)) => polygon_overlaps(&r.to_polygon(), poly),
        (Shape::Circle(c1), Shape::Circle(c2)) => {
            let rr = c1.radius + c2.radius;
            c1.center.distance_squared(c2.center) < rr * rr
        }
        (Shape::Circle(c), Shape::Polygon(poly)) => {
            poly.contains_strict(c.center)
                || poly.edges().any(|(p, q)| point_segment_distance(c.center, p, q) < c.radius)
        }
        (Shape::Polygon(p1), Shape::Polygon(p2)) => polygon_overlaps(p1, p2),
        (Shape::Ellipse(e1), Shape::Ellipse(e2)) => polygon_overlaps(&e1.to_polygon(), &e2.to_polygon()),
        (s, Shape::Ellipse(e)) => {
            if e.is_circle() {
                s.overlaps(&Shape::Circle(Circle::new(e.center, e.radius_x)))
            } else {
                s.overlaps(&Shape::Polygon(e.to_polygon()))
            }
        }
        (a, b) => overlaps_ordered(b, a),
    }
}

fn line_polygon(l: &Line, poly: &Polygon) -> bool {
    poly.contains(l.p1)
        || poly.contains(l.p2)
        || poly.edges().any(|(p, q)| segments_intersect(l.p1, l.p2, p, q))
}

fn polygon_polygon(a: &Polygon, b: &Polygon) -> bool {
    if a.pts.is_empty() || b.pts.is_empty() {
        return false;
    }
    a.edges().any(|(p1, p2)| b.edges().any(|(q1, q2)| segments_intersect(p1, p2, q1, q2)))
        || a.contains(b.pts[0])
        || b.contains(a.pts[0])
}

fn polygon_overlaps(a: &Polygon, b: &Polygon) -> bool {
    if a.pts.len() < 3 || b.pts.len() < 3 {
        return false;
    }
    a.edges().any(|(p1, p2)| b.edges().any(|(q1, q2)| segments_cross(p1, p2, q1, q2)))
        || b.pts.iter().any(|p| a.contains_strict(*p))
        || a.pts.iter().any(|p| b.contains_strict(*p))
        || a.contains_strict(b.centroid())
        || b.contains_strict(a.centroid())
}

// ── Segment helpers ─────────────────────────────────────────────────────

fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

fn orientation(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    cross(b - a, c - a)
}

fn on_segment(a: Vec2, b: Vec2, p: Vec2) -> bool {
    p.x >= a.x.min(b.x) - EPSILON
        && p.x <= a.x.max(b.x) + EPSILON
        && p.y >= a.y.min(b.y) - EPSILON
        && p.y <= a.y.max(b.y) + EPSILON
}

/// Closed segment intersection, collinear overlap and shared endpoints
/// included.
fn segments_intersect(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);
    if ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
    {
        return true;
    }
    (d1.abs() <= EPSILON && on_segment(b1, b2, a1))
        || (d2.abs() <= EPSILON && on_segment(b1, b2, a2))
        || (d3.abs() <= EPSILON && on_segment(a1, a2, b1))
        || (d4.abs() <= EPSILON && on_segment(a1, a2, b2))
}

/// Proper crossing: the segments pass through each other's interior.
fn segments_cross(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);
    d1 * d2 < -EPSILON && d3 * d4 < -EPSILON
}

pub(crate) fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 <= f32::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Liang-Barsky clip of a segment against a rect, returning the parameter
/// interval that lies inside.
fn clip_segment(l: &Line, r: &Rect) -> Option<(f32, f32)> {
    let d = l.p2 - l.p1;
    let (min, max) = (r.min(), r.max());
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;
    for (p, q) in [
        (-d.x, l.p1.x - min.x),
        (d.x, max.x - l.p1.x),
        (-d.y, l.p1.y - min.y),
        (d.y, max.y - l.p1.y),
    ] {
        if p.abs() <= f32::EPSILON {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let t = q / p;
        if p < 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

// ── Raycasts ────────────────────────────────────────────────────────────

fn raycast_segment(origin: Vec2, dir: Vec2, a: Vec2, b: Vec2) -> Option<RaycastHit> {
    let e = b - a;
    let denom = cross(dir, e);
    if denom.abs() <= f32::EPSILON {
        return None;
    }
    let t = cross(a - origin, e) / denom;
    let u = cross(a - origin, dir) / denom;
    if !(0.0..=1.0).contains(&t) || !(0.0..=1.0).contains(&u) {
        return None;
    }
    let mut normal = Vec2::new(-e.y, e.x).normalize_or_zero();
    if normal.dot(dir) > 0.0 {
        normal = -normal;
    }
    Some(RaycastHit { point: origin + dir * t, normal, fraction: t })
}

fn raycast_polygon(origin: Vec2, dir: Vec2, poly: &Polygon) -> Option<RaycastHit> {
    if poly.contains(origin) {
        return Some(RaycastHit {
            point: origin,
            normal: -dir.normalize_or_zero(),
            fraction: 0.0,
        });
    }
    poly.edges()
        .filter_map(|(a, b)| raycast_segment(origin, dir, a, b))
        .min_by(|h1, h2| h1.fraction.total_cmp(&h2.fraction))
}

fn raycast_circle(origin: Vec2, dir: Vec2, center: Vec2, radius: f32) -> Option<RaycastHit> {
    let m = origin - center;
    let c = m.length_squared() - radius * radius;
    if c <= 0.0 {
        return Some(RaycastHit {
            point: origin,
            normal: -dir.normalize_or_zero(),
            fraction: 0.0,
        });
    }
    let a = dir.length_squared();
    let b = m.dot(dir);
    let disc = b * b - a * c;
    if disc < 0.0 {
        return None;
    }
    let t = (-b - disc.sqrt()) / a;
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let point = origin + dir * t;
    Some(RaycastHit { point, normal: (point - center).normalize_or_zero(), fraction: t })
}

// ── Separating axis ─────────────────────────────────────────────────────

/// Minimum translation that moves convex polygon `p1` out of `p2`, or
/// `None` if they are separated. Touching polygons yield a zero vector.
pub fn sat(p1: &[Vec2], p2: &[Vec2]) -> Option<Vec2> {
    if p1.len() < 2 || p2.len() < 2 {
        return None;
    }
    let mut overlap = f32::INFINITY;
    let mut displacement = Vec2::ZERO;
    for poly in [p1, p2] {
        for i in 0..poly.len() {
            let a = poly[i];
            let b = poly[(i + 1) % poly.len()];
            let axis = Vec2::new(-(b.y - a.y), b.x - a.x).normalize_or_zero();
            if axis == Vec2::ZERO {
                continue;
            }
            let (min1, max1) = project(p1, axis);
            let (min2, max2) = project(p2, axis);
            let o = max1.min(max2) - min1.max(min2);
            if o < 0.0 {
                return None;
            }
            if o < overlap.abs() {
                let o1 = max2 - min1;
                let o2 = min2 - max1;
                overlap = if o1.abs() < o2.abs() { o1 } else { o2 };
                displacement = axis * overlap;
            }
        }
    }
    Some(displacement)
}

fn project(pts: &[Vec2], axis: Vec2) -> (f32, f32) {
    pts.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(min, max), p| {
        let d = p.dot(axis);
        (min.min(d), max.max(d))
    })
}

/// SAT displacement between two arbitrary shapes (polygonized).
pub fn displacement(a: &Shape, b: &Shape) -> Option<Vec2> {
    if let (Shape::Circle(c1), Shape::Circle(c2)) = (a, b) {
        let d = c1.center - c2.center;
        let depth = c1.radius + c2.radius - d.length();
        if depth < 0.0 {
            return None;
        }
        return Some(d.normalize_or(Vec2::X) * depth);
    }
    sat(&a.to_polygon().pts, &b.to_polygon().pts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x: f32, y: f32, w: f32, h: f32) -> Shape {
        Shape::Rect(Rect::new(Vec2::new(x, y), w, h))
    }

    fn all_kinds() -> Vec<Shape> {
        vec![
            Shape::Point(Vec2::new(5.0, 5.0)),
            Shape::Line(Line::new(Vec2::new(-5.0, 0.0), Vec2::new(20.0, 12.0))),
            rect(0.0, 0.0, 10.0, 10.0),
            rect(30.0, 30.0, 4.0, 4.0),
            Shape::Circle(Circle::new(Vec2::new(12.0, 5.0), 3.0)),
            Shape::Polygon(Polygon::new(vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(8.0, 0.0),
                Vec2::new(8.0, 8.0),
                Vec2::new(4.0, 3.0),
                Vec2::new(0.0, 8.0),
            ])),
            Shape::Ellipse(Ellipse::new(Vec2::new(6.0, 6.0), 6.0, 2.0, 30.0)),
            Shape::Ellipse(Ellipse::new(Vec2::new(100.0, 6.0), 2.0, 2.0, 0.0)),
        ]
    }

    #[test]
    fn collides_is_symmetric() {
        let shapes = all_kinds();
        for a in &shapes {
            for b in &shapes {
                assert_eq!(a.collides(b), b.collides(a), "{a:?} vs {b:?}");
                assert_eq!(a.overlaps(b), b.overlaps(a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn rects_overlap_and_touch() {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(5.0, 5.0, 10.0, 10.0);
        assert!(a.collides(&b));
        assert!(a.overlaps(&b));

        let touching = rect(10.0, 10.0, 10.0, 10.0);
        assert!(a.collides(&touching));
        assert!(!a.overlaps(&touching));

        let apart = rect(11.0, 0.0, 10.0, 10.0);
        assert!(!a.collides(&apart));
    }

    #[test]
    fn concave_polygon_contains() {
        let poly = Shape::Polygon(Polygon::new(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(8.0, 0.0),
            Vec2::new(8.0, 8.0),
            Vec2::new(4.0, 3.0),
            Vec2::new(0.0, 8.0),
        ]));
        assert!(poly.contains(Vec2::new(1.0, 1.0)));
        // inside the notch
        assert!(!poly.contains(Vec2::new(4.0, 6.0)));
        // on an edge
        assert!(poly.contains(Vec2::new(4.0, 0.0)));
    }

    #[test]
    fn rotated_ellipse_contains() {
        let e = Shape::Ellipse(Ellipse::new(Vec2::ZERO, 10.0, 2.0, 90.0));
        assert!(e.contains(Vec2::new(0.0, 9.0)));
        assert!(!e.contains(Vec2::new(9.0, 0.0)));
    }

    #[test]
    fn circle_rect_edge_touch() {
        let r = rect(0.0, 0.0, 10.0, 10.0);
        let c = Shape::Circle(Circle::new(Vec2::new(15.0, 5.0), 5.0));
        assert!(r.collides(&c));
        assert!(!r.overlaps(&c));
    }

    #[test]
    fn raycast_rect_hits_near_edge() {
        let r = rect(10.0, -5.0, 10.0, 10.0);
        let hit = r.raycast(Vec2::ZERO, Vec2::new(40.0, 0.0)).unwrap();
        assert!((hit.point.x - 10.0).abs() < 1e-3);
        assert!((hit.fraction - 0.25).abs() < 1e-3);
        assert!((hit.normal - Vec2::new(-1.0, 0.0)).length() < 1e-3);
        assert!(r.raycast(Vec2::ZERO, Vec2::new(5.0, 0.0)).is_none());
    }

    #[test]
    fn raycast_circle_and_ellipse() {
        let c = Shape::Circle(Circle::new(Vec2::new(10.0, 0.0), 2.0));
        let hit = c.raycast(Vec2::ZERO, Vec2::new(20.0, 0.0)).unwrap();
        assert!((hit.point.x - 8.0).abs() < 1e-3);

        let e = Shape::Ellipse(Ellipse::new(Vec2::new(10.0, 0.0), 4.0, 1.0, 0.0));
        let hit = e.raycast(Vec2::ZERO, Vec2::new(20.0, 0.0)).unwrap();
        assert!((hit.point.x - 6.0).abs() < 1e-3);
        assert!((hit.normal - Vec2::new(-1.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn sat_pushes_out_along_smallest_axis() {
        let a = Rect::new(Vec2::new(0.0, 0.0), 10.0, 10.0).points();
        let b = Rect::new(Vec2::new(8.0, 2.0), 10.0, 10.0).points();
        let d = sat(&a, &b).unwrap();
        assert!((d - Vec2::new(-2.0, 0.0)).length() < 1e-3);
        let far = Rect::new(Vec2::new(50.0, 0.0), 1.0, 1.0).points();
        assert!(sat(&a, &far).is_none());
    }

    #[test]
    fn transform_rect_becomes_polygon() {
        let r = rect(0.0, 0.0, 2.0, 2.0);
        let m = Mat4::from_translation(crate::math::Vec3::new(10.0, 0.0, 0.0));
        let moved = r.transform(&m);
        assert!(moved.contains(Vec2::new(11.0, 1.0)));
        assert!(!moved.contains(Vec2::new(1.0, 1.0)));
    }

    #[test]
    fn scaled_circle_becomes_ellipse() {
        let c = Shape::Circle(Circle::new(Vec2::ZERO, 1.0));
        let m = Mat4::from_scale(crate::math::Vec3::new(4.0, 1.0, 1.0));
        match c.transform(&m) {
            Shape::Ellipse(e) => {
                assert!((e.radius_x - 4.0).abs() < 1e-4);
                assert!((e.radius_y - 1.0).abs() < 1e-4);
            }
            other => panic!("expected ellipse, got {other:?}"),
        }
    }
}
