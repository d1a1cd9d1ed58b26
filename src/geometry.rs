use serde::{Deserialize, Serialize};

/// Denominator below which two segments are treated as parallel.
const PARALLEL_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Grows the rectangle by `margin` on every side.
    pub fn inflate(&self, margin: f64) -> Rect {
        Rect {
            x: self.x - margin,
            y: self.y - margin,
            width: self.width + 2.0 * margin,
            height: self.height + 2.0 * margin,
        }
    }

    /// Corners in clockwise order starting at the top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.left(), self.top()),
            Point::new(self.right(), self.top()),
            Point::new(self.right(), self.bottom()),
            Point::new(self.left(), self.bottom()),
        ]
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

pub fn distance(p1: Point, p2: Point) -> f64 {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    (dx * dx + dy * dy).sqrt()
}

/// Inclusive containment: points on the border count as inside.
pub fn point_in_rect(p: Point, rect: &Rect) -> bool {
    p.x >= rect.left() && p.x <= rect.right() && p.y >= rect.top() && p.y <= rect.bottom()
}

/// Parametric segment intersection.
///
/// Parallel segments never intersect here, including collinear segments
/// that overlap. Callers that care about grazing an edge along its length
/// rely on the endpoint containment test instead.
pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let denom = (a1.x - a2.x) * (b1.y - b2.y) - (a1.y - a2.y) * (b1.x - b2.x);
    if denom.abs() < PARALLEL_EPSILON {
        return false;
    }
    let t = ((a1.x - b1.x) * (b1.y - b2.y) - (a1.y - b1.y) * (b1.x - b2.x)) / denom;
    let u = -((a1.x - a2.x) * (a1.y - b1.y) - (a1.y - a2.y) * (a1.x - b1.x)) / denom;
    (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)
}

pub fn segment_intersects_inflated_rect(p1: Point, p2: Point, rect: &Rect, margin: f64) -> bool {
    let inflated = rect.inflate(margin);
    if point_in_rect(p1, &inflated) || point_in_rect(p2, &inflated) {
        return true;
    }
    let [top_left, top_right, bottom_right, bottom_left] = inflated.corners();
    let edges = [
        (top_left, top_right),
        (top_right, bottom_right),
        (bottom_right, bottom_left),
        (bottom_left, top_left),
    ];
    edges
        .into_iter()
        .any(|(c, d)| segments_intersect(p1, p2, c, d))
}

pub fn path_distance(points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|segment| distance(segment[0], segment[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(distance(Point::new(0.0, 0.0), Point::new(3.0, 4.0)), 5.0);
        assert_eq!(distance(Point::new(2.0, 2.0), Point::new(2.0, 2.0)), 0.0);
    }

    #[test]
    fn point_in_rect_includes_border() {
        let rect = Rect::new(10.0, 10.0, 20.0, 10.0);
        assert!(point_in_rect(Point::new(10.0, 10.0), &rect));
        assert!(point_in_rect(Point::new(30.0, 20.0), &rect));
        assert!(point_in_rect(Point::new(15.0, 15.0), &rect));
        assert!(!point_in_rect(Point::new(30.1, 15.0), &rect));
        assert!(!point_in_rect(Point::new(15.0, 9.9), &rect));
    }

    #[test]
    fn crossing_segments_intersect() {
        assert!(segments_intersect(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        ));
        assert!(!segments_intersect(
            Point::new(0.0, 0.0),
            Point::new(4.0, 4.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
        ));
    }

    #[test]
    fn touching_endpoints_intersect() {
        assert!(segments_intersect(
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(5.0, -5.0),
            Point::new(5.0, 5.0),
        ));
    }

    #[test]
    fn collinear_overlap_is_not_detected() {
        assert!(!segments_intersect(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(15.0, 0.0),
        ));
    }

    #[test]
    fn inflated_rect_catches_endpoints_and_crossings() {
        let rect = Rect::new(40.0, 40.0, 20.0, 20.0);
        // endpoint inside the margin band only
        assert!(segment_intersects_inflated_rect(
            Point::new(35.0, 50.0),
            Point::new(0.0, 50.0),
            &rect,
            5.0,
        ));
        assert!(!segment_intersects_inflated_rect(
            Point::new(34.0, 50.0),
            Point::new(0.0, 50.0),
            &rect,
            5.0,
        ));
        // passes straight through
        assert!(segment_intersects_inflated_rect(
            Point::new(0.0, 50.0),
            Point::new(100.0, 50.0),
            &rect,
            0.0,
        ));
        // misses above
        assert!(!segment_intersects_inflated_rect(
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            &rect,
            10.0,
        ));
    }

    #[test]
    fn rect_corners_are_clockwise_from_top_left() {
        let corners = Rect::new(0.0, 0.0, 4.0, 2.0).inflate(1.0).corners();
        assert_eq!(corners[0], Point::new(-1.0, -1.0));
        assert_eq!(corners[1], Point::new(5.0, -1.0));
        assert_eq!(corners[2], Point::new(5.0, 3.0));
        assert_eq!(corners[3], Point::new(-1.0, 3.0));
    }

    #[test]
    fn path_distance_sums_segments() {
        assert_eq!(path_distance(&[]), 0.0);
        assert_eq!(path_distance(&[Point::new(1.0, 1.0)]), 0.0);
        let points = [
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 10.0),
        ];
        assert_eq!(path_distance(&points), 11.0);
    }
}
