use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{Point, Rect, distance, path_distance, segment_intersects_inflated_rect};

/// Clearance kept around every obstacle when the caller does not pick one.
pub const DEFAULT_MARGIN: f64 = 10.0;

/// A placed node as seen by the router: an identifier and its bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: String,
    #[serde(flatten)]
    pub rect: Rect,
}

impl Obstacle {
    pub fn new(id: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            rect: Rect::new(x, y, width, height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedPath {
    pub points: Vec<Point>,
    pub total_distance: f64,
}

impl RoutedPath {
    fn direct(start: Point, end: Point) -> Self {
        Self {
            points: vec![start, end],
            total_distance: distance(start, end),
        }
    }

    fn through(points: Vec<Point>) -> Self {
        let total_distance = path_distance(&points);
        Self {
            points,
            total_distance,
        }
    }

    /// True when the path bends at least once.
    pub fn is_routed(&self) -> bool {
        self.points.len() > 2
    }
}

pub fn calculate_route_default(start: Point, end: Point, obstacles: &[Obstacle]) -> RoutedPath {
    calculate_route(start, end, obstacles, DEFAULT_MARGIN)
}

/// Routes a connection from `start` to `end` around `obstacles`.
///
/// Candidates are tried in a fixed order: the straight line, the two
/// L-shaped detours, then a single bend through a corner of the largest
/// blocking obstacle. When nothing is clear the straight line is returned
/// anyway, so the result always starts at `start` and ends at `end`.
pub fn calculate_route(start: Point, end: Point, obstacles: &[Obstacle], margin: f64) -> RoutedPath {
    if obstacles.is_empty() || path_clear(start, end, obstacles, margin) {
        return RoutedPath::direct(start, end);
    }

    let blockers: Vec<&Obstacle> = obstacles
        .iter()
        .filter(|obstacle| segment_intersects_inflated_rect(start, end, &obstacle.rect, margin))
        .collect();
    if blockers.is_empty() {
        return RoutedPath::direct(start, end);
    }
    debug!(blockers = blockers.len(), "direct path blocked");

    if let Some(points) = shortest_l_route(start, end, obstacles, margin) {
        debug!("using L-shaped detour");
        return RoutedPath::through(points);
    }

    match route_around_largest(start, end, obstacles, &blockers, margin) {
        Some(points) => {
            debug!("using corner route");
            RoutedPath::through(points)
        }
        None => {
            debug!("no clear route, falling back to direct path");
            RoutedPath::direct(start, end)
        }
    }
}

fn path_clear<'a>(
    a: Point,
    b: Point,
    obstacles: impl IntoIterator<Item = &'a Obstacle>,
    margin: f64,
) -> bool {
    obstacles
        .into_iter()
        .all(|obstacle| !segment_intersects_inflated_rect(a, b, &obstacle.rect, margin))
}

fn l_route(start: Point, waypoint: Point, end: Point, obstacles: &[Obstacle], margin: f64) -> Option<Vec<Point>> {
    if waypoint == start || waypoint == end {
        return None;
    }
    if path_clear(start, waypoint, obstacles, margin) && path_clear(waypoint, end, obstacles, margin) {
        Some(vec![start, waypoint, end])
    } else {
        None
    }
}

fn shortest_l_route(start: Point, end: Point, obstacles: &[Obstacle], margin: f64) -> Option<Vec<Point>> {
    let horizontal_first = l_route(start, Point::new(end.x, start.y), end, obstacles, margin);
    let vertical_first = l_route(start, Point::new(start.x, end.y), end, obstacles, margin);

    let mut best: Option<(Vec<Point>, f64)> = None;
    for candidate in [horizontal_first, vertical_first].into_iter().flatten() {
        let length = path_distance(&candidate);
        // later candidates only win when strictly shorter
        if best.as_ref().is_none_or(|(_, best_length)| length < *best_length) {
            best = Some((candidate, length));
        }
    }
    best.map(|(points, _)| points)
}

fn route_around_largest(
    start: Point,
    end: Point,
    obstacles: &[Obstacle],
    blockers: &[&Obstacle],
    margin: f64,
) -> Option<Vec<Point>> {
    let mut largest = *blockers.first()?;
    for &blocker in &blockers[1..] {
        if blocker.rect.area() > largest.rect.area() {
            largest = blocker;
        }
    }

    let others: Vec<&Obstacle> = obstacles.iter().filter(|o| o.id != largest.id).collect();
    let mut best: Option<(Vec<Point>, f64)> = None;
    for corner in largest.rect.inflate(margin).corners() {
        if !path_clear(start, corner, others.iter().copied(), margin)
            || !path_clear(corner, end, others.iter().copied(), margin)
        {
            continue;
        }
        let candidate = vec![start, corner, end];
        let length = path_distance(&candidate);
        if best.as_ref().is_none_or(|(_, best_length)| length < *best_length) {
            best = Some((candidate, length));
        }
    }
    best.map(|(points, _)| points)
}
