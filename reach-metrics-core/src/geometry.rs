//! Line geometry helpers.
//!
//! Interpolation, projection and splitting work on the raw coordinates
//! (planar), so fractions along a line are independent of the coordinate
//! space. Distances and lengths go through [`CoordinateSpace`], which picks
//! Haversine metres for lon/lat data and Euclidean units otherwise.

use geo::{Coord, Distance, Euclidean, Haversine, Length, LineString, Point};
use rstar::AABB;
use serde::{Deserialize, Serialize};

/// Mean Earth radius of the Haversine formula, in metres
const MEAN_EARTH_RADIUS: f64 = 6_371_008.8;

/// Widening applied to geographic envelopes to absorb rounding
const ENVELOPE_MARGIN: f64 = 1.001;

/// How coordinates of a network are interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// WGS84 longitude/latitude, distances in metres
    #[default]
    Geographic,
    /// Projected coordinates, distances in CRS units
    Projected,
}

impl CoordinateSpace {
    pub fn distance(self, a: Point<f64>, b: Point<f64>) -> f64 {
        match self {
            CoordinateSpace::Geographic => Haversine.distance(a, b),
            CoordinateSpace::Projected => Euclidean.distance(a, b),
        }
    }

    pub fn length(self, line: &LineString<f64>) -> f64 {
        match self {
            CoordinateSpace::Geographic => Haversine.length(line),
            CoordinateSpace::Projected => Euclidean.length(line),
        }
    }

    /// Envelope that contains every point within `radius` of `center`.
    ///
    /// Longitude spans are sized at the envelope's most poleward latitude,
    /// where a degree of longitude is shortest.
    pub fn envelope(self, center: Point<f64>, radius: f64) -> AABB<[f64; 2]> {
        let (dx, dy) = match self {
            CoordinateSpace::Projected => (radius, radius),
            CoordinateSpace::Geographic => {
                let metres_per_degree = MEAN_EARTH_RADIUS * std::f64::consts::PI / 180.0;
                let dy = radius / metres_per_degree * ENVELOPE_MARGIN;
                let poleward = (center.y().abs() + dy).min(90.0);
                let cos_lat = poleward.to_radians().cos().max(1e-6);
                ((dy / cos_lat).min(180.0), dy)
            }
        };
        AABB::from_corners(
            [center.x() - dx, center.y() - dy],
            [center.x() + dx, center.y() + dy],
        )
    }
}

/// Closest position on a line to some query point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinePosition {
    /// Fraction of the line's planar length, in `[0, 1]`
    pub fraction: f64,
    /// The closest point itself
    pub point: Point<f64>,
}

fn segment_length(start: Coord<f64>, end: Coord<f64>) -> f64 {
    (end.x - start.x).hypot(end.y - start.y)
}

/// Planar length of a line in coordinate units
pub fn planar_length(line: &LineString<f64>) -> f64 {
    line.lines().map(|l| segment_length(l.start, l.end)).sum()
}

/// Point at `fraction` of the line's length, clamped to its ends
pub fn interpolate(line: &LineString<f64>, fraction: f64) -> Option<Point<f64>> {
    let first = *line.0.first()?;
    let total = planar_length(line);
    if total == 0.0 {
        return Some(first.into());
    }

    let target = total * fraction.clamp(0.0, 1.0);
    let mut walked = 0.0;
    for segment in line.lines() {
        let len = segment_length(segment.start, segment.end);
        if len > 0.0 && walked + len >= target {
            let t = ((target - walked) / len).clamp(0.0, 1.0);
            return Some((segment.start + (segment.end - segment.start) * t).into());
        }
        walked += len;
    }

    line.0.last().map(|c| Point::from(*c))
}

/// Projects `point` onto the line. On ties the earliest segment wins.
pub fn locate(line: &LineString<f64>, point: Point<f64>) -> Option<LinePosition> {
    let first = *line.0.first()?;
    let total = planar_length(line);
    if total == 0.0 {
        return Some(LinePosition {
            fraction: 0.0,
            point: first.into(),
        });
    }

    let p: Coord<f64> = point.into();
    let mut best: Option<(f64, f64, Coord<f64>)> = None;
    let mut walked = 0.0;
    for segment in line.lines() {
        let delta = segment.end - segment.start;
        let len_sq = delta.x * delta.x + delta.y * delta.y;
        let t = if len_sq == 0.0 {
            0.0
        } else {
            (((p.x - segment.start.x) * delta.x + (p.y - segment.start.y) * delta.y) / len_sq)
                .clamp(0.0, 1.0)
        };
        let closest = segment.start + delta * t;
        let dist_sq = (p.x - closest.x).powi(2) + (p.y - closest.y).powi(2);
        let along = walked + t * len_sq.sqrt();

        if best.is_none_or(|(best_dist, _, _)| dist_sq < best_dist) {
            best = Some((dist_sq, along, closest));
        }
        walked += len_sq.sqrt();
    }

    best.map(|(_, along, closest)| LinePosition {
        fraction: (along / total).clamp(0.0, 1.0),
        point: closest.into(),
    })
}

/// Splits a line at `fraction` of its length into a head and a tail.
///
/// Both parts always hold at least two coordinates, so a cut at an end
/// produces a degenerate part rather than an empty one.
pub fn split(line: &LineString<f64>, fraction: f64) -> (LineString<f64>, LineString<f64>) {
    let coords = &line.0;
    let Some(cut) = interpolate(line, fraction) else {
        return (LineString::new(vec![]), LineString::new(vec![]));
    };
    let cut: Coord<f64> = cut.into();

    let total = planar_length(line);
    let target = total * fraction.clamp(0.0, 1.0);

    let mut head = vec![coords[0]];
    let mut tail = Vec::new();
    let mut walked = 0.0;
    let mut cut_done = false;
    for segment in line.lines() {
        let len = segment_length(segment.start, segment.end);
        if !cut_done && walked + len >= target {
            head.push(cut);
            tail.push(cut);
            cut_done = true;
        }
        if cut_done {
            tail.push(segment.end);
        } else {
            head.push(segment.end);
        }
        walked += len;
    }
    if !cut_done {
        head.push(cut);
        tail.push(cut);
    }

    head.dedup();
    tail.dedup();
    if head.len() < 2 {
        head.push(cut);
    }
    if tail.len() < 2 {
        tail.insert(0, cut);
    }

    (LineString::new(head), LineString::new(tail))
}

/// The line with its coordinates in reverse order
pub fn reversed(line: &LineString<f64>) -> LineString<f64> {
    LineString::new(line.0.iter().rev().copied().collect())
}
