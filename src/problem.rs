//! Points to visit and their coordinates.

use crate::error::{PlanError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead};
use std::path::Path;

/// A planar coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    /// Create a new coordinate.
    pub fn new(x: f64, y: f64) -> Self {
        Coord { x, y }
    }

    /// Calculate the Euclidean distance between two coordinates.
    pub fn distance(&self, other: &Coord) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub(crate) fn squared_distance(&self, other: &Coord) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Arithmetic mean of a set of coordinates, `None` when empty.
    pub fn mean<'a, I>(coords: I) -> Option<Coord>
    where
        I: IntoIterator<Item = &'a Coord>,
    {
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut count = 0usize;

        for coord in coords {
            sum_x += coord.x;
            sum_y += coord.y;
            count += 1;
        }

        if count > 0 {
            Some(Coord::new(sum_x / count as f64, sum_y / count as f64))
        } else {
            None
        }
    }
}

/// A stop on a route: an order identifier and the receiver's coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Point {
            id: id.into(),
            x,
            y,
        }
    }

    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

/// Reject empty inputs, duplicate identifiers and non-finite coordinates.
pub fn validate_points(points: &[Point]) -> Result<()> {
    if points.is_empty() {
        return Err(PlanError::invalid("point set is empty"));
    }

    let mut seen = HashSet::with_capacity(points.len());
    for point in points {
        if !point.coord().is_finite() {
            return Err(PlanError::invalid(format!(
                "point {} has a non-finite coordinate",
                point.id
            )));
        }
        if !seen.insert(point.id.as_str()) {
            return Err(PlanError::invalid(format!(
                "duplicate point id {}",
                point.id
            )));
        }
    }

    Ok(())
}

/// Load points from a file.
///
/// Files ending in `.json` hold an array of `{ "id", "x", "y" }` objects.
/// Anything else is read as whitespace separated `id x y` lines; blank lines
/// and lines starting with `#` are skipped.
pub fn load_points<P: AsRef<Path>>(path: P) -> Result<Vec<Point>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let reader = io::BufReader::new(file);

    if path.extension().map_or(false, |ext| ext == "json") {
        return Ok(serde_json::from_reader(reader)?);
    }

    let mut points = Vec::new();
    for (line_no, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(PlanError::invalid(format!(
                "line {}: expected `id x y`, got `{}`",
                line_no + 1,
                line
            )));
        }

        let x = parse_coordinate(parts[1], line_no)?;
        let y = parse_coordinate(parts[2], line_no)?;
        points.push(Point::new(parts[0], x, y));
    }

    Ok(points)
}

fn parse_coordinate(raw: &str, line_no: usize) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| {
        PlanError::invalid(format!(
            "line {}: `{}` is not a number",
            line_no + 1,
            raw
        ))
    })
}
