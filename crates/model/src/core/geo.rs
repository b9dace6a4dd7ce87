use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::{fmt, hash::Hash};
use thiserror::Error;

/// A 2D geospatial point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum GeoParseError {
    #[error("not a point literal: {0}")]
    NotAPoint(String),

    #[error("invalid coordinate '{0}'")]
    InvalidCoordinate(String),

    #[error("invalid GeoJSON point: {0}")]
    InvalidGeoJson(String),
}

impl Eq for Point {}

impl Hash for Point {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
    }
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    /// Parses any of the accepted textual syntaxes, in priority order:
    /// a WKT literal, then a GeoJSON document.
    pub fn parse(s: &str) -> Result<Self, GeoParseError> {
        let trimmed = s.trim();
        if trimmed.starts_with('{') {
            return Self::from_geo_json_str(trimmed);
        }
        Self::from_wkt(trimmed)
    }

    /// Parses `POINT (x y)`. The keyword is case-insensitive, surrounding
    /// whitespace and single quotes are ignored.
    pub fn from_wkt(s: &str) -> Result<Self, GeoParseError> {
        let literal = s.trim().trim_matches('\'').trim();
        let keyword = literal
            .get(..5)
            .filter(|k| k.eq_ignore_ascii_case("point"))
            .ok_or_else(|| GeoParseError::NotAPoint(s.to_string()))?;

        let body = literal[keyword.len()..].trim();
        let coords = body
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .ok_or_else(|| GeoParseError::NotAPoint(s.to_string()))?;

        let mut parts = coords.split_whitespace();
        let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(GeoParseError::NotAPoint(s.to_string()));
        };

        Ok(Point::new(parse_coordinate(x)?, parse_coordinate(y)?))
    }

    pub fn from_geo_json_str(s: &str) -> Result<Self, GeoParseError> {
        let node: JsonValue = serde_json::from_str(s)
            .map_err(|e| GeoParseError::InvalidGeoJson(e.to_string()))?;
        Self::from_geo_json(&node)
    }

    /// Reads a GeoJSON `{"type":"Point","coordinates":[x,y]}` object.
    pub fn from_geo_json(node: &JsonValue) -> Result<Self, GeoParseError> {
        let object = node
            .as_object()
            .ok_or_else(|| GeoParseError::InvalidGeoJson(node.to_string()))?;

        let is_point = object
            .get("type")
            .and_then(JsonValue::as_str)
            .is_some_and(|t| t.eq_ignore_ascii_case("point"));
        if !is_point {
            return Err(GeoParseError::InvalidGeoJson(node.to_string()));
        }

        match object.get("coordinates").and_then(JsonValue::as_array) {
            Some(coords) if coords.len() == 2 => {
                let x = coords[0].as_f64();
                let y = coords[1].as_f64();
                match (x, y) {
                    (Some(x), Some(y)) => Ok(Point::new(x, y)),
                    _ => Err(GeoParseError::InvalidGeoJson(node.to_string())),
                }
            }
            _ => Err(GeoParseError::InvalidGeoJson(node.to_string())),
        }
    }

    pub fn as_geo_json(&self) -> JsonValue {
        json!({ "type": "Point", "coordinates": [self.x, self.y] })
    }

    pub fn as_wkt(&self) -> String {
        format!("POINT ({} {})", self.x, self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_wkt())
    }
}

fn parse_coordinate(s: &str) -> Result<f64, GeoParseError> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GeoParseError::InvalidCoordinate(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wkt_regardless_of_case_and_quotes() {
        let expected = Point::new(-1.1, -2.2);
        assert_eq!(Point::parse("POINT (-1.1 -2.2)").unwrap(), expected);
        assert_eq!(Point::parse(" point (-1.1 -2.2) ").unwrap(), expected);
        assert_eq!(Point::parse("'POINT (-1.1 -2.2)'").unwrap(), expected);
        assert_eq!(Point::parse("POINT(-1.1 -2.2)").unwrap(), expected);
    }

    #[test]
    fn parses_geo_json_string() {
        let p = Point::parse(r#"{"type":"Point","coordinates":[-1.1,-2.2]}"#).unwrap();
        assert_eq!(p, Point::new(-1.1, -2.2));
    }

    #[test]
    fn rejects_non_points() {
        assert!(Point::parse("not a valid point literal").is_err());
        assert!(Point::parse("LINESTRING (1 2, 3 4)").is_err());
        assert!(Point::parse("POINT (1)").is_err());
        assert!(Point::parse(r#"{"type":"Polygon","coordinates":[]}"#).is_err());
    }

    #[test]
    fn geo_json_output_reads_back() {
        let p = Point::new(3.5, -7.25);
        assert_eq!(Point::from_geo_json(&p.as_geo_json()).unwrap(), p);
        assert_eq!(Point::from_wkt(&p.as_wkt()).unwrap(), p);
    }
}
