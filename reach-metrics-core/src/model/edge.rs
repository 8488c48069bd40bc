//! Network components - nodes, edges and their attributes

use geo::{LineString, Point};
use serde_json::{Map, Value};

/// Network graph node
#[derive(Debug, Clone)]
pub struct NetworkNode {
    /// Node coordinates
    pub geometry: Point<f64>,
}

/// Edge category, read from the `_layer` attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Layer {
    Sidewalks,
    Crossings,
    ElevatorPaths,
    Other(String),
}

impl Layer {
    pub fn as_str(&self) -> &str {
        match self {
            Layer::Sidewalks => "sidewalks",
            Layer::Crossings => "crossings",
            Layer::ElevatorPaths => "elevator_paths",
            Layer::Other(name) => name,
        }
    }
}

impl From<&str> for Layer {
    fn from(value: &str) -> Self {
        match value {
            "sidewalks" => Layer::Sidewalks,
            "crossings" => Layer::Crossings,
            "elevator_paths" => Layer::ElevatorPaths,
            other => Layer::Other(other.to_string()),
        }
    }
}

/// Stretch of a physical segment covered by a directed edge, as offsets in
/// length units from the segment's start, in traversal order.
///
/// A forward edge over a segment of length `L` covers `(0, L)`, its reverse
/// twin covers `(L, 0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub start: f64,
    pub end: f64,
}

impl Extent {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn full(length: f64, reversed: bool) -> Self {
        if reversed {
            Self::new(length, 0.0)
        } else {
            Self::new(0.0, length)
        }
    }

    pub fn low(&self) -> f64 {
        self.start.min(self.end)
    }

    pub fn high(&self) -> f64 {
        self.start.max(self.end)
    }

    /// Offset reached after travelling `fraction` of the extent
    pub fn at(&self, fraction: f64) -> f64 {
        self.start + (self.end - self.start) * fraction
    }

    /// The first `fraction` of the extent
    pub fn head(&self, fraction: f64) -> Self {
        Self::new(self.start, self.at(fraction))
    }

    /// Everything after the first `fraction` of the extent
    pub fn tail(&self, fraction: f64) -> Self {
        Self::new(self.at(fraction), self.end)
    }
}

/// Street or pedestrian graph edge
#[derive(Debug, Clone)]
pub struct EdgeAttributes {
    pub layer: Layer,
    /// Length in metres, never negative
    pub length: f64,
    pub width: Option<f64>,
    pub incline: Option<f64>,
    pub curbramps: Option<bool>,
    /// Identifier of the physical segment, shared by both directions
    pub pkey: i64,
    /// Set on the edge that runs against the segment's digitized direction
    pub reversed: bool,
    pub geometry: LineString<f64>,
    pub extent: Extent,
    /// Every other attribute, including `_weight_*` and `nsr_*` columns
    pub properties: Map<String, Value>,
}

impl EdgeAttributes {
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Sidewalk `pkey`s referenced through the left/right foreign keys.
    ///
    /// A side counts only when its `sw_*` flag exists and its `pkey_*` is an
    /// integer.
    pub fn sidewalk_ids(&self) -> Vec<i64> {
        [("sw_left", "pkey_left"), ("sw_right", "pkey_right")]
            .into_iter()
            .filter(|(flag, _)| self.properties.contains_key(*flag))
            .filter_map(|(_, key)| self.properties.get(key).and_then(as_pkey))
            .collect()
    }
}

/// Reads an integral JSON value, accepting floats without a fractional part
#[allow(clippy::cast_possible_truncation)]
pub fn as_pkey(value: &Value) -> Option<i64> {
    if let Some(v) = value.as_i64() {
        return Some(v);
    }
    value
        .as_f64()
        .filter(|v| v.fract() == 0.0 && v.abs() < 9.0e15)
        .map(|v| v as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;
    use serde_json::json;

    fn street(properties: Value) -> EdgeAttributes {
        EdgeAttributes {
            layer: Layer::Other("streets".into()),
            length: 10.0,
            width: None,
            incline: None,
            curbramps: None,
            pkey: 1,
            reversed: false,
            geometry: line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)],
            extent: Extent::full(10.0, false),
            properties: properties.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn sidewalk_ids_require_flag_and_key() {
        let both = street(json!({"sw_left": 1, "pkey_left": 7, "sw_right": 1, "pkey_right": 8.0}));
        assert_eq!(both.sidewalk_ids(), vec![7, 8]);

        let missing_flag = street(json!({"pkey_left": 7}));
        assert!(missing_flag.sidewalk_ids().is_empty());

        let null_key = street(json!({"sw_left": 1, "pkey_left": null, "sw_right": 1, "pkey_right": 3}));
        assert_eq!(null_key.sidewalk_ids(), vec![3]);
    }

    #[test]
    fn extent_parts_follow_traversal_order() {
        let reverse = Extent::full(10.0, true);
        assert_eq!(reverse.head(0.25), Extent::new(10.0, 7.5));
        assert_eq!(reverse.tail(0.25), Extent::new(7.5, 0.0));
        assert_eq!(reverse.low(), 0.0);
    }

    #[test]
    fn layer_round_trips_known_names() {
        for name in ["sidewalks", "crossings", "elevator_paths", "streets"] {
            assert_eq!(Layer::from(name).as_str(), name);
        }
    }
}
