//! Wire shape of an `ArcGIS` `f=json` feature.
//!
//! The service returns `{ "attributes": {...}, "geometry": { "rings": [...] } }`
//! with ring coordinates in Web Mercator meters. Parsing is lenient: a
//! record is always produced, with malformed points skipped and missing
//! geometry represented as zero rings.

use serde_json::{Map, Value};

/// A ring in projected (Web Mercator) units.
pub type ProjectedRing = Vec<[f64; 2]>;

/// One feature exactly as the remote layer returned it, before conversion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteRecord {
    /// Raw attribute map.
    pub attributes: Map<String, Value>,
    /// Rings in projected units, in the order the service listed them.
    pub rings: Vec<ProjectedRing>,
}

impl RemoteRecord {
    /// Builds a record from one element of a response's `features` array.
    #[must_use]
    pub fn from_feature(feature: &Value) -> Self {
        let attributes = feature
            .get("attributes")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let rings = feature
            .get("geometry")
            .and_then(|g| g.get("rings"))
            .and_then(Value::as_array)
            .map(|rings| rings.iter().map(parse_ring).collect())
            .unwrap_or_default();

        Self { attributes, rings }
    }

    /// Returns a trimmed, non-empty string attribute.
    ///
    /// Numeric attributes are rendered as strings, since some layers type
    /// FIPS codes as numbers.
    #[must_use]
    pub fn attribute_str(&self, key: &str) -> Option<String> {
        match self.attributes.get(key)? {
            Value::String(s) => Some(s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Returns a numeric attribute. `null`, absent, and unparseable values
    /// all yield `None`.
    #[must_use]
    pub fn attribute_f64(&self, key: &str) -> Option<f64> {
        match self.attributes.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

fn parse_ring(ring: &Value) -> ProjectedRing {
    ring.as_array()
        .map(|points| points.iter().filter_map(parse_point).collect())
        .unwrap_or_default()
}

fn parse_point(point: &Value) -> Option<[f64; 2]> {
    let coords = point.as_array()?;
    let x = coords.first()?.as_f64()?;
    let y = coords.get(1)?.as_f64()?;
    Some([x, y])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attributes_and_rings() {
        let record = RemoteRecord::from_feature(&serde_json::json!({
            "attributes": { "NAME": " Allen Parish ", "STATE": "22", "POP100": 22750 },
            "geometry": { "rings": [[[-10308029.89, 3594670.49], [-10308034.67, 3592380.21]]] }
        }));

        assert_eq!(record.attribute_str("NAME").as_deref(), Some("Allen Parish"));
        assert_eq!(record.attribute_f64("POP100"), Some(22750.0));
        assert_eq!(record.rings.len(), 1);
        assert_eq!(record.rings[0][1], [-10308034.67, 3592380.21]);
    }

    #[test]
    fn missing_geometry_yields_no_rings() {
        let record = RemoteRecord::from_feature(&serde_json::json!({
            "attributes": { "NAME": "Nowhere" }
        }));
        assert!(record.rings.is_empty());

        let record = RemoteRecord::from_feature(&serde_json::json!({
            "attributes": { "NAME": "Nowhere" },
            "geometry": null
        }));
        assert!(record.rings.is_empty());
    }

    #[test]
    fn malformed_points_are_skipped() {
        let record = RemoteRecord::from_feature(&serde_json::json!({
            "geometry": { "rings": [[[1.0, 2.0], [3.0], "x", [4.0, 5.0, 6.0]], "not a ring"] }
        }));
        assert_eq!(record.rings, vec![vec![[1.0, 2.0], [4.0, 5.0]], vec![]]);
        assert!(record.attributes.is_empty());
    }

    #[test]
    fn null_and_numeric_attributes() {
        let record = RemoteRecord::from_feature(&serde_json::json!({
            "attributes": { "POP100": null, "STATE": 6, "EMPTY": "  " }
        }));
        assert_eq!(record.attribute_f64("POP100"), None);
        assert_eq!(record.attribute_str("STATE").as_deref(), Some("6"));
        assert_eq!(record.attribute_str("EMPTY"), None);
        assert_eq!(record.attribute_str("MISSING"), None);
    }
}
