//! Query parameters for `ArcGIS` REST `query` endpoints.

use std::time::Duration;

/// `TIGERweb` states layer (`State_County` layer 54).
pub const TIGERWEB_STATES_URL: &str =
    "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/State_County/MapServer/54/query";

/// `TIGERweb` counties layer (`State_County` layer 55).
pub const TIGERWEB_COUNTIES_URL: &str =
    "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/State_County/MapServer/55/query";

/// Predicate matching every record.
pub const MATCH_ALL: &str = "1=1";

/// A remote query endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Full URL of the layer's `query` operation.
    pub url: String,
    /// Human-readable label used in logs and progress messages.
    pub label: String,
}

impl Endpoint {
    /// Creates an endpoint.
    pub fn new(url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            label: label.into(),
        }
    }
}

/// The fixed part of a feature query; each batch supplies the `where`
/// clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    /// Attribute fields to return.
    pub out_fields: Vec<String>,
    /// Whether to include geometry.
    pub return_geometry: bool,
    /// Decimal places of returned coordinates.
    pub geometry_precision: Option<u32>,
}

impl QueryTemplate {
    /// A geometry-returning template for the given fields.
    #[must_use]
    pub fn new(out_fields: &[&str], geometry_precision: Option<u32>) -> Self {
        Self {
            out_fields: out_fields.iter().map(ToString::to_string).collect(),
            return_geometry: true,
            geometry_precision,
        }
    }

    /// Query-string parameters for one batch.
    #[must_use]
    pub fn params(&self, where_clause: &str, record_limit: Option<u64>) -> Vec<(String, String)> {
        let mut params = vec![
            ("where".to_string(), where_clause.to_string()),
            ("outFields".to_string(), self.out_fields.join(",")),
            ("returnGeometry".to_string(), self.return_geometry.to_string()),
        ];
        if let Some(precision) = self.geometry_precision {
            params.push(("geometryPrecision".to_string(), precision.to_string()));
        }
        if let Some(limit) = record_limit {
            params.push(("resultRecordCount".to_string(), limit.to_string()));
        }
        params.push(("f".to_string(), "json".to_string()));
        params
    }

    /// Query-string parameters for a count-only request.
    #[must_use]
    pub fn count_params(where_clause: &str) -> Vec<(String, String)> {
        vec![
            ("where".to_string(), where_clause.to_string()),
            ("returnCountOnly".to_string(), "true".to_string()),
            ("f".to_string(), "json".to_string()),
        ]
    }
}

/// One concrete HTTP GET handed to a [`Transport`](crate::Transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Endpoint URL.
    pub url: String,
    /// Query-string parameters, in order.
    pub params: Vec<(String, String)>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl QueryRequest {
    /// Returns the value of a query parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` for a count-only request.
    #[must_use]
    pub fn is_count(&self) -> bool {
        self.param("returnCountOnly") == Some("true")
    }
}
