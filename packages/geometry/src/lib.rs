#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary geometry conversion.
//!
//! Reprojects remote Web Mercator rings to geographic degrees, converts
//! raw `ArcGIS` records into typed [`Feature`](region_map_geometry_models::Feature)
//! values, computes label anchors, and exports collections as `GeoJSON`.

pub mod convert;
pub mod export;
pub mod label;
pub mod projection;

pub use convert::{convert_record, convert_records};
pub use projection::web_mercator_to_lon_lat;
