//! `GeoJSON` export of converted boundaries.
//!
//! Produces the `FeatureCollection` artifact consumed by the rendering
//! layer. Callers may attach extra per-feature properties (e.g. the
//! choropleth class and fill color).

use std::path::Path;

use geojson::JsonObject;
use region_map_geometry_models::{Feature, FeatureCollection, Geometry, Ring};

/// Converts a collection to a `GeoJSON` `FeatureCollection`.
#[must_use]
pub fn to_geojson(collection: &FeatureCollection) -> geojson::FeatureCollection {
    to_geojson_with(collection, |_, _| JsonObject::new())
}

/// Converts a collection, merging the properties returned by `extra`
/// (called with each feature's index) into each feature's properties.
pub fn to_geojson_with<F>(collection: &FeatureCollection, mut extra: F) -> geojson::FeatureCollection
where
    F: FnMut(usize, &Feature) -> JsonObject,
{
    let features = collection
        .iter()
        .enumerate()
        .map(|(i, feature)| {
            let mut properties = feature_properties(feature);
            properties.extend(extra(i, feature));
            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geometry_value(&feature.geometry))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Writes a `GeoJSON` collection to `path`.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be written.
pub fn write_geojson(path: &Path, collection: &geojson::FeatureCollection) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, collection.to_string())?;
    log::info!(
        "Wrote {} features to {}",
        collection.features.len(),
        path.display()
    );
    Ok(())
}

fn feature_properties(feature: &Feature) -> JsonObject {
    match serde_json::to_value(&feature.properties) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => JsonObject::new(),
    }
}

fn geometry_value(geometry: &Geometry) -> geojson::Value {
    match geometry {
        Geometry::Polygon(rings) => geojson::Value::Polygon(rings.iter().map(positions).collect()),
        Geometry::MultiPolygon(polygons) => geojson::Value::MultiPolygon(
            polygons
                .iter()
                .map(|rings| rings.iter().map(positions).collect())
                .collect(),
        ),
    }
}

fn positions(ring: &Ring) -> Vec<Vec<f64>> {
    ring.iter().map(|p| p.to_vec()).collect()
}
