//! Spherical Web Mercator (EPSG:3857) ↔ geographic degree conversion.
//!
//! The remote layers are served in Web Mercator meters on a sphere of
//! radius [`EARTH_RADIUS_M`]. Only the inverse direction is needed by the
//! pipeline; the forward direction exists for query construction and
//! tests.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use region_map_geometry_models::Position;

/// Sphere radius of the Web Mercator projection, in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Converts a Web Mercator `(x, y)` pair in meters to
/// `[longitude, latitude]` in degrees.
///
/// Total over all finite inputs. Stable across the 18°–73° latitude band
/// covered by US boundaries, and well beyond it.
#[must_use]
pub fn web_mercator_to_lon_lat(x: f64, y: f64) -> Position {
    let lon = (x / EARTH_RADIUS_M).to_degrees();
    let lat = 2.0_f64
        .mul_add((y / EARTH_RADIUS_M).exp().atan(), -FRAC_PI_2)
        .to_degrees();
    [lon, lat]
}

/// Converts `[longitude, latitude]` in degrees to Web Mercator meters.
#[must_use]
pub fn lon_lat_to_web_mercator(lon: f64, lat: f64) -> [f64; 2] {
    let x = lon.to_radians() * EARTH_RADIUS_M;
    let y = (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln() * EARTH_RADIUS_M;
    [x, y]
}
