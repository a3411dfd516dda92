//! Circle→polygon approximation for geo-shape filters.
//!
//! The index's shape filter takes polygons, not circles, so a
//! center+radius "nearby" constraint is approximated by a regular
//! n-gon. The radius is inflated by `1/cos(π/n)` so the polygon
//! circumscribes the circle — every point inside the requested circle is
//! inside the polygon.

use serde_json::Value;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default number of polygon vertices.
pub const DEFAULT_VERTICES: usize = 32;

/// Largest meaningful radius: half Earth's circumference.
pub fn max_radius_km() -> f64 {
    EARTH_RADIUS_KM * std::f64::consts::PI
}

/// Approximate a circle as a closed ring of `n + 1` `[lng, lat]`
/// coordinates (first repeated as last). Vertices are placed at `n`
/// evenly spaced bearings via geodesic projection from the center, at the
/// inflated radius, so the ring circumscribes the circle.
pub fn circle_to_polygon(lat: f64, lng: f64, radius_km: f64, n: usize) -> Vec<[f64; 2]> {
    let n = n.max(3);
    let inflated = radius_km / (std::f64::consts::PI / n as f64).cos();
    let angular = inflated / EARTH_RADIUS_KM;

    let lat_r = lat.to_radians();
    let lng_r = lng.to_radians();

    let mut ring = Vec::with_capacity(n + 1);
    for i in 0..n {
        let bearing = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
        let sin_lat = lat_r.sin() * angular.cos() + lat_r.cos() * angular.sin() * bearing.cos();
        let v_lat = sin_lat.asin();
        let v_lng = lng_r
            + (bearing.sin() * angular.sin() * lat_r.cos())
                .atan2(angular.cos() - lat_r.sin() * sin_lat);
        ring.push([normalize_lng(v_lng.to_degrees()), v_lat.to_degrees()]);
    }
    ring.push(ring[0]);
    ring
}

/// Circle as a GeoJSON Polygon value ready for a geo-shape filter.
pub fn circle_to_geojson(lat: f64, lng: f64, radius_km: f64, n: usize) -> Value {
    serde_json::json!({
        "type": "Polygon",
        "coordinates": [circle_to_polygon(lat, lng, radius_km, n)]
    })
}

/// Great-circle distance between two `(lat, lng)` points in kilometres.
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

fn normalize_lng(lng: f64) -> f64 {
    let mut l = lng;
    while l > 180.0 {
        l -= 360.0;
    }
    while l < -180.0 {
        l += 360.0;
    }
    l
}
