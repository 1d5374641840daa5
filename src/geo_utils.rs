//! Geographic utilities on a spherical earth.
//!
//! The three primitives `haversine_distance`, `initial_bearing` and
//! `destination` are mutually consistent: for any point P, distance d and
//! bearing b, `destination(P, d, b)` lies `d` meters from P at initial
//! bearing `b`. Inputs are not validated; NaN propagates.

use geo::{Contains, Coord, LineString, Point, Polygon};

use crate::GeoPoint;

/// Mean earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude used by the flat-earth corner jitter.
pub const JITTER_METERS_PER_DEGREE: f64 = 111_000.0;

/// Meters per degree of latitude at the equator.
pub const METERS_PER_DEGREE: f64 = 111_319.9;

/// Great-circle distance between two points in meters (haversine).
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    haversine_distance_raw(p1.lat, p1.lng, p2.lat, p2.lng)
}

/// Haversine distance on raw coordinates.
pub fn haversine_distance_raw(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Initial bearing from `from` to `to` in degrees, normalised to [0, 360).
pub fn initial_bearing(from: &GeoPoint, to: &GeoPoint) -> f64 {
    initial_bearing_raw(from.lat, from.lng, to.lat, to.lng)
}

/// Initial bearing on raw coordinates.
pub fn initial_bearing_raw(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();

    // rem_euclid can return 360.0 for tiny negative inputs
    let bearing = y.atan2(x).to_degrees().rem_euclid(360.0);
    if bearing >= 360.0 {
        0.0
    } else {
        bearing
    }
}

/// Point reached by travelling `distance_m` from `start` along the great
/// circle with initial bearing `bearing_deg`.
pub fn destination(start: &GeoPoint, distance_m: f64, bearing_deg: f64) -> GeoPoint {
    destination_raw(start.lat, start.lng, distance_m, bearing_deg)
}

/// Destination on raw coordinates.
pub fn destination_raw(lat: f64, lng: f64, distance_m: f64, bearing_deg: f64) -> GeoPoint {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lng.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    GeoPoint::new(phi2.to_degrees(), lambda2.to_degrees())
}

/// Shift `point` by `distance_m` in direction `angle_rad` on a flat-earth
/// approximation (x east, y north, angle counter-clockwise from east).
///
/// Cheaper than [`destination`] and only meant for jitter radii of tens of
/// meters.
pub fn jitter_flat(point: &GeoPoint, distance_m: f64, angle_rad: f64) -> GeoPoint {
    let dx = distance_m * angle_rad.cos();
    let dy = distance_m * angle_rad.sin();

    let lat_change = dy / JITTER_METERS_PER_DEGREE;
    let lng_change = dx / (JITTER_METERS_PER_DEGREE * point.lat.to_radians().cos());

    GeoPoint::new(point.lat + lat_change, point.lng + lng_change)
}

/// Convert a distance in meters to (latitude degrees, longitude degrees)
/// at the given latitude.
pub fn meters_to_degrees(meters: f64, latitude: f64) -> (f64, f64) {
    let lat_degrees = meters / METERS_PER_DEGREE;
    let lng_degrees = meters / (METERS_PER_DEGREE * latitude.to_radians().cos());
    (lat_degrees, lng_degrees)
}

/// Arithmetic mean of the coordinates. Returns `None` for an empty slice.
pub fn compute_center(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let lat = points.iter().map(|p| p.lat).sum::<f64>() / n;
    let lng = points.iter().map(|p| p.lng).sum::<f64>() / n;
    Some(GeoPoint::new(lat, lng))
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Whether `point` falls inside the polygon described by `ring`.
///
/// The ring does not need to be closed; fewer than 3 vertices never
/// contain anything.
pub fn point_in_polygon(point: &GeoPoint, ring: &[GeoPoint]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let coords: Vec<Coord<f64>> = ring.iter().map(|p| Coord { x: p.lng, y: p.lat }).collect();
    let polygon = Polygon::new(LineString::new(coords), vec![]);
    polygon.contains(&Point::from(*point))
}
