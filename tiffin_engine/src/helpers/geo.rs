//! Service-area geometry.
//!
//! Serviceability is decided against a *buffered* polygon (the exact area expanded by a small margin) so that
//! customers standing a few metres outside the boundary are not rejected. Hotel dispatch uses the *exact* polygon so
//! that orders never cross zones. A coordinate matching no area at all is an explicit out-of-service rejection for
//! the caller, never a silent empty result.
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Margin applied to the buffered membership test: 300 m.
pub const DEFAULT_BUFFER_M: f64 = 300.0;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const AVERAGE_SPEED_KMH: f64 = 25.0;
const DISPATCH_OVERHEAD_MIN: i64 = 10;

#[derive(Debug, Clone, Error)]
pub enum ServiceAreaError {
    #[error("Could not read service area file: {0}")]
    Io(String),
    #[error("Could not parse service areas: {0}")]
    Parse(String),
    #[error("Service area '{0}' has fewer than 3 vertices")]
    DegeneratePolygon(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Great-circle distance to `other` in metres (haversine).
    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Straight-line travel estimate: distance at the assumed average rider speed, plus a fixed overhead. Never less
/// than the overhead itself. These are display estimates, not routing.
pub fn travel_minutes(distance_m: f64) -> i64 {
    let minutes = distance_m / 1_000.0 / AVERAGE_SPEED_KMH * 60.0;
    DISPATCH_OVERHEAD_MIN.max(minutes.round() as i64 + DISPATCH_OVERHEAD_MIN)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceArea {
    pub name: String,
    pub polygon: Vec<GeoPoint>,
}

impl ServiceArea {
    /// Exact point-in-polygon test (ray casting on lat/lng treated as planar, which is fine at city scale).
    pub fn contains(&self, p: &GeoPoint) -> bool {
        let poly = &self.polygon;
        let mut inside = false;
        let mut j = poly.len() - 1;
        for i in 0..poly.len() {
            let (a, b) = (&poly[i], &poly[j]);
            if (a.latitude > p.latitude) != (b.latitude > p.latitude) {
                let intersect_lon =
                    (b.longitude - a.longitude) * (p.latitude - a.latitude) / (b.latitude - a.latitude) + a.longitude;
                if p.longitude < intersect_lon {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Buffered membership: inside the polygon, or within `margin_m` of its boundary.
    pub fn contains_buffered(&self, p: &GeoPoint, margin_m: f64) -> bool {
        self.contains(p) || self.boundary_distance_m(p) <= margin_m
    }

    /// Distance from `p` to the nearest polygon edge, in metres.
    pub fn boundary_distance_m(&self, p: &GeoPoint) -> f64 {
        let poly = &self.polygon;
        let mut best = f64::INFINITY;
        let mut j = poly.len() - 1;
        for i in 0..poly.len() {
            best = best.min(segment_distance_m(p, &poly[j], &poly[i]));
            j = i;
        }
        best
    }
}

/// Distance from `p` to the segment `a`-`b`, computed in a local equirectangular projection around `p`.
fn segment_distance_m(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> f64 {
    let cos_lat = p.latitude.to_radians().cos();
    let to_xy = |g: &GeoPoint| {
        let x = (g.longitude - p.longitude).to_radians() * cos_lat * EARTH_RADIUS_M;
        let y = (g.latitude - p.latitude).to_radians() * EARTH_RADIUS_M;
        (x, y)
    };
    let (ax, ay) = to_xy(a);
    let (bx, by) = to_xy(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;
    let t = if len_sq == 0.0 { 0.0 } else { ((-ax) * dx + (-ay) * dy) / len_sq };
    let t = t.clamp(0.0, 1.0);
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    (cx * cx + cy * cy).sqrt()
}

#[derive(Debug, Clone)]
pub struct ServiceAreas {
    areas: Vec<ServiceArea>,
    buffer_m: f64,
}

impl ServiceAreas {
    pub fn new(areas: Vec<ServiceArea>, buffer_m: f64) -> Result<Self, ServiceAreaError> {
        for area in &areas {
            if area.polygon.len() < 3 {
                return Err(ServiceAreaError::DegeneratePolygon(area.name.clone()));
            }
        }
        Ok(Self { areas, buffer_m })
    }

    pub fn from_json_str(json: &str) -> Result<Self, ServiceAreaError> {
        let areas: Vec<ServiceArea> = serde_json::from_str(json).map_err(|e| ServiceAreaError::Parse(e.to_string()))?;
        Self::new(areas, DEFAULT_BUFFER_M)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ServiceAreaError> {
        let json = std::fs::read_to_string(path).map_err(|e| ServiceAreaError::Io(e.to_string()))?;
        Self::from_json_str(&json)
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    /// The generous serviceability test: the first area whose buffered polygon contains the point.
    pub fn match_area(&self, p: &GeoPoint) -> Option<&ServiceArea> {
        self.areas.iter().find(|a| a.contains_buffered(p, self.buffer_m))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Roughly a 2.2 km x 2.1 km box.
    fn square() -> ServiceArea {
        ServiceArea {
            name: "central".to_string(),
            polygon: vec![
                GeoPoint::new(19.940, 79.280),
                GeoPoint::new(19.960, 79.280),
                GeoPoint::new(19.960, 79.300),
                GeoPoint::new(19.940, 79.300),
            ],
        }
    }

    #[test]
    fn haversine_known_distance() {
        // One degree of latitude is ~111.2 km.
        let a = GeoPoint::new(19.0, 79.0);
        let b = GeoPoint::new(20.0, 79.0);
        let d = a.distance_m(&b);
        assert!((d - 111_195.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn point_in_polygon() {
        let area = square();
        assert!(area.contains(&GeoPoint::new(19.950, 79.290)));
        assert!(!area.contains(&GeoPoint::new(19.970, 79.290)));
        assert!(!area.contains(&GeoPoint::new(19.950, 79.310)));
    }

    #[test]
    fn buffer_admits_near_misses_only() {
        let area = square();
        // ~110 m north of the top edge: inside the 300 m buffer, outside the exact polygon.
        let near = GeoPoint::new(19.961, 79.290);
        assert!(!area.contains(&near));
        assert!(area.contains_buffered(&near, DEFAULT_BUFFER_M));
        // ~1.1 km north: outside both.
        let far = GeoPoint::new(19.970, 79.290);
        assert!(!area.contains_buffered(&far, DEFAULT_BUFFER_M));
    }

    #[test]
    fn match_area_rejects_out_of_service_points() {
        let areas = ServiceAreas::new(vec![square()], DEFAULT_BUFFER_M).unwrap();
        assert_eq!(areas.match_area(&GeoPoint::new(19.950, 79.290)).map(|a| a.name.as_str()), Some("central"));
        assert!(areas.match_area(&GeoPoint::new(19.800, 79.290)).is_none());
    }

    #[test]
    fn degenerate_polygons_are_rejected() {
        let bad = ServiceArea { name: "line".into(), polygon: vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)] };
        assert!(ServiceAreas::new(vec![bad], DEFAULT_BUFFER_M).is_err());
    }

    #[test]
    fn travel_estimates_floor_at_overhead() {
        assert_eq!(travel_minutes(0.0), 10);
        // 25 km at 25 km/h = 60 min + 10 min overhead
        assert_eq!(travel_minutes(25_000.0), 70);
        assert_eq!(travel_minutes(2_500.0), 16);
    }

    #[test]
    fn parses_from_json() {
        let json = r#"[{"name":"central","polygon":[
            {"latitude":19.94,"longitude":79.28},
            {"latitude":19.96,"longitude":79.28},
            {"latitude":19.96,"longitude":79.30},
            {"latitude":19.94,"longitude":79.30}]}]"#;
        let areas = ServiceAreas::from_json_str(json).unwrap();
        assert!(areas.match_area(&GeoPoint::new(19.95, 79.29)).is_some());
    }
}
