//! Bounding-box helper for "find nearby" queries.
//!
//! The box is a flat-earth approximation: one degree of latitude is taken as
//! 111 km and one degree of longitude as `111 * cos(lat)` km. Points near the
//! corners of the box may lie further than `radius_km` from the center, and the
//! longitude span grows without bound as the center approaches a pole.

const KM_PER_DEGREE: f64 = 111.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn around(latitude: f64, longitude: f64, radius_km: f64) -> Self {
        let lat_delta = radius_km / KM_PER_DEGREE;
        let lon_delta = radius_km / (KM_PER_DEGREE * (latitude * std::f64::consts::PI / 180.0).cos());
        // cos() goes negative past the poles; the span itself is symmetric.
        let lon_delta = lon_delta.abs();

        Self {
            min_latitude: latitude - lat_delta,
            max_latitude: latitude + lat_delta,
            min_longitude: longitude - lon_delta,
            max_longitude: longitude + lon_delta,
        }
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_latitude
            && latitude <= self.max_latitude
            && longitude >= self.min_longitude
            && longitude <= self.max_longitude
    }
}
