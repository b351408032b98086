use serde::{Deserialize, Serialize};

/// Web Mercator stops being useful past this latitude
pub const MAX_LAT: f64 = 85.051_128_779_806_59;

/// A geographic coordinate, serialized as `[lng, lat]` like GeoJSON
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct LngLat {
    pub lng: f64,
    pub lat: f64,
}

impl LngLat {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }

    /// Wrap longitude into [-180, 180) and clamp latitude to the Mercator range
    pub fn normalized(self) -> Self {
        Self {
            lng: (self.lng + 180.0).rem_euclid(360.0) - 180.0,
            lat: self.lat.clamp(-MAX_LAT, MAX_LAT),
        }
    }
}

impl From<[f64; 2]> for LngLat {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<LngLat> for [f64; 2] {
    fn from(p: LngLat) -> Self {
        [p.lng, p.lat]
    }
}
