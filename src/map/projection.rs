use std::f64::consts::PI;

use crate::geo::{LngLat, MAX_LAT};

/// Braille pixels spanned by the whole world at zoom 0
pub const WORLD_SIZE: f64 = 128.0;
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 12.0;
/// Zoom change for one key press or wheel notch
pub const ZOOM_STEP: f64 = 0.5;

/// Viewport representing the visible map area and zoom level.
/// Zoom follows slippy-map semantics: each level doubles the scale.
#[derive(Clone, Debug)]
pub struct Viewport {
    pub center: LngLat,
    pub zoom: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

/// Normalized Web Mercator x in [0, 1)
fn mercator_x(lng: f64) -> f64 {
    (lng + 180.0) / 360.0
}

/// Normalized Web Mercator y in [0, 1], north at 0
fn mercator_y(lat: f64) -> f64 {
    let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0
}

fn inverse_mercator(x: f64, y: f64) -> LngLat {
    let lng = x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();
    LngLat::new(lng, lat)
}

impl Viewport {
    pub fn new(center: LngLat, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center: center.normalized(),
            zoom: zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            width,
            height,
        }
    }

    fn scale(&self) -> f64 {
        WORLD_SIZE * 2f64.powf(self.zoom)
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        let scale = self.scale();
        let x = mercator_x(self.center.lng) + dx as f64 / scale;
        let y = (mercator_y(self.center.lat) + dy as f64 / scale).clamp(0.0, 1.0);
        self.center = inverse_mercator(x, y).normalized();
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom + ZOOM_STEP).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom - ZOOM_STEP).max(MIN_ZOOM);
    }

    /// Zoom in towards a specific pixel location
    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, ZOOM_STEP);
    }

    /// Zoom out from a specific pixel location
    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, -ZOOM_STEP);
    }

    /// Zoom by `delta` levels keeping the point under (px, py) in place
    fn zoom_at(&mut self, px: i32, py: i32, delta: f64) {
        let anchor = self.unproject(px, py);
        self.zoom = (self.zoom + delta).clamp(MIN_ZOOM, MAX_ZOOM);
        let (new_px, new_py) = self.project(anchor);
        self.pan(new_px - px, new_py - py);
    }

    /// Unproject pixel coordinates back to a geographic coordinate
    pub fn unproject(&self, px: i32, py: i32) -> LngLat {
        let scale = self.scale();
        let x = (px as f64 - self.width as f64 / 2.0) / scale + mercator_x(self.center.lng);
        let y = (py as f64 - self.height as f64 / 2.0) / scale + mercator_y(self.center.lat);
        inverse_mercator(x, y)
    }

    /// Project a geographic coordinate to pixel coordinates
    pub fn project(&self, p: LngLat) -> (i32, i32) {
        let scale = self.scale();
        let (cx, cy) = (self.width as f64 / 2.0, self.height as f64 / 2.0);
        let px = (mercator_x(p.lng) - mercator_x(self.center.lng)) * scale + cx;
        let py = (mercator_y(p.lat) - mercator_y(self.center.lat)) * scale + cy;
        (px.round() as i32, py.round() as i32)
    }

    /// Check if a projected point is visible in the viewport
    pub fn is_visible(&self, px: i32, py: i32) -> bool {
        px >= 0 && px < self.width as i32 && py >= 0 && py < self.height as i32
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0
            && min_x < self.width as i32
            && max_y >= 0
            && min_y < self.height as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_center() {
        let vp = Viewport::new(LngLat::new(-105.0, 58.0), 3.0, 100, 100);
        assert_eq!(vp.project(LngLat::new(-105.0, 58.0)), (50, 50));
    }

    #[test]
    fn test_unproject_inverts_project() {
        let vp = Viewport::new(LngLat::new(-105.0, 58.0), 3.0, 400, 160);
        let (px, py) = vp.project(LngLat::new(-79.4, 43.7));
        let back = vp.unproject(px, py);
        // One braille pixel at zoom 3 is well under a degree
        assert!((back.lng - -79.4).abs() < 0.5);
        assert!((back.lat - 43.7).abs() < 0.5);
    }

    #[test]
    fn test_pan() {
        let mut vp = Viewport::new(LngLat::new(0.0, 0.0), 1.0, 100, 100);
        vp.pan(10, 0);
        assert!(vp.center.lng > 0.0);
        vp.pan(0, -10);
        assert!(vp.center.lat > 0.0);
    }

    #[test]
    fn test_zoom_at_keeps_anchor() {
        let mut vp = Viewport::new(LngLat::new(-105.0, 58.0), 3.0, 400, 160);
        let before = vp.unproject(300, 40);
        vp.zoom_in_at(300, 40);
        assert_eq!(vp.zoom, 3.5);
        let (px, py) = vp.project(before);
        assert!((px - 300).abs() <= 1 && (py - 40).abs() <= 1);
    }

    #[test]
    fn test_zoom_limits() {
        let mut vp = Viewport::new(LngLat::default(), MAX_ZOOM, 10, 10);
        vp.zoom_in();
        assert_eq!(vp.zoom, MAX_ZOOM);
        let mut vp = Viewport::new(LngLat::default(), MIN_ZOOM, 10, 10);
        vp.zoom_out();
        assert_eq!(vp.zoom, MIN_ZOOM);
    }
}
