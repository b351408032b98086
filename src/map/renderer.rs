use crate::braille::BrailleCanvas;
use crate::geo::LngLat;
use crate::map::geometry::{clip_segment, draw_line};
use crate::map::projection::Viewport;
use crate::style::Rgb;

/// A geographic line (sequence of lon/lat coordinates)
pub type LineString = Vec<LngLat>;

/// Level of detail for basemap data
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lod {
    Low,    // 110m - continental view
    Medium, // 50m - country view
    High,   // 10m - regional
}

impl Lod {
    /// Select LOD based on zoom level
    pub fn from_zoom(zoom: f64) -> Self {
        if zoom < 3.0 {
            Lod::Low
        } else if zoom < 6.0 {
            Lod::Medium
        } else {
            Lod::High
        }
    }
}

/// Background geography drawn under the data layers, Positron-like palette
pub struct Basemap {
    pub coastlines_low: Vec<LineString>,
    pub coastlines_medium: Vec<LineString>,
    pub coastlines_high: Vec<LineString>,
    pub borders: Vec<LineString>,
    pub background: Rgb,
    pub line_color: Rgb,
}

impl Basemap {
    pub fn new() -> Self {
        Self {
            coastlines_low: Vec::new(),
            coastlines_medium: Vec::new(),
            coastlines_high: Vec::new(),
            borders: Vec::new(),
            background: Rgb(250, 250, 248),
            line_color: Rgb(180, 180, 186),
        }
    }

    /// Get coastlines for the given LOD, falling back to coarser data
    fn get_coastlines(&self, lod: Lod) -> &[LineString] {
        match lod {
            Lod::High if !self.coastlines_high.is_empty() => &self.coastlines_high,
            Lod::High | Lod::Medium if !self.coastlines_medium.is_empty() => {
                &self.coastlines_medium
            }
            _ => &self.coastlines_low,
        }
    }

    /// Draw basemap lines visible at the viewport's zoom
    pub fn draw(&self, canvas: &mut BrailleCanvas, viewport: &Viewport) {
        let lod = Lod::from_zoom(viewport.zoom);
        for line in self.get_coastlines(lod).iter().chain(&self.borders) {
            draw_linestring(canvas, line.iter().copied(), viewport, self.line_color);
        }
    }

    pub fn add_coastline(&mut self, line: LineString, lod: Lod) {
        match lod {
            Lod::Low => self.coastlines_low.push(line),
            Lod::Medium => self.coastlines_medium.push(line),
            Lod::High => self.coastlines_high.push(line),
        }
    }

    pub fn add_border(&mut self, line: LineString) {
        self.borders.push(line);
    }

    /// Check if any data is loaded
    pub fn has_data(&self) -> bool {
        !self.coastlines_low.is_empty()
            || !self.coastlines_medium.is_empty()
            || !self.coastlines_high.is_empty()
    }
}

impl Default for Basemap {
    fn default() -> Self {
        Self::new()
    }
}

/// Draw a linestring, clipping each segment to the viewport
pub fn draw_linestring(
    canvas: &mut BrailleCanvas,
    line: impl IntoIterator<Item = LngLat>,
    viewport: &Viewport,
    color: Rgb,
) {
    let mut prev: Option<(LngLat, (i32, i32))> = None;

    for p in line {
        let cur = viewport.project(p);

        if let Some((prev_p, prev_px)) = prev {
            // Segments crossing the antimeridian would smear across the map
            let wraps = (p.lng - prev_p.lng).abs() > 180.0;
            if !wraps && viewport.line_might_be_visible(prev_px, cur) {
                if let Some((a, b)) = clip_segment(prev_px, cur, viewport.width, viewport.height) {
                    draw_line(canvas, a, b, color);
                }
            }
        }

        prev = Some((p, cur));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lod_thresholds() {
        assert_eq!(Lod::from_zoom(0.0), Lod::Low);
        assert_eq!(Lod::from_zoom(3.0), Lod::Medium);
        assert_eq!(Lod::from_zoom(8.0), Lod::High);
    }

    #[test]
    fn test_coastline_fallback() {
        let mut basemap = Basemap::new();
        basemap.add_coastline(vec![LngLat::new(0.0, 0.0), LngLat::new(1.0, 1.0)], Lod::Low);
        assert!(basemap.has_data());
        assert_eq!(basemap.get_coastlines(Lod::High).len(), 1);

        let medium = vec![LngLat::new(0.0, 0.0), LngLat::new(2.0, 2.0)];
        basemap.add_coastline(medium, Lod::Medium);
        let high = basemap.get_coastlines(Lod::High);
        assert_eq!(high[0][1], LngLat::new(2.0, 2.0));
        let low = basemap.get_coastlines(Lod::Low);
        assert_eq!(low[0][1], LngLat::new(1.0, 1.0));
    }

    #[test]
    fn test_draw_visible_line() {
        let mut basemap = Basemap::new();
        basemap.add_border(vec![LngLat::new(-110.0, 58.0), LngLat::new(-100.0, 58.0)]);
        let viewport = Viewport::new(LngLat::new(-105.0, 58.0), 3.0, 80, 40);
        let mut canvas = BrailleCanvas::new(40, 10);
        basemap.draw(&mut canvas, &viewport);
        let row = 20 / 4;
        assert!(canvas.glyph(20, row).is_some());
    }
}
