use glam::DVec2;

use crate::braille::BrailleCanvas;
use crate::style::Rgb;

/// A closed ring of lon/lat vertices
pub type Ring = Vec<DVec2>;

/// Polygon rings, exterior first, holes after
pub type Polygon = Vec<Ring>;

/// Axis-aligned lon/lat bounds
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub min: DVec2,
    pub max: DVec2,
}

impl BBox {
    /// Bounds of every vertex of every polygon, `None` when there are none
    pub fn of_polygons(polygons: &[Polygon]) -> Option<Self> {
        let mut points = polygons.iter().flatten().flatten();
        let first = *points.next()?;
        let (min, max) = points.fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Some(Self { min, max })
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}

/// Even-odd point-in-polygon test over all rings, so holes are excluded
pub fn polygon_contains(polygon: &[Ring], p: DVec2) -> bool {
    let mut inside = false;
    for ring in polygon {
        if ring.len() < 3 {
            continue;
        }
        let mut prev = ring[ring.len() - 1];
        for &cur in ring {
            // Edge straddles the horizontal through p and crosses to its right
            if (cur.y > p.y) != (prev.y > p.y) {
                let t = (p.y - cur.y) / (prev.y - cur.y);
                let x = cur.x + t * (prev.x - cur.x);
                if p.x < x {
                    inside = !inside;
                }
            }
            prev = cur;
        }
    }
    inside
}

/// Liang-Barsky clip of a pixel segment to `[0, width) x [0, height)`
pub fn clip_segment(
    (x0, y0): (i32, i32),
    (x1, y1): (i32, i32),
    width: usize,
    height: usize,
) -> Option<((i32, i32), (i32, i32))> {
    let (x0f, y0f) = (x0 as f64, y0 as f64);
    let (dx, dy) = ((x1 - x0) as f64, (y1 - y0) as f64);
    let (xmax, ymax) = (width as f64 - 1.0, height as f64 - 1.0);
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;

    for (p, q) in [(-dx, x0f), (dx, xmax - x0f), (-dy, y0f), (dy, ymax - y0f)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    let at = |t: f64| {
        let (x, y) = (x0f + t * dx, y0f + t * dy);
        (x.round() as i32, y.round() as i32)
    };
    Some((at(t0), at(t1)))
}

/// Draw a line using Bresenham's algorithm
pub fn draw_line(
    canvas: &mut BrailleCanvas,
    (x0, y0): (i32, i32),
    (x1, y1): (i32, i32),
    color: Rgb,
) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y, color);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}
