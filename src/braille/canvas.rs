use crate::style::Rgb;

/// One character cell: 8 dot bits plus the color of the last stroke through it
#[derive(Clone, Copy, Default)]
struct Cell {
    dots: u8,
    color: Option<Rgb>,
}

/// Braille Unicode canvas for high-resolution terminal graphics.
/// Each character cell represents a 2x4 pixel grid (8 dots).
/// Unicode Braille patterns: U+2800 to U+28FF
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    cells: Vec<Cell>,
}

impl BrailleCanvas {
    /// Create a new canvas with the given character dimensions.
    /// Effective pixel resolution: width*2 x height*4
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::default(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Set a pixel at the given coordinates in the given color.
    /// Braille dot layout per character:
    /// ```text
    /// (0,0) (1,0)   bits: 0x01 0x08
    /// (0,1) (1,1)   bits: 0x02 0x10
    /// (0,2) (1,2)   bits: 0x04 0x20
    /// (0,3) (1,3)   bits: 0x40 0x80
    /// ```
    pub fn set_pixel(&mut self, x: usize, y: usize, color: Rgb) {
        let cx = x / 2;
        let cy = y / 4;

        if cx >= self.width || cy >= self.height {
            return;
        }

        let bit = match (x % 2, y % 4) {
            (0, 0) => 0x01,
            (1, 0) => 0x08,
            (0, 1) => 0x02,
            (1, 1) => 0x10,
            (0, 2) => 0x04,
            (1, 2) => 0x20,
            (0, 3) => 0x40,
            (1, 3) => 0x80,
            _ => 0,
        };

        let cell = &mut self.cells[cy * self.width + cx];
        cell.dots |= bit;
        cell.color = Some(color);
    }

    /// Set a pixel using signed coordinates (ignores negative values)
    pub fn set_pixel_signed(&mut self, x: i32, y: i32, color: Rgb) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize, color);
        }
    }

    /// Glyph and color at a character cell, `None` when no dot is set
    pub fn glyph(&self, cx: usize, cy: usize) -> Option<(char, Rgb)> {
        if cx >= self.width || cy >= self.height {
            return None;
        }
        let cell = self.cells[cy * self.width + cx];
        if cell.dots == 0 {
            return None;
        }
        let ch = char::from_u32(0x2800 + cell.dots as u32)?;
        Some((ch, cell.color.unwrap_or(Rgb::WHITE)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INK: Rgb = Rgb::WHITE;

    fn glyph_of(canvas: &BrailleCanvas, cx: usize) -> char {
        canvas.glyph(cx, 0).map_or('\u{2800}', |(ch, _)| ch)
    }

    #[test]
    fn test_dot_positions() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.set_pixel(0, 3, INK);
        assert_eq!(glyph_of(&canvas, 0), '\u{2840}');
        canvas.set_pixel(1, 0, INK);
        assert_eq!(glyph_of(&canvas, 0), '\u{2848}');
    }

    #[test]
    fn test_full_cell() {
        let mut canvas = BrailleCanvas::new(1, 1);
        (0..8).for_each(|i| canvas.set_pixel(i % 2, i / 2, INK));
        assert_eq!(glyph_of(&canvas, 0), '⣿');
    }

    #[test]
    fn test_pixels_land_in_their_cell() {
        let mut canvas = BrailleCanvas::new(3, 2);
        canvas.set_pixel(3, 1, INK);
        canvas.set_pixel_signed(4, 6, Rgb::BLACK);
        assert_eq!(glyph_of(&canvas, 1), '\u{2810}');
        assert_eq!(canvas.glyph(2, 1), Some(('\u{2804}', Rgb::BLACK)));
        assert_eq!(canvas.glyph(0, 0), None);
        assert_eq!((canvas.width(), canvas.height()), (3, 2));
    }

    #[test]
    fn test_last_stroke_sets_color() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.set_pixel(0, 0, Rgb(10, 10, 10));
        canvas.set_pixel(1, 0, Rgb(200, 0, 0));
        assert_eq!(canvas.glyph(0, 0), Some(('⠉', Rgb(200, 0, 0))));
        assert_eq!(BrailleCanvas::new(1, 1).glyph(0, 0), None);
    }

    #[test]
    fn test_out_of_bounds_is_ignored() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.set_pixel(2, 0, INK);
        canvas.set_pixel_signed(-1, 0, INK);
        assert_eq!(canvas.glyph(0, 0), None);
        assert_eq!(canvas.glyph(5, 5), None);
    }
}
