use glam::DVec2;
use rayon::prelude::*;

use crate::braille::BrailleCanvas;
use crate::geo::LngLat;
use crate::map::{draw_linestring, Basemap, Viewport};
use crate::style::{EvalContext, FeatureState, LayerSpec, Rgb};

use super::terminal::{FeatureStates, Sources};
use super::SourceFeature;

/// One rendered map picture: a background color per character cell and a
/// braille stroke layer (basemap lines and polygon outlines) on top.
pub struct MapFrame {
    cols: usize,
    rows: usize,
    fills: Vec<Rgb>,
    strokes: BrailleCanvas,
}

impl MapFrame {
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn fill(&self, cx: usize, cy: usize) -> Option<Rgb> {
        if cx >= self.cols {
            return None;
        }
        self.fills.get(cy * self.cols + cx).copied()
    }

    pub fn stroke(&self, cx: usize, cy: usize) -> Option<(char, Rgb)> {
        self.strokes.glyph(cx, cy)
    }
}

/// Borrowed engine state needed to draw a frame
pub(super) struct Scene<'a> {
    pub basemap: &'a Basemap,
    pub layers: &'a [LayerSpec],
    pub sources: &'a Sources,
    pub states: &'a FeatureStates,
    pub viewport: &'a Viewport,
}

impl Scene<'_> {
    fn state_of<'s>(
        &'s self,
        source: &str,
        feature: &SourceFeature,
        empty: &'s FeatureState,
    ) -> &'s FeatureState {
        feature
            .id
            .and_then(|id| self.states.get(source)?.get(&id))
            .unwrap_or(empty)
    }

    /// Composite every visible fill layer, bottom to top, over the background
    fn fill_at(&self, p: DVec2, empty: &FeatureState) -> Rgb {
        let mut color = self.basemap.background;
        for layer in self.layers.iter().filter(|l| l.is_visible()) {
            let Some(source) = self.sources.get(&layer.source).and_then(|s| s.ready()) else {
                continue;
            };
            let hit = source.features_at(p).find_map(|feature| {
                let ctx = EvalContext {
                    properties: &feature.properties,
                    state: self.state_of(&layer.source, feature, empty),
                };
                layer.passes_filter(&ctx).then(|| layer.paint.resolve(&ctx))
            });
            if let Some(fill) = hit {
                color = fill.color.over(color, fill.opacity);
            }
        }
        color
    }

    pub fn render(&self, cols: usize, rows: usize) -> MapFrame {
        let empty = FeatureState::new();
        let viewport = self.viewport;

        // Sample each character cell at its center pixel
        let fills: Vec<Rgb> = (0..rows)
            .into_par_iter()
            .map(|cy| {
                (0..cols)
                    .map(|cx| {
                        let p = viewport.unproject((cx * 2 + 1) as i32, (cy * 4 + 2) as i32);
                        self.fill_at(DVec2::new(p.lng, p.lat), &empty)
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .concat();

        let mut strokes = BrailleCanvas::new(cols, rows);
        self.basemap.draw(&mut strokes, viewport);

        for layer in self.layers.iter().filter(|l| l.is_visible()) {
            let Some(source) = self.sources.get(&layer.source).and_then(|s| s.ready()) else {
                continue;
            };
            for feature in source.features() {
                let ctx = EvalContext {
                    properties: &feature.properties,
                    state: self.state_of(&layer.source, feature, &empty),
                };
                if !layer.passes_filter(&ctx) {
                    continue;
                }
                let outline = layer.paint.resolve(&ctx).outline;
                for ring in feature.polygons.iter().flatten() {
                    let line = ring.iter().map(|v| LngLat::new(v.x, v.y));
                    draw_linestring(&mut strokes, line, viewport, outline);
                }
            }
        }

        MapFrame {
            cols,
            rows,
            fills,
            strokes,
        }
    }
}
