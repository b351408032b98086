mod geometry;
mod projection;
mod renderer;
mod spatial;

pub use geometry::{draw_line, polygon_contains, BBox, Polygon, Ring};
pub use projection::Viewport;
pub use renderer::{draw_linestring, Basemap, LineString, Lod};
pub use spatial::FeatureGrid;
