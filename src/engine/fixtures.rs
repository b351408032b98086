//! Shared test data: four simplified provinces on a small map.

use serde_json::json;

use crate::geo::LngLat;
use crate::map::Basemap;
use crate::style::LayerSpec;

use super::source::parse_collection;
use super::{GeoJsonSourceSpec, MapEngine, MapView, SourceData, TerminalEngine};

pub const SOURCE: &str = "canada-provterr";
pub const LAYER: &str = "provterr-fill";

pub const ALBERTA: LngLat = LngLat::new(-115.0, 54.5);
pub const ONTARIO: LngLat = LngLat::new(-85.0, 49.0);
pub const QUEBEC: LngLat = LngLat::new(-65.0, 53.0);
pub const YUKON: LngLat = LngLat::new(-132.5, 64.5);
pub const OUTSIDE: LngLat = LngLat::new(-102.0, 52.0);

/// Ids are generated in this order: Alberta 0, Ontario 1, Québec 2, Yukon 3
pub const PROVINCES_GEOJSON: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature",
         "properties": {"PRENAME": "Alberta", "POP2021": 4262635},
         "geometry": {"type": "Polygon", "coordinates":
            [[[-120,49],[-110,49],[-110,60],[-120,60],[-120,49]]]}},
        {"type": "Feature",
         "properties": {"PRENAME": "Ontario", "POP2021": 14223942},
         "geometry": {"type": "Polygon", "coordinates":
            [[[-95,42],[-74,42],[-74,56],[-95,56],[-95,42]]]}},
        {"type": "Feature",
         "properties": {"PRENAME": "Québec", "POP2021": 8501833},
         "geometry": {"type": "MultiPolygon", "coordinates":
            [[[[-74,45],[-57,45],[-57,62],[-74,62],[-74,45]]]]}},
        {"type": "Feature",
         "properties": {"PRENAME": "Yukon", "POP2021": 40232},
         "geometry": {"type": "Polygon", "coordinates":
            [[[-141,60],[-124,60],[-124,69],[-141,69],[-141,60]]]}}
    ]
}"#;

pub fn map_view() -> MapView {
    MapView {
        container: "map".into(),
        style: "test".into(),
        center: LngLat::new(-105.0, 58.0),
        zoom: 3.0,
    }
}

pub fn fill_layer() -> LayerSpec {
    serde_json::from_value(json!({
        "id": LAYER,
        "type": "fill",
        "source": SOURCE,
        "paint": {
            "fill-color": ["step", ["get", "POP2021"], "#fd8d3c",
                100000, "#fc4e2a", 500000, "#e31a1c", 1000000, "#bd0026", 5000000, "#800026"],
            "fill-opacity": ["case", ["boolean", ["feature-state", "hover"], false], 1, 0.5],
            "fill-outline-color": "white"
        }
    }))
    .expect("fixture layer is valid")
}

pub fn provinces_source() -> GeoJsonSourceSpec {
    let fc = parse_collection(PROVINCES_GEOJSON.as_bytes().to_vec())
        .expect("fixture GeoJSON is valid");
    GeoJsonSourceSpec {
        data: SourceData::Inline(fc),
        generate_id: true,
    }
}

/// 200x40 character map centered on Canada, nothing registered
pub fn bare_engine() -> TerminalEngine {
    TerminalEngine::new(&map_view(), Basemap::new(), 400, 160)
}

/// Engine with the provinces source and the fill layer already added
pub fn engine_with_provinces() -> TerminalEngine {
    let mut engine = bare_engine();
    engine.add_source(SOURCE, provinces_source());
    engine.add_layer(fill_layer());
    engine
}

pub fn pixel_of(engine: &TerminalEngine, p: LngLat) -> (i32, i32) {
    engine.viewport().project(p)
}
