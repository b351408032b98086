use std::fs;
use std::path::PathBuf;

use geojson::{feature::Id, FeatureCollection, GeoJson, Geometry, Value};
use glam::DVec2;
use thiserror::Error;

use crate::map::{polygon_contains, BBox, FeatureGrid, Polygon};
use crate::style::Properties;

use super::FeatureId;

/// Grid cell size in degrees for the per-source hit-test index
const GRID_CELL_DEGREES: f64 = 2.0;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to fetch source data: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid GeoJSON: {0}")]
    Json(#[from] simd_json::Error),
    #[error("expected a FeatureCollection, got a {0}")]
    NotFeatureCollection(&'static str),
}

/// Where a GeoJSON source gets its data
#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    Url(String),
    Path(PathBuf),
    Inline(FeatureCollection),
}

impl SourceData {
    /// `http(s)://` locations are fetched, anything else is a file path
    pub fn locate(location: &str) -> Self {
        if location.starts_with("http://") || location.starts_with("https://") {
            SourceData::Url(location.to_string())
        } else {
            SourceData::Path(PathBuf::from(location))
        }
    }

    /// Blocking load; run off the event loop for remote data
    pub fn load(&self) -> Result<FeatureCollection, SourceError> {
        match self {
            SourceData::Url(url) => {
                let body = reqwest::blocking::get(url)?.error_for_status()?.bytes()?;
                parse_collection(body.to_vec())
            }
            SourceData::Path(path) => {
                let bytes = fs::read(path).map_err(|source| SourceError::Io {
                    path: path.clone(),
                    source,
                })?;
                parse_collection(bytes)
            }
            SourceData::Inline(fc) => Ok(fc.clone()),
        }
    }
}

/// `addSource` options for a GeoJSON source
#[derive(Debug, Clone, PartialEq)]
pub struct GeoJsonSourceSpec {
    pub data: SourceData,
    /// Assign each feature its index in the collection as id
    pub generate_id: bool,
}

pub fn parse_collection(mut bytes: Vec<u8>) -> Result<FeatureCollection, SourceError> {
    match simd_json::serde::from_slice::<GeoJson>(&mut bytes)? {
        GeoJson::FeatureCollection(fc) => Ok(fc),
        GeoJson::Feature(_) => Err(SourceError::NotFeatureCollection("Feature")),
        GeoJson::Geometry(_) => Err(SourceError::NotFeatureCollection("Geometry")),
    }
}

#[derive(Debug, Clone)]
pub struct SourceFeature {
    pub id: Option<FeatureId>,
    pub properties: Properties,
    pub polygons: Vec<Polygon>,
    pub bbox: Option<BBox>,
}

impl SourceFeature {
    pub fn contains(&self, p: DVec2) -> bool {
        self.bbox.is_some_and(|b| b.contains(p))
            && self.polygons.iter().any(|poly| polygon_contains(poly, p))
    }
}

/// A loaded GeoJSON source with its hit-test index
#[derive(Debug)]
pub struct GeoJsonSource {
    features: Vec<SourceFeature>,
    grid: FeatureGrid,
}

impl GeoJsonSource {
    pub fn from_collection(fc: FeatureCollection, generate_id: bool) -> Self {
        let features: Vec<SourceFeature> = fc
            .features
            .into_iter()
            .enumerate()
            .map(|(idx, feature)| {
                let id = if generate_id {
                    Some(idx as FeatureId)
                } else {
                    match feature.id {
                        Some(Id::Number(n)) => n.as_u64(),
                        _ => None,
                    }
                };
                let mut polygons = Vec::new();
                if let Some(geometry) = &feature.geometry {
                    collect_polygons(geometry, &mut polygons);
                }
                let bbox = BBox::of_polygons(&polygons);
                SourceFeature {
                    id,
                    properties: feature.properties.unwrap_or_default(),
                    polygons,
                    bbox,
                }
            })
            .collect();
        let bboxes = features.iter().map(|f| f.bbox.as_ref());
        let grid = FeatureGrid::build(bboxes, GRID_CELL_DEGREES);
        Self { features, grid }
    }

    pub fn features(&self) -> &[SourceFeature] {
        &self.features
    }

    /// Features containing `p`, topmost (last drawn) first
    pub fn features_at(&self, p: DVec2) -> impl Iterator<Item = &SourceFeature> + '_ {
        self.grid
            .query_point(p)
            .iter()
            .rev()
            .filter_map(|&idx| self.features.get(idx))
            .filter(move |f| f.contains(p))
    }
}

fn to_ring(coords: &[Vec<f64>]) -> Vec<DVec2> {
    coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| DVec2::new(c[0], c[1]))
        .collect()
}

/// Fill layers only draw areal geometry; points and lines are skipped
fn collect_polygons(geometry: &Geometry, out: &mut Vec<Polygon>) {
    match &geometry.value {
        Value::Polygon(rings) => out.push(rings.iter().map(|r| to_ring(r)).collect()),
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                out.push(rings.iter().map(|r| to_ring(r)).collect());
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_polygons(g, out);
            }
        }
        _ => {}
    }
}
