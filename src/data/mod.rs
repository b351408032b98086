use crate::geo::LngLat;
use crate::map::{Basemap, LineString, Lod};
use anyhow::{Context, Result};
use geojson::{GeoJson, Geometry, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Coastline files by resolution, coarsest first
const COASTLINE_FILES: [(&str, Lod); 4] = [
    ("ne_110m_coastline.json", Lod::Low),
    ("natural-earth.json", Lod::Medium),
    ("ne_50m_coastline.json", Lod::Medium),
    ("ne_10m_coastline.json", Lod::High),
];

const BORDER_FILES: [&str; 2] = [
    "ne_50m_admin_0_boundary_lines_land.json",
    "ne_50m_borders.json",
];

/// Build the basemap from whatever Natural Earth files exist in `data_dir`,
/// falling back to a coarse outline of North America
pub fn load_basemap(data_dir: &Path) -> Basemap {
    let mut basemap = Basemap::new();

    if data_dir.is_dir() {
        for (filename, lod) in COASTLINE_FILES {
            let path = data_dir.join(filename);
            if path.exists() {
                if let Err(e) = load_lines(&path, |line| basemap.add_coastline(line, lod)) {
                    warn!(file = filename, error = %format!("{e:#}"), "skipping coastline data");
                }
            }
        }

        for filename in BORDER_FILES {
            let path = data_dir.join(filename);
            if path.exists() {
                if let Err(e) = load_lines(&path, |line| basemap.add_border(line)) {
                    warn!(file = filename, error = %format!("{e:#}"), "skipping border data");
                }
            }
        }
    }

    if !basemap.has_data() {
        debug!(dir = ?data_dir, "no basemap data found, using built-in outline");
        add_simple_outline(&mut basemap);
    }
    basemap
}

fn load_lines<F>(path: &Path, add_line: F) -> Result<()>
where
    F: FnMut(LineString),
{
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading {:?}", path))?;
    let geojson: GeoJson = content
        .parse()
        .with_context(|| format!("parsing {:?}", path))?;
    process_geojson_lines(&geojson, add_line);
    Ok(())
}

/// Process GeoJSON and extract line features
fn process_geojson_lines<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(LineString),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    process_geometry_lines(geometry, &mut add_line);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                process_geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => {
            process_geometry_lines(geometry, &mut add_line);
        }
    }
}

fn to_line(coords: &[Vec<f64>]) -> LineString {
    coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| LngLat::new(c[0], c[1]))
        .collect()
}

fn process_geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(LineString),
{
    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => {
            for coords in lines {
                add_line(to_line(coords));
            }
        }
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add_line(to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    add_line(to_line(exterior));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                process_geometry_lines(g, add_line);
            }
        }
        _ => {}
    }
}

fn outline(points: &[(f64, f64)]) -> LineString {
    points
        .iter()
        .map(|&(lng, lat)| LngLat::new(lng, lat))
        .collect()
}

/// Simplified North American coastline and the Canada/US border
fn add_simple_outline(basemap: &mut Basemap) {
    basemap.add_coastline(
        outline(&[
            (-168.0, 65.0),
            (-166.0, 60.0),
            (-141.0, 60.0),
            (-130.0, 55.0),
            (-125.0, 48.0),
            (-124.0, 40.0),
            (-117.0, 32.0),
            (-110.0, 25.0),
            (-97.0, 25.0),
            (-97.0, 28.0),
            (-82.0, 24.0),
            (-80.0, 25.0),
            (-81.0, 31.0),
            (-75.0, 35.0),
            (-70.0, 41.0),
            (-67.0, 45.0),
            (-65.0, 47.0),
            (-55.0, 47.0),
            (-52.0, 47.0),
            (-55.0, 52.0),
            (-58.0, 55.0),
            (-64.0, 60.0),
            (-73.0, 62.0),
            (-80.0, 63.0),
            (-95.0, 62.0),
            (-110.0, 68.0),
            (-130.0, 70.0),
            (-145.0, 70.0),
            (-168.0, 65.0),
        ]),
        Lod::Low,
    );

    // Hudson Bay
    basemap.add_coastline(
        outline(&[
            (-95.0, 59.0),
            (-93.0, 57.0),
            (-88.0, 56.0),
            (-82.5, 55.0),
            (-80.0, 51.5),
            (-78.5, 55.0),
            (-77.0, 60.0),
            (-78.0, 62.5),
            (-86.0, 64.0),
            (-94.0, 61.5),
            (-95.0, 59.0),
        ]),
        Lod::Low,
    );

    basemap.add_border(outline(&[
        (-123.0, 49.0),
        (-95.2, 49.0),
        (-89.6, 48.0),
        (-84.5, 46.5),
        (-82.4, 45.0),
        (-82.5, 42.3),
        (-79.0, 43.3),
        (-76.0, 44.2),
        (-74.7, 45.0),
        (-71.5, 45.0),
        (-69.2, 47.4),
        (-67.8, 47.1),
        (-67.8, 45.6),
        (-67.0, 44.8),
    ]));
    basemap.add_border(outline(&[(-141.0, 60.0), (-141.0, 69.6)]));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_yields_exterior_only() {
        let geojson: GeoJson = r#"{"type": "Feature", "properties": {},
            "geometry": {"type": "Polygon", "coordinates": [
                [[0,0],[10,0],[10,10],[0,0]],
                [[2,2],[3,2],[3,3],[2,2]]]}}"#
            .parse()
            .unwrap();
        let mut lines = Vec::new();
        process_geojson_lines(&geojson, |line| lines.push(line));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0][1], LngLat::new(10.0, 0.0));
    }

    #[test]
    fn test_multilinestring_in_collection() {
        let geojson: GeoJson = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": null,
             "geometry": {"type": "MultiLineString", "coordinates": [
                [[-120,49],[-110,49]], [[-100,49],[-95,49],[-90,48]]]}},
            {"type": "Feature", "properties": null,
             "geometry": {"type": "Point", "coordinates": [-75, 45]}}]}"#
            .parse()
            .unwrap();
        let mut lines = Vec::new();
        process_geojson_lines(&geojson, |line| lines.push(line));
        assert_eq!(lines.iter().map(Vec::len).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_missing_dir_falls_back_to_outline() {
        let basemap = load_basemap(Path::new("/nonexistent/basemap"));
        assert!(basemap.has_data());
        assert!(!basemap.borders.is_empty());
    }

    #[test]
    fn test_loads_files_by_lod_and_skips_bad_ones() {
        let dir = std::env::temp_dir().join(format!("provmap-basemap-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("ne_10m_coastline.json"),
            r#"{"type": "LineString", "coordinates": [[-80,60],[-70,62]]}"#,
        )
        .unwrap();
        fs::write(dir.join("ne_110m_coastline.json"), "not json").unwrap();

        let basemap = load_basemap(&dir);
        assert_eq!(basemap.coastlines_high.len(), 1);
        assert!(basemap.coastlines_low.is_empty());
        // Real data present, so no built-in border either
        assert!(basemap.borders.is_empty());
        let _ = fs::remove_dir_all(&dir);
    }
}
