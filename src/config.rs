use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::controller::ControllerSettings;
use crate::engine::{GeoJsonSourceSpec, MapView, SourceData};
use crate::geo::LngLat;

pub const DEFAULT_CONFIG_FILE: &str = "provmap.toml";

/// Statistics Canada province and territory boundaries
const PROVINCES_URL: &str =
    "https://raw.githubusercontent.com/smith-lg/webmap-demo/refs/heads/main/data/can-provterr.geojson";

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub view: ViewConfig,
    pub source: SourceConfig,
    pub layer: LayerConfig,
    pub ui: UiConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ViewConfig {
    pub container: String,
    pub style: String,
    /// `[lng, lat]`
    pub center: LngLat,
    pub zoom: f64,
    /// Directory searched for Natural Earth coastline/border GeoJSON
    pub basemap_dir: PathBuf,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            container: "map".into(),
            style: "https://basemaps.cartocdn.com/gl/positron-gl-style/style.json".into(),
            center: LngLat::new(-105.0, 58.0),
            zoom: 3.0,
            basemap_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    pub id: String,
    /// URL or local path of the GeoJSON FeatureCollection
    pub data: String,
    pub generate_id: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            id: "canada-provterr".into(),
            data: PROVINCES_URL.into(),
            generate_id: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LayerConfig {
    pub id: String,
    pub name_property: String,
    pub population_property: String,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            id: "provterr-fill".into(),
            name_property: "PRENAME".into(),
            population_property: "POP2021".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    /// Dropdown entries after the leading "All"
    pub boundary_options: Vec<String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        let names = [
            "British Columbia",
            "Alberta",
            "Saskatchewan",
            "Manitoba",
            "Ontario",
            "Quebec",
            "New Brunswick",
            "Nova Scotia",
            "Prince Edward Island",
            "Newfoundland and Labrador",
            "Yukon",
            "Northwest Territories",
            "Nunavut",
        ];
        Self {
            boundary_options: names.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub file: PathBuf,
    /// `tracing_subscriber::EnvFilter` directives
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("provmap.log"),
            filter: "info".into(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Read `path` when it exists, otherwise fall back to the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn map_view(&self) -> MapView {
        MapView {
            container: self.view.container.clone(),
            style: self.view.style.clone(),
            center: self.view.center,
            zoom: self.view.zoom,
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            view: self.map_view(),
            source_id: self.source.id.clone(),
            source: GeoJsonSourceSpec {
                data: SourceData::locate(&self.source.data),
                generate_id: self.source.generate_id,
            },
            layer_id: self.layer.id.clone(),
            name_property: self.layer.name_property.clone(),
            population_property: self.layer.population_property.clone(),
        }
    }
}
