use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{bail, Context, Result};
use tracing::info;

use crate::panels::ControlPosition;
use crate::tiles::MAX_TILE_ZOOM;
use crate::types::LatLng;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub map: MapConfig,
    pub tiles: TileConfig,
    pub panels: PanelConfig,
    pub window: WindowConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub geojson: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    /// `[lat, lng]`
    pub center: [f64; 2],
    pub zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TileConfig {
    pub enabled: bool,
    pub url_template: String,
    pub subdomains: Vec<String>,
    pub max_zoom: u8,
    pub attribution: String,
    pub user_agent: String,
    pub workers: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PanelConfig {
    pub info: ControlPosition,
    pub legend: ControlPosition,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: f32,
    pub height: f32,
    /// Id of the element the root view is mounted into.
    pub mount_id: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { geojson: PathBuf::from("data/us-states.geojson") }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self { center: [37.8, -96.0], zoom: 4.0, min_zoom: 0.0, max_zoom: 18.0 }
    }
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            subdomains: Vec::new(),
            max_zoom: 19,
            attribution: "© OpenStreetMap contributors".to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            workers: 4,
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self { info: ControlPosition::TopRight, legend: ControlPosition::BottomRight }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "US Population Density".to_string(),
            width: 1200.0,
            height: 800.0,
            mount_id: "app".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filter: "info".to_string() }
    }
}

impl MapConfig {
    pub fn center(&self) -> LatLng {
        LatLng::new(self.center[0], self.center[1])
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise falls back to the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load_from_file(path);
        }
        info!("Config file {:?} not found, using defaults", path);
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<()> {
        let map = &self.map;
        if !(map.min_zoom >= 0.0 && map.min_zoom <= map.max_zoom) {
            bail!("map zoom range [{}, {}] is invalid", map.min_zoom, map.max_zoom);
        }
        if map.max_zoom > MAX_TILE_ZOOM as f64 {
            bail!("map.max_zoom {} is above {}", map.max_zoom, MAX_TILE_ZOOM);
        }
        if !(-90.0..=90.0).contains(&map.center[0]) || !(-180.0..=180.0).contains(&map.center[1]) {
            bail!("map center {:?} is not a valid [lat, lng]", map.center);
        }
        if self.tiles.enabled {
            for key in ["{z}", "{x}", "{y}"] {
                if !self.tiles.url_template.contains(key) {
                    bail!("tile url template is missing {}", key);
                }
            }
            if self.tiles.url_template.contains("{s}") && self.tiles.subdomains.is_empty() {
                bail!("tile url template uses {{s}} but no subdomains are configured");
            }
            if self.tiles.max_zoom > MAX_TILE_ZOOM {
                bail!("tiles.max_zoom {} is above {}", self.tiles.max_zoom, MAX_TILE_ZOOM);
            }
            if self.tiles.workers == 0 {
                bail!("tiles.workers must be at least 1");
            }
        }
        if self.window.width <= 0.0 || self.window.height <= 0.0 {
            bail!("window size must be positive");
        }
        if self.window.mount_id.is_empty() {
            bail!("window.mount_id must not be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.map.center(), LatLng::new(37.8, -96.0));
        assert_eq!(config.map.zoom, 4.0);
        assert_eq!(config.window.mount_id, "app");
        assert_eq!(config.panels.legend, ControlPosition::BottomRight);
        assert!(config.tiles.url_template.contains("openstreetmap"));
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [input]
            geojson = "states.json"

            [map]
            zoom = 3.0

            [panels]
            info = "top-left"
            "#,
        )
        .unwrap();
        assert_eq!(config.input.geojson, PathBuf::from("states.json"));
        assert_eq!(config.map.zoom, 3.0);
        assert_eq!(config.map.max_zoom, 18.0);
        assert_eq!(config.panels.info, ControlPosition::TopLeft);
        assert_eq!(config.panels.legend, ControlPosition::BottomRight);
    }

    #[test]
    fn test_validation() {
        assert!(AppConfig::from_toml("[map]\nmin_zoom = 5.0\nmax_zoom = 2.0").is_err());
        assert!(AppConfig::from_toml("[tiles]\nurl_template = \"https://x/{z}/{x}.png\"").is_err());
        assert!(AppConfig::from_toml(
            "[tiles]\nurl_template = \"https://{s}.x/{z}/{x}/{y}.png\""
        )
        .is_err());
        assert!(AppConfig::from_toml(
            "[tiles]\nenabled = false\nurl_template = \"\""
        )
        .is_ok());
        assert!(AppConfig::from_toml("[window]\nwidth = 0.0").is_err());
    }

    #[test]
    fn test_zoom_upper_bound() {
        assert!(AppConfig::from_toml("[map]\nmax_zoom = 70.0\nzoom = 70.0").is_err());
        assert!(AppConfig::from_toml("[tiles]\nmax_zoom = 70").is_err());
        assert!(AppConfig::from_toml(
            "[map]\nmax_zoom = 70.0\nzoom = 70.0\n[tiles]\nmax_zoom = 70"
        )
        .is_err());

        let config = AppConfig::from_toml("[map]\nmax_zoom = 30.0\n[tiles]\nmax_zoom = 30").unwrap();
        assert_eq!(config.tiles.max_zoom, MAX_TILE_ZOOM);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_or_default(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.logging.filter, "info");
    }
}
