//! View composition and mounting

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::ViewError;
use crate::map::MapView;
use crate::overlay::{LayerId, OverlayController};
use crate::panels::{InfoPanel, LegendPanel};
use crate::scale::ColorScale;
use crate::state::HoverState;
use crate::tiles::TileLayer;
use crate::types::Feature;

/// Work queued to run once the view has a real canvas size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    InvalidateSize,
}

pub struct ChoroplethView {
    pub map: MapView,
    pub tiles: TileLayer,
    pub overlay: OverlayController,
    pub info: InfoPanel,
    pub legend: LegendPanel,
    tiles_enabled: bool,
    deferred: VecDeque<Deferred>,
}

impl ChoroplethView {
    pub fn build(features: Vec<Feature>, config: &AppConfig) -> Self {
        let scale = ColorScale::DENSITY;
        let map = MapView::new(
            config.map.center(),
            config.map.zoom,
            config.map.min_zoom,
            config.map.max_zoom,
        );
        let tiles = TileLayer::from_config(&config.tiles);

        let hover = HoverState::new();
        let info = InfoPanel::mount(hover.reader()).at(config.panels.info);
        let overlay = OverlayController::new(features, scale, hover);
        let legend = LegendPanel::new(&scale).at(config.panels.legend);

        debug!(layers = overlay.len(), "choropleth view built");

        Self {
            map,
            tiles,
            overlay,
            info,
            legend,
            tiles_enabled: config.tiles.enabled,
            deferred: VecDeque::from([Deferred::InvalidateSize]),
        }
    }

    pub fn tiles_enabled(&self) -> bool {
        self.tiles_enabled
    }

    pub fn has_deferred(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Runs queued tasks against the canvas size known after first layout.
    pub fn run_deferred(&mut self, size: [f64; 2]) -> usize {
        let mut ran = 0;
        while let Some(task) = self.deferred.pop_front() {
            match task {
                Deferred::InvalidateSize => {
                    self.map.invalidate_size(size);
                }
            }
            ran += 1;
        }
        ran
    }

    pub fn pointer_moved(&mut self, screen: Option<[f64; 2]>) {
        let p = screen.map(|s| self.map.from_screen(s));
        self.overlay.pointer_moved(p, &mut self.map);
    }

    pub fn clicked(&mut self, screen: [f64; 2]) -> Option<LayerId> {
        let p = self.map.from_screen(screen);
        self.overlay.click_at(p, &mut self.map)
    }
}

/// Named attachment point that accepts a single root view.
pub struct MountPoint {
    id: String,
    root: Option<ChoroplethView>,
}

impl MountPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), root: None }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attach(&mut self, view: ChoroplethView) -> Result<&mut ChoroplethView, ViewError> {
        if self.root.is_some() {
            return Err(ViewError::AlreadyMounted(self.id.clone()));
        }
        info!(mount = %self.id, "mounting root view");
        Ok(self.root.insert(view))
    }

    pub fn view_mut(&mut self) -> Option<&mut ChoroplethView> {
        self.root.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::parse_features;
    use crate::types::LatLng;

    const STATES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "Alaska", "density": 1.26 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-168.0, 71.0], [-141.0, 71.0], [-141.0, 55.0], [-168.0, 55.0], [-168.0, 71.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Colorado", "density": 49.33 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-109.05, 41.0], [-102.05, 41.0], [-102.05, 37.0], [-109.05, 37.0], [-109.05, 41.0]]]
                }
            }
        ]
    }"#;

    fn view() -> ChoroplethView {
        let mut config = AppConfig::default();
        config.map.zoom = 2.0;
        config.map.center = [50.0, -120.0];
        let mut view = ChoroplethView::build(parse_features(STATES).unwrap(), &config);
        view.run_deferred([800.0, 600.0]);
        view
    }

    #[test]
    fn test_deferred_runs_once() {
        let mut view = ChoroplethView::build(Vec::new(), &AppConfig::default());
        assert!(view.has_deferred());
        assert_eq!(view.map.size(), [0.0, 0.0]);
        assert_eq!(view.run_deferred([640.0, 480.0]), 1);
        assert_eq!(view.map.size(), [640.0, 480.0]);
        assert_eq!(view.run_deferred([10.0, 10.0]), 0);
        assert_eq!(view.map.size(), [640.0, 480.0]);
    }

    #[test]
    fn test_mount_once() {
        let mut mount = MountPoint::new("app");
        assert!(mount.view_mut().is_none());
        mount.attach(ChoroplethView::build(Vec::new(), &AppConfig::default())).unwrap();
        let second = mount.attach(ChoroplethView::build(Vec::new(), &AppConfig::default()));
        assert_eq!(second.err(), Some(ViewError::AlreadyMounted("app".to_string())));
        assert_eq!(mount.id(), "app");
    }

    #[test]
    fn test_hover_alaska_end_to_end() {
        let mut view = view();
        assert_eq!(view.info.text(), "Hover over a state");

        let over_alaska = view.map.to_screen(LatLng::new(63.0, -150.0));
        view.pointer_moved(Some(over_alaska));
        assert_eq!(view.info.text(), "Alaska: 1.26 people / mi²");

        view.pointer_moved(None);
        assert_eq!(view.info.text(), "Hover over a state");
    }

    #[test]
    fn test_click_zooms_without_hover_change() {
        let mut view = view();
        let zoom = view.map.zoom();
        let over_colorado = view.map.to_screen(LatLng::new(39.0, -105.5));
        let hit = view.clicked(over_colorado);

        assert_eq!(hit, view.overlay.find("Colorado"));
        assert!(view.map.zoom() > zoom);
        assert!((view.map.center().lng - -105.55).abs() < 1e-6);
        assert_eq!(view.info.text(), "Hover over a state");
    }

    #[test]
    fn test_bundled_config_and_dataset() {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
        let config = AppConfig::load_from_file(&root.join("config.toml")).unwrap();
        let features = crate::data::load_features(&root.join(&config.input.geojson)).unwrap();
        let mut view = ChoroplethView::build(features, &config);

        view.overlay.pointer_moved(Some(LatLng::new(63.0, -150.0)), &mut view.map);
        assert_eq!(view.info.text(), "Alaska: 1.264 people / mi²");
        view.overlay.pointer_moved(Some(LatLng::new(39.0, -105.5)), &mut view.map);
        assert_eq!(view.info.text(), "Colorado: 49.33 people / mi²");
        view.overlay.pointer_moved(Some(LatLng::new(40.5, -77.0)), &mut view.map);
        assert_eq!(view.info.text(), "Pennsylvania: 284.3 people / mi²");
        view.overlay.pointer_moved(Some(LatLng::new(0.0, 0.0)), &mut view.map);
        assert_eq!(view.info.text(), "Hover over a state");
    }

    #[test]
    fn test_panels_follow_config() {
        let mut config = AppConfig::default();
        config.panels.legend = crate::panels::ControlPosition::BottomLeft;
        let view = ChoroplethView::build(Vec::new(), &config);
        assert_eq!(view.legend.position(), crate::panels::ControlPosition::BottomLeft);
        assert_eq!(view.legend.entries().len(), 8);
        assert!(view.tiles_enabled());
    }
}
