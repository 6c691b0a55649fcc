//! Interactive polygon overlay
//!
//! The controller owns every polygon layer. Event handlers address layers by
//! [`LayerId`], an index into the controller's layer table, so nothing holds
//! a reference back into the controller.

use geo::{BoundingRect, Contains, Point};
use rstar::{RTree, RTreeObject, AABB};
use tracing::{debug, trace};

use crate::error::ViewError;
use crate::map::MapHost;
use crate::scale::{Color, ColorScale};
use crate::state::HoverState;
use crate::types::{Bounds, Feature, FeatureProps, LatLng};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(usize);

impl LayerId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStyle {
    pub fill_color: Color,
    pub fill_opacity: f32,
    pub color: Color,
    pub opacity: f32,
    pub weight: f32,
    /// Dash and gap length in pixels; `None` draws a solid line.
    pub dash: Option<f32>,
}

impl PathStyle {
    fn highlighted(self) -> Self {
        Self {
            weight: 5.0,
            color: Color::HIGHLIGHT,
            opacity: 1.0,
            dash: None,
            fill_opacity: 0.7,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerEvent {
    HoverEnter,
    HoverExit,
    Activate,
}

#[derive(Debug, Clone)]
pub struct PolygonLayer {
    pub feature: Feature,
    pub style: PathStyle,
    pub bounds: Bounds,
}

// Wrapper for RTree indexing
struct LayerEnvelope {
    id: LayerId,
    aabb: AABB<[f64; 2]>,
}

impl RTreeObject for LayerEnvelope {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.aabb
    }
}

pub struct OverlayController {
    scale: ColorScale,
    layers: Vec<PolygonLayer>,
    /// Bottom to top.
    draw_order: Vec<LayerId>,
    tree: RTree<LayerEnvelope>,
    hover: HoverState,
    hovered: Option<LayerId>,
}

impl OverlayController {
    pub fn new(features: Vec<Feature>, scale: ColorScale, hover: HoverState) -> Self {
        let mut layers = Vec::with_capacity(features.len());
        for feature in features {
            let Some(bounds) = feature.geometry.bounding_rect() else {
                debug!(name = %feature.props.name, "skipping feature with empty geometry");
                continue;
            };
            let style = base_style(&scale, &feature.props);
            layers.push(PolygonLayer { feature, style, bounds });
        }

        let tree_items: Vec<LayerEnvelope> = layers
            .iter()
            .enumerate()
            .map(|(i, layer)| LayerEnvelope {
                id: LayerId(i),
                aabb: AABB::from_corners(
                    [layer.bounds.min().x, layer.bounds.min().y],
                    [layer.bounds.max().x, layer.bounds.max().y],
                ),
            })
            .collect();

        let draw_order = (0..layers.len()).map(LayerId).collect();
        debug!(layers = layers.len(), "overlay built");

        Self {
            scale,
            layers,
            draw_order,
            tree: RTree::bulk_load(tree_items),
            hover,
            hovered: None,
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layer(&self, id: LayerId) -> Option<&PolygonLayer> {
        self.layers.get(id.0)
    }

    pub fn hovered(&self) -> Option<LayerId> {
        self.hovered
    }

    /// Layers bottom to top.
    pub fn drawn(&self) -> impl Iterator<Item = (LayerId, &PolygonLayer)> + '_ {
        self.draw_order.iter().map(|&id| (id, &self.layers[id.0]))
    }

    pub fn find(&self, name: &str) -> Option<LayerId> {
        self.layers
            .iter()
            .position(|l| l.feature.props.name == name)
            .map(LayerId)
    }

    pub fn dispatch(
        &mut self,
        id: LayerId,
        event: LayerEvent,
        host: &mut dyn MapHost,
    ) -> Result<(), ViewError> {
        if id.0 >= self.layers.len() {
            return Err(ViewError::UnknownLayer(id));
        }
        trace!(?id, ?event, "layer event");
        match event {
            LayerEvent::HoverEnter => self.hover_enter(id),
            LayerEvent::HoverExit => self.hover_exit(id),
            LayerEvent::Activate => self.activate(id, host),
        }
        Ok(())
    }

    fn hover_enter(&mut self, id: LayerId) {
        let layer = &mut self.layers[id.0];
        layer.style = layer.style.highlighted();
        let props = layer.feature.props.clone();
        self.bring_to_front(id);
        self.hovered = Some(id);
        self.hover.set(Some(props));
    }

    fn hover_exit(&mut self, id: LayerId) {
        let layer = &mut self.layers[id.0];
        layer.style = base_style(&self.scale, &layer.feature.props);
        if self.hovered == Some(id) {
            self.hovered = None;
        }
        self.hover.clear();
    }

    fn activate(&self, id: LayerId, host: &mut dyn MapHost) {
        host.fit_bounds(self.layers[id.0].bounds);
    }

    fn bring_to_front(&mut self, id: LayerId) {
        if let Some(pos) = self.draw_order.iter().position(|&l| l == id) {
            self.draw_order.remove(pos);
            self.draw_order.push(id);
        }
    }

    /// Top-most layer containing `p`.
    pub fn layer_at(&self, p: LatLng) -> Option<LayerId> {
        let point = Point::new(p.lng, p.lat);
        let envelope = AABB::from_point([p.lng, p.lat]);

        let hits: Vec<LayerId> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|c| c.id)
            .filter(|id| self.layers[id.0].feature.geometry.contains(&point))
            .collect();

        self.draw_order.iter().rev().find(|id| hits.contains(id)).copied()
    }

    /// Turns a pointer position (or its absence) into exit/enter events.
    pub fn pointer_moved(&mut self, p: Option<LatLng>, host: &mut dyn MapHost) {
        let target = p.and_then(|p| self.layer_at(p));
        if target == self.hovered {
            return;
        }
        if let Some(old) = self.hovered {
            // ids in `hovered` always come from this table
            let _ = self.dispatch(old, LayerEvent::HoverExit, host);
        }
        if let Some(new) = target {
            let _ = self.dispatch(new, LayerEvent::HoverEnter, host);
        }
    }

    /// Activates the layer under `p`, if any.
    pub fn click_at(&mut self, p: LatLng, host: &mut dyn MapHost) -> Option<LayerId> {
        let id = self.layer_at(p)?;
        let _ = self.dispatch(id, LayerEvent::Activate, host);
        Some(id)
    }
}

pub fn base_style(scale: &ColorScale, props: &FeatureProps) -> PathStyle {
    PathStyle {
        fill_color: scale.classify(props.density),
        fill_opacity: 0.7,
        color: Color::WHITE,
        opacity: 1.0,
        weight: 2.0,
        dash: Some(3.0),
    }
}
