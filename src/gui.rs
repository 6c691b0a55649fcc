//! Native map window using egui
//!
//! Hosts the choropleth view: paints tiles and polygons, feeds pointer input
//! to the overlay, and shows the info and legend panels as floating areas.

use std::sync::Arc;

use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Rect, RichText, Sense, Shape, Stroke, TextureHandle, Vec2};
use geo::{coord, MapCoords, Polygon, TriangulateEarcut};
use tracing::{info, warn};

use crate::app::{ChoroplethView, MountPoint};
use crate::config::AppConfig;
use crate::map::{project, MapView};
use crate::overlay::{OverlayController, PathStyle};
use crate::panels::{format_density, ControlPosition, InfoContent};
use crate::scale::Color;
use crate::tiles::{TileFetcher, TileSlot, TileSlots};
use crate::types::{Feature, LatLng};

/// Run the native map window
pub fn run_viewer(config: AppConfig, features: Vec<Feature>) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window.width, config.window.height])
            .with_title(config.window.title.clone()),
        ..Default::default()
    };

    let title = config.window.title.clone();
    eframe::run_native(
        &title,
        options,
        Box::new(|cc| Ok(Box::new(MapApp::new(cc, config, features)?))),
    ).map_err(|e| anyhow::anyhow!("GUI error: {}", e))
}

/// Fill triangles and outline rings in normalized Mercator space.
struct PolygonMesh {
    triangles: Vec<[[f64; 2]; 3]>,
    rings: Vec<Vec<[f64; 2]>>,
}

struct MapApp {
    mount: MountPoint,
    meshes: Vec<PolygonMesh>,
    fetcher: Option<TileFetcher>,
    tiles: TileSlots<TextureHandle>,
}

impl MapApp {
    fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        features: Vec<Feature>,
    ) -> anyhow::Result<Self> {
        cc.egui_ctx.set_visuals(egui::Visuals::light());

        let mut mount = MountPoint::new(config.window.mount_id.clone());
        let view = mount.attach(ChoroplethView::build(features, &config))?;
        let meshes = build_meshes(&view.overlay);

        let fetcher = if view.tiles_enabled() {
            let ctx = cc.egui_ctx.clone();
            match TileFetcher::spawn(&config.tiles, Arc::new(move || ctx.request_repaint())) {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!("Background tiles unavailable: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

        info!(layers = meshes.len(), "map window ready");

        Ok(Self {
            mount,
            meshes,
            fetcher,
            tiles: TileSlots::default(),
        })
    }

    fn receive_tiles(&mut self, ctx: &egui::Context) {
        let Some(fetcher) = self.fetcher.as_mut() else { return };
        for result in fetcher.drain() {
            self.tiles.resolve(result, |id, img| {
                let size = [img.width() as usize, img.height() as usize];
                let color = egui::ColorImage::from_rgba_unmultiplied(size, img.as_raw());
                let name = format!("tile-{}-{}-{}", id.z, id.x, id.y);
                ctx.load_texture(name, color, egui::TextureOptions::LINEAR)
            });
        }
    }
}

impl eframe::App for MapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.receive_tiles(ctx);

        let mount_id = egui::Id::new(self.mount.id());
        let Some(view) = self.mount.view_mut() else { return };

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let (response, painter) =
                    ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
                let rect = response.rect;
                let size = [rect.width() as f64, rect.height() as f64];

                if view.has_deferred() {
                    view.run_deferred(size);
                } else {
                    view.map.invalidate_size(size);
                }

                let local = |p: Pos2| [(p.x - rect.min.x) as f64, (p.y - rect.min.y) as f64];

                if response.dragged() {
                    let d = response.drag_delta();
                    view.map.pan_by(-d.x as f64, -d.y as f64);
                }

                if let Some(p) = response.hover_pos() {
                    let scroll = ui.input(|i| i.raw_scroll_delta.y);
                    if scroll != 0.0 {
                        let target = (view.map.zoom() + scroll.signum() as f64).round();
                        view.map.zoom_at(local(p), target);
                    }
                }

                let pointer = response
                    .hover_pos()
                    .filter(|_| !response.dragged())
                    .map(local);
                view.pointer_moved(pointer);
                if view.overlay.hovered().is_some() {
                    ui.ctx().set_cursor_icon(egui::CursorIcon::PointingHand);
                }

                if response.clicked() {
                    if let Some(p) = response.interact_pointer_pos() {
                        view.clicked(local(p));
                    }
                }

                painter.rect_filled(rect, 0.0, Color32::from_gray(221));

                if let Some(fetcher) = self.fetcher.as_mut() {
                    let visible = view.tiles.visible_tiles(&view.map);
                    for id in self.tiles.retain_visible(&visible) {
                        fetcher.request(id, view.tiles.url(id));
                    }
                    for tile in &visible {
                        if let Some(TileSlot::Ready(texture)) = self.tiles.get(tile.id) {
                            let min = to_pos(rect, tile.origin);
                            let tile_rect = Rect::from_min_size(min, Vec2::splat(tile.size as f32));
                            let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
                            painter.image(texture.id(), tile_rect, uv, Color32::WHITE);
                        }
                    }
                }

                for (id, layer) in view.overlay.drawn() {
                    if let Some(mesh) = self.meshes.get(id.index()) {
                        paint_polygon(&painter, rect, &view.map, mesh, &layer.style);
                    }
                }

                painter.text(
                    rect.left_bottom() + Vec2::new(4.0, -4.0),
                    Align2::LEFT_BOTTOM,
                    view.tiles.attribution(),
                    FontId::proportional(11.0),
                    Color32::from_gray(60),
                );
            });

        let (align, offset) = anchor(view.info.position());
        egui::Area::new(mount_id.with("info"))
            .anchor(align, offset)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.label(RichText::new(view.info.title()).strong().size(15.0));
                    match view.info.content() {
                        InfoContent::Prompt => {
                            ui.label(InfoContent::Prompt.to_string());
                        }
                        InfoContent::Feature(props) => {
                            ui.label(RichText::new(&props.name).strong());
                            ui.label(format!("{} people / mi²", format_density(props.density)));
                        }
                    }
                });
            });

        let (align, offset) = anchor(view.legend.position());
        egui::Area::new(mount_id.with("legend"))
            .anchor(align, offset)
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    for entry in view.legend.entries() {
                        ui.horizontal(|ui| {
                            let (swatch, painter) =
                                ui.allocate_painter(Vec2::splat(18.0), Sense::hover());
                            painter.rect_filled(swatch.rect, 0.0, color32(entry.color, 0.7));
                            ui.label(&entry.label);
                        });
                    }
                });
            });
    }
}

fn build_meshes(overlay: &OverlayController) -> Vec<PolygonMesh> {
    let mut layers: Vec<_> = overlay.drawn().collect();
    layers.sort_by_key(|(id, _)| *id);

    let mut meshes = Vec::with_capacity(layers.len());
    for (_, layer) in layers {
        let mut mesh = PolygonMesh { triangles: Vec::new(), rings: Vec::new() };
        for polygon in &layer.feature.geometry {
            let projected: Polygon<f64> = polygon.map_coords(|c| {
                let n = project(LatLng::new(c.y, c.x));
                coord! { x: n[0], y: n[1] }
            });
            for tri in projected.earcut_triangles() {
                let [a, b, c] = tri.to_array();
                mesh.triangles.push([[a.x, a.y], [b.x, b.y], [c.x, c.y]]);
            }
            for ring in std::iter::once(projected.exterior()).chain(projected.interiors()) {
                mesh.rings.push(ring.coords().map(|c| [c.x, c.y]).collect());
            }
        }
        meshes.push(mesh);
    }
    meshes
}

fn paint_polygon(
    painter: &egui::Painter,
    rect: Rect,
    map: &MapView,
    mesh: &PolygonMesh,
    style: &PathStyle,
) {
    let fill = color32(style.fill_color, style.fill_opacity);
    let mut shape = egui::Mesh::default();
    for tri in &mesh.triangles {
        let base = shape.vertices.len() as u32;
        for v in tri {
            shape.colored_vertex(to_pos(rect, map.normalized_to_screen(*v)), fill);
        }
        shape.add_triangle(base, base + 1, base + 2);
    }
    painter.add(Shape::mesh(shape));

    let stroke = Stroke::new(style.weight, color32(style.color, style.opacity));
    for ring in &mesh.rings {
        let points: Vec<Pos2> = ring
            .iter()
            .map(|v| to_pos(rect, map.normalized_to_screen(*v)))
            .collect();
        match style.dash {
            Some(dash) => painter.extend(Shape::dashed_line(&points, stroke, dash, dash)),
            None => {
                painter.add(Shape::closed_line(points, stroke));
            }
        }
    }
}

fn to_pos(rect: Rect, p: [f64; 2]) -> Pos2 {
    Pos2::new(rect.min.x + p[0] as f32, rect.min.y + p[1] as f32)
}

fn color32(color: Color, opacity: f32) -> Color32 {
    let [r, g, b] = color.rgb();
    Color32::from_rgba_unmultiplied(r, g, b, (opacity.clamp(0.0, 1.0) * 255.0).round() as u8)
}

fn anchor(position: ControlPosition) -> (Align2, Vec2) {
    match position {
        ControlPosition::TopLeft => (Align2::LEFT_TOP, Vec2::new(10.0, 10.0)),
        ControlPosition::TopRight => (Align2::RIGHT_TOP, Vec2::new(-10.0, 10.0)),
        ControlPosition::BottomLeft => (Align2::LEFT_BOTTOM, Vec2::new(10.0, -24.0)),
        ControlPosition::BottomRight => (Align2::RIGHT_BOTTOM, Vec2::new(-10.0, -24.0)),
    }
}
