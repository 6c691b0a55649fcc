//! Background tile imagery
//!
//! Tiles only decorate the map. A failed download leaves a blank square and a
//! log line, nothing else.

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use image::RgbaImage;
use tracing::{debug, warn};

use crate::config::TileConfig;
use crate::map::MapView;

/// Deepest zoom a tile request can address.
pub const MAX_TILE_ZOOM: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// A tile and where its top-left corner lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedTile {
    pub id: TileId,
    pub origin: [f64; 2],
    /// On-screen edge length in pixels.
    pub size: f64,
}

#[derive(Debug, Clone)]
pub struct TileLayer {
    url_template: String,
    subdomains: Vec<String>,
    max_zoom: u8,
    attribution: String,
}

impl TileLayer {
    pub fn from_config(config: &TileConfig) -> Self {
        Self {
            url_template: config.url_template.clone(),
            subdomains: config.subdomains.clone(),
            max_zoom: config.max_zoom,
            attribution: config.attribution.clone(),
        }
    }

    pub fn attribution(&self) -> &str {
        &self.attribution
    }

    pub fn url(&self, id: TileId) -> String {
        let mut url = self
            .url_template
            .replace("{z}", &id.z.to_string())
            .replace("{x}", &id.x.to_string())
            .replace("{y}", &id.y.to_string());
        if !self.subdomains.is_empty() {
            let idx = (id.x as usize + id.y as usize) % self.subdomains.len();
            url = url.replace("{s}", &self.subdomains[idx]);
        }
        url
    }

    /// Tiles covering the canvas at the nearest whole zoom level.
    pub fn visible_tiles(&self, map: &MapView) -> Vec<PlacedTile> {
        let size = map.size();
        if size[0] <= 0.0 || size[1] <= 0.0 {
            return Vec::new();
        }

        let max_zoom = self.max_zoom.min(MAX_TILE_ZOOM);
        let z = map.zoom().round().clamp(0.0, max_zoom as f64) as u8;
        let count = 1u64 << z;
        let n = count as f64;

        let nw = map.screen_to_normalized([0.0, 0.0]);
        let se = map.screen_to_normalized(size);
        let x0 = (nw[0] * n).floor() as i64;
        let x1 = (se[0] * n).ceil() as i64 - 1;
        let y0 = ((nw[1] * n).floor() as i64).max(0);
        let y1 = ((se[1] * n).ceil() as i64 - 1).min(count as i64 - 1);

        let mut tiles = Vec::new();
        for ty in y0..=y1 {
            for tx in x0..=x1 {
                let origin = map.normalized_to_screen([tx as f64 / n, ty as f64 / n]);
                let corner = map.normalized_to_screen([(tx + 1) as f64 / n, (ty + 1) as f64 / n]);
                tiles.push(PlacedTile {
                    id: TileId {
                        z,
                        x: tx.rem_euclid(count as i64) as u32,
                        y: ty as u32,
                    },
                    origin,
                    size: corner[0] - origin[0],
                });
            }
        }
        tiles
    }
}

pub enum TileResult {
    Loaded(TileId, RgbaImage),
    Failed(TileId),
}

pub enum TileSlot<T> {
    Pending,
    Ready(T),
    Failed,
}

/// Per-tile state for what is on screen now. Slots that scroll out of view
/// are dropped, along with whatever they hold.
pub struct TileSlots<T> {
    slots: HashMap<TileId, TileSlot<T>>,
}

impl<T> Default for TileSlots<T> {
    fn default() -> Self {
        Self { slots: HashMap::new() }
    }
}

impl<T> TileSlots<T> {
    /// Keeps only slots for `visible` and returns the tiles that had none.
    /// Those are marked pending.
    pub fn retain_visible(&mut self, visible: &[PlacedTile]) -> Vec<TileId> {
        let ids: HashSet<TileId> = visible.iter().map(|t| t.id).collect();
        self.slots.retain(|id, _| ids.contains(id));

        let mut missing = Vec::new();
        for tile in visible {
            if !self.slots.contains_key(&tile.id) {
                self.slots.insert(tile.id, TileSlot::Pending);
                missing.push(tile.id);
            }
        }
        missing
    }

    /// Files a finished download. Results for tiles no longer on screen are
    /// discarded without calling `load`.
    pub fn resolve(&mut self, result: TileResult, load: impl FnOnce(TileId, RgbaImage) -> T) {
        match result {
            TileResult::Loaded(id, img) => {
                if let Some(slot) = self.slots.get_mut(&id) {
                    *slot = TileSlot::Ready(load(id, img));
                }
            }
            TileResult::Failed(id) => {
                if let Some(slot) = self.slots.get_mut(&id) {
                    *slot = TileSlot::Failed;
                }
            }
        }
    }

    pub fn get(&self, id: TileId) -> Option<&TileSlot<T>> {
        self.slots.get(&id)
    }
}

/// Downloads tiles on a small pool of worker threads.
pub struct TileFetcher {
    requests: Sender<(TileId, String)>,
    results: Receiver<TileResult>,
    in_flight: HashSet<TileId>,
}

impl TileFetcher {
    /// `on_ready` runs on the worker thread after each finished download.
    pub fn spawn(config: &TileConfig, on_ready: Arc<dyn Fn() + Send + Sync>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build tile HTTP client")?;

        let (req_tx, req_rx) = mpsc::channel::<(TileId, String)>();
        let (res_tx, res_rx) = mpsc::channel();
        let req_rx = Arc::new(Mutex::new(req_rx));

        for i in 0..config.workers {
            let client = client.clone();
            let req_rx = req_rx.clone();
            let res_tx = res_tx.clone();
            let on_ready = on_ready.clone();
            thread::Builder::new()
                .name(format!("tile-fetch-{}", i))
                .spawn(move || loop {
                    let next = match req_rx.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => return,
                    };
                    let Ok((id, url)) = next else { return };
                    let result = match fetch_tile(&client, &url) {
                        Ok(img) => TileResult::Loaded(id, img),
                        Err(e) => {
                            warn!(url = %url, "tile fetch failed: {:#}", e);
                            TileResult::Failed(id)
                        }
                    };
                    if res_tx.send(result).is_err() {
                        return;
                    }
                    on_ready();
                })
                .context("Failed to spawn tile worker")?;
        }

        Ok(Self {
            requests: req_tx,
            results: res_rx,
            in_flight: HashSet::new(),
        })
    }

    pub fn request(&mut self, id: TileId, url: String) {
        if !self.in_flight.insert(id) {
            return;
        }
        debug!(?id, %url, "requesting tile");
        if self.requests.send((id, url)).is_err() {
            self.in_flight.remove(&id);
        }
    }

    /// Finished downloads since the last call.
    pub fn drain(&mut self) -> Vec<TileResult> {
        let results: Vec<TileResult> = self.results.try_iter().collect();
        for r in &results {
            let id = match r {
                TileResult::Loaded(id, _) | TileResult::Failed(id) => id,
            };
            self.in_flight.remove(id);
        }
        results
    }
}

fn fetch_tile(client: &reqwest::blocking::Client, url: &str) -> Result<RgbaImage> {
    let bytes = client
        .get(url)
        .send()?
        .error_for_status()?
        .bytes()?;
    let img = image::load_from_memory(&bytes).context("Failed to decode tile")?;
    Ok(img.to_rgba8())
}
