//! Map viewport and Web Mercator projection

use std::f64::consts::PI;

use tracing::debug;

use crate::types::{Bounds, LatLng};

pub const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_779_8;

/// What the overlay may ask of the view hosting it.
pub trait MapHost {
    fn fit_bounds(&mut self, bounds: Bounds);
}

/// Projects to normalized Web Mercator, both axes in `[0, 1]` with y growing
/// southwards.
pub fn project(p: LatLng) -> [f64; 2] {
    let lat = p.lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    let x = (p.lng + 180.0) / 360.0;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0;
    [x, y]
}

pub fn unproject(n: [f64; 2]) -> LatLng {
    let lng = n[0] * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * n[1])).sinh().atan().to_degrees();
    LatLng::new(lat, lng)
}

fn scale(zoom: f64) -> f64 {
    TILE_SIZE * 2f64.powf(zoom)
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    center: LatLng,
    zoom: f64,
    size: [f64; 2],
    min_zoom: f64,
    max_zoom: f64,
}

impl MapView {
    pub fn new(center: LatLng, zoom: f64, min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            center,
            zoom: zoom.clamp(min_zoom, max_zoom),
            size: [0.0, 0.0],
            min_zoom,
            max_zoom,
        }
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn size(&self) -> [f64; 2] {
        self.size
    }

    pub fn set_view(&mut self, center: LatLng, zoom: f64) {
        self.center = center;
        self.zoom = zoom.clamp(self.min_zoom, self.max_zoom);
    }

    /// Records a new canvas size; the geographic center stays put.
    pub fn invalidate_size(&mut self, size: [f64; 2]) -> bool {
        if self.size == size {
            return false;
        }
        debug!(old = ?self.size, new = ?size, "map size invalidated");
        self.size = size;
        true
    }

    /// Pixel position of a normalized Mercator point relative to the canvas
    /// top-left corner.
    pub fn normalized_to_screen(&self, n: [f64; 2]) -> [f64; 2] {
        let s = scale(self.zoom);
        let c = project(self.center);
        [
            (n[0] - c[0]) * s + self.size[0] / 2.0,
            (n[1] - c[1]) * s + self.size[1] / 2.0,
        ]
    }

    pub fn screen_to_normalized(&self, p: [f64; 2]) -> [f64; 2] {
        let s = scale(self.zoom);
        let c = project(self.center);
        [
            c[0] + (p[0] - self.size[0] / 2.0) / s,
            c[1] + (p[1] - self.size[1] / 2.0) / s,
        ]
    }

    #[cfg(test)]
    pub fn to_screen(&self, p: LatLng) -> [f64; 2] {
        self.normalized_to_screen(project(p))
    }

    pub fn from_screen(&self, p: [f64; 2]) -> LatLng {
        unproject(self.screen_to_normalized(p))
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        let c = project(self.center);
        let s = scale(self.zoom);
        self.center = unproject([c[0] + dx / s, c[1] + dy / s]);
    }

    /// Changes zoom keeping the geographic point under `anchor` fixed.
    pub fn zoom_at(&mut self, anchor: [f64; 2], zoom: f64) {
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        if zoom == self.zoom {
            return;
        }
        let fixed = self.screen_to_normalized(anchor);
        self.zoom = zoom;
        let s = scale(zoom);
        self.center = unproject([
            fixed[0] - (anchor[0] - self.size[0] / 2.0) / s,
            fixed[1] - (anchor[1] - self.size[1] / 2.0) / s,
        ]);
    }

    /// Largest whole zoom at which `bounds` fits in the canvas.
    pub fn bounds_zoom(&self, bounds: &Bounds) -> f64 {
        let nw = project(LatLng::new(bounds.max().y, bounds.min().x));
        let se = project(LatLng::new(bounds.min().y, bounds.max().x));
        let span = [(se[0] - nw[0]).abs(), (se[1] - nw[1]).abs()];

        let mut zoom = self.max_zoom;
        for axis in 0..2 {
            if span[axis] > 0.0 && self.size[axis] > 0.0 {
                zoom = zoom.min((self.size[axis] / (span[axis] * TILE_SIZE)).log2());
            }
        }
        zoom.floor().clamp(self.min_zoom, self.max_zoom)
    }
}

impl MapHost for MapView {
    fn fit_bounds(&mut self, bounds: Bounds) {
        let zoom = self.bounds_zoom(&bounds);
        let nw = project(LatLng::new(bounds.max().y, bounds.min().x));
        let se = project(LatLng::new(bounds.min().y, bounds.max().x));
        let center = unproject([(nw[0] + se[0]) / 2.0, (nw[1] + se[1]) / 2.0]);
        debug!(lat = center.lat, lng = center.lng, zoom, "fitting bounds");
        self.set_view(center, zoom);
    }
}
