use geo::{MultiPolygon, Rect};
use serde::Serialize;

/// Attributes published to the hover state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureProps {
    pub name: String,
    // people per square mile
    pub density: f64,
}

#[derive(Debug, Clone)]
pub struct Feature {
    pub props: FeatureProps,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Geographic bounds, x = longitude and y = latitude.
pub type Bounds = Rect<f64>;
