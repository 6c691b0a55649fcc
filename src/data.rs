use crate::types::{Feature, FeatureProps};
use anyhow::{Context, Result, anyhow};
use geo::MultiPolygon;
use geojson::GeoJson;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

pub fn load_features(path: &Path) -> Result<Vec<Feature>> {
    info!("Loading features from {:?}...", path);
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let features = parse_features(&content)
        .with_context(|| format!("Failed to load features from {:?}", path))?;
    info!("Loaded {} features", features.len());
    Ok(features)
}

/// Parses a FeatureCollection, either bare or wrapped in a JavaScript
/// assignment such as `var statesData = {...};`.
pub fn parse_features(content: &str) -> Result<Vec<Feature>> {
    let geojson: GeoJson = strip_js_assignment(content)
        .parse()
        .context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::with_capacity(collection.features.len());

    for (i, feature) in collection.features.into_iter().enumerate() {
        let props = feature.properties.as_ref();

        let name = match props.and_then(|p| p.get("name")) {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => {
                warn!(index = i, "skipping feature without a string name");
                continue;
            }
        };

        let density = match props.and_then(|p| p.get("density")).and_then(|v| v.as_f64()) {
            Some(d) => d,
            None => {
                warn!(index = i, %name, "skipping feature without a numeric density");
                continue;
            }
        };

        let geometry = match feature.geometry {
            Some(geo) => {
                let valid_geo: geo::Geometry<f64> = geo.value.try_into()
                    .map_err(|e| anyhow!("Failed to convert geometry of {}: {:?}", name, e))?;

                match valid_geo {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => {
                        warn!(%name, "skipping non-polygon feature");
                        continue;
                    }
                }
            }
            None => {
                warn!(%name, "skipping feature without geometry");
                continue;
            }
        };

        features.push(Feature {
            props: FeatureProps { name, density },
            geometry,
        });
    }

    if features.is_empty() {
        warn!("GeoJSON contained no usable features");
    }

    Ok(features)
}

fn strip_js_assignment(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with('{') {
        return trimmed;
    }
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_STATES: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "08",
                "properties": { "name": "Colorado", "density": 49.33 },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-109.05, 41.0], [-102.05, 41.0], [-102.05, 37.0], [-109.05, 37.0], [-109.05, 41.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Nowhere" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Pin", "density": 3 },
                "geometry": { "type": "Point", "coordinates": [0.0, 0.0] }
            },
            {
                "type": "Feature",
                "properties": { "name": "Wyoming", "density": 5.851 },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[-111.05, 45.0], [-104.05, 45.0], [-104.05, 41.0], [-111.05, 41.0], [-111.05, 45.0]]]]
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_skips_unusable_features() {
        let features = parse_features(TWO_STATES).unwrap();
        let names: Vec<&str> = features.iter().map(|f| f.props.name.as_str()).collect();
        assert_eq!(names, vec!["Colorado", "Wyoming"]);
        assert_eq!(features[0].props.density, 49.33);
        assert_eq!(features[1].geometry.0.len(), 1);
    }

    #[test]
    fn test_parse_js_wrapper() {
        let js = format!("var statesData = {};\n", TWO_STATES);
        let features = parse_features(&js).unwrap();
        assert_eq!(features.len(), 2);
    }

    #[test]
    fn test_rejects_non_collection() {
        let single = r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        assert!(parse_features(single).is_err());
        assert!(parse_features("not json").is_err());
    }

    #[test]
    fn test_bundled_dataset_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/us-states.geojson");
        let features = load_features(&path).unwrap();
        assert_eq!(features.len(), 52);
        for name in ["Alaska", "District of Columbia", "New Jersey", "Puerto Rico", "Wyoming"] {
            assert!(features.iter().any(|f| f.props.name == name), "missing {}", name);
        }
        let hawaii = features.iter().find(|f| f.props.name == "Hawaii").unwrap();
        assert_eq!(hawaii.geometry.0.len(), 4);
    }
}
