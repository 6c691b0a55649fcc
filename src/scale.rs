//! Density color scale

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const WHITE: Color = Color([0xFF, 0xFF, 0xFF]);
    pub const HIGHLIGHT: Color = Color([0x66, 0x66, 0x66]);

    pub fn rgb(&self) -> [u8; 3] {
        self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "#{:02X}{:02X}{:02X}", r, g, b)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    /// Densities strictly above this value fall into the bucket.
    pub threshold: f64,
    pub color: Color,
}

/// Strictly descending thresholds. The last entry is the catch-all.
const DENSITY_BUCKETS: [Bucket; 8] = [
    Bucket { threshold: 1000.0, color: Color([0x80, 0x00, 0x26]) },
    Bucket { threshold: 500.0, color: Color([0xBD, 0x00, 0x26]) },
    Bucket { threshold: 200.0, color: Color([0xE3, 0x1A, 0x1C]) },
    Bucket { threshold: 100.0, color: Color([0xFC, 0x4E, 0x2A]) },
    Bucket { threshold: 50.0, color: Color([0xFD, 0x8D, 0x3C]) },
    Bucket { threshold: 20.0, color: Color([0xFE, 0xB2, 0x4C]) },
    Bucket { threshold: 10.0, color: Color([0xFE, 0xD9, 0x76]) },
    Bucket { threshold: 0.0, color: Color([0xFF, 0xED, 0xA0]) },
];

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub color: Color,
    pub label: String,
}

#[derive(Debug, Clone, Copy)]
pub struct ColorScale {
    buckets: &'static [Bucket; 8],
}

impl ColorScale {
    /// People per square mile, as used for the state map.
    pub const DENSITY: ColorScale = ColorScale { buckets: &DENSITY_BUCKETS };

    pub fn buckets(&self) -> &[Bucket] {
        self.buckets
    }

    /// Index of the bucket `value` falls in, 0 being the lowest.
    ///
    /// Anything not strictly above a threshold (negative, NaN) lands in the
    /// lowest bucket.
    pub fn rank(&self, value: f64) -> usize {
        let n = self.buckets.len();
        self.buckets
            .iter()
            .position(|b| value > b.threshold)
            .map(|pos| n - 1 - pos)
            .unwrap_or(0)
    }

    pub fn classify(&self, value: f64) -> Color {
        let n = self.buckets.len();
        self.buckets[n - 1 - self.rank(value)].color
    }

    /// Legend rows in ascending order, each colored like a value just inside
    /// its range.
    pub fn legend(&self) -> Vec<LegendEntry> {
        let grades: Vec<f64> = self.buckets.iter().rev().map(|b| b.threshold).collect();
        grades
            .iter()
            .enumerate()
            .map(|(i, &grade)| {
                let label = match grades.get(i + 1) {
                    Some(next) => format!("{}–{}", grade, next),
                    None => format!("{}+", grade),
                };
                LegendEntry {
                    color: self.classify(grade + 1.0),
                    label,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_values_use_lowest_bucket() {
        let scale = ColorScale::DENSITY;
        assert_eq!(scale.classify(0.0).to_string(), "#FFEDA0");
        assert_eq!(scale.classify(5.0).to_string(), "#FFEDA0");
        assert_eq!(scale.classify(10.0).to_string(), "#FFEDA0");
        assert_eq!(scale.classify(-3.0).to_string(), "#FFEDA0");
        assert_eq!(scale.classify(f64::NAN).to_string(), "#FFEDA0");
    }

    #[test]
    fn test_thresholds_are_strict() {
        let scale = ColorScale::DENSITY;
        assert_eq!(scale.classify(10.0001).to_string(), "#FED976");
        assert_eq!(scale.classify(1000.0).to_string(), "#BD0026");
        assert_eq!(scale.classify(1000.0001).to_string(), "#800026");
        assert_eq!(scale.classify(f64::INFINITY).to_string(), "#800026");
    }

    #[test]
    fn test_rank_is_monotonic() {
        let scale = ColorScale::DENSITY;
        let mut last = 0;
        let mut d = 0.0;
        while d < 2500.0 {
            let rank = scale.rank(d);
            assert!(rank >= last, "rank dropped at {}", d);
            assert_eq!(scale.classify(d), scale.buckets()[7 - rank].color);
            last = rank;
            d += 0.75;
        }
        assert_eq!(last, 7);
    }

    #[test]
    fn test_legend_rows() {
        let scale = ColorScale::DENSITY;
        let legend = scale.legend();
        let labels: Vec<&str> = legend.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["0–10", "10–20", "20–50", "50–100", "100–200", "200–500", "500–1000", "1000+"]
        );
        let lower = [0.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0];
        for (entry, lo) in legend.iter().zip(lower) {
            assert_eq!(entry.color, scale.classify(lo + 1.0));
        }
        assert_eq!(legend[0].color.to_string(), "#FFEDA0");
        assert_eq!(legend[7].color.to_string(), "#800026");
    }

    #[test]
    fn test_hex_display() {
        assert_eq!(Color([0xFC, 0x4E, 0x2A]).to_string(), "#FC4E2A");
        assert_eq!(Color::HIGHLIGHT.to_string(), "#666666");
    }
}
