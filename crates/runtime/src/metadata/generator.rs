use anyhow::Result;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

use super::{ChartFont, StarChart};

/// Procedural image generators a Metadata record can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageGenerator {
    #[default]
    StarChart,
}

impl ImageGenerator {
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageGenerator::StarChart => "image/png",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageGenerator::StarChart => "png",
        }
    }

    /// Renders `(label, 0.0..=1.0)` pairs into encoded image bytes.
    pub fn render(&self, values: &[(String, f64)], font: &ChartFont) -> Result<Vec<u8>> {
        match self {
            ImageGenerator::StarChart => StarChart::new(font).render(values),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn generator_names_round_trip_through_text() {
        for generator in ImageGenerator::iter() {
            assert_eq!(ImageGenerator::from_str(&generator.to_string()).unwrap(), generator);
        }
        assert_eq!(ImageGenerator::StarChart.to_string(), "star_chart");
        assert!(ImageGenerator::from_str("generators.StarChart").is_err());
    }
}
