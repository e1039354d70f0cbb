mod document;
mod font;
mod generator;
mod model;
mod service;
mod star_chart;

pub use document::{strip_url_cruft, MetadataDocument};
pub use font::ChartFont;
pub use generator::ImageGenerator;
pub use model::{Metadata, MetadataAttribute, MAX_ATTRIBUTES, MAX_ATTRIBUTE_SCORE};
pub(crate) use model::{is_base58_key, validate_attributes};
pub use service::MetadataService;
pub use star_chart::{StarChart, CHART_SIZE};
