use anyhow::Result;
use serde::{Deserialize, Serialize};
use url::Url;

use super::MetadataAttribute;
use crate::traits::Asset;

/// The public JSON document stored next to the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataDocument {
    pub name: String,
    pub description: String,
    pub external_url: String,
    pub image: String,
    pub attributes: Vec<MetadataAttribute>,
}

impl MetadataDocument {
    pub fn assemble<A: Asset>(asset: &A, image_url: &str) -> Self {
        Self {
            name: asset.name().to_string(),
            description: asset.description().to_string(),
            external_url: asset.external_url().to_string(),
            image: strip_url_cruft(image_url),
            attributes: asset.attributes().to_vec(),
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Drops the query string and fragment, e.g. signing parameters of a storage URL.
pub fn strip_url_cruft(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        // relative URLs from local storage
        Err(_) => raw.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}
