use serde::{Deserialize, Serialize};
use sqlx::types::{Json, Uuid};
use sqlx::PgPool;

use storymint_database::{QueryCriteria, SqlxFilterQuery, SqlxObject};

use super::ImageGenerator;
use crate::traits::{impl_asset_fields, Asset};
use crate::{ValidationError, World};

pub const MAX_ATTRIBUTES: usize = 5;
pub const MAX_ATTRIBUTE_SCORE: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAttribute {
    pub trait_type: String,
    /// Raw score, 0..=5.
    pub value: u8,
}

impl MetadataAttribute {
    pub fn new(trait_type: impl Into<String>, value: u8) -> Self {
        Self { trait_type: trait_type.into(), value }
    }

    /// Score mapped onto the chart's 0.0..=1.0 range.
    pub fn normalized(&self) -> f64 {
        f64::from(self.value) / f64::from(MAX_ATTRIBUTE_SCORE)
    }
}

/// NFT-style descriptor of a world. The image and document objects are derived
/// from the other fields and regenerated on every save.
#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "metadata"]
pub struct Metadata {
    pub id: Uuid,

    #[unique]
    #[foreign_key(referenced_table = "worlds", related_rust_type = "World")]
    pub world_id: Uuid,

    pub name: String,
    pub description: String,

    /// Base58 collection address.
    #[unique]
    pub collection: Option<String>,
    pub external_url: String,

    pub attributes: Json<Vec<MetadataAttribute>>,
    pub generator: ImageGenerator,

    /// Storage key of the rendered image.
    pub image: Option<String>,
    /// Storage key of the JSON document.
    pub metadata: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Metadata {
    pub fn new(world_id: Uuid, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            world_id,
            name: name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub async fn find_for_world(pool: &PgPool, world_id: Uuid) -> anyhow::Result<Option<Self>> {
        let criteria = QueryCriteria::new().add_valued_filter("world_id", "=", world_id);
        Ok(Self::find_one_by_criteria(criteria, pool).await?)
    }
}

impl_asset_fields!(Metadata);

impl Asset for Metadata {
    const KEY_PREFIX: &'static str = "metadata";

    fn asset_id(&self) -> Uuid {
        self.id
    }

    fn external_url(&self) -> &str {
        &self.external_url
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Name may not be blank".to_string());
        }
        validate_attributes(&self.attributes, &mut errors);
        if let Some(collection) = &self.collection {
            if !is_base58_key(collection) {
                errors.push("Collection must be a base58 encoded public key".to_string());
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(ValidationError(errors)) }
    }

    fn object_keys(&self) -> (Option<&str>, Option<&str>) {
        (self.image.as_deref(), self.metadata.as_deref())
    }

    fn set_object_keys(&mut self, image: Option<String>, document: Option<String>) {
        self.image = image;
        self.metadata = document;
    }
}

/// Shared attribute rules: at most five, named, scored 0..=5.
pub(crate) fn validate_attributes(attributes: &[MetadataAttribute], errors: &mut Vec<String>) {
    if attributes.len() > MAX_ATTRIBUTES {
        errors.push(format!("At most {} attributes are allowed", MAX_ATTRIBUTES));
    }
    for attribute in attributes {
        if attribute.trait_type.trim().is_empty() {
            errors.push("Attribute trait_type may not be blank".to_string());
        }
        if attribute.value > MAX_ATTRIBUTE_SCORE {
            errors.push(format!(
                "Attribute '{}' must be between 0 and {}",
                attribute.trait_type, MAX_ATTRIBUTE_SCORE
            ));
        }
    }
}

/// A base58 string decoding to a 32 byte public key.
pub(crate) fn is_base58_key(value: &str) -> bool {
    bs58::decode(value).into_vec().is_ok_and(|bytes| bytes.len() == 32)
}
