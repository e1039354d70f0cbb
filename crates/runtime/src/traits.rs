use sqlx::types::Uuid;

use crate::{MetadataAttribute, ValidationError};

pub trait Named {
    fn name(&self) -> &str;
}

pub trait Described {
    fn description(&self) -> &str;
}

/// Records carrying scored attributes that can be charted.
pub trait Attributed {
    fn attributes(&self) -> &[MetadataAttribute];

    /// `(trait_type, 0.0..=1.0)` pairs in insertion order, as the renderer wants them.
    fn chart_values(&self) -> Vec<(String, f64)> {
        self.attributes().iter()
            .map(|a| (a.trait_type.clone(), a.normalized()))
            .collect()
    }
}

/// A record whose image and JSON document are generated into object storage.
pub trait Asset: Named + Described + Attributed {
    /// First segment of the storage keys, e.g. `metadata/<id>.png`.
    const KEY_PREFIX: &'static str;

    fn asset_id(&self) -> Uuid;

    fn external_url(&self) -> &str {
        ""
    }

    fn validate(&self) -> Result<(), ValidationError>;

    /// Storage keys of the image and the JSON document, once generated.
    fn object_keys(&self) -> (Option<&str>, Option<&str>);

    fn set_object_keys(&mut self, image: Option<String>, document: Option<String>);
}

/// [`Named`], [`Described`] and [`Attributed`] for structs with `name`,
/// `description` and `attributes: Json<Vec<MetadataAttribute>>` fields.
macro_rules! impl_asset_fields {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::traits::Named for $ty {
                fn name(&self) -> &str { &self.name }
            }

            impl $crate::traits::Described for $ty {
                fn description(&self) -> &str { &self.description }
            }

            impl $crate::traits::Attributed for $ty {
                fn attributes(&self) -> &[$crate::MetadataAttribute] { &self.attributes.0 }
            }
        )*
    };
}

pub(crate) use impl_asset_fields;
