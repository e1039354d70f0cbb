use std::sync::Arc;

use anyhow::{anyhow, Result};
use sqlx::PgPool;
use url::Url;

use storymint_database::SqlxCrud;

use super::{ChartFont, ImageGenerator, Metadata, MetadataDocument};
use crate::traits::Asset;
use crate::{Character, ObjectStorage};

/// Renders and stores the generated objects of assets and persists them.
#[derive(Clone)]
pub struct MetadataService {
    storage: Arc<dyn ObjectStorage>,
    font: Arc<ChartFont>,
    public_base_url: Option<Url>,
}

/// Objects written for an asset, plus keys of a previous save that are no longer used.
struct StoredObjects {
    document: MetadataDocument,
    stale: Vec<String>,
}

impl MetadataService {
    pub fn new(storage: Arc<dyn ObjectStorage>, font: Arc<ChartFont>) -> Self {
        Self { storage, font, public_base_url: None }
    }

    /// Base that relative storage URLs (local storage) are resolved against.
    pub fn with_public_base_url(mut self, base: Url) -> Self {
        self.public_base_url = Some(base);
        self
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    pub fn image_key<A: Asset>(asset: &A, generator: ImageGenerator) -> String {
        format!("{}/{}.{}", A::KEY_PREFIX, asset.asset_id(), generator.extension())
    }

    pub fn document_key<A: Asset>(asset: &A) -> String {
        format!("{}/{}.json", A::KEY_PREFIX, asset.asset_id())
    }

    /// Public URL of a stored object, absolute whenever a base is configured.
    pub fn public_url(&self, key: &str) -> String {
        let url = self.storage.url(key);
        match &self.public_base_url {
            Some(base) if Url::parse(&url).is_err() => base.join(&url)
                .map(|joined| joined.to_string())
                .unwrap_or(url),
            _ => url,
        }
    }

    pub fn image_url<A: Asset>(&self, asset: &A) -> Option<String> {
        asset.object_keys().0.map(|key| self.public_url(key))
    }

    pub fn document_url<A: Asset>(&self, asset: &A) -> Option<String> {
        asset.object_keys().1.map(|key| self.public_url(key))
    }

    /// Regenerates the image and JSON document of `asset` and records their keys
    /// on it. Objects of a previous save that the new ones do not replace are deleted.
    pub async fn prepare<A: Asset>(&self, asset: &mut A, generator: ImageGenerator) -> Result<MetadataDocument> {
        let StoredObjects { document, stale } = self.store_objects(asset, generator).await?;
        self.delete_keys(&stale).await?;
        Ok(document)
    }

    /// Inserts or updates world metadata after regenerating its objects.
    pub async fn save(&self, pool: &PgPool, metadata: &mut Metadata) -> Result<MetadataDocument> {
        let generator = metadata.generator;
        self.persist(pool, metadata, generator).await
    }

    /// Inserts or updates a character, drawing it with its world's generator.
    pub async fn save_character(&self, pool: &PgPool, character: &mut Character) -> Result<MetadataDocument> {
        let generator = Metadata::find_for_world(pool, character.world_id).await?
            .map(|metadata| metadata.generator)
            .unwrap_or_default();
        character.has_pending_metadata_update = true;
        self.persist(pool, character, generator).await
    }

    /// Deletes the stored objects of `asset`, leaving the row untouched.
    pub async fn remove_objects<A: Asset>(&self, asset: &mut A) -> Result<()> {
        let (image, document) = asset.object_keys();
        let keys: Vec<String> = [image, document].into_iter().flatten().map(str::to_string).collect();
        asset.set_object_keys(None, None);
        self.delete_keys(&keys).await
    }

    /// Renders everything first so a failed render leaves storage untouched,
    /// then writes both objects.
    async fn store_objects<A: Asset>(&self, asset: &mut A, generator: ImageGenerator) -> Result<StoredObjects> {
        asset.validate()?;

        let image = generator.render(&asset.chart_values(), &self.font)?;
        let image_key = Self::image_key(asset, generator);
        let image_url = self.public_url(&image_key);
        if Url::parse(&image_url).is_err() {
            return Err(anyhow!(
                "[MetadataService::store_objects] {} is not absolute, configure a public base URL",
                image_url
            ));
        }

        let document = MetadataDocument::assemble(asset, &image_url);
        let document_key = Self::document_key(asset);
        let document_bytes = document.to_json_bytes()?;

        self.storage.put(&image_key, generator.content_type(), image).await?;
        self.storage.put(&document_key, "application/json", document_bytes).await?;

        let (old_image, old_document) = asset.object_keys();
        let stale = [old_image, old_document].into_iter()
            .flatten()
            .filter(|key| *key != image_key && *key != document_key)
            .map(str::to_string)
            .collect();
        asset.set_object_keys(Some(image_key), Some(document_key));

        tracing::debug!("[MetadataService::store_objects] regenerated {}/{}", A::KEY_PREFIX, asset.asset_id());
        Ok(StoredObjects { document, stale })
    }

    async fn persist<A>(&self, pool: &PgPool, asset: &mut A, generator: ImageGenerator) -> Result<MetadataDocument>
    where
        A: Asset + SqlxCrud<Id = uuid::Uuid> + Clone + Send + Sync,
    {
        let is_new = A::find_by_id(asset.asset_id(), pool).await?.is_none();
        let stored = self.store_objects(asset, generator).await?;

        let row = asset.clone();
        let written = async {
            let mut tx = pool.begin().await?;
            let saved = if is_new { row.create(&mut *tx).await? } else { row.update(&mut *tx).await? };
            tx.commit().await?;
            Ok::<_, anyhow::Error>(saved)
        }
        .await;

        let saved = self.settle(asset, is_new, &stored.stale, written).await?;
        tracing::info!("[MetadataService::persist] saved {}/{}", A::KEY_PREFIX, saved.asset_id());
        *asset = saved;
        Ok(stored.document)
    }

    /// Finishes a save once the row write is known. Stale keys go after a
    /// successful write; objects of a record that never reached the database
    /// are deleted again.
    async fn settle<A: Asset>(&self, asset: &mut A, is_new: bool, stale: &[String], written: Result<A>) -> Result<A> {
        match written {
            Ok(saved) => {
                self.delete_keys(stale).await?;
                Ok(saved)
            }
            Err(e) => {
                if is_new {
                    if let Err(cleanup) = self.remove_objects(asset).await {
                        tracing::warn!("[MetadataService::settle] could not remove unsaved objects: {:#}", cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.storage.delete(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use sqlx::types::{Json, Uuid};

    use super::*;
    use crate::{MemoryStorage, MetadataAttribute};

    fn font() -> Arc<ChartFont> {
        Arc::new(ChartFont::embedded().unwrap())
    }

    fn service(storage: Arc<MemoryStorage>) -> MetadataService {
        MetadataService::new(storage, font())
    }

    fn aster() -> Metadata {
        let mut metadata = Metadata::new(Uuid::new_v4(), "Aster", "A drifting world");
        metadata.attributes = Json(vec![
            MetadataAttribute::new("Strength", 4),
            MetadataAttribute::new("Wisdom", 2),
            MetadataAttribute::new("Charm", 5),
        ]);
        metadata
    }

    /// Memory storage whose writes can be switched off.
    struct FlakyStorage {
        inner: MemoryStorage,
        failing: AtomicBool,
    }

    #[async_trait]
    impl ObjectStorage for FlakyStorage {
        async fn put(&self, key: &str, content_type: &str, data: Vec<u8>) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(anyhow!("storage unavailable"));
            }
            self.inner.put(key, content_type, data).await
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.inner.delete(key).await
        }

        fn url(&self, key: &str) -> String {
            self.inner.url(key)
        }
    }

    #[tokio::test]
    async fn prepare_stores_image_and_document() {
        let storage = Arc::new(MemoryStorage::new("https://cdn.example.com/"));
        let service = service(storage.clone());
        let mut metadata = aster();

        let document = service.prepare(&mut metadata, ImageGenerator::StarChart).await.unwrap();

        let image_key = format!("metadata/{}.png", metadata.id);
        let document_key = format!("metadata/{}.json", metadata.id);
        assert_eq!(metadata.image.as_deref(), Some(image_key.as_str()));
        assert_eq!(metadata.metadata.as_deref(), Some(document_key.as_str()));
        assert_eq!(document.image, format!("https://cdn.example.com/{}", image_key));

        let (content_type, png) = storage.get(&image_key).await.unwrap();
        assert_eq!(content_type, "image/png");
        assert!(!png.is_empty());

        let (_, json) = storage.get(&document_key).await.unwrap();
        let stored: MetadataDocument = serde_json::from_slice(&json).unwrap();
        assert_eq!(stored, document);
    }

    #[tokio::test]
    async fn relative_storage_urls_are_resolved_against_the_public_base() {
        let storage = Arc::new(MemoryStorage::new("/media"));
        let base = Url::parse("https://storymint.example").unwrap();
        let service = service(storage.clone()).with_public_base_url(base);
        let mut metadata = aster();

        service.prepare(&mut metadata, ImageGenerator::StarChart).await.unwrap();

        let (_, json) = storage.get(metadata.metadata.as_deref().unwrap()).await.unwrap();
        let stored: MetadataDocument = serde_json::from_slice(&json).unwrap();
        assert!(Url::parse(&stored.image).is_ok());
        assert_eq!(stored.image, format!("https://storymint.example/media/metadata/{}.png", metadata.id));
        assert_eq!(service.image_url(&metadata).unwrap(), stored.image);
    }

    #[tokio::test]
    async fn relative_storage_urls_without_base_are_refused() {
        let storage = Arc::new(MemoryStorage::new("/media"));
        let service = service(storage.clone());
        let mut metadata = aster();

        assert!(service.prepare(&mut metadata, ImageGenerator::StarChart).await.is_err());
        assert!(storage.keys().await.is_empty());
        assert!(metadata.image.is_none());
    }

    #[tokio::test]
    async fn invalid_record_stores_nothing() {
        let storage = Arc::new(MemoryStorage::new("https://cdn.example.com"));
        let service = service(storage.clone());
        let mut metadata = aster();
        metadata.attributes.0.push(MetadataAttribute::new("Speed", 9));

        let err = service.prepare(&mut metadata, ImageGenerator::StarChart).await.unwrap_err();
        assert!(err.downcast_ref::<crate::ValidationError>().is_some());
        assert!(storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_objects() {
        let storage = Arc::new(FlakyStorage {
            inner: MemoryStorage::new("https://cdn.example.com"),
            failing: AtomicBool::new(false),
        });
        let service = MetadataService::new(storage.clone(), font());
        let mut metadata = aster();
        service.prepare(&mut metadata, ImageGenerator::StarChart).await.unwrap();
        let before = metadata.clone();
        let (_, first_png) = storage.inner.get(before.image.as_deref().unwrap()).await.unwrap();

        storage.failing.store(true, Ordering::SeqCst);
        metadata.attributes.0[0].value = 0;
        assert!(service.prepare(&mut metadata, ImageGenerator::StarChart).await.is_err());

        assert_eq!(metadata.object_keys(), before.object_keys());
        let (_, png) = storage.inner.get(before.image.as_deref().unwrap()).await.unwrap();
        assert_eq!(png, first_png);
        assert!(storage.inner.get(before.metadata.as_deref().unwrap()).await.is_some());
    }

    #[tokio::test]
    async fn unsaved_new_record_leaves_no_objects() {
        let storage = Arc::new(MemoryStorage::new("https://cdn.example.com"));
        let service = service(storage.clone());
        let mut metadata = aster();

        let stored = service.store_objects(&mut metadata, ImageGenerator::StarChart).await.unwrap();
        assert_eq!(storage.keys().await.len(), 2);

        let written: Result<Metadata> = Err(anyhow!("duplicate key value violates unique constraint"));
        assert!(service.settle(&mut metadata, true, &stored.stale, written).await.is_err());
        assert!(storage.keys().await.is_empty());
        assert_eq!(metadata.object_keys(), (None, None));
    }

    #[tokio::test]
    async fn failed_update_keeps_the_regenerated_objects() {
        let storage = Arc::new(MemoryStorage::new("https://cdn.example.com"));
        let service = service(storage.clone());
        let mut metadata = aster();
        service.prepare(&mut metadata, ImageGenerator::StarChart).await.unwrap();

        let stored = service.store_objects(&mut metadata, ImageGenerator::StarChart).await.unwrap();
        let written: Result<Metadata> = Err(anyhow!("connection reset"));
        assert!(service.settle(&mut metadata, false, &stored.stale, written).await.is_err());
        assert_eq!(storage.keys().await.len(), 2);
        assert!(metadata.image.is_some());
    }

    #[tokio::test]
    async fn stale_keys_go_once_the_row_is_written() {
        let storage = Arc::new(MemoryStorage::new("https://cdn.example.com"));
        let service = service(storage.clone());
        let mut metadata = aster();
        storage.put("metadata/old.png", "image/png", vec![1]).await.unwrap();
        metadata.image = Some("metadata/old.png".to_string());

        let stored = service.store_objects(&mut metadata, ImageGenerator::StarChart).await.unwrap();
        assert_eq!(stored.stale, vec!["metadata/old.png".to_string()]);
        assert!(storage.get("metadata/old.png").await.is_some());

        let saved = metadata.clone();
        service.settle(&mut metadata, false, &stored.stale, Ok(saved)).await.unwrap();
        assert!(storage.get("metadata/old.png").await.is_none());
        assert_eq!(storage.keys().await.len(), 2);
    }

    #[tokio::test]
    async fn characters_render_under_their_own_prefix() {
        let storage = Arc::new(MemoryStorage::new("https://cdn.example.com"));
        let service = service(storage.clone());
        let mut ana = Character::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "Ana", "wallet");
        ana.description = "A wanderer".to_string();
        ana.attributes = Json(vec![MetadataAttribute::new("Courage", 3)]);

        let document = service.prepare(&mut ana, ImageGenerator::StarChart).await.unwrap();

        assert_eq!(ana.image, Some(format!("characters/{}.png", ana.id)));
        assert_eq!(document.name, "Ana");
        assert_eq!(document.description, "A wanderer");
        assert_eq!(document.external_url, "");
        assert_eq!(document.attributes, vec![MetadataAttribute::new("Courage", 3)]);
    }

    #[tokio::test]
    async fn remove_objects_clears_keys() {
        let storage = Arc::new(MemoryStorage::new("https://cdn.example.com"));
        let service = service(storage.clone());
        let mut metadata = aster();
        service.prepare(&mut metadata, ImageGenerator::StarChart).await.unwrap();

        service.remove_objects(&mut metadata).await.unwrap();
        assert!(metadata.image.is_none() && metadata.metadata.is_none());
        assert!(storage.keys().await.is_empty());
    }
}
