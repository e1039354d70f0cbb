use anyhow::Result;
use sqlx::PgPool;

use storymint_database::SqlxCrud;

use crate::{Character, Metadata, MetadataService, World};

/// World lifecycle operations that reach beyond the database.
#[derive(Clone)]
pub struct WorldService {
    metadata: MetadataService,
}

impl WorldService {
    pub fn new(metadata: MetadataService) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &MetadataService {
        &self.metadata
    }

    pub async fn create(&self, pool: &PgPool, world: World) -> Result<World> {
        let world = world.create(pool).await?;
        tracing::info!("[WorldService::create] world {} created by {}", world.id, world.creator_id);
        Ok(world)
    }

    pub async fn update(&self, pool: &PgPool, world: World) -> Result<World> {
        Ok(world.update(pool).await?)
    }

    /// Removes the stored objects of the world's metadata and characters, then
    /// the world row. Rows depending on the world go with it through the
    /// foreign key cascade.
    pub async fn delete(&self, pool: &PgPool, world: World) -> Result<()> {
        if let Some(mut metadata) = Metadata::find_for_world(pool, world.id).await? {
            self.metadata.remove_objects(&mut metadata).await?;
        }
        for mut character in Character::list_for_world(pool, world.id).await? {
            self.metadata.remove_objects(&mut character).await?;
        }

        let id = world.id;
        let deleted = world.delete(pool).await?;
        tracing::info!("[WorldService::delete] world {} deleted ({} row)", id, deleted);
        Ok(())
    }
}
