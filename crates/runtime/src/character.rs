use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{types::{Json, Uuid}, PgPool};

use storymint_database::{OrderDirection, QueryCriteria, SqlxCrud, SqlxFilterQuery, SqlxObject};

use crate::metadata::{is_base58_key, validate_attributes};
use crate::traits::{impl_asset_fields, Asset};
use crate::{Choice, Faction, MetadataAttribute, Node, Story, User, ValidationError, World};

/// A user's avatar and its position inside the story graph.
///
/// Characters are minted assets: like world metadata they carry a rendered
/// image and JSON document, drawn with the generator of their world.
#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "characters"]
pub struct Character {
    pub id: Uuid,

    pub name: String,
    pub description: String,

    #[indexed]
    #[foreign_key(referenced_table = "worlds", related_rust_type = "World")]
    pub world_id: Uuid,

    #[foreign_key(referenced_table = "factions", related_rust_type = "Faction")]
    pub faction_id: Uuid,

    #[indexed]
    #[foreign_key(referenced_table = "users", related_rust_type = "User")]
    pub user_id: Uuid,

    /// Base58 wallet address the character is minted to.
    #[indexed]
    pub address: String,

    #[foreign_key(referenced_table = "nodes", related_rust_type = "Node")]
    pub current_node_id: Uuid,

    pub attributes: Json<Vec<MetadataAttribute>>,

    /// Base58 address of the minted asset, once known.
    #[unique]
    pub asset: Option<String>,

    /// Storage key of the rendered image.
    pub image: Option<String>,
    /// Storage key of the JSON document.
    pub metadata: Option<String>,
    /// Set whenever the stored objects change, cleared once the asset has picked them up.
    pub has_pending_metadata_update: bool,

    pub created_at: i64,
    pub updated_at: i64,
}

/// History entry: `character` took `choice` while playing `story`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "character_choices"]
pub struct CharacterChoice {
    pub id: Uuid,

    #[foreign_key(referenced_table = "stories", related_rust_type = "Story")]
    pub story_id: Uuid,

    #[indexed]
    #[foreign_key(referenced_table = "characters", related_rust_type = "Character")]
    pub character_id: Uuid,

    #[foreign_key(referenced_table = "choices", related_rust_type = "Choice")]
    pub choice_id: Uuid,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Character {
    pub fn new(
        user_id: Uuid,
        world_id: Uuid,
        faction_id: Uuid,
        start_node_id: Uuid,
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            world_id,
            faction_id,
            user_id,
            address: address.into(),
            current_node_id: start_node_id,
            ..Default::default()
        }
    }

    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>> {
        let criteria = QueryCriteria::new()
            .add_valued_filter("user_id", "=", user_id)
            .order_by("created_at", OrderDirection::Asc);
        Ok(Self::find_by_criteria(criteria, pool).await?)
    }

    pub async fn list_for_world(pool: &PgPool, world_id: Uuid) -> Result<Vec<Self>> {
        let criteria = QueryCriteria::new().add_valued_filter("world_id", "=", world_id);
        Ok(Self::find_by_criteria(criteria, pool).await?)
    }

    /// Records the minted asset address and clears the pending update flag.
    pub async fn mark_synced(self, pool: &PgPool, asset: String) -> Result<Self> {
        if !is_base58_key(&asset) {
            return Err(ValidationError::single("Asset must be a base58 encoded public key").into());
        }
        let mut character = self;
        character.asset = Some(asset);
        character.has_pending_metadata_update = false;
        Ok(character.update(pool).await?)
    }

    /// Moves the character along `choice`.
    ///
    /// The choice must start at the current node and lead somewhere. The move and
    /// its history entry are written in one transaction.
    pub async fn take_choice(self, pool: &PgPool, choice: &Choice) -> Result<(Self, CharacterChoice)> {
        if choice.node_id != self.current_node_id {
            return Err(ValidationError::single("Choice does not start at the character's current node").into());
        }
        let Some(next_node_id) = choice.next_node_id else {
            return Err(ValidationError::single("Choice leads nowhere").into());
        };

        let origin = Node::find_by_id(choice.node_id, pool).await?
            .ok_or_else(|| anyhow::anyhow!("node {} of choice {} not found", choice.node_id, choice.id))?;

        let mut tx = pool.begin().await?;

        let mut character = self;
        character.current_node_id = next_node_id;
        let character = character.update(&mut *tx).await?;

        let entry = CharacterChoice {
            id: Uuid::new_v4(),
            story_id: origin.story_id,
            character_id: character.id,
            choice_id: choice.id,
            ..Default::default()
        }
        .create(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(
            "[Character::take_choice] {} moved {} -> {} via {}",
            character.id, choice.node_id, next_node_id, choice.id
        );
        Ok((character, entry))
    }

    pub async fn history(&self, pool: &PgPool) -> Result<Vec<CharacterChoice>> {
        let criteria = QueryCriteria::new()
            .add_valued_filter("character_id", "=", self.id)
            .order_by("created_at", OrderDirection::Asc);
        Ok(CharacterChoice::find_by_criteria(criteria, pool).await?)
    }
}

impl_asset_fields!(Character);

impl Asset for Character {
    const KEY_PREFIX: &'static str = "characters";

    fn asset_id(&self) -> Uuid {
        self.id
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Name may not be blank".to_string());
        }
        validate_attributes(&self.attributes, &mut errors);
        if let Some(asset) = &self.asset {
            if !is_base58_key(asset) {
                errors.push("Asset must be a base58 encoded public key".to_string());
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
