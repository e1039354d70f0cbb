use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{types::Uuid, PgPool};

use storymint_database::{OrderDirection, QueryCriteria, SqlxFilterQuery, SqlxObject};

use crate::User;

/// Top-level content container owned by its creator.
#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "worlds"]
pub struct World {
    pub id: Uuid,

    pub name: String,
    pub description: String,

    #[indexed]
    #[foreign_key(referenced_table = "users", related_rust_type = "User")]
    pub creator_id: Uuid,

    pub created_at: i64,
    pub updated_at: i64,
}

impl World {
    pub fn new(creator_id: Uuid, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            creator_id,
            ..Default::default()
        }
    }

    pub async fn list_for_creator(pool: &PgPool, creator_id: Uuid) -> Result<Vec<Self>> {
        let criteria = QueryCriteria::new()
            .add_valued_filter("creator_id", "=", creator_id)
            .order_by("created_at", OrderDirection::Desc);
        Ok(Self::find_by_criteria(criteria, pool).await?)
    }

    /// The world, if it exists and belongs to `creator_id`.
    pub async fn find_owned(pool: &PgPool, id: Uuid, creator_id: Uuid) -> Result<Option<Self>> {
        let criteria = QueryCriteria::new()
            .add_valued_filter("id", "=", id)
            .add_valued_filter("creator_id", "=", creator_id);
        Ok(Self::find_one_by_criteria(criteria, pool).await?)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "factions"]
pub struct Faction {
    pub id: Uuid,

    pub name: String,
    pub description: String,

    #[indexed]
    #[foreign_key(referenced_table = "worlds", related_rust_type = "World")]
    pub world_id: Uuid,

    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "character_attributes"]
pub struct CharacterAttribute {
    pub id: Uuid,

    pub name: String,
    pub description: String,

    #[indexed]
    #[foreign_key(referenced_table = "worlds", related_rust_type = "World")]
    pub world_id: Uuid,

    pub created_at: i64,
    pub updated_at: i64,
}

macro_rules! world_scoped {
    ($($ty:ident),*) => {
        $(impl $ty {
            pub fn new(world_id: Uuid, name: impl Into<String>, description: impl Into<String>) -> Self {
                Self {
                    id: Uuid::new_v4(),
                    name: name.into(),
                    description: description.into(),
                    world_id,
                    ..Default::default()
                }
            }

            pub async fn list_for_world(pool: &PgPool, world_id: Uuid) -> Result<Vec<Self>> {
                let criteria = QueryCriteria::new()
                    .add_valued_filter("world_id", "=", world_id)
                    .order_by("name", OrderDirection::Asc);
                Ok(Self::find_by_criteria(criteria, pool).await?)
            }
        })*
    };
}

world_scoped!(Faction, CharacterAttribute);
