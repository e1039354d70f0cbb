use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{types::Uuid, PgPool};

use storymint_database::{OrderDirection, QueryCriteria, SqlxFilterQuery, SqlxObject};

use crate::{User, World};

#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "stories"]
pub struct Story {
    pub id: Uuid,

    pub name: String,
    pub description: String,

    #[foreign_key(referenced_table = "users", related_rust_type = "User")]
    pub creator_id: Uuid,

    #[indexed]
    #[foreign_key(referenced_table = "worlds", related_rust_type = "World")]
    pub world_id: Uuid,

    /// Story that has to be played before this one.
    #[foreign_key(referenced_table = "stories", related_rust_type = "Story")]
    pub prerequisite_id: Option<Uuid>,

    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "story_paths"]
pub struct StoryPath {
    pub id: Uuid,

    pub name: String,
    pub description: String,

    #[indexed]
    #[foreign_key(referenced_table = "stories", related_rust_type = "Story")]
    pub story_id: Uuid,

    pub position: i32,

    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "nodes"]
pub struct Node {
    pub id: Uuid,

    #[indexed]
    #[foreign_key(referenced_table = "stories", related_rust_type = "Story")]
    pub story_id: Uuid,

    #[foreign_key(referenced_table = "story_paths", related_rust_type = "StoryPath", on_delete = "SET NULL")]
    pub path_id: Option<Uuid>,

    pub text: String,

    pub created_at: i64,
    pub updated_at: i64,
}

/// An edge of the story graph. `next_node_id = None` is a dead end.
#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "choices"]
pub struct Choice {
    pub id: Uuid,

    #[indexed]
    #[foreign_key(referenced_table = "nodes", related_rust_type = "Node")]
    pub node_id: Uuid,

    #[foreign_key(referenced_table = "nodes", related_rust_type = "Node")]
    pub next_node_id: Option<Uuid>,

    pub choice: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Story {
    pub fn new(creator_id: Uuid, world_id: Uuid, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            creator_id,
            world_id,
            ..Default::default()
        }
    }

    pub async fn list_for_world(pool: &PgPool, world_id: Uuid) -> Result<Vec<Self>> {
        let criteria = QueryCriteria::new()
            .add_valued_filter("world_id", "=", world_id)
            .order_by("created_at", OrderDirection::Asc);
        Ok(Self::find_by_criteria(criteria, pool).await?)
    }
}

impl StoryPath {
    pub fn new(story_id: Uuid, name: impl Into<String>, description: impl Into<String>, position: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            story_id,
            position,
            ..Default::default()
        }
    }
}

impl Node {
    pub fn new(story_id: Uuid, path_id: Option<Uuid>, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            story_id,
            path_id,
            text: text.into(),
            ..Default::default()
        }
    }
}

impl Choice {
    pub fn new(node_id: Uuid, next_node_id: Option<Uuid>, choice: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_id,
            next_node_id,
            choice: choice.into(),
            ..Default::default()
        }
    }

    pub fn is_dead_end(&self) -> bool {
        self.next_node_id.is_none()
    }
}

/// A story with every path, node and choice that belongs to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryGraph {
    pub story: Story,
    pub paths: Vec<StoryPath>,
    pub nodes: Vec<Node>,
    pub choices: Vec<Choice>,
}

impl StoryGraph {
    pub async fn load(pool: &PgPool, story_id: Uuid) -> Result<Option<Self>> {
        let Some(story) = Story::find_by_id(story_id, pool).await? else {
            return Ok(None);
        };

        let paths = StoryPath::find_by_criteria(
            QueryCriteria::new()
                .add_valued_filter("story_id", "=", story_id)
                .order_by("position", OrderDirection::Asc),
            pool,
        ).await?;

        let nodes = Node::find_by_criteria(
            QueryCriteria::new()
                .add_valued_filter("story_id", "=", story_id)
                .order_by("created_at", OrderDirection::Asc),
            pool,
        ).await?;

        let node_ids: Vec<Uuid> = nodes.iter().map(|n| n.id).collect();
        let choices = if node_ids.is_empty() {
            Vec::new()
        } else {
            Choice::find_by_criteria(
                QueryCriteria::new()
                    .add_valued_filter("node_id", "= ANY({})", node_ids)
                    .order_by("created_at", OrderDirection::Asc),
                pool,
            ).await?
        };

        Ok(Some(Self { story, paths, nodes, choices }))
    }

    pub fn choices_from(&self, node_id: Uuid) -> impl Iterator<Item = &Choice> {
        self.choices.iter().filter(move |c| c.node_id == node_id)
    }

    pub fn contains_node(&self, node_id: Uuid) -> bool {
        self.nodes.iter().any(|n| n.id == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_lookups() {
        let story = Story::new(Uuid::new_v4(), Uuid::new_v4(), "Prologue", "");
        let start = Node::new(story.id, None, "You wake up.");
        let end = Node::new(story.id, None, "The end.");
        let go = Choice::new(start.id, Some(end.id), "Get up");
        let stay = Choice::new(start.id, None, "Sleep");

        let graph = StoryGraph {
            story,
            paths: vec![],
            nodes: vec![start.clone(), end.clone()],
            choices: vec![go, stay],
        };

        assert!(graph.contains_node(end.id));
        assert_eq!(graph.choices_from(start.id).count(), 2);
        assert_eq!(graph.choices_from(end.id).count(), 0);
        assert_eq!(graph.choices_from(start.id).filter(|c| c.is_dead_end()).count(), 1);
    }
}
