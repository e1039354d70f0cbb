use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Uuid;

use storymint_database::{SqlxCrud, SqlxFilterQuery};
use storymint_runtime::{Choice, Node, Story, StoryGraph, StoryPath, User, World};

use crate::middleware::{authenticate, ensure_user, AuthenticatedUser};
use crate::response::{json_body, AppError, AppSuccess};
use crate::routes::worlds::owned_world;
use crate::GlobalState;

pub fn story_routes(state: &GlobalState) -> Router<GlobalState> {
    Router::new()
        .route("/api/worlds/{id}/stories",
            get(list_stories)
            .post(create_story)
        )
        .route("/api/stories/{id}", get(get_story_graph))
        .route("/api/stories/{id}/paths", post(create_path))
        .route("/api/stories/{id}/nodes", post(create_node))
        .route("/api/nodes/{id}/choices", post(create_choice))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
}

/// The story if `user` authored it.
async fn authored_story(state: &GlobalState, story_id: Uuid, user: &User) -> Result<Story, AppError> {
    Story::find_by_id(story_id, state.pool()).await?
        .filter(|story| story.creator_id == user.id)
        .ok_or_else(|| AppError::not_found("Story"))
}

async fn list_stories(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(world_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_user(&state, &auth).await?;
    let world = World::find_by_id(world_id, state.pool()).await?
        .ok_or_else(|| AppError::not_found("World"))?;

    let stories = Story::list_for_world(state.pool(), world.id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Stories fetched successfully", json!(stories)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoryPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prerequisite_id: Option<Uuid>,
}

async fn create_story(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(world_id): Path<Uuid>,
    payload: Result<Json<StoryPayload>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::invalid("Name may not be blank"));
    }
    let user = ensure_user(&state, &auth).await?;
    let world = owned_world(&state, world_id, &user).await?;

    if let Some(prerequisite_id) = payload.prerequisite_id {
        let prerequisite = Story::find_by_id(prerequisite_id, state.pool()).await?;
        if prerequisite.map(|p| p.world_id) != Some(world.id) {
            return Err(AppError::invalid("Prerequisite must be a story of the same world"));
        }
    }

    let mut story = Story::new(user.id, world.id, payload.name, payload.description);
    story.prerequisite_id = payload.prerequisite_id;
    let story = story.create(state.pool()).await?;

    tracing::info!("[create_story] story {} in world {}", story.id, world.id);
    Ok(AppSuccess::new(StatusCode::CREATED, "Story created successfully", json!(story)))
}

async fn get_story_graph(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    ensure_user(&state, &auth).await?;
    let graph = StoryGraph::load(state.pool(), id).await?
        .ok_or_else(|| AppError::not_found("Story"))?;
    Ok(AppSuccess::new(StatusCode::OK, "Story fetched successfully", json!(graph)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PathPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub position: i32,
}

async fn create_path(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(story_id): Path<Uuid>,
    payload: Result<Json<PathPayload>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    let user = ensure_user(&state, &auth).await?;
    let story = authored_story(&state, story_id, &user).await?;

    let path = StoryPath::new(story.id, payload.name, payload.description, payload.position)
        .create(state.pool())
        .await?;
    Ok(AppSuccess::new(StatusCode::CREATED, "Path created successfully", json!(path)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodePayload {
    pub text: String,
    #[serde(default)]
    pub path_id: Option<Uuid>,
}

async fn create_node(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(story_id): Path<Uuid>,
    payload: Result<Json<NodePayload>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    let user = ensure_user(&state, &auth).await?;
    let story = authored_story(&state, story_id, &user).await?;

    if let Some(path_id) = payload.path_id {
        let path = StoryPath::find_by_id(path_id, state.pool()).await?;
        if path.map(|p| p.story_id) != Some(story.id) {
            return Err(AppError::invalid("Path must belong to the same story"));
        }
    }

    let node = Node::new(story.id, payload.path_id, payload.text)
        .create(state.pool())
        .await?;
    Ok(AppSuccess::new(StatusCode::CREATED, "Node created successfully", json!(node)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChoicePayload {
    pub choice: String,
    /// Omit for a dead end.
    #[serde(default)]
    pub next_node_id: Option<Uuid>,
}

async fn create_choice(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(node_id): Path<Uuid>,
    payload: Result<Json<ChoicePayload>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    if payload.choice.trim().is_empty() {
        return Err(AppError::invalid("Choice may not be blank"));
    }
    let user = ensure_user(&state, &auth).await?;
    let node = Node::find_by_id(node_id, state.pool()).await?
        .ok_or_else(|| AppError::not_found("Node"))?;
    let story = authored_story(&state, node.story_id, &user).await?;

    if let Some(next_node_id) = payload.next_node_id {
        let next = Node::find_by_id(next_node_id, state.pool()).await?;
        if next.map(|n| n.story_id) != Some(story.id) {
            return Err(AppError::invalid("Next node must belong to the same story"));
        }
    }

    let choice = Choice::new(node.id, payload.next_node_id, payload.choice)
        .create(state.pool())
        .await?;
    Ok(AppSuccess::new(StatusCode::CREATED, "Choice created successfully", json!(choice)))
}
