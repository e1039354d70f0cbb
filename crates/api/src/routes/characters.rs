use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::{Json as SqlJson, Uuid};

use storymint_database::{is_unique_violation, SqlxFilterQuery};
use storymint_runtime::{Character, Choice, Faction, MetadataAttribute, Node, Story, User, World};

use crate::middleware::{authenticate, ensure_user, AuthenticatedUser};
use crate::response::{json_body, AppError, AppSuccess};
use crate::GlobalState;

pub fn character_routes(state: &GlobalState) -> Router<GlobalState> {
    Router::new()
        .route("/api/characters",
            get(list_characters)
            .post(create_character)
        )
        .route("/api/characters/{id}", get(get_character))
        .route("/api/characters/{id}/choices", post(take_choice))
        .route("/api/characters/{id}/synced", post(mark_synced))
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
}

async fn own_character(state: &GlobalState, id: Uuid, user: &User) -> Result<Character, AppError> {
    Character::find_by_id(id, state.pool()).await?
        .filter(|character| character.user_id == user.id)
        .ok_or_else(|| AppError::not_found("Character"))
}

/// The character with absolute URLs of its generated objects.
fn describe(state: &GlobalState, character: &Character) -> serde_json::Value {
    json!({
        "character": character,
        "image_url": state.metadata().image_url(character),
        "metadata_url": state.metadata().document_url(character),
    })
}

async fn list_characters(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_user(&state, &auth).await?;
    let characters = Character::list_for_user(state.pool(), user.id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Characters fetched successfully", json!(characters)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateCharacterRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub world_id: Uuid,
    pub faction_id: Uuid,
    pub start_node_id: Uuid,
    /// Defaults to the signed-in wallet.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub attributes: Vec<MetadataAttribute>,
}

async fn create_character(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<CreateCharacterRequest>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    let user = ensure_user(&state, &auth).await?;
    let pool = state.pool();

    let world = World::find_by_id(payload.world_id, pool).await?
        .ok_or_else(|| AppError::not_found("World"))?;

    let faction = Faction::find_by_id(payload.faction_id, pool).await?;
    if faction.map(|f| f.world_id) != Some(world.id) {
        return Err(AppError::invalid("Faction must belong to the character's world"));
    }

    let start = Node::find_by_id(payload.start_node_id, pool).await?
        .ok_or_else(|| AppError::invalid("Start node does not exist"))?;
    let story = Story::find_by_id(start.story_id, pool).await?;
    if story.map(|s| s.world_id) != Some(world.id) {
        return Err(AppError::invalid("Start node must belong to a story of the character's world"));
    }

    let address = payload.address.unwrap_or_else(|| user.username.clone());
    let mut character = Character::new(user.id, world.id, payload.faction_id, start.id, payload.name, address);
    character.description = payload.description;
    character.attributes = SqlJson(payload.attributes);
    state.metadata().save_character(pool, &mut character).await?;

    tracing::info!("[create_character] {} joined world {} as {}", user.id, world.id, character.id);
    Ok(AppSuccess::new(StatusCode::CREATED, "Character created successfully", describe(&state, &character)))
}

async fn get_character(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_user(&state, &auth).await?;
    let character = own_character(&state, id, &user).await?;
    let history = character.history(state.pool()).await?;
    let current_node = character.fetch_current_node(state.pool()).await?;

    let mut data = describe(&state, &character);
    data["current_node"] = json!(current_node);
    data["history"] = json!(history);
    Ok(AppSuccess::new(StatusCode::OK, "Character fetched successfully", data))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TakeChoiceRequest {
    pub choice_id: Uuid,
}

async fn take_choice(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<TakeChoiceRequest>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    let user = ensure_user(&state, &auth).await?;
    let character = own_character(&state, id, &user).await?;
    let choice = Choice::find_by_id(payload.choice_id, state.pool()).await?
        .ok_or_else(|| AppError::not_found("Choice"))?;

    let (character, entry) = character.take_choice(state.pool(), &choice).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Choice taken", json!({
        "character": character,
        "entry": entry,
    })))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SyncedRequest {
    /// Base58 address of the minted asset.
    pub asset: String,
}

/// Records that the minted asset picked up the current objects.
async fn mark_synced(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SyncedRequest>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    let user = ensure_user(&state, &auth).await?;
    let character = own_character(&state, id, &user).await?;

    let character = match character.mark_synced(state.pool(), payload.asset).await {
        Ok(character) => character,
        Err(e) if e.downcast_ref::<sqlx::Error>().is_some_and(is_unique_violation) => {
            return Err(AppError::invalid("Character with this asset already exists"));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(AppSuccess::new(StatusCode::OK, "Character synced", describe(&state, &character)))
}
