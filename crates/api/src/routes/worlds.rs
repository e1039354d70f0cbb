use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::Uuid;

use storymint_database::SqlxCrud;
use storymint_runtime::{CharacterAttribute, Faction, User, World};

use crate::middleware::{authenticate, ensure_user, AuthenticatedUser};
use crate::response::{json_body, AppError, AppSuccess};
use crate::GlobalState;

pub fn world_routes(state: &GlobalState) -> Router<GlobalState> {
    Router::new()
        .route("/api/worlds",
            get(list_worlds)
            .post(create_world)
        )
        .route("/api/worlds/{id}",
            get(get_world)
            .put(update_world)
            .delete(delete_world)
        )
        .route("/api/worlds/{id}/factions",
            get(list_factions)
            .post(create_faction)
        )
        .route("/api/worlds/{id}/attributes",
            get(list_attributes)
            .post(create_attribute)
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
}

/// The world if `user` created it. Someone else's world is reported as missing.
pub async fn owned_world(state: &GlobalState, world_id: Uuid, user: &User) -> Result<World, AppError> {
    World::find_owned(state.pool(), world_id, user.id).await?
        .ok_or_else(|| AppError::not_found("World"))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorldPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl WorldPayload {
    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::invalid("Name may not be blank"));
        }
        Ok(())
    }
}

async fn list_worlds(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_user(&state, &auth).await?;
    let worlds = World::list_for_creator(state.pool(), user.id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Worlds fetched successfully", json!(worlds)))
}

async fn create_world(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    payload: Result<Json<WorldPayload>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    payload.validate()?;
    let user = ensure_user(&state, &auth).await?;

    let world = state.worlds
        .create(state.pool(), World::new(user.id, payload.name, payload.description))
        .await?;
    Ok(AppSuccess::new(StatusCode::CREATED, "World created successfully", json!(world)))
}

async fn get_world(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_user(&state, &auth).await?;
    let world = owned_world(&state, id, &user).await?;
    Ok(AppSuccess::new(StatusCode::OK, "World fetched successfully", json!(world)))
}

async fn update_world(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<WorldPayload>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    payload.validate()?;
    let user = ensure_user(&state, &auth).await?;
    let mut world = owned_world(&state, id, &user).await?;

    world.name = payload.name;
    world.description = payload.description;
    let world = state.worlds.update(state.pool(), world).await?;
    Ok(AppSuccess::new(StatusCode::OK, "World updated successfully", json!(world)))
}

async fn delete_world(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_user(&state, &auth).await?;
    let world = owned_world(&state, id, &user).await?;

    state.worlds.delete(state.pool(), world).await?;
    Ok(AppSuccess::new(StatusCode::OK, "World deleted successfully", json!({ "id": id })))
}

async fn list_factions(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_user(&state, &auth).await?;
    let world = owned_world(&state, id, &user).await?;
    let factions = Faction::list_for_world(state.pool(), world.id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Factions fetched successfully", json!(factions)))
}

async fn create_faction(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<WorldPayload>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    payload.validate()?;
    let user = ensure_user(&state, &auth).await?;
    let world = owned_world(&state, id, &user).await?;

    let faction = Faction::new(world.id, payload.name, payload.description)
        .create(state.pool())
        .await?;
    Ok(AppSuccess::new(StatusCode::CREATED, "Faction created successfully", json!(faction)))
}

async fn list_attributes(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_user(&state, &auth).await?;
    let world = owned_world(&state, id, &user).await?;
    let attributes = CharacterAttribute::list_for_world(state.pool(), world.id).await?;
    Ok(AppSuccess::new(StatusCode::OK, "Attributes fetched successfully", json!(attributes)))
}

async fn create_attribute(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    Path(id): Path<Uuid>,
    payload: Result<Json<WorldPayload>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    payload.validate()?;
    let user = ensure_user(&state, &auth).await?;
    let world = owned_world(&state, id, &user).await?;

    let attribute = CharacterAttribute::new(world.id, payload.name, payload.description)
        .create(state.pool())
        .await?;
    Ok(AppSuccess::new(StatusCode::CREATED, "Attribute created successfully", json!(attribute)))
}
