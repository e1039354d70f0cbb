use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::{Json as SqlJson, Uuid};

use storymint_database::{is_unique_violation, SqlxFilterQuery};
use storymint_runtime::{ImageGenerator, Metadata, MetadataAttribute, MetadataDocument};

use crate::middleware::{authenticate, ensure_user, AuthenticatedUser};
use crate::response::{json_body, AppError, AppSuccess};
use crate::routes::worlds::owned_world;
use crate::utils::absolute_url;
use crate::GlobalState;

pub fn metadata_routes(state: &GlobalState) -> Router<GlobalState> {
    Router::new()
        .route("/api/metadata/{id}", get(get_document))

        .route("/api/worlds/{id}/metadata",
            get(get_world_metadata)
            .put(save_world_metadata)
            .route_layer(middleware::from_fn_with_state(state.clone(), authenticate))
        )
}

/// Public descriptor with an absolute image URL.
async fn get_document(
    State(state): State<GlobalState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<MetadataDocument>, AppError> {
    let metadata = Metadata::find_by_id(id, state.pool()).await?
        .ok_or_else(|| AppError::not_found("Metadata"))?;

    let image_url = state.metadata().image_url(&metadata).unwrap_or_default();
    let mut document = MetadataDocument::assemble(&metadata, &image_url);
    document.image = absolute_url(&document.image, state.public_base_url.as_deref(), &headers);
    Ok(Json(document))
}

fn describe(state: &GlobalState, headers: &HeaderMap, metadata: &Metadata) -> serde_json::Value {
    let absolute = |url: Option<String>| {
        url.map(|url| absolute_url(&url, state.public_base_url.as_deref(), headers))
    };
    json!({
        "metadata": metadata,
        "image_url": absolute(state.metadata().image_url(metadata)),
        "metadata_url": absolute(state.metadata().document_url(metadata)),
    })
}

async fn get_world_metadata(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Path(world_id): Path<Uuid>,
) -> Result<AppSuccess, AppError> {
    let user = ensure_user(&state, &auth).await?;
    let world = owned_world(&state, world_id, &user).await?;

    let metadata = Metadata::find_for_world(state.pool(), world.id).await?
        .ok_or_else(|| AppError::not_found("Metadata"))?;

    Ok(AppSuccess::new(StatusCode::OK, "Metadata fetched successfully", describe(&state, &headers, &metadata)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub external_url: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub attributes: Vec<MetadataAttribute>,
    #[serde(default)]
    pub generator: ImageGenerator,
}

/// Creates the world's metadata or replaces its fields; objects are regenerated either way.
async fn save_world_metadata(
    State(state): State<GlobalState>,
    Extension(auth): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    Path(world_id): Path<Uuid>,
    payload: Result<Json<MetadataPayload>, JsonRejection>,
) -> Result<AppSuccess, AppError> {
    let payload = json_body(payload)?;
    let user = ensure_user(&state, &auth).await?;
    let world = owned_world(&state, world_id, &user).await?;

    let existing = Metadata::find_for_world(state.pool(), world.id).await?;
    let created = existing.is_none();
    let mut metadata = existing.unwrap_or_else(|| Metadata::new(world.id, "", ""));

    metadata.name = payload.name;
    metadata.description = payload.description;
    metadata.external_url = payload.external_url;
    metadata.collection = payload.collection.filter(|c| !c.trim().is_empty());
    metadata.attributes = SqlJson(payload.attributes);
    metadata.generator = payload.generator;

    if let Err(e) = state.metadata().save(state.pool(), &mut metadata).await {
        if e.downcast_ref::<sqlx::Error>().is_some_and(is_unique_violation) {
            return Err(AppError::invalid("Metadata with this collection already exists"));
        }
        return Err(e.into());
    }

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok(AppSuccess::new(status, "Metadata saved successfully", describe(&state, &headers, &metadata)))
}
