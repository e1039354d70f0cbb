mod env;
mod global_state;
mod jwt;
mod middleware;
mod response;
mod routes;
mod utils;

use std::time::Duration;

use axum::Router;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

pub use routes::{
    auth_routes,
    character_routes,
    metadata_routes,
    misc_routes,
    story_routes,
    world_routes,
};

pub use env::{ApiServerEnv, StorageBackend};
pub use global_state::GlobalState;
pub use jwt::{Claims, JwtManager, TokenError, TokenKind, TokenPair};
pub use middleware::{authenticate, ensure_user, AuthenticatedUser, SESSION_COOKIE};
pub use response::{json_body, AppError, AppSuccess, TOKEN_INVALID_DETAIL};
pub use utils::{absolute_url, setup_tracing};

/// Every route with the standard layers applied.
pub fn app(state: GlobalState) -> Router {
    Router::new()
        .merge(misc_routes())
        .merge(auth_routes(&state))
        .merge(metadata_routes(&state))
        .merge(world_routes(&state))
        .merge(story_routes(&state))
        .merge(character_routes(&state))
        .layer(TimeoutLayer::new(Duration::from_secs(60)))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
