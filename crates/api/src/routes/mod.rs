mod auth;
mod characters;
mod metadata;
mod misc;
mod stories;
mod worlds;

pub use auth::auth_routes;
pub use characters::character_routes;
pub use metadata::metadata_routes;
pub use misc::misc_routes;
pub use stories::story_routes;
pub use worlds::world_routes;
