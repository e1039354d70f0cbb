mod auth;
mod character;
mod error;
mod metadata;
mod services;
mod storage;
mod story;
mod traits;
mod user;
mod world;

pub use auth::{
    verify_wallet_signature, SignInChallenge, SignatureError, WalletAuthenticator, WalletCredentials,
    SIGN_IN_STATEMENT,
};
pub use character::{Character, CharacterChoice};
pub use error::ValidationError;
pub use metadata::{
    strip_url_cruft, ChartFont, ImageGenerator, Metadata, MetadataAttribute, MetadataDocument,
    MetadataService, StarChart, CHART_SIZE, MAX_ATTRIBUTES, MAX_ATTRIBUTE_SCORE,
};
pub use services::WorldService;
pub use storage::{MemoryStorage, ObjectStorage};
pub use story::{Choice, Node, Story, StoryGraph, StoryPath};
pub use traits::{Asset, Attributed, Described, Named};
pub use user::User;
pub use world::{CharacterAttribute, Faction, World};
