//! Runs against a scratch database:
//! `DATABASE_URL=postgres://... cargo test -p storymint-runtime --test postgres -- --ignored`

use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use sqlx::types::Json;
use storymint_database::{init_databases, SqlxCrud, SqlxFilterQuery};
use storymint_runtime::*;

init_databases!(default: [
    User, World, Metadata, Faction, CharacterAttribute,
    Story, StoryPath, Node, Choice, Character, CharacterChoice,
]);

fn credentials(seed: u8, message: &str) -> WalletCredentials {
    let key = SigningKey::from_bytes(&[seed; 32]);
    WalletCredentials {
        public_key: bs58::encode(key.verifying_key().as_bytes()).into_string(),
        signature: bs58::encode(key.sign(message.as_bytes()).to_bytes()).into_string(),
        signed_message: message.to_string(),
    }
}

#[tokio::test]
#[ignore]
async fn world_lifecycle() -> anyhow::Result<()> {
    let pool = connect(true, true).await?;

    // sign-in is idempotent per key
    let creds = credentials(7, SIGN_IN_STATEMENT);
    let user = WalletAuthenticator::authenticate(pool, &creds).await?.expect("valid signature");
    let again = WalletAuthenticator::authenticate(pool, &creds).await?.expect("valid signature");
    assert_eq!(user.id, again.id);
    assert_eq!(user.username, creds.public_key);

    let mut forged = credentials(8, SIGN_IN_STATEMENT);
    forged.signed_message = "something else".to_string();
    assert!(WalletAuthenticator::authenticate(pool, &forged).await?.is_none());
    assert!(User::find_by_username(pool, &forged.public_key).await?.is_none());

    let storage = Arc::new(MemoryStorage::new("https://cdn.example.com"));
    let metadata_service = MetadataService::new(storage.clone(), Arc::new(ChartFont::embedded()?));
    let worlds = WorldService::new(metadata_service.clone());

    let world = worlds.create(pool, World::new(user.id, "Aster", "A drifting world")).await?;
    assert!(World::find_owned(pool, world.id, user.id).await?.is_some());

    let mut metadata = Metadata::new(world.id, "Aster", "A drifting world");
    metadata.attributes = Json(vec![MetadataAttribute::new("Strength", 3)]);
    metadata_service.save(pool, &mut metadata).await?;
    metadata.attributes = Json(vec![MetadataAttribute::new("Strength", 5)]);
    metadata_service.save(pool, &mut metadata).await?;

    let stored = Metadata::find_for_world(pool, world.id).await?.expect("metadata row");
    assert_eq!(stored.attributes.0[0].value, 5);
    assert_eq!(storage.keys().await.len(), 2);

    // a tiny story: start -> end
    let faction = Faction::new(world.id, "Wanderers", "").create(pool).await?;
    let story = Story::new(user.id, world.id, "Arrival", "").create(pool).await?;
    let path = StoryPath::new(story.id, "Main", "", 0).create(pool).await?;
    let start = Node::new(story.id, Some(path.id), "You wake up.").create(pool).await?;
    let end = Node::new(story.id, Some(path.id), "You leave.").create(pool).await?;
    let go = Choice::new(start.id, Some(end.id), "Leave").create(pool).await?;
    let stay = Choice::new(end.id, None, "Stay").create(pool).await?;

    let graph = StoryGraph::load(pool, story.id).await?.expect("story graph");
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.choices_from(start.id).count(), 1);

    // characters are drawn with their world's generator and stored next to the metadata
    let mut character = Character::new(user.id, world.id, faction.id, start.id, "Ana", &creds.public_key);
    character.attributes = Json(vec![MetadataAttribute::new("Courage", 4)]);
    let document = metadata_service.save_character(pool, &mut character).await?;
    assert_eq!(document.name, "Ana");
    assert!(character.has_pending_metadata_update);
    assert_eq!(storage.keys().await.len(), 4);

    let character = character.mark_synced(pool, creds.public_key.clone()).await?;
    assert!(!character.has_pending_metadata_update);
    assert_eq!(character.asset.as_deref(), Some(creds.public_key.as_str()));

    let (character, entry) = character.take_choice(pool, &go).await?;
    assert_eq!(character.current_node_id, end.id);
    assert_eq!(entry.story_id, story.id);
    assert!(character.clone().take_choice(pool, &stay).await.is_err());
    assert_eq!(character.history(pool).await?.len(), 1);

    worlds.delete(pool, world.clone()).await?;
    assert!(storage.keys().await.is_empty());
    assert!(World::find_by_id(world.id, pool).await?.is_none());
    assert!(Character::find_by_id(character.id, pool).await?.is_none());
    assert!(Choice::find_by_id(go.id, pool).await?.is_none());
    assert!(User::find_by_id(user.id, pool).await?.is_some());

    Ok(())
}
