use storymint_common::define_module_client;
use storymint_database::init_databases;
use sqlx::PgPool;

// Parents first: rows holding foreign keys come after the tables they point at.
init_databases!(
    default: [
        storymint_runtime::User,
        storymint_runtime::World,
        storymint_runtime::Metadata,
        storymint_runtime::Faction,
        storymint_runtime::CharacterAttribute,

        storymint_runtime::Story,
        storymint_runtime::StoryPath,
        storymint_runtime::Node,
        storymint_runtime::Choice,

        storymint_runtime::Character,
        storymint_runtime::CharacterChoice,
    ]
);

define_module_client! {
    (struct PostgresClient, "postgres")
    client_type: &'static PgPool,
    env: ["DATABASE_URL"],
    setup: async {
        connect(false, true).await
    }
}
