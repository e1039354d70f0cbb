use std::sync::Arc;

use anyhow::Result;
use sqlx::PgPool;
use url::Url;

use storymint_clients::{LocalStorage, PostgresClient, R2Client};
use storymint_common::ModuleClient;
use storymint_runtime::{ChartFont, MetadataService, ObjectStorage, WorldService};

use crate::env::{ApiServerEnv, StorageBackend};
use crate::jwt::JwtManager;

#[derive(Clone)]
pub struct GlobalState {
    pub db: PostgresClient,
    pub jwt: JwtManager,
    pub worlds: WorldService,
    pub public_base_url: Option<String>,
}

impl GlobalState {
    pub async fn new(env: &ApiServerEnv) -> Result<Self> {
        let db = PostgresClient::setup_connection().await?;

        let storage: Arc<dyn ObjectStorage> = match env.storage_backend {
            StorageBackend::R2 => Arc::new(R2Client::setup_connection().await?),
            StorageBackend::Local => Arc::new(LocalStorage::new(&env.local_storage_root, &env.local_storage_url)),
        };
        tracing::info!("[GlobalState::new] storing generated objects in {}", env.storage_backend);

        // local storage hands out relative URLs; stored documents need absolute ones
        let public_base_url = env.public_base_url.clone().or_else(|| match env.storage_backend {
            StorageBackend::Local => {
                let fallback = format!("http://localhost:{}", env.port);
                tracing::warn!("[GlobalState::new] PUBLIC_BASE_URL is not set, using {}", fallback);
                Some(fallback)
            }
            StorageBackend::R2 => None,
        });

        let font = Arc::new(ChartFont::load(env.star_chart_font.as_deref())?);
        let jwt = JwtManager::new(&env.jwt_secret, env.access_token_ttl_secs, env.refresh_token_ttl_secs)?;

        Ok(Self::from_parts(db, storage, font, jwt, public_base_url))
    }

    pub fn from_parts(
        db: PostgresClient,
        storage: Arc<dyn ObjectStorage>,
        font: Arc<ChartFont>,
        jwt: JwtManager,
        public_base_url: Option<String>,
    ) -> Self {
        let mut metadata = MetadataService::new(storage, font);
        if let Some(base) = public_base_url.as_deref() {
            match Url::parse(base) {
                Ok(base) => metadata = metadata.with_public_base_url(base),
                Err(e) => tracing::warn!("[GlobalState::from_parts] ignoring PUBLIC_BASE_URL {}: {}", base, e),
            }
        }

        Self {
            db,
            jwt,
            worlds: WorldService::new(metadata),
            public_base_url,
        }
    }

    pub fn pool(&self) -> &'static PgPool {
        **self.db.get_client()
    }

    pub fn metadata(&self) -> &MetadataService {
        self.worlds.metadata()
    }
}
