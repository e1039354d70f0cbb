use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{types::Uuid, PgPool};

use storymint_common::get_current_timestamp;
use storymint_database::{is_unique_violation, QueryCriteria, SqlxCrud, SqlxFilterQuery, SqlxObject};

/// A wallet holder. `username` is the base58 Ed25519 public key.
#[derive(Debug, Serialize, Deserialize, Clone, Default, SqlxObject)]
#[table_name = "users"]
pub struct User {
    pub id: Uuid,

    #[unique]
    pub username: String,
    pub email: Option<String>,

    pub is_active: bool,
    pub is_staff: bool,
    pub last_login: Option<i64>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            is_active: true,
            ..Default::default()
        }
    }

    pub async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Self>> {
        let criteria = QueryCriteria::new()
            .add_valued_filter("username", "=", username.to_string());
        Ok(Self::find_one_by_criteria(criteria, pool).await?)
    }

    /// Returns the user keyed by `username`, creating it on first sight.
    /// The flag is true when the user was created by this call.
    pub async fn find_or_create(pool: &PgPool, username: &str) -> Result<(Self, bool)> {
        if let Some(user) = Self::find_by_username(pool, username).await? {
            return Ok((user, false));
        }

        match Self::new(username).create(pool).await {
            Ok(user) => {
                tracing::info!("[User::find_or_create] created user {} for {}", user.id, username);
                Ok((user, true))
            }
            // a concurrent sign-in with the same key won the insert
            Err(e) if is_unique_violation(&e) => {
                let user = Self::find_by_username(pool, username).await?
                    .ok_or_else(|| anyhow::anyhow!("user {} vanished after unique violation", username))?;
                Ok((user, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn record_login(mut self, pool: &PgPool) -> Result<Self> {
        self.last_login = Some(get_current_timestamp());
        Ok(self.update(pool).await?)
    }
}
