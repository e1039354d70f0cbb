/// Declares the process-wide Postgres pool and the tables that live in it.
///
/// Tables are created in the order given, so list parents before the records
/// that hold foreign keys to them. Dropping runs in reverse order.
///
/// # Generated items
/// - `async fn connect(drop_existing: bool, create_missing: bool) -> anyhow::Result<&'static PgPool>`
/// - `async fn create_tables(pool: &PgPool) -> anyhow::Result<()>`
///
/// # Example
/// ```rust,ignore
/// init_databases!(default: [User, World, Metadata]);
///
/// let pool = connect(false, true).await?;
/// ```
#[macro_export]
macro_rules! init_databases {
    (
        default: [$($default_type:ty),* $(,)?]
    ) => {
        static POOL: $crate::tokio::sync::OnceCell<$crate::sqlx::PgPool> = $crate::tokio::sync::OnceCell::const_new();

        const SET_UPDATED_AT_FN_SQL: &str = r#"
        CREATE OR REPLACE FUNCTION set_updated_at_unix_timestamp()
        RETURNS TRIGGER AS $$
        BEGIN NEW.updated_at = floor(extract(epoch from now())); RETURN NEW; END;
        $$ language 'plpgsql';
        "#;

        #[allow(dead_code)]
        pub async fn create_tables(pool: &$crate::sqlx::PgPool) -> ::anyhow::Result<()> {
            use ::anyhow::Context;

            $crate::sqlx::query(SET_UPDATED_AT_FN_SQL).execute(pool).await
                .context("failed to create timestamp helper function")?;

            $(
                let create_table_sql = <$default_type as $crate::SqlxSchema>::create_table_sql();
                $crate::sqlx::query(&create_table_sql).execute(pool).await
                    .with_context(|| format!("failed to create table for '{}'", stringify!($default_type)))?;

                let trigger_sql = <$default_type as $crate::SqlxSchema>::trigger_sql();
                for statement in trigger_sql.split(';').filter(|s| !s.trim().is_empty()) {
                    $crate::sqlx::query(statement).execute(pool).await
                        .with_context(|| format!("failed to execute trigger for '{}': {}", stringify!($default_type), statement))?;
                }

                for index_sql in <$default_type as $crate::SqlxSchema>::INDEXES_SQL {
                    $crate::sqlx::query(index_sql).execute(pool).await
                        .with_context(|| format!("failed to create index for '{}': {}", stringify!($default_type), index_sql))?;
                }
            )*

            $crate::tracing::info!("[init_databases] tables ready");
            Ok(())
        }

        #[allow(dead_code)]
        pub async fn drop_tables(pool: &$crate::sqlx::PgPool) -> ::anyhow::Result<()> {
            let mut drop_statements: Vec<String> = vec![
                $( <$default_type as $crate::SqlxSchema>::drop_table_sql() ),*
            ];
            drop_statements.reverse();

            for statement in drop_statements {
                if let Err(e) = $crate::sqlx::query(&statement).execute(pool).await {
                    $crate::tracing::warn!("[init_databases] failed to run '{}': {:?}", statement, e);
                }
            }
            Ok(())
        }

        pub async fn connect(drop_existing: bool, create_missing: bool) -> ::anyhow::Result<&'static $crate::sqlx::PgPool> {
            POOL.get_or_try_init(|| async {
                let database_url = std::env::var("DATABASE_URL")
                    .map_err(|_| ::anyhow::anyhow!("DATABASE_URL environment variable not set"))?;

                let pool = $crate::sqlx::PgPool::connect(&database_url).await?;

                if drop_existing {
                    drop_tables(&pool).await?;
                }
                if create_missing {
                    create_tables(&pool).await?;
                }

                Ok::<_, ::anyhow::Error>(pool)
            }).await
        }
    };
}
