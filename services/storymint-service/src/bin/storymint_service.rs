use anyhow::{Context, Result};
use tower_http::services::ServeDir;

use storymint_common::{load_dotenv, EnvVars};
use storymint_service_api::{app, setup_tracing, ApiServerEnv, GlobalState, StorageBackend};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    setup_tracing();

    let env = ApiServerEnv::load();
    let global_state = GlobalState::new(&env).await?;

    let mut app = app(global_state);
    if env.storage_backend == StorageBackend::Local {
        let mount = format!("/{}", env.local_storage_url.trim_matches('/'));
        tracing::info!("[storymint_service] serving {} at {}", env.local_storage_root, mount);
        app = app.nest_service(&mount, ServeDir::new(&env.local_storage_root));
    }

    let port = env.port;
    let listener = tokio::net::TcpListener::bind(format!(":::{port}"))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;

    tracing::info!("LISTENING ON {port}");
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
