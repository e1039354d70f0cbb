pub trait EnvVars {
    fn load() -> Self;
    fn get_env_var(&self, key: &str) -> String;
}

/// Reads a `.env` file from the working directory if there is one.
pub fn load_dotenv() {
    match dotenv::dotenv() {
        Ok(path) => tracing::debug!("[load_dotenv] loaded {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("[load_dotenv] failed to read .env: {}", e),
    }
}
