use std::str::FromStr;

use storymint_common::EnvVars;
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StorageBackend {
    R2,
    #[default]
    Local,
}

#[derive(Debug, Clone)]
pub struct ApiServerEnv {
    pub port: u16,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub storage_backend: StorageBackend,
    pub local_storage_root: String,
    pub local_storage_url: String,
    pub public_base_url: Option<String>,
    pub star_chart_font: Option<String>,
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("[ApiServerEnv::load] {}={} is not valid, using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl EnvVars for ApiServerEnv {
    fn load() -> Self {
        Self {
            port: parsed_or("PORT", 3033),
            jwt_secret: var_or("JWT_SECRET", ""),
            access_token_ttl_secs: parsed_or("ACCESS_TOKEN_TTL_SECS", 300),
            refresh_token_ttl_secs: parsed_or("REFRESH_TOKEN_TTL_SECS", 86_400),
            storage_backend: parsed_or("STORAGE_BACKEND", StorageBackend::Local),
            local_storage_root: var_or("LOCAL_STORAGE_ROOT", "media"),
            local_storage_url: var_or("LOCAL_STORAGE_URL", "/media"),
            public_base_url: non_empty("PUBLIC_BASE_URL"),
            star_chart_font: non_empty("STAR_CHART_FONT"),
        }
    }

    fn get_env_var(&self, key: &str) -> String {
        match key {
            "PORT" => self.port.to_string(),
            "JWT_SECRET" => self.jwt_secret.clone(),
            "ACCESS_TOKEN_TTL_SECS" => self.access_token_ttl_secs.to_string(),
            "REFRESH_TOKEN_TTL_SECS" => self.refresh_token_ttl_secs.to_string(),
            "STORAGE_BACKEND" => self.storage_backend.to_string(),
            "LOCAL_STORAGE_ROOT" => self.local_storage_root.clone(),
            "LOCAL_STORAGE_URL" => self.local_storage_url.clone(),
            "PUBLIC_BASE_URL" => self.public_base_url.clone().unwrap_or_default(),
            "STAR_CHART_FONT" => self.star_chart_font.clone().unwrap_or_default(),
            _ => {
                tracing::warn!("[ApiServerEnv::get_env_var] unknown key {}", key);
                String::new()
            }
        }
    }
}
