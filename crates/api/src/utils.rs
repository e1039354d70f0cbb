use anyhow::anyhow;
use axum::http::{header, HeaderMap, StatusCode};
use tracing_subscriber::EnvFilter;
use url::Url;

use crate::response::AppError;

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers.get(header::AUTHORIZATION)
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, anyhow!("missing authorization header")))?;

    let value = auth_header
        .to_str()
        .map_err(|_| AppError::new(StatusCode::UNAUTHORIZED, anyhow!("invalid authorization header")))?
        .split_whitespace()
        .collect::<Vec<_>>();

    match value.as_slice() {
        ["Bearer", token] => Ok(token.to_string()),
        _ => Err(AppError::new(StatusCode::UNAUTHORIZED, anyhow!("invalid authorization header"))),
    }
}

pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Turns a possibly relative URL into an absolute one. A configured public
/// base wins over the request's `Host` header.
pub fn absolute_url(location: &str, public_base_url: Option<&str>, headers: &HeaderMap) -> String {
    if location.is_empty() || Url::parse(location).is_ok() {
        return location.to_string();
    }

    let base = match public_base_url {
        Some(base) => base.to_string(),
        None => {
            let host = headers.get(header::HOST)
                .and_then(|h| h.to_str().ok())
                .unwrap_or("localhost");
            let scheme = headers.get("x-forwarded-proto")
                .and_then(|h| h.to_str().ok())
                .unwrap_or("http");
            format!("{}://{}", scheme, host)
        }
    };

    match Url::parse(&base).and_then(|base| base.join(location)) {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::warn!("[absolute_url] cannot join {} onto {}: {}", location, base, e);
            location.to_string()
        }
    }
}

pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn bearer_token_needs_scheme_and_value() {
        assert_eq!(extract_bearer_token(&headers(&[(header::AUTHORIZATION, "Bearer abc")])).unwrap(), "abc");
        assert!(extract_bearer_token(&headers(&[(header::AUTHORIZATION, "Token abc")])).is_err());
        assert!(extract_bearer_token(&headers(&[(header::AUTHORIZATION, "Bearer")])).is_err());
        assert!(extract_bearer_token(&HeaderMap::new()).is_err());
    }

    #[test]
    fn finds_cookie_among_others() {
        let map = headers(&[(header::COOKIE, "theme=dark; sessionid=tok.en.value"), (header::COOKIE, "x=1")]);
        assert_eq!(extract_cookie(&map, "sessionid").as_deref(), Some("tok.en.value"));
        assert_eq!(extract_cookie(&map, "x").as_deref(), Some("1"));
        assert!(extract_cookie(&map, "csrftoken").is_none());
    }

    #[test]
    fn relative_urls_are_made_absolute() {
        let map = headers(&[(header::HOST, "api.example.com:3033")]);
        assert_eq!(
            absolute_url("/media/metadata/a.png", None, &map),
            "http://api.example.com:3033/media/metadata/a.png"
        );
        assert_eq!(
            absolute_url("/media/metadata/a.png", Some("https://storymint.example"), &map),
            "https://storymint.example/media/metadata/a.png"
        );
        assert_eq!(
            absolute_url("https://cdn.example.com/a.png", None, &map),
            "https://cdn.example.com/a.png"
        );
    }
}
