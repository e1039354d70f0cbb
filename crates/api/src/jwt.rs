use anyhow::{anyhow, Result};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::types::Uuid;

use storymint_common::get_current_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    /// Carried by the `sessionid` cookie.
    Session,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub token_type: TokenKind,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Invalid)
    }
}

/// Every variant is reported to clients as the same 401.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed or its signature does not match")]
    Invalid,
    #[error("token has expired")]
    Expired,
    #[error("expected a {expected:?} token, got {actual:?}")]
    WrongKind { expected: TokenKind, actual: TokenKind },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub refresh: String,
    pub access: String,
}

/// HS256 issuer and verifier for access, refresh and session tokens.
#[derive(Clone)]
pub struct JwtManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: i64,
    refresh_ttl: i64,
}

impl JwtManager {
    pub fn new(secret: &str, access_ttl: i64, refresh_ttl: i64) -> Result<Self> {
        if secret.is_empty() {
            return Err(anyhow!("JWT_SECRET is not set"));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn ttl(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh | TokenKind::Session => self.refresh_ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, kind: TokenKind) -> Result<String> {
        let now = get_current_timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            token_type: kind,
            iat: now,
            exp: now + self.ttl(kind),
            jti: Uuid::new_v4().simple().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| anyhow!("[JwtManager::issue] failed to sign token: {}", e))
    }

    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        Ok(TokenPair {
            refresh: self.issue(user_id, TokenKind::Refresh)?,
            access: self.issue(user_id, TokenKind::Access)?,
        })
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })?
            .claims;

        if claims.token_type != expected {
            return Err(TokenError::WrongKind { expected, actual: claims.token_type });
        }
        Ok(claims)
    }

    /// A fresh access token for the holder of a valid refresh token.
    pub fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        self.issue(claims.user_id()?, TokenKind::Access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-with-enough-entropy-000";

    #[test]
    fn pair_tokens_verify_only_as_their_kind() {
        let jwt = JwtManager::new(SECRET, 300, 86_400).unwrap();
        let user_id = Uuid::new_v4();
        let pair = jwt.issue_pair(user_id).unwrap();

        let claims = jwt.verify(&pair.access, TokenKind::Access).unwrap();
        assert_eq!(claims.user_id().unwrap(), user_id);
        assert_eq!(claims.exp - claims.iat, 300);

        assert_eq!(
            jwt.verify(&pair.access, TokenKind::Refresh).unwrap_err(),
            TokenError::WrongKind { expected: TokenKind::Refresh, actual: TokenKind::Access }
        );
        assert!(jwt.verify(&pair.refresh, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn refresh_issues_access_for_same_user() {
        let jwt = JwtManager::new(SECRET, 300, 86_400).unwrap();
        let user_id = Uuid::new_v4();
        let refresh = jwt.issue(user_id, TokenKind::Refresh).unwrap();

        let access = jwt.refresh(&refresh).unwrap();
        assert_eq!(jwt.verify(&access, TokenKind::Access).unwrap().user_id().unwrap(), user_id);

        let err = jwt.refresh(&access).unwrap_err();
        assert!(err.downcast_ref::<TokenError>().is_some());
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let expired = JwtManager::new(SECRET, -10, -10).unwrap();
        let token = expired.issue(Uuid::new_v4(), TokenKind::Access).unwrap();
        assert_eq!(expired.verify(&token, TokenKind::Access).unwrap_err(), TokenError::Expired);

        let other = JwtManager::new("another-secret-of-decent-length-11", 300, 300).unwrap();
        let token = other.issue(Uuid::new_v4(), TokenKind::Access).unwrap();
        let jwt = JwtManager::new(SECRET, 300, 300).unwrap();
        assert_eq!(jwt.verify(&token, TokenKind::Access).unwrap_err(), TokenError::Invalid);
        assert_eq!(jwt.verify("not-a-token", TokenKind::Access).unwrap_err(), TokenError::Invalid);
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(JwtManager::new("", 300, 300).is_err());
    }
}
