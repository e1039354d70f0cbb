use anyhow::Result;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use storymint_common::get_current_iso_timestamp;

use crate::User;

pub const SIGN_IN_STATEMENT: &str = "Please sign this message to verify your wallet ownership.";

/// What the client is asked to sign. The server does not remember it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInChallenge {
    pub statement: String,
    #[serde(rename = "issuedAt")]
    pub issued_at: String,
}

impl SignInChallenge {
    pub fn new() -> Self {
        Self {
            statement: SIGN_IN_STATEMENT.to_string(),
            issued_at: get_current_iso_timestamp(),
        }
    }
}

impl Default for SignInChallenge {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletCredentials {
    #[serde(rename = "publicKey")]
    pub public_key: String,
    pub signature: String,
    #[serde(rename = "signedMessage")]
    pub signed_message: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("{0} is not valid base58")]
    Base58(&'static str),
    #[error("public key must be 32 bytes, got {0}")]
    KeyLength(usize),
    #[error("signature must be 64 bytes, got {0}")]
    SignatureLength(usize),
    #[error("public key is not a valid Ed25519 point")]
    InvalidKey,
    #[error("signature does not verify")]
    Mismatch,
}

/// Verifies an Ed25519 signature over the UTF-8 bytes of `message`.
/// Both the key and the signature are base58 encoded.
pub fn verify_wallet_signature(public_key: &str, signature: &str, message: &str) -> Result<(), SignatureError> {
    let key_bytes = bs58::decode(public_key).into_vec()
        .map_err(|_| SignatureError::Base58("public key"))?;
    let key_bytes: [u8; 32] = key_bytes.as_slice().try_into()
        .map_err(|_| SignatureError::KeyLength(key_bytes.len()))?;

    let sig_bytes = bs58::decode(signature).into_vec()
        .map_err(|_| SignatureError::Base58("signature"))?;
    let sig_bytes: [u8; 64] = sig_bytes.as_slice().try_into()
        .map_err(|_| SignatureError::SignatureLength(sig_bytes.len()))?;

    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|_| SignatureError::InvalidKey)?;
    let signature = Signature::from_bytes(&sig_bytes);

    verifying_key.verify(message.as_bytes(), &signature)
        .map_err(|_| SignatureError::Mismatch)
}

/// Resolves wallet credentials to a user.
pub struct WalletAuthenticator;

impl WalletAuthenticator {
    /// `Ok(None)` means the signature did not check out. Database failures are errors.
    pub async fn authenticate(pool: &PgPool, credentials: &WalletCredentials) -> Result<Option<User>> {
        if let Err(e) = verify_wallet_signature(
            &credentials.public_key,
            &credentials.signature,
            &credentials.signed_message,
        ) {
            tracing::debug!("[WalletAuthenticator::authenticate] rejected {}: {}", credentials.public_key, e);
            return Ok(None);
        }

        let (user, _) = User::find_or_create(pool, &credentials.public_key).await?;
        Ok(Some(user.record_login(pool).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed(seed: u8, message: &str) -> (String, String) {
        let signing_key = SigningKey::from_bytes(&[seed; 32]);
        let signature = signing_key.sign(message.as_bytes());
        (
            bs58::encode(signing_key.verifying_key().to_bytes()).into_string(),
            bs58::encode(signature.to_bytes()).into_string(),
        )
    }

    #[test]
    fn accepts_signature_over_exact_message() {
        let (key, sig) = signed(7, SIGN_IN_STATEMENT);
        assert_eq!(verify_wallet_signature(&key, &sig, SIGN_IN_STATEMENT), Ok(()));
    }

    #[test]
    fn rejects_tampered_message_and_foreign_key() {
        let (key, sig) = signed(7, SIGN_IN_STATEMENT);
        let (other_key, _) = signed(8, SIGN_IN_STATEMENT);

        assert_eq!(
            verify_wallet_signature(&key, &sig, "Please sign this message."),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_wallet_signature(&other_key, &sig, SIGN_IN_STATEMENT),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_malformed_input() {
        let (key, sig) = signed(7, "hello");

        assert_eq!(verify_wallet_signature("0OIl", &sig, "hello"), Err(SignatureError::Base58("public key")));
        assert_eq!(verify_wallet_signature(&key, "not base58!", "hello"), Err(SignatureError::Base58("signature")));

        let short_key = bs58::encode([1u8; 31]).into_string();
        assert_eq!(verify_wallet_signature(&short_key, &sig, "hello"), Err(SignatureError::KeyLength(31)));

        let short_sig = bs58::encode([1u8; 63]).into_string();
        assert_eq!(verify_wallet_signature(&key, &short_sig, "hello"), Err(SignatureError::SignatureLength(63)));
    }

    #[test]
    fn challenge_carries_statement_and_timestamp() {
        let challenge = serde_json::to_value(SignInChallenge::new()).unwrap();
        assert_eq!(challenge["statement"], SIGN_IN_STATEMENT);
        assert!(challenge["issuedAt"].as_str().unwrap().ends_with('Z'));
    }
}
