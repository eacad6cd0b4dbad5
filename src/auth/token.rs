//! Self-contained bearer tokens.
//!
//! Wire form: `<hex(claims json)>.<hex(HMAC-SHA256(claims json))>`.
//! No server-side session table: a token is valid iff the signature
//! verifies under the process key and `exp` is in the future.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Generated secret length when none is configured.
const GENERATED_SECRET_BYTES: usize = 32;

/// Claims carried inside a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Username the token was issued to.
    pub sub: String,
    /// Issued at (unix seconds).
    pub iat: u64,
    /// Expiry (unix seconds).
    pub exp: u64,
}

/// Why a presented token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    BadSignature,
    Expired,
}

impl TokenRejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed token",
            Self::BadSignature => "invalid token signature",
            Self::Expired => "token expired",
        }
    }
}

/// Issues and verifies signed tokens with one process-wide key.
pub struct TokenSigner {
    key: Vec<u8>,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("key", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            key: secret.to_vec(),
            ttl_secs,
        }
    }

    /// Random key; tokens do not survive a restart.
    pub fn with_generated_secret(ttl_secs: u64) -> Self {
        let key: [u8; GENERATED_SECRET_BYTES] = rand::random();
        Self::new(&key, ttl_secs)
    }

    pub fn issue(&self, username: &str) -> (String, TokenClaims) {
        self.issue_at(username, epoch_secs())
    }

    pub fn issue_at(&self, username: &str, now: u64) -> (String, TokenClaims) {
        let claims = TokenClaims {
            sub: username.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
        };
        // Serializing a struct of strings and integers cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let signature = self.sign(&payload);
        let token = format!("{}.{}", hex::encode(&payload), hex::encode(signature));
        (token, claims)
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenRejection> {
        self.verify_at(token, epoch_secs())
    }

    pub fn verify_at(&self, token: &str, now: u64) -> Result<TokenClaims, TokenRejection> {
        let (payload_hex, sig_hex) = token.trim().split_once('.').ok_or(TokenRejection::Malformed)?;
        let payload = hex::decode(payload_hex).map_err(|_| TokenRejection::Malformed)?;
        let signature = hex::decode(sig_hex).map_err(|_| TokenRejection::Malformed)?;

        let mut mac = self.mac();
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| TokenRejection::BadSignature)?;

        let claims: TokenClaims =
            serde_json::from_slice(&payload).map_err(|_| TokenRejection::Malformed)?;
        if claims.exp <= now {
            return Err(TokenRejection::Expired);
        }
        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.key).expect("HMAC can accept any key length")
    }
}

/// Current Unix epoch in seconds.
pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new(b"test-secret", 3600)
    }

    #[test]
    fn issue_and_verify() {
        let s = signer();
        let (token, claims) = s.issue_at("bob", 1_000);
        assert_eq!(claims.exp, 4_600);
        let verified = s.verify_at(&token, 1_001).unwrap();
        assert_eq!(verified.sub, "bob");
        assert_eq!(verified, claims);
    }

    #[test]
    fn expired_token_rejected() {
        let s = signer();
        let (token, _) = s.issue_at("bob", 1_000);
        assert_eq!(s.verify_at(&token, 4_600), Err(TokenRejection::Expired));
        assert_eq!(s.verify_at(&token, 9_999), Err(TokenRejection::Expired));
    }

    #[test]
    fn other_key_rejected() {
        let (token, _) = signer().issue_at("bob", 1_000);
        let other = TokenSigner::new(b"different", 3600);
        assert_eq!(other.verify_at(&token, 1_001), Err(TokenRejection::BadSignature));
    }

    #[test]
    fn tampered_payload_rejected() {
        let s = signer();
        let (token, _) = s.issue_at("alice", 1_000);
        let (_, sig) = token.split_once('.').unwrap();
        let forged_claims = TokenClaims {
            sub: "admin".into(),
            iat: 1_000,
            exp: 4_600,
        };
        let forged = format!(
            "{}.{}",
            hex::encode(serde_json::to_vec(&forged_claims).unwrap()),
            sig
        );
        assert_eq!(s.verify_at(&forged, 1_001), Err(TokenRejection::BadSignature));
    }

    #[test]
    fn garbage_is_malformed() {
        let s = signer();
        assert_eq!(s.verify_at("", 0), Err(TokenRejection::Malformed));
        assert_eq!(s.verify_at("no-dot", 0), Err(TokenRejection::Malformed));
        assert_eq!(s.verify_at("zz.zz", 0), Err(TokenRejection::Malformed));
    }

    #[test]
    fn generated_secrets_differ() {
        let a = TokenSigner::with_generated_secret(60);
        let b = TokenSigner::with_generated_secret(60);
        let (token, _) = a.issue("bob");
        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let dbg = format!("{:?}", signer());
        assert!(!dbg.contains("test-secret"));
        assert!(dbg.contains("redacted"));
    }
}
