//! Anti-forgery tokens: signed, time-bound, bound to one actor and one action.
//!
//! A token is `v1.<issued-at unix seconds>.<hex HMAC-SHA256>` where the MAC
//! covers the actor subject, the action name and the issue time. Verification
//! needs no server-side storage.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::domain::actors::Actor;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "v1";
const MIN_SECRET_LEN: usize = 32;
const CLOCK_SKEW: Duration = Duration::seconds(60);
const FIELD_SEPARATOR: u8 = 0x1f;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token was issued in the future")]
    IssuedInFuture,
    #[error("token signature does not match actor and action")]
    SignatureMismatch,
}

#[derive(Debug, Error)]
pub enum TokenConfigError {
    #[error("token secret must be at least {MIN_SECRET_LEN} bytes")]
    SecretTooShort,
    #[error("token lifetime must be positive")]
    NonPositiveTtl,
}

#[derive(Clone)]
pub struct TokenService {
    mac: HmacSha256,
    ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: impl AsRef<[u8]>, ttl: Duration) -> Result<Self, TokenConfigError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_LEN {
            return Err(TokenConfigError::SecretTooShort);
        }
        if !ttl.is_positive() {
            return Err(TokenConfigError::NonPositiveTtl);
        }
        let mac =
            HmacSha256::new_from_slice(secret).map_err(|_| TokenConfigError::SecretTooShort)?;
        Ok(Self { mac, ttl })
    }

    pub fn issue(&self, actor: &Actor, action: &str) -> String {
        self.issue_at(actor, action, OffsetDateTime::now_utc())
    }

    pub fn verify(&self, token: &str, actor: &Actor, action: &str) -> Result<(), TokenError> {
        self.verify_at(token, actor, action, OffsetDateTime::now_utc())
    }

    pub(crate) fn issue_at(&self, actor: &Actor, action: &str, now: OffsetDateTime) -> String {
        let issued_at = now.unix_timestamp();
        let signature = self.sign(&actor.subject(), action, issued_at);
        format!("{TOKEN_VERSION}.{issued_at}.{}", hex::encode(signature))
    }

    pub(crate) fn verify_at(
        &self,
        token: &str,
        actor: &Actor,
        action: &str,
        now: OffsetDateTime,
    ) -> Result<(), TokenError> {
        let parsed = ParsedToken::parse(token).ok_or(TokenError::Malformed)?;

        let issued_at = OffsetDateTime::from_unix_timestamp(parsed.issued_at)
            .map_err(|_| TokenError::Malformed)?;
        if issued_at > now + CLOCK_SKEW {
            return Err(TokenError::IssuedInFuture);
        }
        if now - issued_at > self.ttl {
            return Err(TokenError::Expired);
        }

        let expected = self.sign(&actor.subject(), action, parsed.issued_at);
        if expected.ct_eq(&parsed.signature).unwrap_u8() == 0 {
            return Err(TokenError::SignatureMismatch);
        }

        Ok(())
    }

    fn sign(&self, subject: &str, action: &str, issued_at: i64) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(subject.as_bytes());
        mac.update(&[FIELD_SEPARATOR]);
        mac.update(action.as_bytes());
        mac.update(&[FIELD_SEPARATOR]);
        mac.update(&issued_at.to_be_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

/// Random per-process secret for deployments that configure none.
pub fn generate_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

struct ParsedToken {
    issued_at: i64,
    signature: Vec<u8>,
}

impl ParsedToken {
    fn parse(token: &str) -> Option<Self> {
        let mut parts = token.trim().splitn(3, '.');
        if parts.next()? != TOKEN_VERSION {
            return None;
        }
        let issued_at = parts.next()?.parse().ok()?;
        let signature = hex::decode(parts.next()?).ok()?;
        Some(Self {
            issued_at,
            signature,
        })
    }
}
