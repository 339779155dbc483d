use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::YoddaError;

type HmacSha256 = Hmac<Sha256>;

/// `{"alg":"HS256","typ":"JWT"}`, base64url without padding.
const HEADER_SEGMENT: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

/// Ten years.
const MAX_TTL_MINUTES: u64 = 10 * 365 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email.
    pub sub: String,
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Issues and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_minutes: u64) -> Self {
        let minutes = i64::try_from(ttl_minutes.min(MAX_TTL_MINUTES)).unwrap_or(0);
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::minutes(minutes),
        }
    }

    fn mac(&self) -> Result<HmacSha256, YoddaError> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| YoddaError::Configuration(format!("invalid token secret: {e}")))
    }

    pub fn issue(&self, email: &str, is_admin: bool) -> Result<String, YoddaError> {
        let now = Utc::now();
        let claims = Claims {
            sub: email.to_string(),
            is_admin,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let payload = serde_json::to_vec(&claims)
            .map_err(|e| YoddaError::UnexpectedError(format!("claims encode failed: {e}")))?;
        let signing_input = format!("{HEADER_SEGMENT}.{}", URL_SAFE_NO_PAD.encode(payload));

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{signing_input}.{signature}"))
    }

    /// Checks signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, YoddaError> {
        let invalid = || YoddaError::Authentication("Invalid or expired token".to_string());

        let (signing_input, signature) = token.rsplit_once('.').ok_or_else(invalid)?;
        let (header, payload) = signing_input.split_once('.').ok_or_else(invalid)?;
        if header != HEADER_SEGMENT {
            return Err(invalid());
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| invalid())?;
        if claims.exp <= Utc::now().timestamp() {
            return Err(invalid());
        }
        Ok(claims)
    }
}
