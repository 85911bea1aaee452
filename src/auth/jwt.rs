use axum::extract::FromRef;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

use super::claims::Claims;
use crate::state::AppState;

/// Lifetime of every issued token. There is no refresh flow.
pub const TOKEN_TTL: Duration = Duration::hours(24);

/// Algorithms accepted on validation: the HMAC family only.
const HMAC_FAMILY: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Why a token could not be issued or was rejected.
///
/// Rejection reasons are for logs only; callers answer every one of them
/// with the same 401.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing secret is not configured")]
    MissingSecret,
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("malformed token")]
    Malformed,
    #[error("bad token signature")]
    BadSignature,
    #[error("unexpected signing algorithm")]
    WrongAlgorithm,
    #[error("token expired")]
    Expired,
    #[error("token carries no valid user id")]
    MissingUserId,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                TokenError::WrongAlgorithm
            }
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        }
    }
}

/// HS256 signing and verification keys derived from the process secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

impl JwtKeys {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    pub fn issue(&self, user_id: i64) -> Result<String, TokenError> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    pub fn issue_at(&self, user_id: i64, now: OffsetDateTime) -> Result<String, TokenError> {
        let claims = Claims {
            user_id,
            iat: now.unix_timestamp(),
            exp: (now + TOKEN_TTL).unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)?;
        debug!(user_id, "jwt signed");
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<i64, TokenError> {
        self.validate_at(token, OffsetDateTime::now_utc())
    }

    /// Verifies signature and algorithm family, then checks expiry against
    /// `now` with no leeway. Returns the embedded user id.
    pub fn validate_at(&self, token: &str, now: OffsetDateTime) -> Result<i64, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = HMAC_FAMILY.to_vec();
        validation.set_required_spec_claims(&["exp"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding, &validation)?.claims;

        if now.unix_timestamp() > claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.user_id <= 0 {
            return Err(TokenError::MissingUserId);
        }
        debug!(user_id = claims.user_id, "jwt verified");
        Ok(claims.user_id)
    }
}
