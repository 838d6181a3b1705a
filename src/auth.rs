use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::{Error, Result};

/// Claims carried by issued access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: String,
}

/// Sign an HS256 token for `username`, valid for the configured lifetime.
///
/// There is no user store: any non-empty username gets a token.
pub fn issue_token(username: &str, config: &JwtConfig) -> Result<IssuedToken> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::InvalidQuery("username must not be empty".into()));
    }

    let now = Utc::now().timestamp();
    let ttl = i64::try_from(config.ttl.as_secs()).unwrap_or(i64::MAX);
    let claims = Claims {
        sub: "1".to_string(),
        username: username.to_string(),
        iat: now,
        exp: now.saturating_add(ttl),
    };

    let access_token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| Error::Auth(format!("failed to sign token: {e}")))?;

    log::debug!("Issued access token for {username}");
    Ok(IssuedToken {
        access_token,
        expires_in: config.expires_in.clone(),
    })
}

/// Check signature and expiry, returning the claims.
pub fn verify_token(token: &str, config: &JwtConfig) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| Error::Auth(format!("invalid token: {e}")))
}
