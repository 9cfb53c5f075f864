use std::path::Path;

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;

use crate::auth::middleware::Claims;

const SECONDS_PER_DAY: i64 = 86_400;

/// Load or generate the JWT signing key (256-bit random secret).
/// Key is stored as raw bytes in data_dir/jwt_secret.
/// The key must be cryptographically random, never human-readable.
pub fn load_or_generate_jwt_secret(data_dir: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;
    let key_path = Path::new(data_dir).join("jwt_secret");

    if key_path.exists() {
        let key = std::fs::read(&key_path)?;
        if key.len() == 32 {
            tracing::info!("JWT signing key loaded from {}", key_path.display());
            return Ok(key);
        }
        tracing::warn!("JWT key file has wrong size ({}), regenerating", key.len());
    }

    let key: [u8; 32] = rand::rng().random();
    std::fs::write(&key_path, key)?;
    tracing::info!("JWT signing key generated at {}", key_path.display());
    Ok(key.to_vec())
}

/// Issue an access token for `user_id` valid for `ttl_days`.
/// Claims: sub=user_id, iat, exp
pub fn issue_access_token(
    secret: &[u8],
    user_id: &str,
    ttl_days: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    issue_access_token_with_ttl(secret, user_id, ttl_days * SECONDS_PER_DAY)
}

/// Issue an access token with an explicit lifetime in seconds.
pub fn issue_access_token_with_ttl(
    secret: &[u8],
    user_id: &str,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Validate an access token and return its claims.
pub fn validate_access_token(
    secret: &[u8],
    token: &str,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)?;
    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_round_trips_subject() {
        let secret = [3u8; 32];
        let token = issue_access_token(&secret, "user-1", 7).unwrap();
        let claims = validate_access_token(&secret, &token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 7 * SECONDS_PER_DAY);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_access_token(&[1u8; 32], "user-1", 1).unwrap();
        assert!(validate_access_token(&[2u8; 32], &token).is_err());
    }

    #[test]
    fn expired_token_reports_expiry() {
        let secret = [3u8; 32];
        let token = issue_access_token_with_ttl(&secret, "user-1", -3600).unwrap();
        let err = validate_access_token(&secret, &token).unwrap_err();
        assert_eq!(
            *err.kind(),
            jsonwebtoken::errors::ErrorKind::ExpiredSignature
        );
    }

    #[test]
    fn secret_is_persisted_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().to_str().unwrap();
        let first = load_or_generate_jwt_secret(data_dir).unwrap();
        let second = load_or_generate_jwt_secret(data_dir).unwrap();
        assert_eq!(first.len(), 32);
        assert_eq!(first, second);
    }
}
