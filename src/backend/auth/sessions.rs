/**
 * JWT Token Verification
 *
 * HS256 bearer tokens as issued by the auth service. The principal is the
 * `sub` claim; expiry is enforced by `jsonwebtoken`'s default validation.
 */

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{AuthError, Authenticator};
use crate::shared::Principal;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at time (Unix timestamp)
    pub iat: u64,
}

/// Authenticator backed by a shared HMAC secret
#[derive(Clone)]
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    /// Verify and decode a JWT token
    ///
    /// # Arguments
    /// * `token` - JWT token string
    ///
    /// # Returns
    /// Decoded claims or error
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let token_data = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(token_data.claims)
    }
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator").finish_non_exhaustive()
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.verify(token)?;
        Principal::new(claims.sub).map_err(|_| AuthError::MissingSubject)
    }
}

/// Create a JWT token for a user
///
/// # Arguments
/// * `secret` - HMAC secret shared with the verifier
/// * `subject` - User ID placed in the `sub` claim
/// * `ttl` - Lifetime of the token
///
/// # Returns
/// JWT token string
pub fn create_token(
    secret: &str,
    subject: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let claims = Claims {
        sub: subject.to_string(),
        exp: now + ttl.as_secs(),
        iat: now,
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &str = "test-secret";
    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test]
    async fn test_authenticate_valid_token() {
        let token = create_token(SECRET, "alice", DAY).unwrap();
        let auth = JwtAuthenticator::new(SECRET);

        let principal = auth.authenticate(&token).await.unwrap();
        assert_eq!(principal.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_authenticate_wrong_secret() {
        let token = create_token("other-secret", "alice", DAY).unwrap();
        let auth = JwtAuthenticator::new(SECRET);

        assert_matches!(auth.authenticate(&token).await, Err(AuthError::InvalidToken(_)));
    }

    #[tokio::test]
    async fn test_authenticate_empty_token() {
        let auth = JwtAuthenticator::new(SECRET);
        assert_matches!(auth.authenticate("").await, Err(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn test_authenticate_garbage_token() {
        let auth = JwtAuthenticator::new(SECRET);
        assert_matches!(
            auth.authenticate("invalid.token.here").await,
            Err(AuthError::InvalidToken(_))
        );
    }

    #[tokio::test]
    async fn test_authenticate_empty_subject() {
        let token = create_token(SECRET, "", DAY).unwrap();
        let auth = JwtAuthenticator::new(SECRET);
        assert_matches!(auth.authenticate(&token).await, Err(AuthError::MissingSubject));
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = Claims {
            sub: "alice".to_string(),
            exp: 1,
            iat: 0,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let auth = JwtAuthenticator::new(SECRET);
        assert_matches!(auth.verify(&token), Err(AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_token_contains_subject() {
        let token = create_token(SECRET, "bob", DAY).unwrap();
        let claims = JwtAuthenticator::new(SECRET).verify(&token).unwrap();
        assert_eq!(claims.sub, "bob");
        assert!(claims.exp > claims.iat);
    }
}
