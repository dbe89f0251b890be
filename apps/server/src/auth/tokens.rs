//! Session token issuing and decoding.
//!
//! HS256 tokens carrying [`TokenClaims`]. Expiry is deliberately not
//! checked while decoding: the stored session row decides liveness, so an
//! expired token still decodes and the gate can delete its row.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use pharmacon_core::session::{expiry_from, parse_bearer};
use pharmacon_core::{AuthError, SessionToken, TokenClaims};

use crate::error::ApiError;

/// A freshly signed token and the session row that backs it.
#[derive(Debug, Clone)]
pub struct TokenDetails {
    pub token: String,
    pub session: SessionToken,
}

/// Signs and decodes session tokens.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl TokenIssuer {
    /// Create a new issuer.
    pub fn new(secret: &str, ttl_secs: i64) -> Self {
        TokenIssuer {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Issue a token for a user. Persists nothing.
    pub fn issue(&self, user_id: i64, admin: bool) -> Result<TokenDetails, ApiError> {
        self.issue_at(user_id, admin, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        user_id: i64,
        admin: bool,
        now: DateTime<Utc>,
    ) -> Result<TokenDetails, ApiError> {
        let expired_at = expiry_from(now, self.ttl_secs);

        let claims = TokenClaims {
            user_id,
            uuid: Uuid::new_v4().to_string(),
            admin,
            exp: expired_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to generate token: {}", e)))?;

        Ok(TokenDetails {
            token,
            session: SessionToken {
                user_id,
                uuid: claims.uuid,
                expired_at,
            },
        })
    }

    /// Decode and verify the signature of a raw token.
    pub fn decode(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed(e.to_string()),
            })
    }

    /// Read `Authorization: Bearer <token>` and decode it.
    pub fn extract(&self, headers: &HeaderMap) -> Result<TokenClaims, AuthError> {
        let header = headers
            .get(AUTHORIZATION)
            .ok_or_else(|| AuthError::Malformed("missing Authorization header".to_string()))?
            .to_str()
            .map_err(|_| AuthError::Malformed("Authorization header is not text".to_string()))?;

        self.decode(parse_bearer(header)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_issue_then_extract() {
        let issuer = TokenIssuer::new("test-secret", 3600);
        let details = issuer.issue(7, true).unwrap();

        let claims = issuer.extract(&bearer(&details.token)).unwrap();
        assert_eq!(claims.user_id, 7);
        assert!(claims.admin);
        assert_eq!(claims.uuid, details.session.uuid);
        assert_eq!(claims.exp, details.session.expired_at.timestamp());
    }

    #[test]
    fn test_uuid_is_unique_per_issue() {
        let issuer = TokenIssuer::new("test-secret", 3600);
        let a = issuer.issue(1, false).unwrap();
        let b = issuer.issue(1, false).unwrap();
        assert_ne!(a.session.uuid, b.session.uuid);
    }

    #[test]
    fn test_expired_token_still_decodes() {
        let issuer = TokenIssuer::new("test-secret", 60);
        let past = Utc::now() - chrono::Duration::days(2);
        let details = issuer.issue_at(3, false, past).unwrap();
        let claims = issuer.decode(&details.token).unwrap();
        assert_eq!(claims.user_id, 3);
    }

    #[test]
    fn test_wrong_secret_is_invalid_signature() {
        let details = TokenIssuer::new("secret-a", 3600).issue(1, false).unwrap();
        let err = TokenIssuer::new("secret-b", 3600)
            .decode(&details.token)
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidSignature);
    }

    #[test]
    fn test_missing_or_garbage_header_is_malformed() {
        let issuer = TokenIssuer::new("test-secret", 3600);
        assert!(matches!(
            issuer.extract(&HeaderMap::new()),
            Err(AuthError::Malformed(_))
        ));
        assert!(matches!(
            issuer.extract(&bearer("not.a.token")),
            Err(AuthError::Malformed(_))
        ));
    }
}
