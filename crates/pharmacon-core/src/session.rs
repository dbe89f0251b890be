//! # Session Tokens
//!
//! Claim layout and expiry rules for bearer tokens. Signing and
//! persistence live in the server and db crates; this module only decides
//! what a token says and when a stored session is still alive.
//!
//! ## Lifecycle
//! ```text
//! login ──► IssueToken ──► SaveToken (user_id, uuid, expired_at)
//!                                   │
//!        ┌──────────────────────────┘
//!        ▼
//! request ──► claims ──► stored row live? ──yes──► user
//!                              │
//!                              no ──► row deleted lazily, Expired
//!
//! logout ──► every row of the user deleted
//! ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Claims embedded in a signed token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    pub user_id: i64,
    pub uuid: String,
    pub admin: bool,
    /// Expiry as a unix timestamp (seconds).
    pub exp: i64,
}

/// A persisted session: one row per successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SessionToken {
    pub user_id: i64,
    pub uuid: String,
    pub expired_at: DateTime<Utc>,
}

impl SessionToken {
    /// A session is live strictly before its expiry instant.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expired_at
    }

    /// Rebuilds the session triple carried by a set of claims.
    pub fn from_claims(claims: &TokenClaims) -> Option<Self> {
        Utc.timestamp_opt(claims.exp, 0)
            .single()
            .map(|expired_at| SessionToken {
                user_id: claims.user_id,
                uuid: claims.uuid.clone(),
                expired_at,
            })
    }
}

/// Expiry instant for a token issued at `now` with the given lifetime.
pub fn expiry_from(now: DateTime<Utc>, ttl_secs: i64) -> DateTime<Utc> {
    now + Duration::seconds(ttl_secs)
}

/// Splits `Bearer <token>` and returns the token part.
pub fn parse_bearer(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or_else(|| AuthError::Malformed("expected 'Bearer <token>'".to_string()))?;

    if token.is_empty() {
        return Err(AuthError::Malformed("empty bearer token".to_string()));
    }
    Ok(token)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expired_at: DateTime<Utc>) -> SessionToken {
        SessionToken {
            user_id: 1,
            uuid: "8d7c".to_string(),
            expired_at,
        }
    }

    #[test]
    fn test_live_strictly_before_expiry() {
        let now = Utc::now();
        assert!(session(now + Duration::seconds(1)).is_live_at(now));
        assert!(!session(now).is_live_at(now));
        assert!(!session(now - Duration::seconds(1)).is_live_at(now));
    }

    #[test]
    fn test_expiry_from_ttl() {
        let now = Utc::now();
        assert_eq!(expiry_from(now, 3600) - now, Duration::hours(1));
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc.def").unwrap(), "abc.def");
        assert!(matches!(parse_bearer("Token abc"), Err(AuthError::Malformed(_))));
        assert!(matches!(parse_bearer("Bearer "), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn test_session_from_claims() {
        let claims = TokenClaims {
            user_id: 3,
            uuid: "u-1".to_string(),
            admin: false,
            exp: 1_700_000_000,
        };
        let session = SessionToken::from_claims(&claims).unwrap();
        assert_eq!(session.user_id, 3);
        assert_eq!(session.expired_at.timestamp(), 1_700_000_000);
    }
}
