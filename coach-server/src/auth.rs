//! Request-scoped caller credentials
//!
//! Every `/api/*` request carries `Authorization: Bearer <token>`. The
//! [`Caller`] extractor resolves the token to a coach and hands handlers an
//! explicit identity; nothing about the caller is stored globally.
//!
//! Tokens are random 256-bit values shown once at creation. Only their
//! SHA-256 digest is stored.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::ApiError, AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Coach,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Coach => "COACH",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = coach_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COACH" => Ok(Role::Coach),
            "ADMIN" => Ok(Role::Admin),
            other => Err(coach_common::Error::InvalidInput(format!(
                "Unknown role '{}'",
                other
            ))),
        }
    }
}

/// Authenticated identity of the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub coach_id: Uuid,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins see everything; coaches only what they own
    pub fn can_access(&self, owner: Uuid) -> bool {
        self.is_admin() || self.coach_id == owner
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin role required".to_string()))
        }
    }

    /// Coach filter for list queries (`None` = all coaches)
    pub fn scope(&self) -> Option<Uuid> {
        if self.is_admin() {
            None
        } else {
            Some(self.coach_id)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Expected a bearer token".to_string()))?;

        match crate::db::coaches::find_by_token_hash(&state.db, &hash_token(token)).await? {
            Some(coach) => {
                debug!(coach_id = %coach.id, role = %coach.role, "Authenticated request");
                Ok(Caller {
                    coach_id: coach.id,
                    role: coach.role,
                })
            }
            None => {
                warn!("Rejected request with unknown API token");
                Err(ApiError::Unauthorized("Unknown API token".to_string()))
            }
        }
    }
}

/// Fresh random API token (64 hex characters)
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Digest stored in `coaches.token_hash`
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_distinct_hex() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable_and_not_the_token() {
        let token = "secret-token";
        assert_eq!(hash_token(token), hash_token(token));
        assert_ne!(hash_token(token), token);
        assert_eq!(hash_token(token).len(), 64);
    }

    #[test]
    fn test_caller_access_rules() {
        let owner = Uuid::new_v4();
        let coach = Caller { coach_id: owner, role: Role::Coach };
        let other = Caller { coach_id: Uuid::new_v4(), role: Role::Coach };
        let admin = Caller { coach_id: Uuid::new_v4(), role: Role::Admin };

        assert!(coach.can_access(owner));
        assert!(!other.can_access(owner));
        assert!(admin.can_access(owner));
        assert!(other.require_admin().is_err());
        assert_eq!(admin.scope(), None);
        assert_eq!(coach.scope(), Some(owner));
    }
}
