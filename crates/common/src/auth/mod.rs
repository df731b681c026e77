//! Authentication and authorization utilities
//!
//! Provides:
//! - Argon2id password hashing and verification (with optional pepper)
//! - Opaque bearer tokens backed by `user_sessions` rows
//! - The [`AuthContext`] extractor for authenticated handlers

use crate::config::AuthConfig;
use crate::db::models::User;
use crate::db::{DbPool, Repository};
use crate::errors::{AppError, Result};
use crate::metrics;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, FixedOffset};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: User,
    pub session_id: Uuid,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn email(&self) -> &str {
        &self.user.email
    }

    /// The caller's center, or `NoCenter` for unaffiliated accounts
    pub fn require_center(&self) -> Result<Uuid> {
        self.user.center_id.ok_or(AppError::NoCenter)
    }

    /// Only allow acting on the caller's own account
    pub fn require_self(&self, user_id: Uuid) -> Result<()> {
        if self.user.id == user_id {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: "You can only modify your own account".to_string(),
            })
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    /// Bearer token; returned once and never stored in clear
    pub token: String,
    pub expires_at: DateTime<FixedOffset>,
}

fn peppered(password: &str, pepper: Option<&str>) -> String {
    match pepper {
        Some(p) => format!("{p}{password}"),
        None => password.to_string(),
    }
}

/// Hash a password into an Argon2id PHC string
pub fn hash_password(password: &str, pepper: Option<&str>) -> Result<String> {
    let salt_bytes: [u8; 16] = rand::random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AppError::Internal {
        message: format!("Failed to encode salt: {}", e),
    })?;

    Argon2::default()
        .hash_password(peppered(password, pepper).as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Verify a password against a stored PHC string
///
/// `Ok(false)` on mismatch; an error only for a malformed stored hash.
pub fn verify_password(password: &str, hash: &str, pepper: Option<&str>) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AppError::Internal {
        message: format!("Invalid password hash format: {}", e),
    })?;

    match Argon2::default().verify_password(peppered(password, pepper).as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal {
            message: format!("Password verification error: {}", e),
        }),
    }
}

/// Registration-time password policy
pub fn check_password_policy(password: &str, config: &AuthConfig) -> Result<()> {
    if password.chars().count() < config.min_password_length {
        return Err(AppError::Validation {
            message: format!(
                "This password is too short. It must contain at least {} characters.",
                config.min_password_length
            ),
            field: Some("password".to_string()),
        });
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation {
            message: "This password is entirely numeric.".to_string(),
            field: Some("password".to_string()),
        });
    }
    Ok(())
}

/// Generate a new opaque session token
pub fn generate_session_token() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}

/// Hash a session token for storage and lookup
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract the token from an `Authorization: Bearer <token>` value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Check credentials and open a session
pub async fn authenticate(
    repo: &Repository,
    email: &str,
    password: &str,
    config: &AuthConfig,
) -> Result<LoginOutcome> {
    let user = match repo.find_user_by_email(email).await? {
        Some(user) if user.is_active => user,
        _ => {
            metrics::record_login(false);
            return Err(AppError::InvalidCredentials);
        }
    };

    if !verify_password(password, &user.password_hash, config.password_pepper.as_deref())? {
        metrics::record_login(false);
        warn!(user_id = %user.id, "Login rejected");
        return Err(AppError::InvalidCredentials);
    }

    let token = generate_session_token();
    let session = repo
        .create_session(user.id, hash_token(&token), config.session_ttl())
        .await?;

    repo.delete_expired_sessions(user.id).await?;
    repo.touch_last_login(user.id).await?;

    metrics::record_login(true);
    info!(user_id = %user.id, session_id = %session.id, "User logged in");

    Ok(LoginOutcome {
        user,
        token,
        expires_at: session.expires_at,
    })
}

/// End the caller's session
pub async fn logout(repo: &Repository, ctx: &AuthContext) -> Result<()> {
    repo.delete_session(ctx.session_id).await?;
    info!(user_id = %ctx.user.id, "User logged out");
    Ok(())
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    DbPool: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        if let Some(ctx) = parts.extensions.get::<AuthContext>() {
            return Ok(ctx.clone());
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer)
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication credentials were not provided".to_string(),
            })?;

        let repo = Repository::new(DbPool::from_ref(state));
        let (session, user) = repo
            .find_active_session(&hash_token(token))
            .await?
            .ok_or_else(|| AppError::Unauthorized {
                message: "Invalid or expired token".to_string(),
            })?;

        if !user.is_active {
            return Err(AppError::Unauthorized {
                message: "User inactive or deleted".to_string(),
            });
        }

        let ctx = AuthContext {
            user,
            session_id: session.id,
        };
        parts.extensions.insert(ctx.clone());
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(center_id: Option<Uuid>) -> User {
        let now = chrono::Utc::now().fixed_offset();
        User {
            id: Uuid::new_v4(),
            email: "tech@acme.org".into(),
            username: "tech".into(),
            first_name: "Lab".into(),
            last_name: "Tech".into(),
            phone: None,
            center_id,
            is_center_admin: false,
            is_active: true,
            is_staff: false,
            password_hash: String::new(),
            last_login: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("correct horse", None).unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash, None).unwrap());
        assert!(!verify_password("wrong", &hash, None).unwrap());
    }

    #[test]
    fn test_pepper_is_applied() {
        let hash = hash_password("hunter22", Some("pepper!")).unwrap();
        assert!(verify_password("hunter22", &hash, Some("pepper!")).unwrap());
        assert!(!verify_password("hunter22", &hash, None).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert!(verify_password("pw", "not-a-hash", None).is_err());
    }

    #[test]
    fn test_session_token_hashing() {
        let token = generate_session_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_session_token());

        let hash = hash_token(&token);
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token(&token));
        assert_ne!(hash, token);
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
        assert_eq!(extract_bearer("abc123"), None);
    }

    #[test]
    fn test_password_policy() {
        let config = AuthConfig::default();
        assert!(check_password_policy("s3cure-pass", &config).is_ok());
        assert!(check_password_policy("short", &config).is_err());
        assert!(check_password_policy("12345678901", &config).is_err());
    }

    #[test]
    fn test_require_center() {
        let center = Uuid::new_v4();
        let with = AuthContext { user: user(Some(center)), session_id: Uuid::new_v4() };
        assert_eq!(with.require_center().unwrap(), center);

        let without = AuthContext { user: user(None), session_id: Uuid::new_v4() };
        assert!(matches!(without.require_center(), Err(AppError::NoCenter)));
    }

    #[test]
    fn test_require_self() {
        let ctx = AuthContext { user: user(None), session_id: Uuid::new_v4() };
        assert!(ctx.require_self(ctx.user_id()).is_ok());
        assert!(matches!(
            ctx.require_self(Uuid::new_v4()),
            Err(AppError::Forbidden { .. })
        ));
    }
}
