use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::{User, UserRole},
    repository::RepositoryState,
};

pub const FORBIDDEN_MESSAGE: &str = "Forbidden! You don't have permission to access this resources!";
pub const EMAIL_NOT_VERIFIED_MESSAGE: &str =
    "Email verification required. Please verify your email!";

/// Claims
///
/// Payload of the session token issued by the external auth provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's UUID, the key into `public.users`.
    pub sub: Uuid,
    /// Expiration Time (exp): tokens past this instant are refused.
    pub exp: usize,
    /// Issued At (iat)
    pub iat: usize,
}

/// AuthUser
///
/// The principal of an authenticated request. Handlers take it as an argument and use
/// `id` for ownership comparisons and `role` for RBAC.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// ensure_role
    ///
    /// Rejects the request with 403 unless the principal holds one of `allowed`.
    pub fn ensure_role(&self, allowed: &[UserRole]) -> Result<(), AppError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden(FORBIDDEN_MESSAGE.to_string()))
        }
    }
}

impl TryFrom<User> for AuthUser {
    type Error = AppError;

    /// Only verified accounts may act as a principal.
    fn try_from(user: User) -> Result<Self, Self::Error> {
        if !user.email_verified {
            return Err(AppError::Forbidden(EMAIL_NOT_VERIFIED_MESSAGE.to_string()));
        }
        Ok(AuthUser {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        })
    }
}

/// AuthUser Extractor Implementation
///
/// Resolution order:
/// 1. A principal already resolved by the auth middleware (request extensions).
/// 2. Local bypass: `x-user-id` naming an existing user, only when `Env::Local`.
/// 3. `Authorization: Bearer <jwt>` validated against the shared secret, followed by
///    a user lookup so deleted accounts lose access immediately.
///
/// Rejection: 401 when no valid session exists, 403 when the account is unverified.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());

            if let Some(user_id) = bypass_id {
                if let Some(user) = repo.get_user(user_id).await? {
                    tracing::debug!(%user_id, "resolved principal through local bypass");
                    return AuthUser::try_from(user);
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired session token"),
                other => tracing::debug!("rejected session token: {:?}", other),
            }
            AppError::Unauthorized
        })?;

        let user = repo
            .get_user(token_data.claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        AuthUser::try_from(user)
    }
}
