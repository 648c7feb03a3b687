use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Dispatcher,
    Driver,
}

/// Verified identity of the caller, extracted once per request and once per
/// channel open. Credential issuance lives in the identity collaborator; this
/// module only checks tokens it already signed.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn require_dispatcher(&self) -> Result<(), AppError> {
        match self.role {
            Role::Dispatcher => Ok(()),
            Role::Driver => Err(AppError::Forbidden("dispatcher role required".to_string())),
        }
    }

    pub fn require_driver(&self) -> Result<Uuid, AppError> {
        match self.role {
            Role::Driver => Ok(self.user_id),
            Role::Dispatcher => Err(AppError::Forbidden("driver role required".to_string())),
        }
    }
}

/// Token layout: `<role>:<user id>:<signature>`, signature checked against
/// the configured shared secret.
pub fn verify_token(token: &str, secret: &str) -> Result<Identity, AppError> {
    let mut parts = token.splitn(3, ':');
    let role = parts.next().unwrap_or_default();
    let user_id = parts.next().unwrap_or_default();
    let signature = parts.next().unwrap_or_default();

    if signature != secret {
        return Err(AppError::Unauthorized("invalid token signature".to_string()));
    }

    let role = match role {
        "dispatcher" => Role::Dispatcher,
        "driver" => Role::Driver,
        other => {
            return Err(AppError::Unauthorized(format!("unknown role: {other}")));
        }
    };

    let user_id = user_id
        .parse::<Uuid>()
        .map_err(|_| AppError::Unauthorized("malformed user id in token".to_string()))?;

    Ok(Identity { user_id, role })
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        let token = match header {
            Some(header) => header.strip_prefix("Bearer ").ok_or_else(|| {
                AppError::Unauthorized("expected a Bearer token".to_string())
            })?,
            None => {
                warn!("request without authorization header");
                return Err(AppError::Unauthorized("missing credentials".to_string()));
            }
        };

        verify_token(token, &state.config.auth_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_dispatcher_token() {
        let id = Uuid::from_u128(42);
        let identity = verify_token(&format!("dispatcher:{id}:s3cret"), "s3cret").unwrap();
        assert_eq!(identity.role, Role::Dispatcher);
        assert_eq!(identity.user_id, id);
        assert!(identity.require_dispatcher().is_ok());
        assert!(identity.require_driver().is_err());
    }

    #[test]
    fn rejects_wrong_signature() {
        let id = Uuid::from_u128(42);
        assert!(verify_token(&format!("driver:{id}:wrong"), "s3cret").is_err());
    }

    #[test]
    fn rejects_unknown_role_and_bad_id() {
        assert!(verify_token("admin:not-a-uuid:s3cret", "s3cret").is_err());
        assert!(verify_token("driver:not-a-uuid:s3cret", "s3cret").is_err());
    }
}
