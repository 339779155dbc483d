use crate::error::YoddaError;
use crate::orchestrator::Caller;
use crate::server::router::YoddaState;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

fn extract_bearer(parts: &Parts) -> Result<String, YoddaError> {
    parts
        .headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
        .ok_or_else(|| YoddaError::Authentication("No token provided".to_string()))
}

/// Any caller holding a valid bearer token.
#[derive(Debug, Clone)]
pub struct RequireCaller(pub Caller);

impl FromRequestParts<YoddaState> for RequireCaller {
    type Rejection = YoddaError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &YoddaState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer(parts)?;
        let claims = state.tokens.verify(&token)?;
        Ok(RequireCaller(Caller {
            email: claims.sub,
            is_admin: claims.is_admin,
        }))
    }
}

/// A caller whose stored account is an admin. The token claim alone is not trusted.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Caller);

impl FromRequestParts<YoddaState> for RequireAdmin {
    type Rejection = YoddaError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &YoddaState,
    ) -> Result<Self, Self::Rejection> {
        let RequireCaller(caller) = RequireCaller::from_request_parts(parts, state).await?;
        let is_admin = state
            .store
            .get_user(&caller.email)
            .await?
            .is_some_and(|user| user.is_admin);
        if !is_admin {
            return Err(YoddaError::Forbidden("Admin only".to_string()));
        }
        Ok(RequireAdmin(Caller {
            is_admin: true,
            ..caller
        }))
    }
}
