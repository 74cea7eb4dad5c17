/// Authentication extractors
use crate::{
    account::Caller,
    api::middleware::extract_bearer_token,
    context::AppContext,
    error::RegistryError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated caller - rejects the request without a valid session
#[derive(Debug, Clone)]
pub struct CallerContext(pub Caller);

#[async_trait]
impl FromRequestParts<AppContext> for CallerContext {
    type Rejection = RegistryError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        // Already resolved by the authenticate middleware
        if let Some(caller) = parts.extensions.get::<Caller>() {
            return Ok(CallerContext(caller.clone()));
        }

        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| RegistryError::Unauthorized("Missing authorization header".to_string()))?;

        let caller = state.account_manager.validate_access_token(&token).await?;
        Ok(CallerContext(caller))
    }
}

/// Optional caller - does not fail if no auth provided. Whether an anonymous
/// request may proceed is decided by the registry policy and the auth mode.
#[derive(Debug, Clone)]
pub struct OptionalCaller(pub Option<Caller>);

impl OptionalCaller {
    pub fn as_ref(&self) -> Option<&Caller> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for OptionalCaller {
    type Rejection = RegistryError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        if let Some(caller) = parts.extensions.get::<Caller>() {
            return Ok(OptionalCaller(Some(caller.clone())));
        }

        let Some(token) = extract_bearer_token(&parts.headers) else {
            return Ok(OptionalCaller(None));
        };

        match state.account_manager.validate_access_token(&token).await {
            Ok(caller) => Ok(OptionalCaller(Some(caller))),
            Err(RegistryError::Unauthorized(_)) => Ok(OptionalCaller(None)),
            Err(e) => Err(e),
        }
    }
}

/// Admin caller - requires a valid session with the admin role
#[derive(Debug, Clone)]
pub struct AdminCaller(pub Caller);

#[async_trait]
impl FromRequestParts<AppContext> for AdminCaller {
    type Rejection = RegistryError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let CallerContext(caller) = CallerContext::from_request_parts(parts, state).await?;

        if !caller.is_admin() {
            tracing::warn!(username = %caller.username, "Admin role required");
            return Err(RegistryError::Forbidden("Admin role required".to_string()));
        }

        Ok(AdminCaller(caller))
    }
}
