use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use uuid::Uuid;

/// Stand-in for an authenticated user. There is no authentication system;
/// the purchasing user is fixed by configuration and injected into every
/// request as an extension at startup.
#[derive(Debug, Clone, Copy)]
pub struct DemoUser {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for DemoUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<DemoUser>().copied().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Demo user is not configured".to_string(),
        ))
    }
}
