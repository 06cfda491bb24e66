use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::error::AppError;
use crate::config::cors::USERNAME_HEADER;

/// The user acting on a request, as set by the authentication proxy in
/// front of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USERNAME_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|username| !username.is_empty())
            .map(|username| Actor(username.to_string()))
            .ok_or_else(|| AppError::AuthError("Missing X-Username header".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<Actor, AppError> {
        let (mut parts, _) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_actor_is_read_from_header() {
        let request = Request::builder()
            .header("X-Username", "alice")
            .body(())
            .unwrap();

        assert_eq!(extract(request).await.unwrap(), Actor("alice".into()));
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_is_unauthorized() {
        let missing = Request::builder().body(()).unwrap();
        let blank = Request::builder()
            .header("X-Username", "  ")
            .body(())
            .unwrap();

        assert!(matches!(extract(missing).await, Err(AppError::AuthError(_))));
        assert!(matches!(extract(blank).await, Err(AppError::AuthError(_))));
    }
}
