use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the caller as an `Extension<User>`.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_value = request
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

    let user = validate_token(token, &config.supabase_jwt_secret)
        .map_err(|e| AppError::Auth(e.to_string()))?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Resolves the acting user id, rejecting a body-supplied id that names someone else.
pub fn resolve_actor(user: &User, claimed: Option<Uuid>) -> Result<Uuid, AppError> {
    let actor = user
        .user_id()
        .ok_or_else(|| AppError::Auth("Token subject is not a valid user id".to_string()))?;

    match claimed {
        Some(claimed) if claimed != actor => Err(AppError::Forbidden(
            "Request body user does not match the authenticated user".to_string(),
        )),
        _ => Ok(actor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestUser;
    use assert_matches::assert_matches;

    #[test]
    fn test_resolve_actor() {
        let user = TestUser::host("host@example.com").to_user();
        let id = user.user_id().unwrap();

        assert_eq!(resolve_actor(&user, None).unwrap(), id);
        assert_eq!(resolve_actor(&user, Some(id)).unwrap(), id);
        assert_matches!(resolve_actor(&user, Some(Uuid::new_v4())), Err(AppError::Forbidden(_)));
    }
}
