use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use tracing::debug;

use crate::error::{ApiError, AuthError};
use crate::state::{AppState, blocking};

/// The authenticated caller, inserted as a request extension by `require_auth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
}

/// Extract and validate the bearer token, then confirm its subject still exists.
pub async fn require_auth(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|_| AuthError::MissingToken)?;

    let user_id = state.tokens.verify(bearer.token()).map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        e
    })?;

    let db = state.clone();
    let user = blocking(move || Ok(db.db.get_user_by_id(user_id)?)).await?;
    if user.is_none() {
        debug!("Token subject {} no longer exists", user_id);
        return Err(AuthError::InvalidToken.into());
    }

    req.extensions_mut().insert(AuthUser { id: user_id });
    Ok(next.run(req).await)
}
