use axum::{
    Form, Json,
    extract::State,
    extract::rejection::{FormRejection, JsonRejection},
};
use tracing::{info, warn};

use keepsake_types::api::{LoginForm, MessageResponse, SignupRequest, TokenResponse};

use crate::credentials;
use crate::error::{ApiError, AuthError};
use crate::state::{AppState, blocking};

/// POST /signup: `{email, password}` JSON body.
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(req) = payload?;
    let db = state.clone();
    blocking(move || credentials::create_user(&db.db, &req.email, &req.password)).await?;

    Ok(Json(MessageResponse {
        msg: "User created".to_string(),
    }))
}

/// POST /login: password form, email in `username`.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Form<LoginForm>, FormRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Form(form) = payload?;
    let db = state.clone();
    let user = blocking(move || {
        let user = credentials::find_by_email(&db.db, &form.username)?;
        Ok(user.filter(|u| credentials::verify(u, &form.password)))
    })
    .await?;

    let Some(user) = user else {
        warn!("Failed login attempt");
        return Err(AuthError::BadCredentials.into());
    };

    let access_token = state.tokens.issue(user.id)?;
    info!("User {} logged in", user.id);

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}
