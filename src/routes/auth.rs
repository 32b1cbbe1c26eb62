use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    models::{
        auth::TokenData,
        user::{ChangePasswordRequest, LoginRequest},
    },
    routes::error::ApiError,
    AppState,
};

/// `?token=..&id=..` of an action link.
#[derive(Debug, Deserialize)]
pub struct ActionTokenQuery {
    pub token: Option<String>,
    pub id: Option<String>,
}

impl ActionTokenQuery {
    pub fn into_token_data(self) -> Result<TokenData, ApiError> {
        match (self.token, self.id) {
            (Some(token), Some(id)) if !token.is_empty() && !id.is_empty() => {
                Ok(TokenData { token, id })
            }
            _ => Err(ApiError::BadRequest(
                "Missing token or id query param".to_string(),
            )),
        }
    }
}

fn require_phone_number(phone_number: &str) -> Result<(), ApiError> {
    let valid = (9..=15).contains(&phone_number.len())
        && phone_number.chars().all(|c| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest("Incorrect phone number".to_string()))
    }
}

pub async fn log_in(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    require_phone_number(&body.phone_number)?;
    if body.password.is_empty() {
        return Err(ApiError::BadRequest("Missing password".to_string()));
    }

    let token = state
        .auth
        .authenticate(&body.phone_number, &body.password)
        .await?;
    Ok(Json(json!({ "token": token })))
}

pub async fn restore_password(
    State(state): State<AppState>,
    Path(phone_number): Path<String>,
) -> Result<Json<TokenData>, ApiError> {
    require_phone_number(&phone_number)?;
    let token_data = state.auth.restore_password(&phone_number).await?;
    Ok(Json(token_data))
}

pub async fn change_password(
    State(state): State<AppState>,
    Path(phone_number): Path<String>,
    Query(query): Query<ActionTokenQuery>,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    require_phone_number(&phone_number)?;
    let token_data = query.into_token_data()?;
    if body.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if body.code.is_empty() {
        return Err(ApiError::BadRequest("Missing verification code".to_string()));
    }

    let token = state
        .auth
        .change_password(&phone_number, &token_data, &body.password, &body.code)
        .await?;
    Ok(Json(json!({ "token": token })))
}
