use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{routes::error::ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct Auth2Query {
    pub grant_type: Option<String>,
    pub token: Option<String>,
    pub client_id: Option<String>,
}

/// `grant_type=refresh_token` trades a session token for a refresh token
/// bound to `client_id`; `grant_type=auth_token` redeems that refresh token.
pub async fn token(
    State(state): State<AppState>,
    Query(query): Query<Auth2Query>,
) -> Result<Json<Value>, ApiError> {
    let client_id = query
        .client_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing client_id query param".to_string()))?;
    let token = query
        .token
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing auth token query param".to_string()))?;

    let body = match query.grant_type.as_deref() {
        Some("refresh_token") => {
            serde_json::to_value(state.auth.get_refresh_token(&token, &client_id).await?)
        }
        Some("auth_token") => {
            serde_json::to_value(state.auth.renew_auth_token(&token, &client_id).await?)
        }
        _ => {
            return Err(ApiError::BadRequest(
                "Missing or incorrect grant_type query param".to_string(),
            ))
        }
    };
    body.map(Json)
        .map_err(|e| ApiError::Auth(crate::error::AuthError::Internal(e.to_string())))
}
