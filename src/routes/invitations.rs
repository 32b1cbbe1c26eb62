use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::{
    middleware::auth::grant_access,
    models::{
        auth::AuthenticatedUser,
        user::{Invitation, InviteMemberRequest, Role},
    },
    routes::{auth::ActionTokenQuery, error::ApiError},
    services::invitations::InviteOutcome,
    AppState,
};

/// Roles allowed to invite people into a care team.
const INVITING_ROLES: &[Role] = &[
    Role::Patient,
    Role::Nurse,
    Role::Therapist,
    Role::Physician,
    Role::RelatedPerson,
];

pub async fn invite_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<InviteMemberRequest>,
) -> Result<Json<InviteOutcome>, ApiError> {
    grant_access(&user, INVITING_ROLES)?;
    if body.first_name.trim().is_empty() || body.last_name.trim().is_empty() {
        return Err(ApiError::BadRequest("Missing invitee name".to_string()));
    }
    let outcome = state.invitations.invite_member(user.user_id, body).await?;
    Ok(Json(outcome))
}

pub async fn list_invitations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Invitation>>, ApiError> {
    Ok(Json(state.invitations.list(user.user_id).await?))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ActionTokenQuery>,
) -> Result<Json<Value>, ApiError> {
    let token_data = query.into_token_data()?;
    let invitation = state
        .invitations
        .accept_invitation(user.user_id, &token_data)
        .await?;
    Ok(Json(json!({ "invitation": invitation })))
}

/// Entry point of links sent out with action tokens.
pub async fn action(
    State(state): State<AppState>,
    Query(query): Query<ActionTokenQuery>,
) -> Result<Response, ApiError> {
    let token_data = query.into_token_data()?;
    let redirect = state.invitations.resolve_action(&token_data).await?;
    let location = redirect.url(&state.config.frontend_url);
    tracing::info!(%location, "redirecting action link");
    Ok((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response())
}
