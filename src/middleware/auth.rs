use axum::{extract::FromRequestParts, http::request::Parts};

use crate::models::auth::AuthenticatedUser;
use crate::models::user::Role;
use crate::routes::error::ApiError;
use crate::AppState;

pub const AUTH_HEADER: &str = "x-auth-token";

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::MissingAuth)?;

        let session = state.auth.verify_auth_token(token)?;
        Ok(session.into())
    }
}

/// Every role the user holds must be among `granted`.
pub fn grant_access(user: &AuthenticatedUser, granted: &[Role]) -> Result<(), ApiError> {
    if user.roles.iter().all(|r| granted.contains(r)) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(roles: Vec<Role>) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            roles,
        }
    }

    #[test]
    fn all_roles_must_be_granted() {
        let granted = [Role::Patient, Role::RelatedPerson];
        assert!(grant_access(&user(vec![Role::Patient]), &granted).is_ok());
        assert!(grant_access(&user(vec![Role::Patient, Role::RelatedPerson]), &granted).is_ok());
        assert!(grant_access(&user(vec![Role::Patient, Role::Admin]), &granted).is_err());
    }
}
