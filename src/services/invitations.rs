use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::InvitationStore,
    error::{AuthError, AuthResult, InvalidTokenCause},
    models::{
        auth::{TokenAction, TokenClaims, TokenData},
        user::{Invitation, InvitationState, InviteMemberRequest},
    },
    services::auth::AuthService,
};

/// Where an action link should send the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRedirect {
    Login,
    Register { token: String, id: String },
}

impl ActionRedirect {
    pub fn url(&self, frontend_url: &str) -> String {
        let base = frontend_url.trim_end_matches('/');
        match self {
            ActionRedirect::Login => format!("{base}/login"),
            ActionRedirect::Register { token, id } => {
                format!("{base}/register?token={token}&id={id}")
            }
        }
    }
}

pub struct InvitationService {
    invitations: Arc<dyn InvitationStore>,
    auth: Arc<AuthService>,
    invite_token_lifetime: Duration,
}

impl InvitationService {
    pub fn new(
        invitations: Arc<dyn InvitationStore>,
        auth: Arc<AuthService>,
        invite_token_lifetime: Duration,
    ) -> Self {
        Self {
            invitations,
            auth,
            invite_token_lifetime,
        }
    }

    /// Invite a phone number into the sender's care team. People without an
    /// account get an action token; existing users get the invitation
    /// embedded in their own profile instead.
    pub async fn invite_member(
        &self,
        sender: Uuid,
        request: InviteMemberRequest,
    ) -> AuthResult<InviteOutcome> {
        let invitee = self
            .auth
            .users()
            .find_by_phone_number(&request.phone_number)
            .await?;
        match invitee {
            Some(user) if user.id == sender => Err(AuthError::SelfInvitation),
            Some(user) => {
                let invitation = self.invite_existing_member(sender, user.id, request).await?;
                Ok(InviteOutcome {
                    invitation,
                    token_data: None,
                })
            }
            None => {
                let (invitation, token_data) = self.invite_new_member(sender, request).await?;
                Ok(InviteOutcome {
                    invitation,
                    token_data: Some(token_data),
                })
            }
        }
    }

    /// Invite someone without an account. The invitation travels inside an
    /// `INVITE_MEMBER` action token and is also kept under the sender.
    pub async fn invite_new_member(
        &self,
        sender: Uuid,
        request: InviteMemberRequest,
    ) -> AuthResult<(Invitation, TokenData)> {
        let mut invitation = new_invitation(sender, request);

        let token_data = self
            .auth
            .generate_action_token(
                &invitation,
                TokenAction::InviteMember,
                Some(self.invite_token_lifetime),
            )
            .await?;
        invitation.token_id = Some(token_data.id.clone());
        self.invitations.save(sender, &invitation).await?;

        tracing::info!(
            invitation_id = %invitation.id,
            sender = %sender,
            "invitation issued"
        );
        Ok((invitation, token_data))
    }

    async fn invite_existing_member(
        &self,
        sender: Uuid,
        invitee: Uuid,
        request: InviteMemberRequest,
    ) -> AuthResult<Invitation> {
        let invitation = new_invitation(sender, request);
        let received = Invitation {
            id: Uuid::new_v4(),
            ..invitation.clone()
        };
        self.invitations.save(invitee, &received).await?;
        self.invitations.save(sender, &invitation).await?;

        tracing::info!(
            invitation_id = %invitation.id,
            sender = %sender,
            invitee = %invitee,
            "invitation delivered to existing user"
        );
        Ok(invitation)
    }

    pub async fn list(&self, owner: Uuid) -> AuthResult<Vec<Invitation>> {
        Ok(self.invitations.list(owner).await?)
    }

    /// Resolve an action link without consuming its token.
    pub async fn resolve_action(&self, token_data: &TokenData) -> AuthResult<ActionRedirect> {
        let claims: TokenClaims<Value> = self.auth.check_action_token(token_data).await?;
        match claims.action {
            Some(TokenAction::InviteMember) => {
                let invitation: Invitation = serde_json::from_value(claims.data)
                    .map_err(|_| AuthError::InvalidToken(InvalidTokenCause::PayloadMismatch))?;
                let existing = self
                    .auth
                    .users()
                    .find_by_phone_number(&invitation.phone_number)
                    .await?;
                Ok(match existing {
                    Some(_) => ActionRedirect::Login,
                    None => ActionRedirect::Register {
                        token: token_data.token.clone(),
                        id: token_data.id.clone(),
                    },
                })
            }
            _ => Err(AuthError::InvalidToken(InvalidTokenCause::ActionMismatch)),
        }
    }

    /// Redeem an invitation token as `acceptor`, whose phone number must be
    /// the invited one. The token is consumed before the sender's stored
    /// invitation is removed.
    pub async fn accept_invitation(
        &self,
        acceptor: Uuid,
        token_data: &TokenData,
    ) -> AuthResult<Invitation> {
        let claims: TokenClaims<Invitation> = self.auth.check_action_token(token_data).await?;
        if claims.action != Some(TokenAction::InviteMember) {
            return Err(AuthError::InvalidToken(InvalidTokenCause::ActionMismatch));
        }
        let invited = claims.data;

        let acceptor = self
            .auth
            .users()
            .find_by_id(acceptor)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        if acceptor.phone_number != invited.phone_number {
            tracing::warn!(
                invitation_id = %invited.id,
                acceptor = %acceptor.id,
                "invitation presented by another user"
            );
            return Err(AuthError::InvalidToken(InvalidTokenCause::PayloadMismatch));
        }

        let stored = self
            .invitations
            .find_embedded(invited.uid, invited.id)
            .await?
            .filter(|i| {
                i.state == InvitationState::Active
                    && i.token_id.as_deref() == Some(token_data.id.as_str())
            })
            .ok_or(AuthError::InvalidToken(InvalidTokenCause::RecordMissing))?;

        self.auth.consume_action_token(&token_data.id).await?;
        self.invitations.remove_embedded(stored.uid, stored.id).await?;

        tracing::info!(invitation_id = %stored.id, acceptor = %acceptor.id, "invitation accepted");
        Ok(stored)
    }
}

/// Result of an invite: the stored invitation, plus the action token when
/// the invitee has no account yet.
#[derive(Debug, Clone, Serialize)]
pub struct InviteOutcome {
    pub invitation: Invitation,
    #[serde(flatten)]
    pub token_data: Option<TokenData>,
}

fn new_invitation(sender: Uuid, request: InviteMemberRequest) -> Invitation {
    Invitation {
        id: Uuid::new_v4(),
        uid: sender,
        phone_number: request.phone_number,
        patient_id: request.patient_id,
        resource_type: request.resource_type,
        first_name: request.first_name,
        last_name: request.last_name,
        created_at: Utc::now(),
        state: InvitationState::Active,
        token_id: None,
    }
}
