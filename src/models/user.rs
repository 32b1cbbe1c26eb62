use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Patient,
    Nurse,
    Therapist,
    Physician,
    RelatedPerson,
    Admin,
    Other,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Patient => "patient",
            Role::Nurse => "nurse",
            Role::Therapist => "therapist",
            Role::Physician => "physician",
            Role::RelatedPerson => "relatedPerson",
            Role::Admin => "admin",
            Role::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "nurse" => Ok(Role::Nurse),
            "therapist" => Ok(Role::Therapist),
            "physician" => Ok(Role::Physician),
            "relatedPerson" => Ok(Role::RelatedPerson),
            "admin" => Ok(Role::Admin),
            "other" => Ok(Role::Other),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

/// Stored user as the auth core sees it.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub phone_number: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub confirmed: bool,
    pub login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

/// FHIR resource type backing a user account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResourceType {
    Patient,
    Practitioner,
    RelatedPerson,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResourceType::Patient => "Patient",
            ResourceType::Practitioner => "Practitioner",
            ResourceType::RelatedPerson => "RelatedPerson",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Patient" => Ok(ResourceType::Patient),
            "Practitioner" => Ok(ResourceType::Practitioner),
            "RelatedPerson" => Ok(ResourceType::RelatedPerson),
            _ => Err(format!("Unknown resource type: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationState {
    Active,
    Rejected,
}

impl std::fmt::Display for InvitationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvitationState::Active => write!(f, "ACTIVE"),
            InvitationState::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl std::str::FromStr for InvitationState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(InvitationState::Active),
            "REJECTED" => Ok(InvitationState::Rejected),
            _ => Err(format!("Unknown invitation state: {s}")),
        }
    }
}

/// Invitation owned by the inviting user. Also the payload of an
/// `INVITE_MEMBER` action token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Inviting user.
    pub uid: Uuid,
    pub phone_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub resource_type: ResourceType,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub state: InvitationState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
}

// Request/Response DTOs
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
    /// Verification code sent to the phone by restore-password.
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteMemberRequest {
    pub phone_number: String,
    pub first_name: String,
    pub last_name: String,
    pub resource_type: ResourceType,
    pub patient_id: Option<String>,
}
