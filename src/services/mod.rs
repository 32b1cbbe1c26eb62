pub mod action_tokens;
pub mod auth;
pub mod auth_code;
pub mod invitations;
pub mod jwt;
pub mod lockout;
pub mod password;
