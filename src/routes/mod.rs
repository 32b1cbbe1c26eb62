pub mod auth;
pub mod auth2;
pub mod error;
pub mod health;
pub mod invitations;
