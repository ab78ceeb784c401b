pub mod auth;
pub mod v1;
