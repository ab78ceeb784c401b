pub mod auth;
pub mod chat;
pub mod health;

pub use auth::{Caller, TokenVerifier};
pub use chat::ChatService;
pub use health::{HealthCheck, HealthStatus};
