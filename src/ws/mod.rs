pub mod connection;
pub mod handler;
pub mod hub;
pub mod server;

pub use hub::{Hub, HubCommand, HubHandle, PresenceSnapshot};
pub use server::Gateway;
