pub mod config;
pub mod jwt;
pub mod response;
pub mod tracing;

pub use self::config::{get_global_config_manager, init_global_config_manager, ConfigManager};
pub use self::tracing::init_tracing;
