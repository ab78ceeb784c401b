use anyhow::Result;

use crate::comm::ConfigManager;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub ws_port: u16,
    pub http_port: u16,
    pub workers: usize,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// 关闭时不校验签名（仅开发）/ When off, signatures are not checked (development only)
    pub enabled: bool,
    pub jwt_secret: Option<String>,
    pub internal_token: Option<String>,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub backend: String,
    pub path: String,
}

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub idle_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct ChatConfig {
    pub max_message_len: usize,
    pub enforce_participants: bool,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub gateway: GatewayConfig,
    pub chat: ChatConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_len: 2000,
            enforce_participants: true,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: None,
            internal_token: None,
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 60_000,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn port(cm: &ConfigManager, key: &str, default: i64) -> Result<u16> {
    let raw = cm.get_or(key, default);
    u16::try_from(raw).map_err(|_| anyhow::anyhow!("{} out of range: {}", key, raw))
}

/// 从配置管理器投影出强类型配置 / Project typed config out of the manager
pub fn from_manager(cm: &ConfigManager) -> Result<AppConfig> {
    Ok(AppConfig {
        server: ServerConfig {
            host: cm.get_or("server.host", "127.0.0.1".to_string()),
            ws_port: port(cm, "server.ws_port", 5200)?,
            http_port: port(cm, "server.http_port", 8080)?,
            workers: cm.get_or("server.workers", 4_i64).max(1) as usize,
        },
        auth: AuthConfig {
            enabled: cm.get_or("auth.enabled", false),
            jwt_secret: non_empty(cm.get::<String>("auth.jwt_secret").ok()),
            internal_token: non_empty(cm.get::<String>("auth.internal_token").ok()),
        },
        storage: StorageConfig {
            backend: cm.get_or("storage.backend", "sled".to_string()),
            path: cm.get_or("storage.path", "./data/v-market-chat".to_string()),
        },
        gateway: GatewayConfig {
            idle_timeout_ms: cm.get_or("gateway.idle_timeout_ms", 60_000_i64).max(1000) as u64,
        },
        chat: ChatConfig {
            max_message_len: cm.get_or("chat.max_message_len", 2000_i64).max(1) as usize,
            enforce_participants: cm.get_or("chat.enforce_participants", true),
        },
    })
}

/// 从全局配置加载 / Load from the global manager
pub fn load() -> Result<AppConfig> {
    let cm = crate::comm::get_global_config_manager()?;
    let config = from_manager(&cm)?;
    if config.auth.enabled && config.auth.jwt_secret.is_none() {
        anyhow::bail!("auth.enabled requires auth.jwt_secret");
    }
    Ok(config)
}
