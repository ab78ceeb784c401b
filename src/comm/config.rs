use anyhow::{anyhow, Result};
use config::{Config, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref GLOBAL_CONFIG_MANAGER: RwLock<Option<Arc<ConfigManager>>> = RwLock::new(None);
}

/// 环境变量前缀 / Environment variable prefix (`VMC__SERVER__HTTP_PORT`)
pub const ENV_PREFIX: &str = "VMC";

/// 配置数据源信息 / Config source info
#[derive(Debug, Clone)]
pub struct ConfigSourceInfo {
    pub description: String,
    pub loaded: bool,
}

/// 配置管理器 / Config manager
///
/// 优先级（低到高）：default.toml -> production.toml -> 命令行指定文件 -> 环境变量
/// Priority (low to high): default.toml -> production.toml -> file given on CLI -> env
pub struct ConfigManager {
    config: Config,
    sources_info: Vec<ConfigSourceInfo>,
}

impl ConfigManager {
    /// 加载默认配置源 / Load default sources
    pub fn new() -> Result<Self> {
        Self::load(None)
    }

    /// 加载默认配置源以及可选的额外文件 / Load default sources plus an optional extra file
    pub fn load(extra: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        let mut sources_info = Vec::new();

        let mut files: Vec<(String, bool)> = vec![
            ("config/default.toml".to_string(), false),
            ("config/production.toml".to_string(), false),
        ];
        if let Some(path) = extra {
            // 命令行指定的文件必须存在 / a file passed explicitly must exist
            if !files.iter().any(|(p, _)| p == path) {
                files.push((path.to_string(), true));
            }
        }

        for (path, required) in files {
            let exists = std::path::Path::new(&path).exists();
            if !exists && required {
                return Err(anyhow!("必需的配置文件不存在 / required config file missing: {}", path));
            }
            if exists {
                let format = match path.rsplit('.').next() {
                    Some("json") => FileFormat::Json,
                    Some("yaml") | Some("yml") => FileFormat::Yaml,
                    _ => FileFormat::Toml,
                };
                builder = builder.add_source(File::new(&path, format).required(required));
            }
            sources_info.push(ConfigSourceInfo {
                description: path,
                loaded: exists,
            });
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );
        sources_info.push(ConfigSourceInfo {
            description: format!("env {}__*", ENV_PREFIX),
            loaded: true,
        });

        let config = builder
            .build()
            .map_err(|e| anyhow!("构建配置失败 / failed to build config: {}", e))?;
        Ok(Self {
            config,
            sources_info,
        })
    }

    /// 从 TOML 文本构建（测试用）/ Build from inline TOML (tests)
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .map_err(|e| anyhow!("构建配置失败 / failed to build config: {}", e))?;
        Ok(Self {
            config,
            sources_info: vec![ConfigSourceInfo {
                description: "inline".to_string(),
                loaded: true,
            }],
        })
    }

    /// 获取指定 key 的配置值 / Get value for key
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config
            .get(key)
            .map_err(|e| anyhow!("获取配置 '{}' 失败 / failed to read '{}': {}", key, key, e))
    }

    /// 获取配置值，不存在则返回默认值 / Get value or fall back to default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// 检查配置项是否存在 / Whether a key is present
    pub fn exists(&self, key: &str) -> bool {
        self.config.get::<serde_json::Value>(key).is_ok()
    }

    pub fn sources(&self) -> &[ConfigSourceInfo] {
        &self.sources_info
    }
}

/// 初始化全局配置管理器 / Install the global config manager
pub fn init_global_config_manager(manager: ConfigManager) -> Arc<ConfigManager> {
    let manager = Arc::new(manager);
    if let Ok(mut slot) = GLOBAL_CONFIG_MANAGER.write() {
        *slot = Some(manager.clone());
    }
    manager
}

/// 获取全局配置管理器 / Get the global config manager
pub fn get_global_config_manager() -> Result<Arc<ConfigManager>> {
    let slot = GLOBAL_CONFIG_MANAGER
        .read()
        .map_err(|_| anyhow!("配置锁已损坏 / config lock poisoned"))?;
    slot.clone()
        .ok_or_else(|| anyhow!("全局配置未初始化 / global config not initialized"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_values_and_defaults() {
        let cm = ConfigManager::from_toml_str(
            r#"
            [server]
            http_port = 9100
            host = "0.0.0.0"
            "#,
        )
        .unwrap();
        assert_eq!(cm.get::<u16>("server.http_port").unwrap(), 9100);
        assert_eq!(cm.get_or("server.ws_port", 5200_u16), 5200);
        assert!(cm.exists("server.host"));
        assert!(!cm.exists("server.missing"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(ConfigManager::load(Some("config/does-not-exist.toml")).is_err());
    }
}
