//! 存储模块 / Storage module
//!
//! 会话记录与目录摘要的持久化。`ChatStore` 负责会话，`Directory` 负责用户/商品摘要。
//! Persistence for conversation records and directory summaries. `ChatStore` owns
//! conversations, `Directory` owns user/product summaries.
//!
//! 两个后端：内存（测试、开发）与 sled（默认）。
//! Two backends: in-memory (tests, development) and sled (default).

pub mod memory;
pub mod sled_store;
pub mod traits;

use std::sync::Arc;

use anyhow::Result;

use crate::config::StorageConfig;
use crate::domain::ObjectId;

pub use memory::MemoryChatStore;
pub use sled_store::SledChatStore;
pub use traits::{ChatStore, Directory, UpsertOutcome};

/// 存储错误 / Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    ConversationNotFound(ObjectId),
    #[error("message {0} not found")]
    MessageNotFound(ObjectId),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("sled: {0}")]
    Sled(#[from] sled::Error),
    #[error("codec: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// 同时实现会话与目录的后端 / Backend implementing both conversations and directory
pub trait Backend: ChatStore + Directory {}

impl<T: ChatStore + Directory> Backend for T {}

/// 按配置打开存储 / Open the configured backend
pub fn open(config: &StorageConfig) -> Result<Arc<dyn Backend>> {
    match config.backend.as_str() {
        "memory" => {
            tracing::warn!("🧪 Using in-memory chat store, data is lost on restart");
            Ok(Arc::new(MemoryChatStore::new()))
        }
        _ => {
            tracing::info!("🗄️  Opening sled chat store at {}", config.path);
            Ok(Arc::new(SledChatStore::open(&config.path)?))
        }
    }
}
