use std::sync::Arc;

use crate::config::AppConfig;
use crate::service::auth::TokenVerifier;
use crate::service::chat::ChatService;
use crate::storage::Backend;
use crate::ws::{Gateway, HubHandle};

/// 服务端全局状态 / Server global state
#[derive(Clone)]
pub struct MarketChatServer {
    pub chat: ChatService,                // 聊天服务 / Chat service
    pub hub: HubHandle,                   // 在线状态 hub / Presence hub
    pub verifier: Arc<TokenVerifier>,     // 令牌校验 / Token verification
    pub config: Arc<AppConfig>,           // 配置快照 / Config snapshot
}

impl MarketChatServer {
    pub fn new(store: Arc<dyn Backend>, hub: HubHandle, config: AppConfig) -> Self {
        let verifier = Arc::new(TokenVerifier::new(&config.auth));
        Self {
            chat: ChatService::new(store, config.chat.clone()),
            hub,
            verifier,
            config: Arc::new(config),
        }
    }

    /// 构建共享同一 hub 与校验器的网关 / Build a gateway sharing this hub and verifier
    pub fn gateway(&self) -> Gateway {
        Gateway::new(
            self.hub.clone(),
            self.verifier.clone(),
            self.config.gateway.idle_timeout_ms,
        )
    }
}
