use async_trait::async_trait;

use crate::server::MarketChatServer;

/// 健康状态结构体：用于表示组件当前健康状况
/// Health status struct: represents the current health of a component
#[derive(Debug, serde::Serialize)]
pub struct HealthStatus {
    pub component: String,
    pub healthy: bool,
    /// 附加消息（错误信息或提示）/ Additional message (error details or hint)
    pub message: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// 健康检查通用接口 / Generic health check interface
#[async_trait]
pub trait HealthCheck {
    async fn check_health(&self) -> HealthStatus;
}

// 存储可读且 hub 在运行即为健康
// Healthy when the store answers and the hub is running
#[async_trait]
impl HealthCheck for MarketChatServer {
    async fn check_health(&self) -> HealthStatus {
        let store = self.chat.store().count();
        let presence = self.hub.snapshot().await;
        let healthy = store.is_ok() && presence.is_ok();
        let message = match (store, presence) {
            (Ok(chats), Ok(p)) => format!(
                "chats={} online={} connections={}",
                chats, p.online_count, p.connection_count
            ),
            (Err(e), _) => format!("store unavailable: {}", e),
            (_, Err(e)) => format!("presence hub unavailable: {}", e),
        };

        HealthStatus {
            component: "market_chat".to_string(),
            healthy,
            message: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}
