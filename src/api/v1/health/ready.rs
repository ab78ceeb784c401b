use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, Responder};

use crate::comm::response::respond_any;
use crate::server::MarketChatServer;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(health_ready_handle)));
}

// 就绪检查：存储可读且 hub 在运行
// Readiness: the store answers and the hub is running
pub async fn health_ready_handle(server: web::Data<Arc<MarketChatServer>>) -> impl Responder {
    let store_ok = server.chat.store().count().is_ok();
    let presence = server.hub.snapshot().await.ok();
    let is_ready = store_ok && presence.is_some();
    let payload = serde_json::json!({
        "ready": is_ready,
        "service": "v-market-chat",
        "timestamp": chrono::Utc::now().timestamp_millis(),
        "store": store_ok,
        "online_users": presence.map(|p| p.online_count),
    });
    let code = if is_ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    respond_any(code, payload)
}
