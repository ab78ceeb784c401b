use actix_web::http::StatusCode;
use actix_web::{web, Responder};

use crate::comm::response::respond_any;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(health_live_handle)));
}

// 存活检查
// Liveness check
pub async fn health_live_handle() -> impl Responder {
    let payload = serde_json::json!({
        "alive": true,
        "service": "v-market-chat",
        "timestamp": chrono::Utc::now().timestamp_millis()
    });
    respond_any(StatusCode::OK, payload)
}
