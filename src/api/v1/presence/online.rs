use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};

use crate::comm::response::{respond_any, respond_ok};
use crate::error::ChatResult;
use crate::server::MarketChatServer;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(presence_online_handle)));
}

// 在线用户快照 / Online users snapshot
pub async fn presence_online_handle(
    server: web::Data<Arc<MarketChatServer>>,
    req: HttpRequest,
) -> ChatResult<HttpResponse> {
    crate::api::auth::caller(&server, &req)?;
    Ok(match server.hub.snapshot().await {
        Ok(snapshot) => respond_ok(snapshot),
        Err(e) => respond_any(
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({"error": format!("{}", e)}),
        ),
    })
}
