use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::comm::response::respond_ok;
use crate::error::ChatResult;
use crate::server::MarketChatServer;
use crate::service::chat::MarkReadRequest;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(chat_read_handle)));
}

// 标记已读（幂等）/ Mark read (idempotent)
pub async fn chat_read_handle(
    server: web::Data<Arc<MarketChatServer>>,
    req: HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Json<MarkReadRequest>,
) -> ChatResult<HttpResponse> {
    let caller = crate::api::auth::caller(&server, &req)?;
    let (id, message_id) = path.into_inner();
    let receipt = server.chat.mark_read(&caller, &id, &message_id, &body)?;
    Ok(respond_ok(receipt))
}
