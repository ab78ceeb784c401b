use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::comm::response::respond_ok;
use crate::error::ChatResult;
use crate::server::MarketChatServer;
use crate::service::chat::AppendMessageRequest;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::post().to(chat_append_handle)));
}

pub async fn chat_append_handle(
    server: web::Data<Arc<MarketChatServer>>,
    req: HttpRequest,
    id: web::Path<String>,
    body: web::Json<AppendMessageRequest>,
) -> ChatResult<HttpResponse> {
    let caller = crate::api::auth::caller(&server, &req)?;
    let chat = server.chat.append_message(&caller, &id, &body)?;
    Ok(respond_ok(chat))
}
