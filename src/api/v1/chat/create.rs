use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::comm::response::respond_ok;
use crate::error::ChatResult;
use crate::server::MarketChatServer;
use crate::service::chat::StartChatRequest;

// 查找或创建会话并发送首条消息
// Find-or-create a conversation with its message
pub async fn chat_create_handle(
    server: web::Data<Arc<MarketChatServer>>,
    req: HttpRequest,
    body: web::Json<StartChatRequest>,
) -> ChatResult<HttpResponse> {
    let caller = crate::api::auth::caller(&server, &req)?;
    let chat = server.chat.find_or_create(&caller, &body)?;
    Ok(respond_ok(chat))
}
