use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::comm::response::respond_ok;
use crate::error::ChatResult;
use crate::server::MarketChatServer;

#[derive(serde::Deserialize)]
pub struct ChatListQuery {
    pub user_id: Option<String>,
    pub product_id: Option<String>,
}

// 用户会话列表（按最近消息倒序）
// Conversations of a user, most recent first
pub async fn chat_list_handle(
    server: web::Data<Arc<MarketChatServer>>,
    req: HttpRequest,
    query: web::Query<ChatListQuery>,
) -> ChatResult<HttpResponse> {
    let caller = crate::api::auth::caller(&server, &req)?;
    let chats = server.chat.list_for_user(
        &caller,
        query.user_id.as_deref(),
        query.product_id.as_deref(),
    )?;
    Ok(respond_ok(chats))
}
