use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::comm::response::respond_ok;
use crate::error::ChatResult;
use crate::server::MarketChatServer;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::get().to(user_get_handle)));
}

// 客户端按需解析未展开的用户引用
// Clients resolve unpopulated user references on demand
pub async fn user_get_handle(
    server: web::Data<Arc<MarketChatServer>>,
    req: HttpRequest,
    id: web::Path<String>,
) -> ChatResult<HttpResponse> {
    crate::api::auth::caller(&server, &req)?;
    Ok(respond_ok(server.chat.user_summary(&id)?))
}
