use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::comm::response::respond_ok;
use crate::domain::UserSummary;
use crate::error::ChatResult;
use crate::server::MarketChatServer;
use crate::service::chat::required_id;

#[derive(serde::Deserialize)]
pub struct UserSyncRequest {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::put().to(user_sync_handle)));
}

// 同步用户摘要 / Sync a user summary
pub async fn user_sync_handle(
    server: web::Data<Arc<MarketChatServer>>,
    req: HttpRequest,
    id: web::Path<String>,
    body: web::Json<UserSyncRequest>,
) -> ChatResult<HttpResponse> {
    let caller = crate::api::auth::caller(&server, &req)?;
    let id = required_id(Some(id.as_str()), "id")?;
    let body = body.into_inner();
    let user = UserSummary {
        id,
        username: body.username,
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        avatar: body.avatar,
    };
    server.chat.put_user(&caller, user.clone())?;
    Ok(respond_ok(user))
}
