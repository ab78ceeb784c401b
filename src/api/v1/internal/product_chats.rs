use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::comm::response::respond_ok;
use crate::error::ChatResult;
use crate::server::MarketChatServer;

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::delete().to(product_chats_delete_handle)));
}

// 商品删除时由市场后端调用 / Called by the marketplace backend when a listing is removed
pub async fn product_chats_delete_handle(
    server: web::Data<Arc<MarketChatServer>>,
    req: HttpRequest,
    product_id: web::Path<String>,
) -> ChatResult<HttpResponse> {
    let caller = crate::api::auth::caller(&server, &req)?;
    let deleted = server.chat.delete_by_product(&caller, &product_id)?;
    Ok(respond_ok(serde_json::json!({
        "product_id": product_id.as_str(),
        "deleted": deleted
    })))
}
