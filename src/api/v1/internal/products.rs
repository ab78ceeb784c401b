use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};

use crate::comm::response::respond_ok;
use crate::domain::ProductSummary;
use crate::error::{ChatError, ChatResult};
use crate::server::MarketChatServer;
use crate::service::chat::required_id;

#[derive(serde::Deserialize)]
pub struct ProductSyncRequest {
    pub title: Option<String>,
    pub price: Option<f64>,
    pub image: Option<String>,
}

pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(web::resource(path).route(web::put().to(product_sync_handle)));
}

// 同步商品摘要 / Sync a listing summary
pub async fn product_sync_handle(
    server: web::Data<Arc<MarketChatServer>>,
    req: HttpRequest,
    id: web::Path<String>,
    body: web::Json<ProductSyncRequest>,
) -> ChatResult<HttpResponse> {
    let caller = crate::api::auth::caller(&server, &req)?;
    let id = required_id(Some(id.as_str()), "id")?;
    let body = body.into_inner();
    let title = body
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ChatError::validation("title", "is required"))?;
    let product = ProductSummary {
        id,
        title,
        price: body.price,
        image: body.image,
    };
    server.chat.put_product(&caller, product.clone())?;
    Ok(respond_ok(product))
}
