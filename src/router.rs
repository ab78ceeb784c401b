use actix_web::web;

/// 路由配置包装 / Route configuration wrapper
pub fn configure(cfg: &mut web::ServiceConfig) {
    crate::api::v1::chat::register(cfg, "/v1/chats");
    crate::api::v1::internal::product_chats::register(cfg, "/v1/internal/products/{id}/chats");
    crate::api::v1::internal::users::register(cfg, "/v1/internal/users/{id}");
    crate::api::v1::internal::products::register(cfg, "/v1/internal/products/{id}");
    crate::api::v1::users::get::register(cfg, "/v1/users/{id}");
    crate::api::v1::presence::online::register(cfg, "/v1/presence");
    crate::api::v1::health::basic::register(cfg, "/v1/health");
    crate::api::v1::health::live::register(cfg, "/v1/health/live");
    crate::api::v1::health::ready::register(cfg, "/v1/health/ready");
}
