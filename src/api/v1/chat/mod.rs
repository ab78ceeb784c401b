use actix_web::web;

pub mod append;
pub mod create;
pub mod list;
pub mod read;

// 路由注册入口：同一资源上的 GET 列表与 POST 创建
// Route registration entry: GET list and POST create share one resource
pub fn register(cfg: &mut web::ServiceConfig, path: &str) {
    cfg.service(
        web::resource(path)
            .route(web::get().to(list::chat_list_handle))
            .route(web::post().to(create::chat_create_handle)),
    );
    append::register(cfg, &format!("{}/{{id}}/messages", path));
    read::register(cfg, &format!("{}/{{id}}/messages/{{message_id}}/read", path));
}
