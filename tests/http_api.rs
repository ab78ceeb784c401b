//! HTTP 接口集成测试 / HTTP API integration tests

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use v_market_chat::comm::ConfigManager;
use v_market_chat::config;
use v_market_chat::domain::ObjectId;
use v_market_chat::presence::PresenceTracker;
use v_market_chat::router;
use v_market_chat::service::auth::Claims;
use v_market_chat::storage::MemoryChatStore;
use v_market_chat::ws::Hub;
use v_market_chat::MarketChatServer;

const CONFIG: &str = r#"
[auth]
enabled = true
jwt_secret = "integration-secret"
internal_token = "svc-token"
"#;

fn server() -> Arc<MarketChatServer> {
    let cm = ConfigManager::from_toml_str(CONFIG).unwrap();
    let (hub, _task) = Hub::spawn(PresenceTracker::new());
    Arc::new(MarketChatServer::new(
        Arc::new(MemoryChatStore::new()),
        hub,
        config::from_manager(&cm).unwrap(),
    ))
}

fn bearer(server: &MarketChatServer, user: ObjectId) -> (&'static str, String) {
    let token = server.verifier.sign(&Claims::for_user(user)).unwrap();
    ("Authorization", format!("Bearer {}", token))
}

macro_rules! app {
    ($server:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($server.clone()))
                .configure(router::configure),
        )
        .await
    };
}

/// 会话路由的鉴权与参与者校验 / Auth and participant checks on chat routes
#[actix_web::test]
async fn test_chat_routes_enforce_participants() {
    let server = server();
    let app = app!(server);
    let (p, u1, u2) = (ObjectId::new(), ObjectId::new(), ObjectId::new());

    let req = test::TestRequest::get()
        .uri(&format!("/v1/chats?user_id={}", u1))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/v1/chats")
        .insert_header(bearer(&server, u1))
        .set_json(json!({
            "product": p.to_hex(), "user1": u1.to_hex(), "user2": u2.to_hex(),
            "sender": u1.to_hex(), "content": "Is the bike still available?"
        }))
        .to_request();
    let chat: Value = test::call_and_read_body_json(&app, req).await;
    let chat_id = chat["id"].as_str().unwrap().to_string();
    let message_id = chat["messages"][0]["id"].as_str().unwrap().to_string();
    assert_eq!(chat["product"]["kind"], "id");

    let req = test::TestRequest::get()
        .uri(&format!("/v1/chats?user_id={}", u1))
        .insert_header(bearer(&server, u2))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::post()
        .uri(&format!("/v1/chats/{}/messages/{}/read", chat_id, message_id))
        .insert_header(bearer(&server, u2))
        .set_json(json!({"user_id": u2.to_hex()}))
        .to_request();
    let receipt: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(receipt["changed"], true);
    assert_eq!(receipt["message"]["read_by"], json!([u1.to_hex(), u2.to_hex()]));

    let req = test::TestRequest::get()
        .uri(&format!("/v1/chats?user_id={}&product_id={}", u2, p))
        .insert_header(bearer(&server, u2))
        .to_request();
    let listed: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

/// 校验错误返回 400 并指明字段 / Validation errors return 400 naming the field
#[actix_web::test]
async fn test_validation_error_body() {
    let server = server();
    let app = app!(server);
    let u1 = ObjectId::new();

    let req = test::TestRequest::post()
        .uri("/v1/chats")
        .insert_header(bearer(&server, u1))
        .set_json(json!({
            "product": "not-an-id", "user1": u1.to_hex(), "user2": ObjectId::new().to_hex(),
            "sender": u1.to_hex(), "content": "hi"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["field"], "product");
    assert_eq!(body["error"]["code"], 1004);

    let req = test::TestRequest::post()
        .uri(&format!("/v1/chats/{}/messages", ObjectId::new()))
        .insert_header(bearer(&server, u1))
        .set_json(json!({"sender": u1.to_hex(), "content": "anyone?"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

/// 内部接口需要内部令牌 / Internal endpoints require the internal token
#[actix_web::test]
async fn test_internal_directory_and_product_cleanup() {
    let server = server();
    let app = app!(server);
    let (p, u1, u2) = (ObjectId::new(), ObjectId::new(), ObjectId::new());

    let req = test::TestRequest::put()
        .uri(&format!("/v1/internal/users/{}", u2))
        .insert_header(("X-Internal-Token", "svc-token"))
        .set_json(json!({"username": "bike_seller"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri(&format!("/v1/users/{}", u2))
        .insert_header(bearer(&server, u1))
        .to_request();
    let user: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(user["username"], "bike_seller");

    let req = test::TestRequest::get()
        .uri(&format!("/v1/users/{}", ObjectId::new()))
        .insert_header(bearer(&server, u1))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/v1/chats")
        .insert_header(bearer(&server, u1))
        .set_json(json!({
            "product": p.to_hex(), "user1": u1.to_hex(), "user2": u2.to_hex(),
            "sender": u1.to_hex(), "content": "hello"
        }))
        .to_request();
    let chat: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(chat["user2"]["kind"], "resolved");
    assert_eq!(chat["user2"]["value"]["username"], "bike_seller");

    let path = format!("/v1/internal/products/{}/chats", p);
    let req = test::TestRequest::delete()
        .uri(&path)
        .insert_header(bearer(&server, u1))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::delete()
        .uri(&path)
        .insert_header(("X-Internal-Token", "svc-token"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["deleted"], 1);
}

/// 健康检查 / Health checks
#[actix_web::test]
async fn test_health_endpoints() {
    let server = server();
    let app = app!(server);

    let req = test::TestRequest::get().uri("/v1/health/live").to_request();
    let live: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(live["alive"], true);

    let req = test::TestRequest::get().uri("/v1/health/ready").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri("/v1/health").to_request();
    let status: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(status["component"], "market_chat");
    assert_eq!(status["healthy"], true);
}
