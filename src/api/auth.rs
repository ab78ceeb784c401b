use actix_web::http::header::AUTHORIZATION;
use actix_web::HttpRequest;

use crate::error::{ChatError, ChatResult};
use crate::server::MarketChatServer;
use crate::service::Caller;

/// 市场后端使用的内部令牌头 / Header carrying the marketplace backend token
pub const INTERNAL_TOKEN_HEADER: &str = "X-Internal-Token";

/// 从请求头解析请求方 / Resolve the caller from request headers
pub fn caller(server: &MarketChatServer, req: &HttpRequest) -> ChatResult<Caller> {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());
    server
        .verifier
        .caller(header(AUTHORIZATION.as_str()), header(INTERNAL_TOKEN_HEADER))
        .map_err(|e| ChatError::Unauthorized(e.to_string()))
}
