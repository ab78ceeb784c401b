use actix_web::{http::StatusCode, HttpResponse};

// 通用 HTTP 响应封装 / Generic HTTP response helpers

// 结构体自动转 JSON，失败则原样文本
// Serialize to JSON, fall back to the Debug text
pub fn respond_any<T: serde::Serialize + std::fmt::Debug>(
    code: StatusCode,
    data: T,
) -> HttpResponse {
    match serde_json::to_value(&data) {
        Ok(v) => HttpResponse::build(code).json(v),
        Err(_) => HttpResponse::build(code)
            .content_type("text/plain; charset=utf-8")
            .body(format!("{:?}", data)),
    }
}

// 成功响应 / 200 with JSON body
pub fn respond_ok<T: serde::Serialize + std::fmt::Debug>(data: T) -> HttpResponse {
    respond_any(StatusCode::OK, data)
}
