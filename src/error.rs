use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::storage::StoreError;

/// 聊天服务错误 / Chat service errors
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("{field} {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("storage error: {0}")]
    Storage(StoreError),
}

impl ChatError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden(reason.into())
    }

    /// 获取错误代码 / Error code
    pub fn error_code(&self) -> i32 {
        match self {
            ChatError::Validation { .. } => 1004,
            ChatError::Unauthorized(_) => 1002,
            ChatError::Forbidden(_) => 1003,
            ChatError::NotFound { .. } => 1009,
            ChatError::Storage(_) => 1006,
        }
    }

    pub fn field(&self) -> Option<&'static str> {
        match self {
            ChatError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConversationNotFound(id) => ChatError::NotFound {
                entity: "conversation",
                id: id.to_hex(),
            },
            StoreError::MessageNotFound(id) => ChatError::NotFound {
                entity: "message",
                id: id.to_hex(),
            },
            other => ChatError::Storage(other),
        }
    }
}

impl ResponseError for ChatError {
    fn status_code(&self) -> StatusCode {
        match self {
            ChatError::Validation { .. } => StatusCode::BAD_REQUEST,
            ChatError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
            ChatError::NotFound { .. } => StatusCode::NOT_FOUND,
            ChatError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ChatError::Storage(e) => {
                tracing::error!("❌ Storage error: {}", e);
                "internal storage error".to_string()
            }
            other => {
                tracing::info!("Client error: {}", other);
                other.to_string()
            }
        };
        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "error": {
                "code": self.error_code(),
                "message": message,
                "field": self.field(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
