use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::auth::INTERNAL_TOKEN_HEADER;
use crate::domain::{ConversationKey, ConversationView, ObjectId, UserSummary};
use crate::service::chat::{AppendMessageRequest, MarkReadRequest, ReadReceipt, StartChatRequest};
use crate::ws::PresenceSnapshot;

use super::profile::ProfileSource;
use super::reconcile::{plan_open, CreationGuard, DisabledReason, OpenPlan};
use super::identity::current_user;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded {status}: {message}")]
    Api {
        status: u16,
        message: String,
        field: Option<String>,
    },
    #[error("cannot open conversation: {0}")]
    Disabled(DisabledReason),
}

/// 聊天服务 HTTP 客户端 / HTTP client for the chat service
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    internal_token: Option<String>,
}

impl ChatClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            internal_token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_internal_token(mut self, token: impl Into<String>) -> Self {
        self.internal_token = Some(token.into());
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut rb = self.http.request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = &self.token {
            rb = rb.bearer_auth(token);
        }
        if let Some(internal) = &self.internal_token {
            rb = rb.header(INTERNAL_TOKEN_HEADER, internal);
        }
        rb
    }

    async fn send<T: DeserializeOwned>(rb: RequestBuilder) -> Result<T, ClientError> {
        let resp = rb.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        let error = &body["error"];
        Err(ClientError::Api {
            status: status.as_u16(),
            message: error["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string()),
            field: error["field"].as_str().map(str::to_string),
        })
    }

    pub async fn list_chats(
        &self,
        user: ObjectId,
        product: Option<ObjectId>,
    ) -> Result<Vec<ConversationView>, ClientError> {
        let mut query = vec![("user_id", user.to_hex())];
        if let Some(product) = product {
            query.push(("product_id", product.to_hex()));
        }
        Self::send(self.request(Method::GET, "/v1/chats").query(&query)).await
    }

    pub async fn start_chat(&self, req: &StartChatRequest) -> Result<ConversationView, ClientError> {
        Self::send(self.request(Method::POST, "/v1/chats").json(req)).await
    }

    pub async fn append(
        &self,
        conversation: ObjectId,
        req: &AppendMessageRequest,
    ) -> Result<ConversationView, ClientError> {
        let path = format!("/v1/chats/{}/messages", conversation);
        Self::send(self.request(Method::POST, &path).json(req)).await
    }

    pub async fn mark_read(
        &self,
        conversation: ObjectId,
        message: ObjectId,
        user: ObjectId,
    ) -> Result<ReadReceipt, ClientError> {
        let path = format!("/v1/chats/{}/messages/{}/read", conversation, message);
        let body = MarkReadRequest {
            user_id: Some(user.to_hex()),
        };
        Self::send(self.request(Method::POST, &path).json(&body)).await
    }

    pub async fn user(&self, id: ObjectId) -> Result<Option<UserSummary>, ClientError> {
        let path = format!("/v1/users/{}", id);
        match Self::send(self.request(Method::GET, &path)).await {
            Ok(user) => Ok(Some(user)),
            Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn presence(&self) -> Result<PresenceSnapshot, ClientError> {
        Self::send(self.request(Method::GET, "/v1/presence")).await
    }

    /// 打开与卖家就某商品的会话：先查已有，再经守卫创建
    /// Open the chat with a seller about a product: look up first, then create through the guard
    pub async fn open_conversation(
        &self,
        seller: &str,
        product: &str,
        guard: &CreationGuard,
    ) -> Result<ObjectId, ClientError> {
        let loaded = match (self.token().and_then(current_user), product.parse::<ObjectId>()) {
            (Some(me), Ok(product)) if seller.parse::<ObjectId>().is_ok() => {
                self.list_chats(me, Some(product)).await?
            }
            _ => Vec::new(),
        };
        match plan_open(self.token(), seller, product, &loaded) {
            OpenPlan::Existing(id) => {
                debug!("💬 Reusing conversation {}", id);
                Ok(id)
            }
            OpenPlan::Disabled(reason) => Err(ClientError::Disabled(reason)),
            OpenPlan::Create {
                product,
                current,
                seller,
                greeting,
            } => {
                let req = StartChatRequest {
                    product: Some(product.to_hex()),
                    user1: Some(current.to_hex()),
                    user2: Some(seller.to_hex()),
                    sender: Some(current.to_hex()),
                    content: Some(greeting),
                };
                let key = ConversationKey::new(product, current, seller);
                debug!("💬 Creating conversation ({} in flight)", guard.pending());
                guard
                    .create(key, || async move { self.start_chat(&req).await.map(|chat| chat.id) })
                    .await
            }
        }
    }
}

#[async_trait]
impl ProfileSource for ChatClient {
    async fn fetch_user(&self, id: ObjectId) -> Result<Option<UserSummary>, ClientError> {
        self.user(id).await
    }
}
