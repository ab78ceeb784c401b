use serde::{Deserialize, Serialize};

use crate::comm::jwt::{self, JwtError};
use crate::config::AuthConfig;
use crate::domain::ObjectId;

/// 令牌声明 / Token claims
///
/// 市场前端签发的令牌把用户 ID 放在 `id`，兼容 `userId` 与 `sub`。
/// Marketplace tokens carry the user id in `id`; `userId` and `sub` are accepted too.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    #[serde(alias = "userId", alias = "sub")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl Claims {
    pub fn for_user(id: ObjectId) -> Self {
        Self {
            id: Some(id.to_hex()),
            exp: None,
        }
    }

    pub fn expiring_at(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn user_id(&self) -> Option<ObjectId> {
        self.id.as_deref().and_then(|raw| raw.parse().ok())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("missing credentials")]
    Missing,
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("token expired")]
    Expired,
    #[error("token has no valid user id claim")]
    Subject,
}

/// 请求方身份 / Who is calling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// 终端用户 / End user
    User(ObjectId),
    /// 市场后端（内部令牌）/ Marketplace backend (internal token)
    Service,
}

impl Caller {
    pub fn user(&self) -> Option<ObjectId> {
        match self {
            Caller::User(id) => Some(*id),
            Caller::Service => None,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Caller::Service)
    }
}

/// 令牌校验器 / Token verifier
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    verify_signature: bool,
    secret: Vec<u8>,
    internal_token: Option<String>,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            verify_signature: config.enabled,
            secret: config
                .jwt_secret
                .clone()
                .unwrap_or_default()
                .into_bytes(),
            internal_token: config.internal_token.clone(),
        }
    }

    pub fn verifies_signatures(&self) -> bool {
        self.verify_signature
    }

    /// 校验用户令牌并返回用户 ID / Verify a user token and return its user id
    pub fn verify(&self, token: &str) -> Result<ObjectId, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }
        let claims: Claims = if self.verify_signature {
            jwt::verify_hs256(token, &self.secret)?
        } else {
            jwt::decode_payload(token)?
        };
        if let Some(exp) = claims.exp {
            if exp <= chrono::Utc::now().timestamp() {
                return Err(TokenError::Expired);
            }
        }
        claims.user_id().ok_or(TokenError::Subject)
    }

    pub fn is_internal(&self, presented: &str) -> bool {
        match &self.internal_token {
            Some(expected) => !presented.is_empty() && expected == presented,
            None => false,
        }
    }

    /// 由请求头解析请求方 / Resolve the caller from request headers
    pub fn caller(
        &self,
        authorization: Option<&str>,
        internal: Option<&str>,
    ) -> Result<Caller, TokenError> {
        if let Some(presented) = internal {
            if self.is_internal(presented) {
                return Ok(Caller::Service);
            }
        }
        let header = authorization.ok_or(TokenError::Missing)?;
        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .unwrap_or(header);
        self.verify(token).map(Caller::User)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        Ok(jwt::sign_hs256(claims, &self.secret)?)
    }
}
