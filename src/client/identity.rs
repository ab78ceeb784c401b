use crate::comm::jwt;
use crate::domain::ObjectId;
use crate::service::auth::Claims;

/// 从本地令牌推断当前用户（不校验签名，仅用于展示）
/// Infer the current user from the local token (no signature check, display only)
pub fn current_user(token: &str) -> Option<ObjectId> {
    jwt::decode_payload::<Claims>(token).ok()?.user_id()
}
