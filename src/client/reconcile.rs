use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::domain::{ConversationKey, ConversationView, ObjectId};

use super::identity::current_user;

/// 新会话默认问候语 / Default greeting seeding a new conversation
pub const DEFAULT_GREETING: &str = "Hi! Is this still available?";

/// 无法发起会话的原因 / Why a conversation cannot be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DisabledReason {
    #[error("current user is unknown")]
    UnknownIdentity,
    #[error("seller id is not a valid id")]
    InvalidSeller,
    #[error("product id is not a valid id")]
    InvalidProduct,
    #[error("cannot chat with yourself")]
    SelfChat,
}

/// 打开会话的计划 / Plan for opening a conversation
#[derive(Debug, Clone, PartialEq)]
pub enum OpenPlan {
    /// 已有会话 / Existing conversation
    Existing(ObjectId),
    /// 需要创建，附带问候语 / Needs creation, seeded with a greeting
    Create {
        product: ObjectId,
        current: ObjectId,
        seller: ObjectId,
        greeting: String,
    },
    /// 禁用，不发出请求 / Disabled, no request is issued
    Disabled(DisabledReason),
}

/// 在已加载会话中查找 {product, 无序(current, seller)}
/// Find {product, unordered(current, seller)} among loaded conversations
pub fn find_existing(
    conversations: &[ConversationView],
    current: ObjectId,
    seller: ObjectId,
    product: ObjectId,
) -> Option<&ConversationView> {
    conversations
        .iter()
        .find(|chat| chat.is_between(product, current, seller))
}

pub fn plan_open(
    token: Option<&str>,
    seller: &str,
    product: &str,
    loaded: &[ConversationView],
) -> OpenPlan {
    let Some(current) = token.and_then(current_user) else {
        return OpenPlan::Disabled(DisabledReason::UnknownIdentity);
    };
    let Ok(seller) = seller.parse::<ObjectId>() else {
        return OpenPlan::Disabled(DisabledReason::InvalidSeller);
    };
    let Ok(product) = product.parse::<ObjectId>() else {
        return OpenPlan::Disabled(DisabledReason::InvalidProduct);
    };
    if seller == current {
        return OpenPlan::Disabled(DisabledReason::SelfChat);
    }
    match find_existing(loaded, current, seller, product) {
        Some(chat) => OpenPlan::Existing(chat.id),
        None => OpenPlan::Create {
            product,
            current,
            seller,
            greeting: DEFAULT_GREETING.to_string(),
        },
    }
}

/// 同一客户端内对同一键的并发创建共享一次在途请求
/// Concurrent creations for the same key within one client share a single in-flight request
///
/// 请求结束后即移除条目：失败会在下次调用时重试，成功的结果不会被长期缓存。
/// The entry is dropped once the request settles: failures retry on the next call and
/// successful ids are not cached past the in-flight window.
#[derive(Default)]
pub struct CreationGuard {
    inflight: DashMap<ConversationKey, Arc<OnceCell<ObjectId>>>,
}

impl CreationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create<F, Fut, E>(&self, key: ConversationKey, create: F) -> Result<ObjectId, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ObjectId, E>>,
    {
        let cell = self.inflight.entry(key).or_default().clone();
        let result = cell.get_or_try_init(create).await.copied();
        self.inflight.remove_if(&key, |_, current| Arc::ptr_eq(current, &cell));
        result
    }

    /// 当前在途的创建数 / Number of creations currently in flight
    pub fn pending(&self) -> usize {
        self.inflight.len()
    }
}
