use super::StoreResult;
use crate::domain::{
    Conversation, ConversationKey, Message, ObjectId, ProductSummary, UserSummary,
};

/// 查找或创建的结果 / Result of a find-or-create
#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub conversation: Conversation,
    pub created: bool,
}

/// 会话存储，便于测试替换 / Conversation store, swappable for tests
///
/// 实现必须保证每个 [`ConversationKey`] 最多一条记录。
/// Implementations must keep at most one record per [`ConversationKey`].
pub trait ChatStore: Send + Sync {
    /// 原子地查找或创建会话并追加消息 / Atomically find-or-create and append
    fn upsert_message(&self, key: &ConversationKey, user1: ObjectId, user2: ObjectId, message: Message)
        -> StoreResult<UpsertOutcome>;

    fn get(&self, id: ObjectId) -> StoreResult<Option<Conversation>>;

    fn append_message(&self, id: ObjectId, message: Message) -> StoreResult<Conversation>;

    /// 返回更新后的消息与是否发生变化 / Returns the message and whether it changed
    fn mark_read(&self, id: ObjectId, message_id: ObjectId, user: ObjectId)
        -> StoreResult<(Message, bool)>;

    /// 按 last_message_at 倒序 / Ordered by last_message_at descending
    fn list_for_user(&self, user: ObjectId, product: Option<ObjectId>)
        -> StoreResult<Vec<Conversation>>;

    fn delete_by_product(&self, product: ObjectId) -> StoreResult<usize>;

    fn count(&self) -> StoreResult<usize>;
}

/// 用户与商品摘要 / User and product summaries
pub trait Directory: Send + Sync {
    fn user(&self, id: ObjectId) -> StoreResult<Option<UserSummary>>;
    fn put_user(&self, user: UserSummary) -> StoreResult<()>;
    fn product(&self, id: ObjectId) -> StoreResult<Option<ProductSummary>>;
    fn put_product(&self, product: ProductSummary) -> StoreResult<()>;
}

pub(crate) fn sort_recent_first(list: &mut [Conversation]) {
    list.sort_by(|a, b| {
        b.last_message_at
            .cmp(&a.last_message_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
