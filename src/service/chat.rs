use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::domain::{
    Conversation, ConversationKey, ConversationView, Message, MessageView, ObjectId,
    ProductSummary, Reference, UserSummary,
};
use crate::error::{ChatError, ChatResult};
use crate::service::auth::Caller;
use crate::storage::Backend;

/// 发起或续聊请求 / Start-or-continue request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartChatRequest {
    pub product: Option<String>,
    pub user1: Option<String>,
    pub user2: Option<String>,
    pub sender: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppendMessageRequest {
    pub sender: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkReadRequest {
    pub user_id: Option<String>,
}

/// 已读回执结果 / Read receipt outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub conversation_id: ObjectId,
    pub message: MessageView,
    pub changed: bool,
}

/// 解析必填 ID / Parse a required id
pub fn required_id(raw: Option<&str>, field: &'static str) -> ChatResult<ObjectId> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ChatError::validation(field, "is required"))?;
    raw.parse()
        .map_err(|_| ChatError::validation(field, "is not a valid id"))
}

fn optional_id(raw: Option<&str>, field: &'static str) -> ChatResult<Option<ObjectId>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => required_id(Some(s), field).map(Some),
        None => Ok(None),
    }
}

/// 聊天服务 / Chat service
///
/// 所有标识在访问存储前校验。/ Every identifier is validated before the store is touched.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn Backend>,
    config: ChatConfig,
}

impl ChatService {
    pub fn new(store: Arc<dyn Backend>, config: ChatConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<dyn Backend> {
        &self.store
    }

    fn content(&self, raw: Option<&str>) -> ChatResult<String> {
        let content = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ChatError::validation("content", "is required"))?;
        if content.chars().count() > self.config.max_message_len {
            return Err(ChatError::validation(
                "content",
                format!("exceeds {} characters", self.config.max_message_len),
            ));
        }
        Ok(content.to_string())
    }

    /// 请求方必须就是 `user` 本人 / The caller must be `user` itself
    fn act_as(&self, caller: &Caller, user: ObjectId) -> ChatResult<()> {
        if !self.config.enforce_participants {
            return Ok(());
        }
        match caller {
            Caller::Service => Ok(()),
            Caller::User(id) if *id == user => Ok(()),
            Caller::User(_) => Err(ChatError::forbidden("caller may not act as another user")),
        }
    }

    fn service_only(&self, caller: &Caller) -> ChatResult<()> {
        if !self.config.enforce_participants || caller.is_service() {
            Ok(())
        } else {
            Err(ChatError::forbidden("internal operation"))
        }
    }

    fn load(&self, id: ObjectId) -> ChatResult<Conversation> {
        self.store.get(id)?.ok_or_else(|| ChatError::NotFound {
            entity: "conversation",
            id: id.to_hex(),
        })
    }

    /// 查找或创建会话并追加消息 / Find-or-create a conversation and append the message
    pub fn find_or_create(
        &self,
        caller: &Caller,
        req: &StartChatRequest,
    ) -> ChatResult<ConversationView> {
        let product = required_id(req.product.as_deref(), "product")?;
        let user1 = required_id(req.user1.as_deref(), "user1")?;
        let user2 = required_id(req.user2.as_deref(), "user2")?;
        let sender = required_id(req.sender.as_deref(), "sender")?;
        let content = self.content(req.content.as_deref())?;
        if user1 == user2 {
            return Err(ChatError::validation("user2", "must differ from user1"));
        }
        if sender != user1 && sender != user2 {
            return Err(ChatError::validation("sender", "must be user1 or user2"));
        }
        self.act_as(caller, sender)?;

        let key = ConversationKey::new(product, user1, user2);
        let outcome = self
            .store
            .upsert_message(&key, user1, user2, Message::new(sender, content))?;
        if outcome.created {
            info!(
                "💬 Conversation {} created for product {}",
                outcome.conversation.id, product
            );
        } else {
            debug!(
                "💬 Message appended to existing conversation {}",
                outcome.conversation.id
            );
        }
        self.populate(outcome.conversation)
    }

    pub fn append_message(
        &self,
        caller: &Caller,
        conversation_id: &str,
        req: &AppendMessageRequest,
    ) -> ChatResult<ConversationView> {
        let id = required_id(Some(conversation_id), "conversation_id")?;
        let sender = required_id(req.sender.as_deref(), "sender")?;
        let content = self.content(req.content.as_deref())?;
        self.act_as(caller, sender)?;

        let chat = self.load(id)?;
        if !chat.has_participant(sender) {
            return Err(ChatError::validation("sender", "is not a participant"));
        }
        let chat = self.store.append_message(id, Message::new(sender, content))?;
        debug!("📨 Message appended to conversation {}", id);
        self.populate(chat)
    }

    pub fn mark_read(
        &self,
        caller: &Caller,
        conversation_id: &str,
        message_id: &str,
        req: &MarkReadRequest,
    ) -> ChatResult<ReadReceipt> {
        let id = required_id(Some(conversation_id), "conversation_id")?;
        let message_id = required_id(Some(message_id), "message_id")?;
        let user = required_id(req.user_id.as_deref(), "user_id")?;
        self.act_as(caller, user)?;

        if self.config.enforce_participants && !caller.is_service() {
            let chat = self.load(id)?;
            if !chat.has_participant(user) {
                return Err(ChatError::forbidden("user is not a participant"));
            }
        }
        let (message, changed) = self.store.mark_read(id, message_id, user)?;
        if changed {
            debug!("👀 Message {} read by {}", message_id, user);
        }
        let mut cache = HashMap::new();
        Ok(ReadReceipt {
            conversation_id: id,
            message: self.message_view(&mut cache, message)?,
            changed,
        })
    }

    pub fn list_for_user(
        &self,
        caller: &Caller,
        user_id: Option<&str>,
        product_id: Option<&str>,
    ) -> ChatResult<Vec<ConversationView>> {
        let user = required_id(user_id, "user_id")?;
        let product = optional_id(product_id, "product_id")?;
        self.act_as(caller, user)?;

        self.store
            .list_for_user(user, product)?
            .into_iter()
            .map(|chat| self.populate(chat))
            .collect()
    }

    pub fn delete_by_product(&self, caller: &Caller, product_id: &str) -> ChatResult<usize> {
        let product = required_id(Some(product_id), "product_id")?;
        self.service_only(caller)?;
        let removed = self.store.delete_by_product(product)?;
        info!("🧹 Removed {} conversations for product {}", removed, product);
        Ok(removed)
    }

    pub fn user_summary(&self, user_id: &str) -> ChatResult<UserSummary> {
        let id = required_id(Some(user_id), "user_id")?;
        self.store.user(id)?.ok_or_else(|| ChatError::NotFound {
            entity: "user",
            id: id.to_hex(),
        })
    }

    pub fn put_user(&self, caller: &Caller, user: UserSummary) -> ChatResult<()> {
        self.service_only(caller)?;
        self.store.put_user(user)?;
        Ok(())
    }

    pub fn put_product(&self, caller: &Caller, product: ProductSummary) -> ChatResult<()> {
        self.service_only(caller)?;
        self.store.put_product(product)?;
        Ok(())
    }

    fn user_ref(
        &self,
        cache: &mut HashMap<ObjectId, Option<UserSummary>>,
        id: ObjectId,
    ) -> ChatResult<Reference<UserSummary>> {
        if let Some(hit) = cache.get(&id) {
            return Ok(Reference::from_lookup(id, hit.clone()));
        }
        let found = self.store.user(id)?;
        cache.insert(id, found.clone());
        Ok(Reference::from_lookup(id, found))
    }

    fn message_view(
        &self,
        cache: &mut HashMap<ObjectId, Option<UserSummary>>,
        message: Message,
    ) -> ChatResult<MessageView> {
        Ok(MessageView {
            id: message.id,
            sender: self.user_ref(cache, message.sender)?,
            content: message.content,
            sent_at: message.sent_at,
            read_by: message.read_by,
        })
    }

    /// 展开参与者与商品 / Populate participants and product
    fn populate(&self, chat: Conversation) -> ChatResult<ConversationView> {
        let mut cache = HashMap::new();
        let product = Reference::from_lookup(chat.product, self.store.product(chat.product)?);
        let user1 = self.user_ref(&mut cache, chat.user1)?;
        let user2 = self.user_ref(&mut cache, chat.user2)?;
        let messages = chat
            .messages
            .into_iter()
            .map(|m| self.message_view(&mut cache, m))
            .collect::<ChatResult<Vec<_>>>()?;
        Ok(ConversationView {
            id: chat.id,
            product,
            user1,
            user2,
            messages,
            last_message_at: chat.last_message_at,
            created_at: chat.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryChatStore;

    fn service() -> ChatService {
        ChatService::new(Arc::new(MemoryChatStore::new()), ChatConfig::default())
    }

    fn start(product: ObjectId, u1: ObjectId, u2: ObjectId, sender: ObjectId, text: &str) -> StartChatRequest {
        StartChatRequest {
            product: Some(product.to_hex()),
            user1: Some(u1.to_hex()),
            user2: Some(u2.to_hex()),
            sender: Some(sender.to_hex()),
            content: Some(text.to_string()),
        }
    }

    #[test]
    fn second_send_reuses_conversation_for_swapped_pair() {
        let svc = service();
        let (p, a, b) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        let first = svc.find_or_create(&Caller::User(a), &start(p, a, b, a, "hi")).unwrap();
        let second = svc.find_or_create(&Caller::User(b), &start(p, b, a, b, "hello")).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.messages.len(), 2);
        assert_eq!(second.messages[1].sender.id(), b);
    }

    #[test]
    fn validation_precedes_store_access() {
        let svc = service();
        let a = ObjectId::new();
        let mut req = start(ObjectId::new(), a, a, a, "hi");
        let err = svc.find_or_create(&Caller::User(a), &req).unwrap_err();
        assert_eq!(err.field(), Some("user2"));

        req.user2 = Some("not-an-id".into());
        let err = svc.find_or_create(&Caller::User(a), &req).unwrap_err();
        assert_eq!(err.field(), Some("user2"));

        req.user2 = Some(ObjectId::new().to_hex());
        req.content = Some("   ".into());
        let err = svc.find_or_create(&Caller::User(a), &req).unwrap_err();
        assert_eq!(err.field(), Some("content"));
        assert_eq!(svc.store().count().unwrap(), 0);
    }

    #[test]
    fn sender_must_belong_to_pair() {
        let svc = service();
        let (p, a, b, c) = (ObjectId::new(), ObjectId::new(), ObjectId::new(), ObjectId::new());
        let err = svc.find_or_create(&Caller::Service, &start(p, a, b, c, "hi")).unwrap_err();
        assert_eq!(err.field(), Some("sender"));
    }

    #[test]
    fn impersonation_is_forbidden() {
        let svc = service();
        let (p, a, b) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        let err = svc.find_or_create(&Caller::User(b), &start(p, a, b, a, "hi")).unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));

        let chat = svc.find_or_create(&Caller::User(a), &start(p, a, b, a, "hi")).unwrap();
        let err = svc
            .list_for_user(&Caller::User(b), Some(&a.to_hex()), None)
            .unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));

        let outsider = ObjectId::new();
        let err = svc
            .mark_read(
                &Caller::User(outsider),
                &chat.id.to_hex(),
                &chat.messages[0].id.to_hex(),
                &MarkReadRequest { user_id: Some(outsider.to_hex()) },
            )
            .unwrap_err();
        assert!(matches!(err, ChatError::Forbidden(_)));
    }

    #[test]
    fn mark_read_is_idempotent() {
        let svc = service();
        let (p, a, b) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        let chat = svc.find_or_create(&Caller::User(a), &start(p, a, b, a, "hi")).unwrap();
        let req = MarkReadRequest { user_id: Some(b.to_hex()) };
        let msg = chat.messages[0].id.to_hex();
        let first = svc.mark_read(&Caller::User(b), &chat.id.to_hex(), &msg, &req).unwrap();
        let again = svc.mark_read(&Caller::User(b), &chat.id.to_hex(), &msg, &req).unwrap();
        assert!(first.changed);
        assert!(!again.changed);
        assert_eq!(again.message.read_by, vec![a, b]);
    }

    #[test]
    fn views_resolve_known_directory_entries() {
        let svc = service();
        let (p, a, b) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        svc.put_user(&Caller::Service, UserSummary::new(a).with_username("alice")).unwrap();
        svc.put_product(&Caller::Service, ProductSummary { id: p, title: "Bike".into(), price: Some(120.0), image: None })
            .unwrap();
        let chat = svc.find_or_create(&Caller::User(a), &start(p, a, b, a, "hi")).unwrap();
        assert_eq!(chat.product.resolved().map(|p| p.title.as_str()), Some("Bike"));
        assert_eq!(
            chat.user1.resolved().and_then(|u| u.username.as_deref()),
            Some("alice")
        );
        assert!(chat.user2.resolved().is_none());
        assert_eq!(chat.user2.id(), b);
    }

    #[test]
    fn delete_by_product_requires_service() {
        let svc = service();
        let (p, a, b) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        svc.find_or_create(&Caller::User(a), &start(p, a, b, a, "hi")).unwrap();
        assert!(svc.delete_by_product(&Caller::User(a), &p.to_hex()).is_err());
        assert_eq!(svc.delete_by_product(&Caller::Service, &p.to_hex()).unwrap(), 1);
        assert!(svc
            .list_for_user(&Caller::User(a), Some(&a.to_hex()), None)
            .unwrap()
            .is_empty());
    }
}
