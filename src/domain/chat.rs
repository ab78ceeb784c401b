use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::directory::{ProductSummary, UserSummary};
use super::id::ObjectId;
use super::reference::Reference;

/// 存储键长度 / Storage key length
pub const KEY_LEN: usize = ObjectId::LEN * 3;

/// 会话唯一键：商品 + 排序后的参与者对 / Unique key: product + sorted participant pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub product: ObjectId,
    low: ObjectId,
    high: ObjectId,
}

impl ConversationKey {
    pub fn new(product: ObjectId, a: ObjectId, b: ObjectId) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self { product, low, high }
    }

    pub fn participants(&self) -> (ObjectId, ObjectId) {
        (self.low, self.high)
    }

    /// 存储键：product|low|high，按商品前缀可扫描 / Storage key, prefix-scannable by product
    pub fn to_bytes(&self) -> [u8; KEY_LEN] {
        let mut out = [0u8; KEY_LEN];
        out[..12].copy_from_slice(self.product.as_bytes());
        out[12..24].copy_from_slice(self.low.as_bytes());
        out[24..].copy_from_slice(self.high.as_bytes());
        out
    }

    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() != KEY_LEN {
            return None;
        }
        Some(Self {
            product: ObjectId::from_slice(&raw[..12])?,
            low: ObjectId::from_slice(&raw[12..24])?,
            high: ObjectId::from_slice(&raw[24..])?,
        })
    }
}

/// 单条消息 / A single message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: ObjectId,
    pub sender: ObjectId,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    /// 只增不减，发送者默认已读 / Append-only, sender included at creation
    pub read_by: Vec<ObjectId>,
}

impl Message {
    pub fn new(sender: ObjectId, content: impl Into<String>) -> Self {
        Self::sent_at(sender, content, Utc::now())
    }

    pub fn sent_at(sender: ObjectId, content: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: ObjectId::new(),
            sender,
            content: content.into(),
            sent_at: at,
            read_by: vec![sender],
        }
    }

    pub fn is_read_by(&self, user: ObjectId) -> bool {
        self.read_by.contains(&user)
    }

    /// 标记已读，返回是否发生变化 / Mark read, returns whether anything changed
    pub fn mark_read(&mut self, user: ObjectId) -> bool {
        if self.is_read_by(user) {
            return false;
        }
        self.read_by.push(user);
        true
    }
}

/// 会话记录（存储形态，只存 ID）/ Conversation record as stored (ids only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ObjectId,
    pub product: ObjectId,
    pub user1: ObjectId,
    pub user2: ObjectId,
    pub messages: Vec<Message>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// 以首条消息创建会话 / Start a conversation seeded with its first message
    pub fn start(product: ObjectId, user1: ObjectId, user2: ObjectId, first: Message) -> Self {
        let now = Utc::now();
        let mut chat = Self {
            id: ObjectId::new(),
            product,
            user1,
            user2,
            messages: Vec::with_capacity(1),
            last_message_at: first.sent_at,
            created_at: now,
        };
        chat.push(first);
        chat
    }

    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self.product, self.user1, self.user2)
    }

    pub fn has_participant(&self, user: ObjectId) -> bool {
        self.user1 == user || self.user2 == user
    }

    /// 对方用户 / The other participant
    pub fn counterpart(&self, user: ObjectId) -> Option<ObjectId> {
        if self.user1 == user {
            Some(self.user2)
        } else if self.user2 == user {
            Some(self.user1)
        } else {
            None
        }
    }

    pub fn push(&mut self, message: Message) {
        self.last_message_at = message.sent_at;
        self.messages.push(message);
    }

    pub fn message_mut(&mut self, id: ObjectId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

/// 展开后的消息 / Message with sender populated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: ObjectId,
    pub sender: Reference<UserSummary>,
    pub content: String,
    pub sent_at: DateTime<Utc>,
    pub read_by: Vec<ObjectId>,
}

/// 展开后的会话 / Conversation with participants and product populated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationView {
    pub id: ObjectId,
    pub product: Reference<ProductSummary>,
    pub user1: Reference<UserSummary>,
    pub user2: Reference<UserSummary>,
    pub messages: Vec<MessageView>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ConversationView {
    /// 是否为 {product, 无序(a, b)} 对应的会话 / Whether this is the chat for {product, unordered(a, b)}
    pub fn is_between(&self, product: ObjectId, a: ObjectId, b: ObjectId) -> bool {
        self.product.id() == product
            && ConversationKey::new(product, self.user1.id(), self.user2.id())
                == ConversationKey::new(product, a, b)
    }

    pub fn counterpart(&self, user: ObjectId) -> Option<&Reference<UserSummary>> {
        if self.user1.id() == user {
            Some(&self.user2)
        } else if self.user2.id() == user {
            Some(&self.user1)
        } else {
            None
        }
    }

    pub fn unread_for(&self, user: ObjectId) -> usize {
        self.messages.iter().filter(|m| !m.read_by.contains(&user)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn key_ignores_participant_order() {
        let (p, a, b) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        assert_eq!(ConversationKey::new(p, a, b), ConversationKey::new(p, b, a));
        let key = ConversationKey::new(p, a, b);
        assert_eq!(ConversationKey::from_bytes(&key.to_bytes()), Some(key));
        assert_eq!(&key.to_bytes()[..12], p.as_bytes());
    }

    #[test]
    fn mark_read_is_idempotent_and_sender_is_included() {
        let (sender, reader) = (ObjectId::new(), ObjectId::new());
        let mut msg = Message::new(sender, "hi");
        assert!(msg.is_read_by(sender));
        assert!(msg.mark_read(reader));
        assert!(!msg.mark_read(reader));
        assert_eq!(msg.read_by, vec![sender, reader]);
    }

    #[test]
    fn push_moves_last_message_at() {
        let (p, a, b) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        let t0 = Utc::now() - Duration::minutes(5);
        let mut chat = Conversation::start(p, a, b, Message::sent_at(a, "hi", t0));
        assert_eq!(chat.last_message_at, t0);
        let t1 = Utc::now();
        chat.push(Message::sent_at(b, "hello back", t1));
        assert_eq!(chat.last_message_at, t1);
        assert_eq!(chat.messages.len(), 2);
        assert!(!chat.messages[1].is_read_by(a));
        assert_eq!(chat.counterpart(a), Some(b));
        assert_eq!(chat.counterpart(p), None);
    }

    #[test]
    fn view_counts_messages_not_yet_read() {
        let (p, a, b) = (ObjectId::new(), ObjectId::new(), ObjectId::new());
        let msg = |sender: ObjectId, read_by: Vec<ObjectId>| MessageView {
            id: ObjectId::new(),
            sender: Reference::Id { id: sender },
            content: "hi".into(),
            sent_at: Utc::now(),
            read_by,
        };
        let view = ConversationView {
            id: ObjectId::new(),
            product: Reference::Id { id: p },
            user1: Reference::Id { id: a },
            user2: Reference::Id { id: b },
            messages: vec![msg(a, vec![a, b]), msg(b, vec![b]), msg(b, vec![b])],
            last_message_at: Utc::now(),
            created_at: Utc::now(),
        };
        assert_eq!(view.unread_for(a), 2);
        assert_eq!(view.unread_for(b), 0);
    }
}
