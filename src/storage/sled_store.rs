use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
};
use sled::{Db, Transactional, Tree};

use super::traits::{sort_recent_first, ChatStore, Directory, UpsertOutcome};
use super::{StoreError, StoreResult};
use crate::domain::{
    Conversation, ConversationKey, Message, ObjectId, ProductSummary, UserSummary,
};

/// sled 存储 / sled-backed store
///
/// 树布局 / Tree layout:
/// - `chats`: chat_id -> Conversation(json)
/// - `chat_keys`: product|low|high -> chat_id（唯一索引 / uniqueness index）
/// - `user_chats`: user_id|chat_id -> ()（参与者索引 / participant index）
/// - `users`, `products`: id -> summary(json)
#[derive(Clone, Debug)]
pub struct SledChatStore {
    db: Db,
    chats: Tree,
    keys: Tree,
    members: Tree,
    users: Tree,
    products: Tree,
}

impl From<TransactionError<StoreError>> for StoreError {
    fn from(e: TransactionError<StoreError>) -> Self {
        match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => StoreError::Sled(e),
        }
    }
}

fn abort(e: StoreError) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(e)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, ConflictableTransactionError<StoreError>> {
    serde_json::to_vec(value).map_err(|e| abort(e.into()))
}

fn decode_chat(raw: &[u8]) -> Result<Conversation, ConflictableTransactionError<StoreError>> {
    serde_json::from_slice(raw).map_err(|e| abort(e.into()))
}

fn member_key(user: ObjectId, chat: ObjectId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ObjectId::LEN * 2);
    key.extend_from_slice(user.as_bytes());
    key.extend_from_slice(chat.as_bytes());
    key
}

impl SledChatStore {
    pub fn open(path: &str) -> StoreResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    pub fn open_temporary() -> StoreResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let chats = db.open_tree("chats")?;
        let keys = db.open_tree("chat_keys")?;
        let members = db.open_tree("user_chats")?;
        let users = db.open_tree("users")?;
        let products = db.open_tree("products")?;
        Ok(Self {
            db,
            chats,
            keys,
            members,
            users,
            products,
        })
    }

    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }

    fn load(&self, id: ObjectId) -> StoreResult<Option<Conversation>> {
        match self.chats.get(&id.as_bytes()[..])? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }
}

impl ChatStore for SledChatStore {
    fn upsert_message(
        &self,
        key: &ConversationKey,
        user1: ObjectId,
        user2: ObjectId,
        message: Message,
    ) -> StoreResult<UpsertOutcome> {
        let key_bytes = key.to_bytes();
        // 索引与记录在同一事务中写入，冲突时 sled 自动重试
        // index and record are written in one transaction, sled retries on conflict
        let outcome = (&self.chats, &self.keys, &self.members).transaction(
            |(chats, keys, members)| -> ConflictableTransactionResult<UpsertOutcome, StoreError> {
                if let Some(raw_id) = keys.get(&key_bytes[..])? {
                    let id = ObjectId::from_slice(&raw_id)
                        .ok_or_else(|| abort(StoreError::Corrupt("bad chat key value".into())))?;
                    let raw = chats.get(&id.as_bytes()[..])?.ok_or_else(|| {
                        abort(StoreError::Corrupt(format!("index points at missing chat {}", id)))
                    })?;
                    let mut chat = decode_chat(&raw)?;
                    chat.push(message.clone());
                    chats.insert(&id.as_bytes()[..], encode(&chat)?)?;
                    return Ok(UpsertOutcome {
                        conversation: chat,
                        created: false,
                    });
                }
                let chat = Conversation::start(key.product, user1, user2, message.clone());
                let id = &chat.id.as_bytes()[..];
                keys.insert(&key_bytes[..], id)?;
                chats.insert(id, encode(&chat)?)?;
                members.insert(member_key(user1, chat.id), Vec::<u8>::new())?;
                members.insert(member_key(user2, chat.id), Vec::<u8>::new())?;
                Ok(UpsertOutcome {
                    conversation: chat,
                    created: true,
                })
            },
        )?;
        self.chats.flush()?;
        Ok(outcome)
    }

    fn get(&self, id: ObjectId) -> StoreResult<Option<Conversation>> {
        self.load(id)
    }

    fn append_message(&self, id: ObjectId, message: Message) -> StoreResult<Conversation> {
        let chat = self.chats.transaction(
            |chats| -> ConflictableTransactionResult<Conversation, StoreError> {
                let raw = chats
                    .get(&id.as_bytes()[..])?
                    .ok_or_else(|| abort(StoreError::ConversationNotFound(id)))?;
                let mut chat = decode_chat(&raw)?;
                chat.push(message.clone());
                chats.insert(&id.as_bytes()[..], encode(&chat)?)?;
                Ok(chat)
            },
        )?;
        self.chats.flush()?;
        Ok(chat)
    }

    fn mark_read(
        &self,
        id: ObjectId,
        message_id: ObjectId,
        user: ObjectId,
    ) -> StoreResult<(Message, bool)> {
        let result = self.chats.transaction(
            |chats| -> ConflictableTransactionResult<(Message, bool), StoreError> {
                let raw = chats
                    .get(&id.as_bytes()[..])?
                    .ok_or_else(|| abort(StoreError::ConversationNotFound(id)))?;
                let mut chat = decode_chat(&raw)?;
                let message = chat
                    .message_mut(message_id)
                    .ok_or_else(|| abort(StoreError::MessageNotFound(message_id)))?;
                let changed = message.mark_read(user);
                let snapshot = message.clone();
                if changed {
                    chats.insert(&id.as_bytes()[..], encode(&chat)?)?;
                }
                Ok((snapshot, changed))
            },
        )?;
        if result.1 {
            self.chats.flush()?;
        }
        Ok(result)
    }

    fn list_for_user(
        &self,
        user: ObjectId,
        product: Option<ObjectId>,
    ) -> StoreResult<Vec<Conversation>> {
        let mut list = Vec::new();
        for item in self.members.scan_prefix(&user.as_bytes()[..]) {
            let (k, _v) = item?;
            let chat_id = ObjectId::from_slice(&k[ObjectId::LEN..])
                .ok_or_else(|| StoreError::Corrupt("bad participant index key".into()))?;
            let Some(chat) = self.load(chat_id)? else {
                continue;
            };
            if product.map_or(true, |p| chat.product == p) && chat.has_participant(user) {
                list.push(chat);
            }
        }
        sort_recent_first(&mut list);
        Ok(list)
    }

    fn delete_by_product(&self, product: ObjectId) -> StoreResult<usize> {
        let mut doomed: Vec<sled::IVec> = Vec::new();
        for item in self.keys.scan_prefix(&product.as_bytes()[..]) {
            let (k, _v) = item?;
            doomed.push(k);
        }
        if doomed.is_empty() {
            return Ok(0);
        }
        // 扫描结果可能已过期，事务内按键的当前指向重新确认
        // The scan may be stale; each key is re-resolved inside the transaction
        let removed = (&self.chats, &self.keys, &self.members).transaction(
            |(chats, keys, members)| -> ConflictableTransactionResult<usize, StoreError> {
                let mut removed = 0;
                for key in doomed.iter() {
                    let Some(raw_id) = keys.get(key)? else {
                        continue;
                    };
                    let id = ObjectId::from_slice(&raw_id)
                        .ok_or_else(|| abort(StoreError::Corrupt("bad chat key value".into())))?;
                    let Some(raw) = chats.get(&id.as_bytes()[..])? else {
                        keys.remove(key)?;
                        continue;
                    };
                    let chat = decode_chat(&raw)?;
                    if chat.product != product {
                        continue;
                    }
                    keys.remove(key)?;
                    chats.remove(&id.as_bytes()[..])?;
                    members.remove(member_key(chat.user1, chat.id))?;
                    members.remove(member_key(chat.user2, chat.id))?;
                    removed += 1;
                }
                Ok(removed)
            },
        )?;
        if removed > 0 {
            self.chats.flush()?;
        }
        Ok(removed)
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.chats.len())
    }
}

impl Directory for SledChatStore {
    fn user(&self, id: ObjectId) -> StoreResult<Option<UserSummary>> {
        match self.users.get(&id.as_bytes()[..])? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn put_user(&self, user: UserSummary) -> StoreResult<()> {
        self.users
            .insert(&user.id.as_bytes()[..], serde_json::to_vec(&user)?)?;
        self.users.flush()?;
        Ok(())
    }

    fn product(&self, id: ObjectId) -> StoreResult<Option<ProductSummary>> {
        match self.products.get(&id.as_bytes()[..])? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn put_product(&self, product: ProductSummary) -> StoreResult<()> {
        self.products
            .insert(&product.id.as_bytes()[..], serde_json::to_vec(&product)?)?;
        self.products.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn ids() -> (ObjectId, ObjectId, ObjectId) {
        (ObjectId::new(), ObjectId::new(), ObjectId::new())
    }

    #[test]
    fn swapped_pair_reuses_conversation() {
        let store = SledChatStore::open_temporary().unwrap();
        let (p, a, b) = ids();
        let first = store
            .upsert_message(&ConversationKey::new(p, a, b), a, b, Message::new(a, "hi"))
            .unwrap();
        assert!(first.created);
        let second = store
            .upsert_message(
                &ConversationKey::new(p, b, a),
                b,
                a,
                Message::new(b, "hello back"),
            )
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.conversation.id, first.conversation.id);
        assert_eq!(second.conversation.messages.len(), 2);
        // 首次记录的参与者顺序保持不变 / original participant order is kept
        assert_eq!(second.conversation.user1, a);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn concurrent_upserts_create_exactly_one_record() {
        let store = Arc::new(SledChatStore::open_temporary().unwrap());
        let (p, a, b) = ids();
        let handles: Vec<_> = (0..6)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let (u1, u2) = if i % 2 == 0 { (a, b) } else { (b, a) };
                    store
                        .upsert_message(&ConversationKey::new(p, u1, u2), u1, u2, Message::new(u1, "x"))
                        .unwrap()
                        .created
                })
            })
            .collect();
        let created: usize = handles.into_iter().map(|h| h.join().unwrap() as usize).sum();
        assert_eq!(created, 1);
        let list = store.list_for_user(b, None).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].messages.len(), 6);
    }

    #[test]
    fn mark_read_and_missing_records() {
        let store = SledChatStore::open_temporary().unwrap();
        let (p, a, b) = ids();
        let chat = store
            .upsert_message(&ConversationKey::new(p, a, b), a, b, Message::new(a, "hi"))
            .unwrap()
            .conversation;
        let msg_id = chat.messages[0].id;
        let (msg, changed) = store.mark_read(chat.id, msg_id, b).unwrap();
        assert!(changed);
        assert_eq!(msg.read_by, vec![a, b]);
        let (msg, changed) = store.mark_read(chat.id, msg_id, b).unwrap();
        assert!(!changed);
        assert_eq!(msg.read_by.len(), 2);

        let unknown = ObjectId::new();
        assert!(matches!(
            store.mark_read(chat.id, unknown, b),
            Err(StoreError::MessageNotFound(id)) if id == unknown
        ));
        assert!(matches!(
            store.append_message(unknown, Message::new(a, "?")),
            Err(StoreError::ConversationNotFound(_))
        ));
    }

    #[test]
    fn delete_by_product_clears_indexes() {
        let store = SledChatStore::open_temporary().unwrap();
        let (p1, a, b) = ids();
        let p2 = ObjectId::new();
        store
            .upsert_message(&ConversationKey::new(p1, a, b), a, b, Message::new(a, "p1"))
            .unwrap();
        store
            .upsert_message(&ConversationKey::new(p2, a, b), a, b, Message::new(a, "p2"))
            .unwrap();
        assert_eq!(store.delete_by_product(p1).unwrap(), 1);
        assert_eq!(store.delete_by_product(p1).unwrap(), 0);
        let left = store.list_for_user(a, None).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].product, p2);
        // 删除后可为同一键重新建会话 / the key is free again after deletion
        let again = store
            .upsert_message(&ConversationKey::new(p1, b, a), b, a, Message::new(b, "new"))
            .unwrap();
        assert!(again.created);
    }

    #[test]
    fn delete_counts_only_chats_actually_removed() {
        let store = SledChatStore::open_temporary().unwrap();
        let (p, a, b) = ids();
        let c = ObjectId::new();
        store
            .upsert_message(&ConversationKey::new(p, a, b), a, b, Message::new(a, "kept"))
            .unwrap();
        // 指向已不存在会话的索引项 / key whose chat is already gone
        let dangling = ConversationKey::new(p, a, c).to_bytes();
        store.keys.insert(&dangling[..], &ObjectId::new().as_bytes()[..]).unwrap();

        assert_eq!(store.delete_by_product(p).unwrap(), 1);
        assert!(store.keys.get(&dangling[..]).unwrap().is_none());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn concurrent_deletes_and_upserts_keep_one_chat_per_key() {
        let store = Arc::new(SledChatStore::open_temporary().unwrap());
        let (p, a, b) = ids();
        let key = ConversationKey::new(p, a, b);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let (mut created, mut removed) = (0usize, 0usize);
                    for _ in 0..25 {
                        if i % 2 == 0 {
                            let outcome = store
                                .upsert_message(&key, a, b, Message::new(a, "x"))
                                .unwrap();
                            created += outcome.created as usize;
                        } else {
                            removed += store.delete_by_product(p).unwrap();
                        }
                    }
                    (created, removed)
                })
            })
            .collect();
        let (created, removed) = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .fold((0, 0), |acc, (c, r)| (acc.0 + c, acc.1 + r));

        let remaining = store.count().unwrap();
        assert!(remaining <= 1);
        assert_eq!(created, removed + remaining);
        assert_eq!(store.keys.len(), remaining);
        if let Some(chat) = store.list_for_user(a, None).unwrap().first() {
            let indexed = store.keys.get(key.to_bytes()).unwrap().unwrap();
            assert_eq!(ObjectId::from_slice(&indexed), Some(chat.id));
        }
        // 下一次开聊仍复用同一会话 / the next open still reuses one chat
        let next = store.upsert_message(&key, b, a, Message::new(b, "y")).unwrap();
        let again = store.upsert_message(&key, a, b, Message::new(a, "z")).unwrap();
        assert_eq!(next.conversation.id, again.conversation.id);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn directory_round_trip() {
        let store = SledChatStore::open_temporary().unwrap();
        let id = ObjectId::new();
        assert!(store.user(id).unwrap().is_none());
        store
            .put_user(UserSummary::new(id).with_username("ana"))
            .unwrap();
        assert_eq!(
            store.user(id).unwrap().and_then(|u| u.username),
            Some("ana".to_string())
        );
    }
}
