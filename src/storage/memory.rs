use std::collections::HashMap;

use parking_lot::RwLock;

use super::traits::{sort_recent_first, ChatStore, Directory, UpsertOutcome};
use super::{StoreError, StoreResult};
use crate::domain::{
    Conversation, ConversationKey, Message, ObjectId, ProductSummary, UserSummary,
};

#[derive(Default)]
struct State {
    chats: HashMap<ObjectId, Conversation>,
    keys: HashMap<ConversationKey, ObjectId>,
    users: HashMap<ObjectId, UserSummary>,
    products: HashMap<ObjectId, ProductSummary>,
}

/// 内存存储（写锁内完成查找与创建）/ In-memory store, find and create under one write lock
#[derive(Default)]
pub struct MemoryChatStore {
    state: RwLock<State>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChatStore for MemoryChatStore {
    fn upsert_message(
        &self,
        key: &ConversationKey,
        user1: ObjectId,
        user2: ObjectId,
        message: Message,
    ) -> StoreResult<UpsertOutcome> {
        let mut state = self.state.write();
        if let Some(id) = state.keys.get(key).copied() {
            let chat = state
                .chats
                .get_mut(&id)
                .ok_or_else(|| StoreError::Corrupt(format!("index points at missing chat {}", id)))?;
            chat.push(message);
            return Ok(UpsertOutcome {
                conversation: chat.clone(),
                created: false,
            });
        }
        let chat = Conversation::start(key.product, user1, user2, message);
        state.keys.insert(*key, chat.id);
        state.chats.insert(chat.id, chat.clone());
        Ok(UpsertOutcome {
            conversation: chat,
            created: true,
        })
    }

    fn get(&self, id: ObjectId) -> StoreResult<Option<Conversation>> {
        Ok(self.state.read().chats.get(&id).cloned())
    }

    fn append_message(&self, id: ObjectId, message: Message) -> StoreResult<Conversation> {
        let mut state = self.state.write();
        let chat = state
            .chats
            .get_mut(&id)
            .ok_or(StoreError::ConversationNotFound(id))?;
        chat.push(message);
        Ok(chat.clone())
    }

    fn mark_read(
        &self,
        id: ObjectId,
        message_id: ObjectId,
        user: ObjectId,
    ) -> StoreResult<(Message, bool)> {
        let mut state = self.state.write();
        let chat = state
            .chats
            .get_mut(&id)
            .ok_or(StoreError::ConversationNotFound(id))?;
        let message = chat
            .message_mut(message_id)
            .ok_or(StoreError::MessageNotFound(message_id))?;
        let changed = message.mark_read(user);
        Ok((message.clone(), changed))
    }

    fn list_for_user(
        &self,
        user: ObjectId,
        product: Option<ObjectId>,
    ) -> StoreResult<Vec<Conversation>> {
        let state = self.state.read();
        let mut list: Vec<Conversation> = state
            .chats
            .values()
            .filter(|c| c.has_participant(user))
            .filter(|c| product.map_or(true, |p| c.product == p))
            .cloned()
            .collect();
        sort_recent_first(&mut list);
        Ok(list)
    }

    fn delete_by_product(&self, product: ObjectId) -> StoreResult<usize> {
        let mut state = self.state.write();
        let doomed: Vec<(ConversationKey, ObjectId)> = state
            .keys
            .iter()
            .filter(|(k, _)| k.product == product)
            .map(|(k, id)| (*k, *id))
            .collect();
        for (key, id) in doomed.iter() {
            state.keys.remove(key);
            state.chats.remove(id);
        }
        Ok(doomed.len())
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.state.read().chats.len())
    }
}

impl Directory for MemoryChatStore {
    fn user(&self, id: ObjectId) -> StoreResult<Option<UserSummary>> {
        Ok(self.state.read().users.get(&id).cloned())
    }

    fn put_user(&self, user: UserSummary) -> StoreResult<()> {
        self.state.write().users.insert(user.id, user);
        Ok(())
    }

    fn product(&self, id: ObjectId) -> StoreResult<Option<ProductSummary>> {
        Ok(self.state.read().products.get(&id).cloned())
    }

    fn put_product(&self, product: ProductSummary) -> StoreResult<()> {
        self.state.write().products.insert(product.id, product);
        Ok(())
    }
}
