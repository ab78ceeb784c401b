//! 在线状态注册表 / Presence registry
//!
//! 用户 ID 到在线连接集合的映射。只由网关 hub 的事件循环修改。
//! Maps a user id to its set of live connections. Mutated only by the gateway hub loop.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::ObjectId;

/// 在线状态变化 / Presence transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    Online(ObjectId),
    Offline(ObjectId),
}

#[derive(Debug, Default)]
pub struct PresenceTracker {
    users: BTreeMap<ObjectId, HashSet<String>>,
    connections: HashMap<String, ObjectId>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记连接；首个连接产生上线事件
    /// Register a connection; the user's first connection yields an online change
    pub fn announce(&mut self, connection_id: &str, user: ObjectId) -> Vec<PresenceChange> {
        let mut changes = Vec::new();
        match self.connections.get(connection_id) {
            Some(current) if *current == user => return changes,
            Some(_) => changes.extend(self.disconnect(connection_id)),
            None => {}
        }

        self.connections.insert(connection_id.to_string(), user);
        let set = self.users.entry(user).or_default();
        set.insert(connection_id.to_string());
        if set.len() == 1 {
            changes.push(PresenceChange::Online(user));
        }
        changes
    }

    /// 移除连接；最后一个连接离开时产生下线事件
    /// Detach a connection; the last one leaving yields an offline change
    pub fn disconnect(&mut self, connection_id: &str) -> Option<PresenceChange> {
        let user = self.connections.remove(connection_id)?;
        let set = self.users.get_mut(&user)?;
        set.remove(connection_id);
        if set.is_empty() {
            self.users.remove(&user);
            Some(PresenceChange::Offline(user))
        } else {
            None
        }
    }

    pub fn snapshot(&self) -> Vec<ObjectId> {
        self.users.keys().copied().collect()
    }

    pub fn online_count(&self) -> usize {
        self.users.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}
