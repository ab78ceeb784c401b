use std::collections::{HashMap, VecDeque};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::domain::{ObjectId, ServerEvent};
use crate::presence::{PresenceChange, PresenceTracker};

impl From<PresenceChange> for ServerEvent {
    fn from(change: PresenceChange) -> Self {
        match change {
            PresenceChange::Online(user_id) => ServerEvent::UserOnline { user_id },
            PresenceChange::Offline(user_id) => ServerEvent::UserOffline { user_id },
        }
    }
}

/// 在线快照 / Presence snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresenceSnapshot {
    pub users: Vec<ObjectId>,
    pub online_count: usize,
    pub connection_count: usize,
}

/// hub 指令 / Hub commands
#[derive(Debug)]
pub enum HubCommand {
    Register {
        connection_id: String,
        sender: mpsc::UnboundedSender<Message>,
    },
    Announce {
        connection_id: String,
        user: ObjectId,
    },
    Subscribe {
        connection_id: String,
    },
    Broadcast(ServerEvent),
    SendTo {
        connection_id: String,
        event: ServerEvent,
    },
    Disconnect {
        connection_id: String,
    },
    Snapshot(oneshot::Sender<PresenceSnapshot>),
}

/// hub 句柄，可廉价克隆 / Cheaply cloneable hub handle
#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    fn send(&self, command: HubCommand) {
        if self.tx.send(command).is_err() {
            warn!("⚠️  Presence hub is gone, command dropped");
        }
    }

    pub fn register(&self, connection_id: &str, sender: mpsc::UnboundedSender<Message>) {
        self.send(HubCommand::Register {
            connection_id: connection_id.to_string(),
            sender,
        });
    }

    pub fn announce(&self, connection_id: &str, user: ObjectId) {
        self.send(HubCommand::Announce {
            connection_id: connection_id.to_string(),
            user,
        });
    }

    pub fn subscribe(&self, connection_id: &str) {
        self.send(HubCommand::Subscribe {
            connection_id: connection_id.to_string(),
        });
    }

    pub fn broadcast(&self, event: ServerEvent) {
        self.send(HubCommand::Broadcast(event));
    }

    pub fn send_to(&self, connection_id: &str, event: ServerEvent) {
        self.send(HubCommand::SendTo {
            connection_id: connection_id.to_string(),
            event,
        });
    }

    pub fn disconnect(&self, connection_id: &str) {
        self.send(HubCommand::Disconnect {
            connection_id: connection_id.to_string(),
        });
    }

    pub async fn snapshot(&self) -> Result<PresenceSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Snapshot(reply))
            .map_err(|_| anyhow::anyhow!("presence hub is not running"))?;
        Ok(rx.await?)
    }
}

/// 网关 hub：唯一持有在线注册表与连接发送端的任务
/// Gateway hub: the single task owning the presence registry and connection senders
///
/// 指令按到达顺序处理，因此每个连接收到的帧保持 FIFO。
/// Commands are applied in arrival order, so every connection sees frames FIFO.
pub struct Hub {
    tracker: PresenceTracker,
    senders: HashMap<String, mpsc::UnboundedSender<Message>>,
    rx: mpsc::UnboundedReceiver<HubCommand>,
}

impl Hub {
    pub fn new(tracker: PresenceTracker) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tracker,
                senders: HashMap::new(),
                rx,
            },
            HubHandle { tx },
        )
    }

    /// 启动 hub 事件循环 / Spawn the hub event loop
    pub fn spawn(tracker: PresenceTracker) -> (HubHandle, JoinHandle<()>) {
        let (hub, handle) = Self::new(tracker);
        (handle, tokio::spawn(hub.run()))
    }

    pub async fn run(mut self) {
        info!("🛰️  Presence hub started");
        while let Some(command) = self.rx.recv().await {
            self.apply(command);
        }
        info!("🛰️  Presence hub stopped");
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register {
                connection_id,
                sender,
            } => {
                debug!("🔌 Connection {} registered", connection_id);
                self.senders.insert(connection_id, sender);
            }
            HubCommand::Announce {
                connection_id,
                user,
            } => {
                if !self.senders.contains_key(&connection_id) {
                    debug!("Announce from unknown connection {}", connection_id);
                    return;
                }
                let changes = self.tracker.announce(&connection_id, user);
                debug!("📣 Connection {} announced as {}", connection_id, user);
                self.publish(changes.into_iter().map(ServerEvent::from));
            }
            HubCommand::Subscribe { connection_id } => {
                let users = self.tracker.snapshot();
                self.deliver(&connection_id, ServerEvent::PresenceSnapshot { users });
            }
            HubCommand::Broadcast(event) => self.publish(std::iter::once(event)),
            HubCommand::SendTo {
                connection_id,
                event,
            } => self.deliver(&connection_id, event),
            HubCommand::Disconnect { connection_id } => self.drop_connection(&connection_id),
            HubCommand::Snapshot(reply) => {
                let _ = reply.send(PresenceSnapshot {
                    users: self.tracker.snapshot(),
                    online_count: self.tracker.online_count(),
                    connection_count: self.senders.len(),
                });
            }
        }
    }

    fn deliver(&mut self, connection_id: &str, event: ServerEvent) {
        let Some(sender) = self.senders.get(connection_id) else {
            return;
        };
        let text = match event.to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode event: {}", e);
                return;
            }
        };
        if sender.send(Message::Text(text)).is_err() {
            self.drop_connection(connection_id);
        }
    }

    fn drop_connection(&mut self, connection_id: &str) {
        if self.senders.remove(connection_id).is_some() {
            debug!("🔌 Connection {} removed from hub", connection_id);
        }
        if let Some(change) = self.tracker.disconnect(connection_id) {
            self.publish(std::iter::once(ServerEvent::from(change)));
        }
    }

    /// 广播到全部连接；失效连接按断开处理，可能继续产生下线广播
    /// Broadcast to every connection; dead ones count as disconnects and may cascade offline events
    fn publish(&mut self, events: impl IntoIterator<Item = ServerEvent>) {
        let mut pending: VecDeque<ServerEvent> = events.into_iter().collect();
        while let Some(event) = pending.pop_front() {
            let text = match event.to_text() {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to encode event: {}", e);
                    continue;
                }
            };
            let dead: Vec<String> = self
                .senders
                .iter()
                .filter(|(_, tx)| tx.send(Message::Text(text.clone())).is_err())
                .map(|(id, _)| id.clone())
                .collect();
            for id in dead {
                self.senders.remove(&id);
                if let Some(change) = self.tracker.disconnect(&id) {
                    pending.push_back(change.into());
                }
            }
        }
    }
}
