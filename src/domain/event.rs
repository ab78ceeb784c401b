use serde::{Deserialize, Serialize};

use super::id::ObjectId;

/// 客户端上报身份 / Client identity announcement
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnnounceData {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// 客户端 -> 服务端帧 / Client -> server frames
///
/// 线上格式 `{"type": .., "data": ..}` / Wire shape `{"type": .., "data": ..}`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Announce(AnnounceData),
    PresenceSubscribe,
    Message(serde_json::Value),
    Ping,
}

/// 服务端 -> 客户端帧 / Server -> client frames
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Welcome { connection_id: String },
    UserOnline { user_id: ObjectId },
    UserOffline { user_id: ObjectId },
    PresenceSnapshot { users: Vec<ObjectId> },
    Message(serde_json::Value),
    Pong { timestamp: i64 },
}

impl ServerEvent {
    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_client_frames() {
        let announce: ClientEvent = serde_json::from_value(json!({
            "type": "announce",
            "data": {"user_id": "64b7f0c2a1b2c3d4e5f60718"}
        }))
        .unwrap();
        assert_eq!(
            announce,
            ClientEvent::Announce(AnnounceData {
                user_id: "64b7f0c2a1b2c3d4e5f60718".to_string(),
                token: None
            })
        );
        let sub: ClientEvent =
            serde_json::from_value(json!({"type": "presence_subscribe"})).unwrap();
        assert_eq!(sub, ClientEvent::PresenceSubscribe);
        assert!(serde_json::from_value::<ClientEvent>(json!({"type": "bogus"})).is_err());
    }

    #[test]
    fn server_frames_use_type_and_data() {
        let id: ObjectId = "64b7f0c2a1b2c3d4e5f60718".parse().unwrap();
        let frame = serde_json::to_value(ServerEvent::UserOnline { user_id: id }).unwrap();
        assert_eq!(
            frame,
            json!({"type": "user_online", "data": {"user_id": "64b7f0c2a1b2c3d4e5f60718"}})
        );
    }
}
