use anyhow::Result;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::domain::{AnnounceData, ClientEvent, ObjectId, ServerEvent};
use crate::ws::server::Gateway;

/// 分发客户端帧 / Dispatch a client frame
///
/// 非法帧直接忽略 / Malformed frames are ignored
pub fn dispatch(gateway: &Gateway, connection_id: &str, message: Message) -> Result<()> {
    let text = match message {
        Message::Text(text) => text,
        _ => return Ok(()),
    };
    let event = match serde_json::from_str::<ClientEvent>(&text) {
        Ok(event) => event,
        Err(e) => {
            debug!("🗑️  Ignoring malformed frame from {}: {}", connection_id, e);
            return Ok(());
        }
    };

    match event {
        ClientEvent::Announce(data) => {
            if let Some(user) = announced_user(gateway, connection_id, &data) {
                gateway.hub.announce(connection_id, user);
            }
        }
        ClientEvent::PresenceSubscribe => gateway.hub.subscribe(connection_id),
        ClientEvent::Message(data) => {
            debug!("📢 Relaying message from {}", connection_id);
            gateway.hub.broadcast(ServerEvent::Message(data));
        }
        ClientEvent::Ping => {
            debug!("🏓 Ping from {}", connection_id);
            gateway.hub.send_to(
                connection_id,
                ServerEvent::Pong {
                    timestamp: chrono::Utc::now().timestamp_millis(),
                },
            );
        }
    }
    Ok(())
}

fn announced_user(gateway: &Gateway, connection_id: &str, data: &AnnounceData) -> Option<ObjectId> {
    let user = match data.user_id.parse::<ObjectId>() {
        Ok(user) => user,
        Err(e) => {
            debug!("Ignoring announce with bad user id from {}: {}", connection_id, e);
            return None;
        }
    };
    if !gateway.verifier.verifies_signatures() {
        return Some(user);
    }
    match data.token.as_deref().map(|t| gateway.verifier.verify(t)) {
        Some(Ok(verified)) if verified == user => Some(user),
        Some(Ok(_)) => {
            warn!("🚫 Connection {} announced a user its token does not name", connection_id);
            None
        }
        Some(Err(e)) => {
            warn!("🚫 Connection {} announce rejected: {}", connection_id, e);
            None
        }
        None => {
            warn!("🚫 Connection {} announced without a token", connection_id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use super::*;
    use crate::config::AuthConfig;
    use crate::presence::PresenceTracker;
    use crate::service::auth::{Claims, TokenVerifier};
    use crate::ws::hub::Hub;

    fn gateway(enabled: bool) -> Gateway {
        let (handle, _task) = Hub::spawn(PresenceTracker::new());
        let verifier = TokenVerifier::new(&AuthConfig {
            enabled,
            jwt_secret: Some("s3cret".into()),
            internal_token: None,
        });
        Gateway::new(handle, Arc::new(verifier), 60_000)
    }

    fn announce(user: ObjectId, token: Option<String>) -> Message {
        let frame = serde_json::json!({
            "type": "announce",
            "data": {"user_id": user.to_hex(), "token": token}
        });
        Message::Text(frame.to_string())
    }

    #[tokio::test]
    async fn announce_requires_matching_token_when_auth_enabled() {
        let gw = gateway(true);
        let (tx, _rx) = mpsc::unbounded_channel();
        gw.hub.register("c1", tx);
        let (user, other) = (ObjectId::new(), ObjectId::new());

        dispatch(&gw, "c1", announce(user, None)).unwrap();
        let wrong = gw.verifier.sign(&Claims::for_user(other)).unwrap();
        dispatch(&gw, "c1", announce(user, Some(wrong))).unwrap();
        assert!(gw.hub.snapshot().await.unwrap().users.is_empty());

        let right = gw.verifier.sign(&Claims::for_user(user)).unwrap();
        dispatch(&gw, "c1", announce(user, Some(right))).unwrap();
        assert_eq!(gw.hub.snapshot().await.unwrap().users, vec![user]);
    }

    #[tokio::test]
    async fn malformed_frames_are_ignored() {
        let gw = gateway(false);
        let (tx, mut rx) = mpsc::unbounded_channel();
        gw.hub.register("c1", tx);
        dispatch(&gw, "c1", Message::Text("{not json".into())).unwrap();
        dispatch(&gw, "c1", Message::Text(r#"{"type":"teleport"}"#.into())).unwrap();
        dispatch(&gw, "c1", Message::Binary(vec![1, 2, 3])).unwrap();
        dispatch(&gw, "c1", Message::Text(r#"{"type":"ping"}"#.into())).unwrap();
        gw.hub.snapshot().await.unwrap();

        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a pong frame");
        };
        assert!(matches!(
            serde_json::from_str::<ServerEvent>(&text).unwrap(),
            ServerEvent::Pong { .. }
        ));
        assert!(rx.try_recv().is_err());
    }
}
