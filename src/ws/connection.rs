use std::net::SocketAddr;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use uuid::Uuid;

use crate::domain::ServerEvent;
use crate::ws::server::Gateway;

/// 处理新连接 / Handle new connection
pub async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, gateway: Gateway) -> Result<()> {
    tracing::info!("📨 New connection from: {}", peer_addr);

    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let connection_id = Uuid::new_v4().to_string();

    let connection_id_clone = connection_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send(msg).await {
                tracing::debug!("Failed to send message to {}: {}", connection_id_clone, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    // 欢迎帧先于注册入队，保证它是第一帧 / Queued before registering so it is always first
    let welcome = ServerEvent::Welcome {
        connection_id: connection_id.clone(),
    };
    tx.send(Message::Text(welcome.to_text()?))?;
    gateway.hub.register(&connection_id, tx);
    tracing::info!("✅ Connection {} opened from {}", connection_id, peer_addr);

    loop {
        match tokio::time::timeout(gateway.idle_timeout, ws_receiver.next()).await {
            Err(_) => {
                tracing::info!("⏰ Connection {} idle, closing", connection_id);
                break;
            }
            Ok(None) => break,
            Ok(Some(Ok(Message::Close(_)))) => break,
            Ok(Some(Ok(message))) => {
                if let Err(e) = crate::ws::handler::dispatch(&gateway, &connection_id, message) {
                    tracing::debug!("Error handling frame from {}: {}", connection_id, e);
                }
            }
            Ok(Some(Err(e))) => {
                tracing::warn!("WebSocket error from {}: {}", connection_id, e);
                break;
            }
        }
    }

    // hub 丢弃发送端后发送任务结束 / The send task ends once the hub drops its sender
    gateway.hub.disconnect(&connection_id);
    if tokio::time::timeout(std::time::Duration::from_secs(1), send_task).await.is_err() {
        tracing::debug!("Send task for {} did not finish in time", connection_id);
    }
    tracing::info!("👋 Connection {} closed", connection_id);
    Ok(())
}
