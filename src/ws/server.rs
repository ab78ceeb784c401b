use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::service::auth::TokenVerifier;
use crate::ws::hub::HubHandle;

/// 实时网关 / Realtime gateway
#[derive(Clone)]
pub struct Gateway {
    pub hub: HubHandle,
    pub verifier: Arc<TokenVerifier>,
    pub idle_timeout: Duration,
}

impl Gateway {
    pub fn new(hub: HubHandle, verifier: Arc<TokenVerifier>, idle_timeout_ms: u64) -> Self {
        Self {
            hub,
            verifier,
            idle_timeout: Duration::from_millis(idle_timeout_ms),
        }
    }

    /// 启动WS监听 / Start WS listener
    pub async fn run(&self, host: &str, port: u16, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr).await?;
        info!("🚀 v-market-chat WebSocket gateway starting on {}", addr);
        self.serve(listener, shutdown_rx).await
    }

    /// 在已绑定的监听器上接受连接 / Accept connections on a bound listener
    pub async fn serve(&self, listener: TcpListener, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        info!("📡 Waiting for connections...");
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr) = accepted?;
                    let gateway = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = crate::ws::connection::handle_connection(stream, peer_addr, gateway).await {
                            tracing::error!("Connection error from {}: {}", peer_addr, e);
                        }
                    });
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("🛑 WebSocket gateway stopping");
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}
