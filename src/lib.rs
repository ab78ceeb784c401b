//! v-market-chat: 市场聊天与在线状态服务 / marketplace chat and presence service
//!
//! HTTP API（actix-web）负责会话读写，WebSocket 网关（tokio-tungstenite）负责在线状态推送。
//! The HTTP API (actix-web) serves conversations; the WebSocket gateway
//! (tokio-tungstenite) pushes presence.

pub mod api;
pub mod client;
pub mod comm;
pub mod config;
pub mod domain;
pub mod error;
pub mod presence;
pub mod router;
pub mod server;
pub mod service;
pub mod storage;
pub mod ws;

pub use error::{ChatError, ChatResult};
pub use server::MarketChatServer;
