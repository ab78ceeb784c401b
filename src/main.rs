use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use v_market_chat::comm::{init_global_config_manager, init_tracing, ConfigManager};
use v_market_chat::presence::PresenceTracker;
use v_market_chat::ws::Hub;
use v_market_chat::{config, router, storage, MarketChatServer};

/// 命令行参数 / Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "v-market-chat WebSocket & HTTP Server", long_about = None)]
pub struct Args {
    /// 额外的配置文件（TOML/JSON/YAML自动识别）
    /// Extra config file (auto-detect TOML/JSON/YAML)
    #[arg(short = 'c', long = "config")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cm = init_global_config_manager(ConfigManager::load(args.config.as_deref())?);
    init_tracing()?;
    for source in cm.sources() {
        info!(
            "🔧 Config source {} ({})",
            source.description,
            if source.loaded { "loaded" } else { "absent" }
        );
    }

    info!("🎯 Starting v-market-chat (WebSocket + HTTP)...");
    let cfg = config::load()?;
    if !cfg.auth.enabled {
        tracing::warn!("⚠️  auth.enabled = false, token signatures are NOT verified");
    }

    let store = storage::open(&cfg.storage)?;
    let (hub, hub_task) = Hub::spawn(PresenceTracker::new());
    let server = Arc::new(MarketChatServer::new(store, hub, cfg.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // 启动WebSocket网关 / Start WebSocket gateway
    let gateway = server.gateway();
    let ws_host = cfg.server.host.clone();
    let ws_port = cfg.server.ws_port;
    let ws_task = tokio::spawn(async move {
        if let Err(e) = gateway.run(&ws_host, ws_port, shutdown_rx).await {
            error!("❌ WebSocket gateway error: {}", e);
        }
    });

    // 启动HTTP服务器 / Start HTTP server
    info!("🌐 Starting HTTP server on {}:{}", cfg.server.host, cfg.server.http_port);
    let data = web::Data::new(server.clone());
    let http = HttpServer::new(move || {
        App::new()
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Headers", "*"))
                    .add((
                        "Access-Control-Allow-Methods",
                        "GET, POST, PUT, DELETE, OPTIONS",
                    )),
            )
            .wrap(middleware::Logger::default())
            .app_data(data.clone())
            .configure(router::configure)
    })
    .workers(cfg.server.workers)
    .bind((cfg.server.host.as_str(), cfg.server.http_port))?
    .run();

    // actix 自行处理 ctrl-c；HTTP 结束后关闭网关
    // actix handles ctrl-c itself; the gateway is stopped once HTTP returns
    if let Err(e) = http.await {
        error!("❌ HTTP server error: {}", e);
    }
    let _ = shutdown_tx.send(true);
    let _ = ws_task.await;
    drop(server);
    hub_task.abort();

    info!("✅ Server shutdown successfully");
    Ok(())
}
