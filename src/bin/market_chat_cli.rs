use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use v_market_chat::client::{current_user, ChatClient, CreationGuard, ProfileCache};
use v_market_chat::comm::init_tracing;
use v_market_chat::domain::ObjectId;
use v_market_chat::service::chat::AppendMessageRequest;

/// 市场聊天命令行客户端 / Marketplace chat command line client
#[derive(Parser, Debug)]
#[command(author, version, about = "v-market-chat command line client", long_about = None)]
struct Cli {
    /// 服务地址 / Service base URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    base_url: String,

    /// 登录令牌（JWT）/ Sign-in token (JWT)
    #[arg(short, long)]
    token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出我的会话 / List my conversations
    List {
        #[arg(long)]
        product: Option<String>,
    },
    /// 与卖家就某商品开聊 / Open a chat with a seller about a product
    Open {
        #[arg(long)]
        seller: String,
        #[arg(long)]
        product: String,
    },
    /// 发送消息 / Send a message
    Send {
        #[arg(long)]
        chat: String,
        #[arg(long)]
        content: String,
    },
    /// 标记已读 / Mark a message read
    Read {
        #[arg(long)]
        chat: String,
        #[arg(long)]
        message: String,
    },
}

fn parse_id(raw: &str, what: &str) -> Result<ObjectId> {
    raw.parse()
        .map_err(|e| anyhow!("invalid {} id '{}': {}", what, raw, e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let me = current_user(&cli.token).ok_or_else(|| anyhow!("token does not name a user"))?;
    let client = ChatClient::new(&cli.base_url)?.with_token(&cli.token);

    match cli.command {
        Command::List { product } => {
            let product = product.as_deref().map(|p| parse_id(p, "product")).transpose()?;
            let chats = client.list_chats(me, product).await?;
            let profiles = ProfileCache::new(client.clone());
            for chat in &chats {
                let other = match chat.counterpart(me) {
                    Some(reference) => profiles.display_name(reference).await,
                    None => "?".to_string(),
                };
                let unread = chat.unread_for(me);
                let last = chat.messages.last().map(|m| m.content.as_str()).unwrap_or("");
                println!(
                    "{}  {:<20}  unread={:<3} {}  {}",
                    chat.id,
                    other,
                    unread,
                    chat.last_message_at.format("%Y-%m-%d %H:%M"),
                    last
                );
            }
            if chats.is_empty() {
                println!("no conversations");
            }
        }
        Command::Open { seller, product } => {
            let guard = CreationGuard::new();
            let id = client.open_conversation(&seller, &product, &guard).await?;
            println!("{}", id);
        }
        Command::Send { chat, content } => {
            let chat = parse_id(&chat, "chat")?;
            let req = AppendMessageRequest {
                sender: Some(me.to_hex()),
                content: Some(content),
            };
            let view = client.append(chat, &req).await?;
            println!("{} messages in {}", view.messages.len(), view.id);
        }
        Command::Read { chat, message } => {
            let chat = parse_id(&chat, "chat")?;
            let message = parse_id(&message, "message")?;
            let receipt = client.mark_read(chat, message, me).await?;
            println!(
                "{} {}",
                receipt.message.id,
                if receipt.changed { "marked read" } else { "already read" }
            );
        }
    }
    Ok(())
}
