use clap::{Parser, Subcommand};
use herald_core::{config, traits::RequestGateway, update::MessageType};
use herald_dispatch::Pattern;
use herald_transport::{Bot, HttpGateway};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "herald",
    version,
    about = "Herald: Telegram update transport and dispatch"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo bot until Ctrl-C.
    Start,
    /// Check the configuration and the bot token.
    Status,
    /// Show the webhook currently registered with the platform.
    WebhookInfo,
    /// Remove the registered webhook.
    DeleteWebhook {
        /// Also discard updates queued on the platform side.
        #[arg(long)]
        drop_pending: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.herald.log_level)),
        )
        .init();

    match cli.command {
        Commands::Start => {
            let bot = Bot::new(&cfg)?;
            register_demo_handlers(&bot)?;

            let me = bot
                .start_then(|me| println!("Herald {} is up", me.display_name()))
                .await?;
            info!("Serving updates for bot {}", me.id);

            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl-C: {e}");
            }
            info!("Received shutdown signal");
            bot.stop_then(|| println!("Herald stopped")).await;
        }
        Commands::Status => {
            println!("Herald status check\n");
            println!("Config: {}", cli.config);
            println!("Transport: {}", cfg.transport.mode());
            println!("API: {}", cfg.bot.base_api_url);
            println!();

            if let Err(e) = cfg.validate() {
                println!("  config: invalid ({e})");
                return Ok(());
            }
            println!("  config: ok");

            let gateway = HttpGateway::new(&cfg.bot);
            match gateway.get_me().await {
                Ok(me) => println!("  token: valid ({})", me.display_name()),
                Err(e) => println!("  token: rejected ({e})"),
            }
        }
        Commands::WebhookInfo => {
            cfg.validate()?;
            let gateway = HttpGateway::new(&cfg.bot);
            let info = gateway.request("getWebhookInfo", None).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::DeleteWebhook { drop_pending } => {
            cfg.validate()?;
            let gateway = HttpGateway::new(&cfg.bot);
            let before = gateway.get_webhook_info().await?;
            gateway.delete_webhook(drop_pending).await?;
            if before.url.is_empty() {
                println!("No webhook was registered.");
            } else {
                println!(
                    "Webhook deleted ({} pending update(s) {}).",
                    before.pending_update_count,
                    if drop_pending { "dropped" } else { "kept" }
                );
            }
        }
    }

    Ok(())
}

/// `/start`, `/help`, echo, and a callback acknowledger.
///
/// Handlers run on the dispatch path, so replies go out from spawned tasks.
fn register_demo_handlers(bot: &Bot) -> anyhow::Result<()> {
    let gateway = bot.gateway().clone();
    bot.on_command("start", reply(&gateway, "Hello! Send me any text and I will echo it."));
    bot.on_command(
        "help",
        reply(&gateway, "/start: greeting\n/help: this message\nanything else is echoed back"),
    );

    let echo = gateway.clone();
    bot.on_message(MessageType::Text, move |msg| {
        let Some(text) = msg.text.clone() else {
            return Ok(());
        };
        if text.starts_with('/') {
            return Ok(());
        }
        let gateway = echo.clone();
        let chat_id = msg.chat.id;
        tokio::spawn(async move {
            if let Err(e) = gateway.send_message(chat_id, &text).await {
                warn!("echo to chat {chat_id} failed: {e}");
            }
        });
        Ok(())
    });

    let answer = gateway.clone();
    bot.on_callback_query(move |query| {
        let gateway = answer.clone();
        let id = query.id.clone();
        let data = query.data.clone();
        tokio::spawn(async move {
            if let Err(e) = gateway.answer_callback_query(&id, Some(&data)).await {
                warn!("answerCallbackQuery {id} failed: {e}");
            }
        });
        Ok(())
    });

    bot.on_text(Pattern::delimited("/(?i)^ping$/")?, |msg| {
        info!("ping from chat {}", msg.chat.id);
        Ok(())
    });
    Ok(())
}

/// Handler that answers with fixed text.
fn reply(
    gateway: &Arc<dyn RequestGateway>,
    text: &'static str,
) -> impl Fn(&herald_core::update::Message) -> anyhow::Result<()> + Send + Sync + 'static {
    let gateway = gateway.clone();
    move |msg| {
        let gateway = gateway.clone();
        let chat_id = msg.chat.id;
        tokio::spawn(async move {
            if let Err(e) = gateway.send_message(chat_id, text).await {
                warn!("reply to chat {chat_id} failed: {e}");
            }
        });
        Ok(())
    }
}
