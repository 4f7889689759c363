//! Bot facade: one gateway, one dispatcher, one transport.

use crate::{api::HttpGateway, polling::PollingTransport, webhook::WebhookTransport};
use herald_core::{
    config::{Config, TransportConfig},
    error::HeraldError,
    traits::RequestGateway,
    update::{CallbackQuery, Message, MessageType, User},
};
use herald_dispatch::{Dispatcher, Pattern};
use std::sync::Arc;
use tracing::info;

/// The update source, fixed at construction.
pub enum Transport {
    Polling(PollingTransport),
    Webhook(WebhookTransport),
}

impl Transport {
    pub fn from_config(
        config: &TransportConfig,
        gateway: Arc<dyn RequestGateway>,
        dispatcher: Arc<Dispatcher>,
        allowed_updates: Vec<String>,
    ) -> Result<Self, HeraldError> {
        Ok(match config {
            TransportConfig::Polling(p) => Self::Polling(PollingTransport::new(
                gateway,
                dispatcher,
                p.clone(),
                allowed_updates,
            )),
            TransportConfig::Webhook(w) => Self::Webhook(WebhookTransport::new(
                gateway,
                dispatcher,
                w.clone(),
                allowed_updates,
            )?),
        })
    }

    pub fn mode(&self) -> &'static str {
        match self {
            Self::Polling(_) => "polling",
            Self::Webhook(_) => "webhook",
        }
    }

    /// Polling first clears any webhook registration, which would otherwise
    /// make every `getUpdates` call fail. Webhook mode replaces it.
    async fn start(&self, gateway: &dyn RequestGateway) -> Result<(), HeraldError> {
        match self {
            Self::Polling(p) => {
                if p.is_running() {
                    return Err(HeraldError::AlreadyRunning);
                }
                gateway.delete_webhook(false).await?;
                p.start()
            }
            Self::Webhook(w) => w.start().await.map(|_| ()),
        }
    }

    async fn stop(&self) {
        match self {
            Self::Polling(p) => p.stop().await,
            Self::Webhook(w) => w.stop().await,
        }
    }
}

/// A Telegram bot.
///
/// Subscriptions can be added before or after `start()`.
pub struct Bot {
    gateway: Arc<dyn RequestGateway>,
    dispatcher: Arc<Dispatcher>,
    transport: Transport,
}

impl Bot {
    /// Build a bot talking to the Bot API over HTTPS.
    pub fn new(config: &Config) -> Result<Self, HeraldError> {
        let gateway = Arc::new(HttpGateway::new(&config.bot));
        Self::with_gateway(config, gateway)
    }

    /// Build a bot on a caller-supplied gateway.
    pub fn with_gateway(
        config: &Config,
        gateway: Arc<dyn RequestGateway>,
    ) -> Result<Self, HeraldError> {
        config.validate()?;
        let dispatcher = Arc::new(Dispatcher::default());
        let transport = Transport::from_config(
            &config.transport,
            gateway.clone(),
            dispatcher.clone(),
            config.bot.allowed_updates.clone(),
        )?;
        Ok(Self {
            gateway,
            dispatcher,
            transport,
        })
    }

    /// Outbound API access, e.g. to reply from a spawned task.
    pub fn gateway(&self) -> &Arc<dyn RequestGateway> {
        &self.gateway
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn on_command<F>(&self, name: &str, handler: F) -> &Self
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.register(|r| {
            r.on_command(name, handler);
        });
        self
    }

    pub fn on_message<F>(&self, ty: MessageType, handler: F) -> &Self
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.register(|r| {
            r.on_message(ty, handler);
        });
        self
    }

    pub fn on_text<F>(&self, pattern: impl Into<Pattern>, handler: F) -> &Self
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.register(|r| {
            r.on_text(pattern, handler);
        });
        self
    }

    pub fn on_callback_query<F>(&self, handler: F) -> &Self
    where
        F: Fn(&CallbackQuery) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.register(|r| {
            r.on_callback_query(handler);
        });
        self
    }

    pub fn on_callback_data<F>(&self, pattern: impl Into<Pattern>, handler: F) -> &Self
    where
        F: Fn(&CallbackQuery) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.dispatcher.register(|r| {
            r.on_callback_data(pattern, handler);
        });
        self
    }

    /// Verify the token with `getMe`, then start receiving updates.
    pub async fn start(&self) -> Result<User, HeraldError> {
        let me = self.gateway.get_me().await?;
        self.transport.start(self.gateway.as_ref()).await?;
        info!(
            "Bot @{} started ({} mode, {} subscriptions)",
            me.username.as_deref().unwrap_or(&me.first_name),
            self.transport.mode(),
            self.dispatcher.subscription_count()
        );
        Ok(me)
    }

    /// `start()`, then run `on_ready` once with the bot's identity.
    pub async fn start_then<F>(&self, on_ready: F) -> Result<User, HeraldError>
    where
        F: FnOnce(&User),
    {
        let me = self.start().await?;
        on_ready(&me);
        Ok(me)
    }

    /// Stop receiving updates. Returns once the transport has shut down.
    pub async fn stop(&self) {
        self.transport.stop().await;
        info!("Bot stopped");
    }

    /// `stop()`, then run `on_stopped` once.
    pub async fn stop_then<F>(&self, on_stopped: F)
    where
        F: FnOnce(),
    {
        self.stop().await;
        on_stopped();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{text_update, wait_until, ScriptedGateway};
    use herald_core::config::{PollingConfig, WebhookConfig};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn polling_config() -> Config {
        let mut config = Config::default();
        config.bot.token = "123:ABC".into();
        config.transport = TransportConfig::Polling(PollingConfig {
            timeout: 0,
            retry_delay_ms: 10,
            ..Default::default()
        });
        config
    }

    fn webhook_config() -> Config {
        let mut config = polling_config();
        config.transport = TransportConfig::Webhook(WebhookConfig {
            domain: "https://bot.example.com".into(),
            host: "127.0.0.1".into(),
            port: 0,
            path: Some("/hook".into()),
        });
        config
    }

    #[tokio::test]
    async fn test_polling_start_sequence() {
        let gw = Arc::new(ScriptedGateway::new());
        let bot = Bot::with_gateway(&polling_config(), gw.clone()).unwrap();
        assert_eq!(bot.transport().mode(), "polling");

        let mut ready = None;
        let me = bot
            .start_then(|user| ready = user.username.clone())
            .await
            .unwrap();
        assert_eq!(me.id, 1);
        assert_eq!(ready.as_deref(), Some("herald_bot"));
        assert!(wait_until(|| !gw.offsets().is_empty()).await);

        let mut stopped = false;
        bot.stop_then(|| stopped = true).await;
        assert!(stopped);

        let methods = gw.methods();
        assert_eq!(&methods[..3], &["getMe", "deleteWebhook", "getUpdates"]);
        assert_eq!(
            gw.calls()[1].1.as_ref().unwrap()["drop_pending_updates"],
            json!(false)
        );
    }

    #[tokio::test]
    async fn test_polling_start_twice_skips_delete() {
        let gw = Arc::new(ScriptedGateway::new());
        let bot = Bot::with_gateway(&polling_config(), gw.clone()).unwrap();
        bot.start().await.unwrap();
        assert!(matches!(bot.start().await, Err(HeraldError::AlreadyRunning)));
        bot.stop().await;

        let deletes = gw.methods().iter().filter(|m| *m == "deleteWebhook").count();
        assert_eq!(deletes, 1);
    }

    #[tokio::test]
    async fn test_handlers_registered_on_bot_receive_updates() {
        let gw = Arc::new(ScriptedGateway::new());
        gw.push_batch(json!([text_update(1, "/start"), text_update(2, "ping")]));
        let bot = Bot::with_gateway(&polling_config(), gw.clone()).unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        let (a, b) = (hits.clone(), hits.clone());
        bot.on_command("start", move |_| {
            a.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .on_text("ping", move |_| {
            b.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(bot.dispatcher().subscription_count(), 2);

        bot.start().await.unwrap();
        assert!(wait_until(|| hits.load(Ordering::SeqCst) == 11).await);
        bot.stop().await;
    }

    #[tokio::test]
    async fn test_webhook_mode_registers_and_never_deletes() {
        let gw = Arc::new(ScriptedGateway::new());
        let bot = Bot::with_gateway(&webhook_config(), gw.clone()).unwrap();
        assert_eq!(bot.transport().mode(), "webhook");

        bot.start().await.unwrap();
        bot.stop().await;

        let methods = gw.methods();
        assert_eq!(methods, vec!["getMe", "setWebhook"]);
        assert_eq!(
            gw.calls()[1].1.as_ref().unwrap()["url"],
            "https://bot.example.com/hook"
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let gw = Arc::new(ScriptedGateway::new());
        let mut config = polling_config();
        config.bot.token = "  ".into();
        assert!(matches!(
            Bot::with_gateway(&config, gw.clone()),
            Err(HeraldError::Config(_))
        ));

        let mut config = webhook_config();
        if let TransportConfig::Webhook(ref mut w) = config.transport {
            w.domain = "ftp://nope".into();
        }
        assert!(matches!(
            Bot::with_gateway(&config, gw),
            Err(HeraldError::Config(_))
        ));
    }
}
