use crate::{
    error::HeraldError,
    update::{Message, Update, User},
};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::warn;

/// Request gateway trait: the outbound wire.
///
/// Performs one Bot API call and returns the unwrapped `result` payload.
/// A platform `ok: false` answer surfaces as [`HeraldError::Protocol`],
/// network failures as [`HeraldError::Transport`].
#[async_trait]
pub trait RequestGateway: Send + Sync {
    /// Call `method` with optional parameters.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, HeraldError>;

    /// `getMe`: identity of the bot behind the token.
    async fn get_me(&self) -> Result<User, HeraldError> {
        let value = self.request("getMe", None).await?;
        decode(value)
    }

    /// `getUpdates`: long-poll for updates with `update_id >= offset`.
    async fn get_updates(
        &self,
        offset: i64,
        limit: u32,
        timeout: u64,
        allowed_updates: &[String],
    ) -> Result<Vec<Update>, HeraldError> {
        let mut params = json!({
            "offset": offset,
            "limit": limit,
            "timeout": timeout,
        });
        if !allowed_updates.is_empty() {
            params["allowed_updates"] = json!(allowed_updates);
        }
        let value = self.request("getUpdates", Some(params)).await?;
        let batch: Vec<Value> = decode(value)?;
        Ok(batch
            .into_iter()
            .filter_map(|item| {
                let update = Update::from_value(item);
                if update.is_none() {
                    warn!("skipping batch element without an update_id");
                }
                update
            })
            .collect())
    }

    /// `setWebhook`: route updates to `url` instead of `getUpdates`.
    async fn set_webhook(&self, url: &str, allowed_updates: &[String]) -> Result<(), HeraldError> {
        let params = json!({
            "url": url,
            "allowed_updates": allowed_updates,
        });
        self.request("setWebhook", Some(params)).await?;
        Ok(())
    }

    /// `deleteWebhook`: required before polling can receive anything.
    async fn delete_webhook(&self, drop_pending_updates: bool) -> Result<(), HeraldError> {
        let params = json!({ "drop_pending_updates": drop_pending_updates });
        self.request("deleteWebhook", Some(params)).await?;
        Ok(())
    }

    /// `getWebhookInfo`: current webhook registration.
    async fn get_webhook_info(&self) -> Result<WebhookInfo, HeraldError> {
        let value = self.request("getWebhookInfo", None).await?;
        decode(value)
    }

    /// `sendMessage` with plain text.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<Message, HeraldError> {
        let params = json!({ "chat_id": chat_id, "text": text });
        let value = self.request("sendMessage", Some(params)).await?;
        decode(value)
    }

    /// `answerCallbackQuery`: stop the client-side loading spinner.
    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
    ) -> Result<(), HeraldError> {
        let mut params = json!({ "callback_query_id": callback_query_id });
        if let Some(text) = text {
            params["text"] = json!(text);
        }
        self.request("answerCallbackQuery", Some(params)).await?;
        Ok(())
    }
}

/// Result of `getWebhookInfo`.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookInfo {
    /// Empty when no webhook is registered.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pending_update_count: i64,
    #[serde(default)]
    pub last_error_message: Option<String>,
    #[serde(default)]
    pub allowed_updates: Vec<String>,
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, HeraldError> {
    serde_json::from_value(value).map_err(|e| HeraldError::Parse(e.to_string()))
}
