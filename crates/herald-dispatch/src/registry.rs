//! Subscription tables keyed by route.

use crate::pattern::Pattern;
use herald_core::update::{CallbackQuery, Message, MessageType};
use std::collections::HashMap;
use std::sync::Arc;

/// A subscribed callback. Runs synchronously on the dispatch path; spawn
/// a task for anything slow.
pub type Handler<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

/// Command, content-type, free-text, and callback subscriptions.
///
/// Every table preserves registration order, and several handlers may
/// share a key: all of them fire.
#[derive(Default)]
pub struct HandlerRegistry {
    commands: HashMap<String, Vec<Handler<Message>>>,
    message_types: HashMap<MessageType, Vec<Handler<Message>>>,
    texts: Vec<(Pattern, Handler<Message>)>,
    callback_default: Vec<Handler<CallbackQuery>>,
    callbacks: Vec<(Pattern, Handler<CallbackQuery>)>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `/name`. Matching is case-insensitive.
    pub fn on_command<F>(&mut self, name: &str, handler: F) -> &mut Self
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.commands
            .entry(normalize_command(name))
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Subscribe to messages whose primary content is `ty`.
    pub fn on_message<F>(&mut self, ty: MessageType, handler: F) -> &mut Self
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.message_types
            .entry(ty)
            .or_default()
            .push(Arc::new(handler));
        self
    }

    /// Subscribe to messages whose text matches `pattern`.
    pub fn on_text<F>(&mut self, pattern: impl Into<Pattern>, handler: F) -> &mut Self
    where
        F: Fn(&Message) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.texts.push((pattern.into(), Arc::new(handler)));
        self
    }

    /// Subscribe to every callback query.
    pub fn on_callback_query<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&CallbackQuery) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callback_default.push(Arc::new(handler));
        self
    }

    /// Subscribe to callback queries whose `data` matches `pattern`.
    pub fn on_callback_data<F>(&mut self, pattern: impl Into<Pattern>, handler: F) -> &mut Self
    where
        F: Fn(&CallbackQuery) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callbacks.push((pattern.into(), Arc::new(handler)));
        self
    }

    pub fn command_handlers(&self, name: &str) -> Vec<Handler<Message>> {
        self.commands.get(name).cloned().unwrap_or_default()
    }

    pub fn message_type_handlers(&self, ty: MessageType) -> Vec<Handler<Message>> {
        self.message_types.get(&ty).cloned().unwrap_or_default()
    }

    /// Text subscriptions matching `text`, with their patterns for logging.
    pub fn text_handlers(&self, text: &str) -> Vec<(String, Handler<Message>)> {
        self.texts
            .iter()
            .filter(|(pattern, _)| pattern.is_match(text))
            .map(|(pattern, handler)| (pattern.to_string(), handler.clone()))
            .collect()
    }

    /// Default handlers first, then every pattern match in registration order.
    pub fn callback_handlers(&self, data: &str) -> Vec<(String, Handler<CallbackQuery>)> {
        let defaults = self
            .callback_default
            .iter()
            .map(|handler| ("default".to_string(), handler.clone()));
        let matched = self
            .callbacks
            .iter()
            .filter(|(pattern, _)| pattern.is_match(data))
            .map(|(pattern, handler)| (pattern.to_string(), handler.clone()));
        defaults.chain(matched).collect()
    }

    /// Total number of subscriptions.
    pub fn len(&self) -> usize {
        self.commands.values().map(Vec::len).sum::<usize>()
            + self.message_types.values().map(Vec::len).sum::<usize>()
            + self.texts.len()
            + self.callback_default.len()
            + self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Canonical command key: no leading slash, no `@botname`, lowercase.
pub fn normalize_command(raw: &str) -> String {
    let name = raw.strip_prefix('/').unwrap_or(raw);
    let name = name.split('@').next().unwrap_or(name);
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &Message) -> anyhow::Result<()> {
        Ok(())
    }

    fn noop_query(_: &CallbackQuery) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_normalize_command() {
        assert_eq!(normalize_command("/start"), "start");
        assert_eq!(normalize_command("START"), "start");
        assert_eq!(normalize_command("/Help@HeraldBot"), "help");
        assert_eq!(normalize_command(""), "");
    }

    #[test]
    fn test_command_registration_is_case_insensitive() {
        let mut registry = HandlerRegistry::new();
        registry.on_command("Start", noop).on_command("/start", noop);
        assert_eq!(registry.command_handlers("start").len(), 2);
        assert!(registry.command_handlers("Start").is_empty());
    }

    #[test]
    fn test_message_type_lookup() {
        let mut registry = HandlerRegistry::new();
        registry.on_message(MessageType::Photo, noop);
        assert_eq!(registry.message_type_handlers(MessageType::Photo).len(), 1);
        assert!(registry.message_type_handlers(MessageType::Voice).is_empty());
    }

    #[test]
    fn test_callback_handlers_default_first() {
        let mut registry = HandlerRegistry::new();
        registry
            .on_callback_data(Pattern::regex("^buy_").unwrap(), noop_query)
            .on_callback_data("buy_42", noop_query)
            .on_callback_query(noop_query)
            .on_callback_data("sell", noop_query);

        let labels: Vec<String> = registry
            .callback_handlers("buy_42")
            .into_iter()
            .map(|(label, _)| label)
            .collect();
        assert_eq!(labels, vec!["default", "/^buy_/", "\"buy_42\""]);
    }

    #[test]
    fn test_text_handlers_filter() {
        let mut registry = HandlerRegistry::new();
        registry
            .on_text(Pattern::prefix("hello"), noop)
            .on_text("hi", noop)
            .on_text(Pattern::regex("(?i)bye").unwrap(), noop);
        assert_eq!(registry.text_handlers("hello world").len(), 1);
        assert_eq!(registry.text_handlers("hi").len(), 1);
        assert_eq!(registry.text_handlers("hi there").len(), 0);
        assert_eq!(registry.text_handlers("Bye!").len(), 1);
    }

    #[test]
    fn test_len() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        registry
            .on_command("a", noop)
            .on_command("a", noop)
            .on_message(MessageType::Text, noop)
            .on_text("x", noop)
            .on_callback_query(noop_query)
            .on_callback_data("y", noop_query);
        assert_eq!(registry.len(), 6);
    }
}
