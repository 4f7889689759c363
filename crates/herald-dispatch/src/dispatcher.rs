//! Update classification and handler fan-out.

use crate::registry::{normalize_command, Handler, HandlerRegistry};
use herald_core::{
    error::HeraldError,
    update::{CallbackQuery, Message, MessageType, Update},
};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, error};

/// What an update carries, as far as routing is concerned.
#[derive(Debug, Clone, Copy)]
pub enum Event<'a> {
    Message(&'a Message),
    CallbackQuery(&'a CallbackQuery),
    /// Payload kinds nothing subscribes to. Dropped.
    Unrecognized,
}

/// Route keys derived from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRoute {
    pub content_type: Option<MessageType>,
    /// Normalized command name, if the message carries a `bot_command` entity.
    pub command: Option<String>,
}

impl MessageRoute {
    pub fn of(message: &Message) -> Self {
        let command = message
            .command_entity()
            .and_then(|(text, entity)| entity.extract(text))
            .map(|raw| normalize_command(&raw));
        Self {
            content_type: message.content_type(),
            command,
        }
    }
}

/// Outcome of dispatching one update.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Handlers invoked, including the ones that failed.
    pub fired: usize,
    /// One entry per handler that returned an error or panicked.
    pub errors: Vec<HeraldError>,
}

impl DispatchReport {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}

/// Routes updates to the handlers in a [`HandlerRegistry`].
///
/// Safe to call from several tasks at once. Handlers run after the
/// registry lock is released, so a handler may subscribe more handlers.
#[derive(Default)]
pub struct Dispatcher {
    registry: RwLock<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self {
            registry: RwLock::new(registry),
        }
    }

    /// Mutate the subscriptions while transports may be running.
    pub fn register<R>(&self, f: impl FnOnce(&mut HandlerRegistry) -> R) -> R {
        let mut registry = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut registry)
    }

    pub fn subscription_count(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn classify(update: &Update) -> Event<'_> {
        if let Some(ref message) = update.message {
            Event::Message(message)
        } else if let Some(ref query) = update.callback_query {
            Event::CallbackQuery(query)
        } else {
            Event::Unrecognized
        }
    }

    /// Classify `update` and invoke every matching handler in order.
    ///
    /// Handler failures are logged and collected, never propagated.
    pub fn dispatch(&self, update: &Update) -> DispatchReport {
        let mut report = DispatchReport::default();
        match Self::classify(update) {
            Event::Message(message) => {
                self.dispatch_message(update.update_id, message, &mut report)
            }
            Event::CallbackQuery(query) => {
                self.dispatch_callback(update.update_id, query, &mut report)
            }
            Event::Unrecognized => {
                let kinds: Vec<&str> = update.other.keys().map(String::as_str).collect();
                debug!(
                    "dropping unrecognized update {} ({})",
                    update.update_id,
                    kinds.join(", ")
                );
            }
        }
        report
    }

    fn dispatch_message(&self, update_id: i64, message: &Message, report: &mut DispatchReport) {
        let route = MessageRoute::of(message);

        // Snapshot under the read lock; invoke after it is released.
        let (by_type, by_command, by_text) = {
            let registry = self
                .registry
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let by_type = route
                .content_type
                .map(|ty| registry.message_type_handlers(ty))
                .unwrap_or_default();
            let by_command = route
                .command
                .as_deref()
                .map(|name| registry.command_handlers(name))
                .unwrap_or_default();
            let by_text = message
                .text
                .as_deref()
                .map(|text| registry.text_handlers(text))
                .unwrap_or_default();
            (by_type, by_command, by_text)
        };

        if let Some(ty) = route.content_type {
            let label = format!("message:{ty}");
            for handler in &by_type {
                invoke(update_id, &label, handler, message, report);
            }
        }
        if let Some(ref name) = route.command {
            let label = format!("command:/{name}");
            for handler in &by_command {
                invoke(update_id, &label, handler, message, report);
            }
        }
        for (pattern, handler) in &by_text {
            invoke(update_id, &format!("text:{pattern}"), handler, message, report);
        }
    }

    fn dispatch_callback(&self, update_id: i64, query: &CallbackQuery, report: &mut DispatchReport) {
        let handlers = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .callback_handlers(&query.data);
        for (pattern, handler) in &handlers {
            invoke(update_id, &format!("callback:{pattern}"), handler, query, report);
        }
    }
}

/// Run one handler, containing both `Err` returns and panics.
fn invoke<E>(
    update_id: i64,
    route: &str,
    handler: &Handler<E>,
    event: &E,
    report: &mut DispatchReport,
) {
    report.fired += 1;
    let failure = match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
        Ok(Ok(())) => return,
        Ok(Err(e)) => format!("{e:#}"),
        Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
    };
    error!("handler {route} failed on update {update_id}: {failure}");
    report
        .errors
        .push(HeraldError::Handler(format!("{route}: {failure}")));
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
