//! # herald-transport
//!
//! Delivers Telegram updates to a [`Dispatcher`](herald_dispatch::Dispatcher)
//! by long polling or by webhook, and calls the Bot API over HTTP.

pub mod api;
pub mod bot;
pub mod polling;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

pub use api::HttpGateway;
pub use bot::{Bot, Transport};
pub use polling::PollingTransport;
pub use webhook::WebhookTransport;
