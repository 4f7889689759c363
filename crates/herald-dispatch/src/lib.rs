//! # herald-dispatch
//!
//! Classifies updates and routes them to registered handlers by command,
//! content type, free text, or callback payload.

pub mod dispatcher;
pub mod pattern;
pub mod registry;

pub use dispatcher::{DispatchReport, Dispatcher, Event, MessageRoute};
pub use pattern::Pattern;
pub use registry::{Handler, HandlerRegistry};
