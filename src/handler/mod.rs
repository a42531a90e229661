//! Handler module - event registration and dispatch.
//!
//! Provides:
//! - [`EventDispatcher`] - maps event names to ordered handler lists
//! - [`Event`] - the name and data handed to each handler
//!
//! # Example
//!
//! ```ignore
//! use discord_ipc_client::handler::{DispatchMode, EventDispatcher};
//!
//! let dispatcher = EventDispatcher::new(DispatchMode::Bounded(16));
//!
//! dispatcher.register_typed("message_delete", |data: serde_json::Value| async move {
//!     tracing::info!("deleted: {}", data["message"]["id"]);
//!     Ok(())
//! });
//! ```

mod event;
mod registry;

pub use event::Event;
pub use registry::{
    BoxFuture, DispatchMode, EventDispatcher, FnHandler, Handler, HandlerId, HandlerResult,
    TypedHandler,
};
