//! Event handler registry and fan-out dispatch.
//!
//! Handlers are registered per event name (case-insensitive) and kept in
//! registration order. Dispatching an event spawns every matching handler
//! as its own task; dispatch never waits for them and never sees their
//! errors, which are logged instead.
//!
//! # Example
//!
//! ```ignore
//! use discord_ipc_client::handler::{DispatchMode, EventDispatcher};
//!
//! let dispatcher = EventDispatcher::new(DispatchMode::Unbounded);
//!
//! dispatcher.register("message_create", |event| async move {
//!     println!("{}: {}", event.name, event.data);
//!     Ok(())
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;

use super::Event;
use crate::codec::JsonCodec;
use crate::error::Result;

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait for event handlers.
pub trait Handler: Send + Sync + 'static {
    /// Handle one dispatched event.
    fn call(&self, event: Event) -> BoxFuture<'static, HandlerResult>;
}

/// Handler taking the raw [`Event`].
pub struct FnHandler<F> {
    handler: F,
}

impl<F> FnHandler<F> {
    /// Wrap a closure.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, event: Event) -> BoxFuture<'static, HandlerResult> {
        Box::pin((self.handler)(event))
    }
}

/// Wrapper that deserializes the event data before calling the handler.
pub struct TypedHandler<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    handler: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

impl<F, T, Fut> TypedHandler<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, Fut> Handler for TypedHandler<F, T, Fut>
where
    F: Fn(T) -> Fut + Send + Sync + 'static,
    T: DeserializeOwned + Send + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, event: Event) -> BoxFuture<'static, HandlerResult> {
        let parsed: T = match JsonCodec::from_value(event.data) {
            Ok(v) => v,
            Err(e) => return Box::pin(async move { Err(e) }),
        };

        Box::pin((self.handler)(parsed))
    }
}

/// Identifies one registration, for [`EventDispatcher::unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// How many handler tasks may run at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Spawn every handler immediately, without limit.
    #[default]
    Unbounded,
    /// At most this many handlers run concurrently; events arriving while
    /// all slots are busy are dropped with a warning.
    Bounded(usize),
}

/// Registry entry.
struct Registration {
    id: HandlerId,
    handler: Arc<dyn Handler>,
}

/// Registry mapping lower-cased event names to ordered handler lists.
pub struct EventDispatcher {
    handlers: RwLock<HashMap<String, Vec<Registration>>>,
    next_id: AtomicU64,
    limiter: Option<Arc<Semaphore>>,
}

impl EventDispatcher {
    /// Create an empty dispatcher.
    pub fn new(mode: DispatchMode) -> Self {
        let limiter = match mode {
            DispatchMode::Unbounded => None,
            DispatchMode::Bounded(limit) => Some(Arc::new(Semaphore::new(limit))),
        };

        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            limiter,
        }
    }

    /// Register a handler receiving the raw [`Event`].
    pub fn register<F, Fut>(&self, name: &str, handler: F) -> HandlerId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_handler(name, Arc::new(FnHandler::new(handler)))
    }

    /// Register a handler receiving the event data deserialized as `T`.
    pub fn register_typed<F, T, Fut>(&self, name: &str, handler: F) -> HandlerId
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        T: DeserializeOwned + Send + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.register_handler(name, Arc::new(TypedHandler::new(handler)))
    }

    /// Register an already boxed handler.
    pub fn register_handler(&self, name: &str, handler: Arc<dyn Handler>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let key = name.to_lowercase();

        self.handlers
            .write()
            .entry(key)
            .or_default()
            .push(Registration { id, handler });

        tracing::info!(event = %name, "Registered event handler");
        id
    }

    /// Remove one registration. Returns `false` if it was not found.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|r| r.id == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Number of handlers registered for `name`.
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers
            .read()
            .get(&name.to_lowercase())
            .map_or(0, Vec::len)
    }

    /// Fan an event out to every handler registered for `name`.
    ///
    /// Must be called from within a tokio runtime. Returns the number of
    /// handler tasks spawned.
    pub fn dispatch(&self, name: &str, data: Value) -> usize {
        let handlers: Vec<Arc<dyn Handler>> = match self.handlers.read().get(&name.to_lowercase()) {
            Some(list) => list.iter().map(|r| Arc::clone(&r.handler)).collect(),
            None => return 0,
        };

        let mut spawned = 0;
        for handler in handlers {
            let permit = match &self.limiter {
                None => None,
                Some(limiter) => match Arc::clone(limiter).try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        tracing::warn!(event = %name, "Handler capacity reached, dropping event");
                        continue;
                    }
                },
            };

            let event = Event::new(name, data.clone());
            tokio::spawn(async move {
                // Permit is held until this task completes
                let _permit = permit;
                let event_name = event.name.clone();

                if let Err(e) = handler.call(event).await {
                    tracing::error!("Handler error for event {}: {}", event_name, e);
                }
            });
            spawned += 1;
        }

        spawned
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DispatchMode::Unbounded)
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read();
        let counts: HashMap<&str, usize> =
            handlers.iter().map(|(k, v)| (k.as_str(), v.len())).collect();
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .field("bounded", &self.limiter.is_some())
            .finish()
    }
}
