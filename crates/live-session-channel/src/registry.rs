//! Observer registration for inbound messages and connection state.

use crate::{ChannelMessage, ConnectionState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::error;

/// Message type that matches every inbound message.
pub const WILDCARD: &str = "*";

pub type MessageHandler = Arc<dyn Fn(&ChannelMessage) + Send + Sync>;
pub type StateHandler = Arc<dyn Fn(&ConnectionState) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Message(String),
    State,
}

#[derive(Default)]
pub(crate) struct HandlerRegistry {
    next_id: AtomicU64,
    messages: Mutex<HashMap<String, Vec<(u64, MessageHandler)>>>,
    states: Mutex<Vec<(u64, StateHandler)>>,
}

impl HandlerRegistry {
    pub fn on_message(self: &Arc<Self>, message_type: &str, handler: MessageHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.messages
            .lock()
            .entry(message_type.to_string())
            .or_default()
            .push((id, handler));
        Subscription::new(self, Slot::Message(message_type.to_string()), id)
    }

    pub fn on_state(self: &Arc<Self>, handler: StateHandler) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.states.lock().push((id, handler));
        Subscription::new(self, Slot::State, id)
    }

    fn remove(&self, slot: &Slot, id: u64) {
        match slot {
            Slot::Message(message_type) => {
                let mut messages = self.messages.lock();
                if let Some(handlers) = messages.get_mut(message_type) {
                    handlers.retain(|(existing, _)| *existing != id);
                    if handlers.is_empty() {
                        messages.remove(message_type);
                    }
                }
            }
            Slot::State => self.states.lock().retain(|(existing, _)| *existing != id),
        }
    }

    /// Deliver to exact-type handlers, then wildcard handlers. Returns the
    /// number of handlers invoked.
    pub fn dispatch_message(&self, message: &ChannelMessage) -> usize {
        let handlers: Vec<MessageHandler> = {
            let messages = self.messages.lock();
            let exact = (message.message_type != WILDCARD)
                .then(|| messages.get(&message.message_type))
                .flatten();
            exact
                .into_iter()
                .chain(messages.get(WILDCARD))
                .flatten()
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };

        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                error!(message_type = %message.message_type, "Message handler panicked");
            }
        }
        handlers.len()
    }

    pub fn dispatch_state(&self, state: &ConnectionState) {
        let handlers: Vec<StateHandler> = self
            .states
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in &handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(state))).is_err() {
                error!("Connection state handler panicked");
            }
        }
    }

    #[cfg(test)]
    pub fn message_handler_count(&self) -> usize {
        self.messages.lock().values().map(Vec::len).sum()
    }
}

/// Handle returned by handler registration.
///
/// Dropping it keeps the handler registered; call [`Subscription::unsubscribe`]
/// to remove it.
pub struct Subscription {
    registry: Weak<HandlerRegistry>,
    slot: Slot,
    id: u64,
    active: AtomicBool,
}

impl Subscription {
    fn new(registry: &Arc<HandlerRegistry>, slot: Slot, id: u64) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            slot,
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Remove the handler. Calling this more than once is a no-op.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.slot, self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("slot", &self.slot)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
