//! Per-chat order state. One draft order per chat at a time, held only
//! until the user confirms or cancels. The store is externally owned and
//! shared via `Arc`; the estimate builder itself stays stateless.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::order::Order;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

#[derive(Debug, Default)]
pub struct SessionStore {
    orders: Mutex<HashMap<ChatId, Order>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self, chat: ChatId) -> Option<Order> {
        self.lock().get(&chat).cloned()
    }

    pub fn replace(&self, chat: ChatId, order: Order) {
        self.lock().insert(chat, order);
    }

    /// Remove and return the draft, e.g. when the user confirms printing.
    pub fn take(&self, chat: ChatId) -> Option<Order> {
        self.lock().remove(&chat)
    }

    pub fn clear(&self, chat: ChatId) {
        self.lock().remove(&chat);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ChatId, Order>> {
        // A poisoned draft map is still usable; drafts are disposable.
        self.orders.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use crate::order::Order;

    use super::{ChatId, SessionStore};

    #[test]
    fn replace_take_roundtrip() {
        let store = SessionStore::new();
        let chat = ChatId(42);
        assert!(store.current(chat).is_none());

        let order = Order { client_name: "Ivan".to_string(), ..Order::default() };
        store.replace(chat, order.clone());
        assert_eq!(store.current(chat), Some(order.clone()));

        assert_eq!(store.take(chat), Some(order));
        assert!(store.current(chat).is_none());
    }

    #[test]
    fn sessions_are_isolated_per_chat() {
        let store = SessionStore::new();
        store.replace(ChatId(1), Order { client_name: "A".to_string(), ..Order::default() });
        store.replace(ChatId(2), Order { client_name: "B".to_string(), ..Order::default() });

        store.clear(ChatId(1));
        assert!(store.current(ChatId(1)).is_none());
        assert_eq!(store.current(ChatId(2)).map(|order| order.client_name), Some("B".to_string()));
    }
}
