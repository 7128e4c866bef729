//! Telegram transport for the estimate bot.
//!
//! A thin layer over the Bot API: `api` speaks the wire protocol, `events`
//! routes parsed updates to handlers, `messages` owns every user-visible
//! text, and `poller` drives the long-poll loop with reconnect backoff.
//! All order logic lives below this crate; the transport only moves text
//! and documents.

pub mod api;
pub mod events;
pub mod messages;
pub mod poller;

pub use api::{BotApi, TelegramError};
pub use events::{OrderFlowHandler, UpdateDispatcher, UpdateEvent};
pub use poller::{PollingRunner, ReconnectPolicy};
