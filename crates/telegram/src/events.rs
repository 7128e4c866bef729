//! Update routing and the order conversation flow.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use smeta_agent::intake::OrderIntake;
use smeta_core::catalog::Catalog;
use smeta_core::session::{ChatId, SessionStore};
use smeta_docs::{DocumentGenerator, DocumentKind};

use crate::api::{BotApi, InlineKeyboard, SentMessage, TelegramError, Update};
use crate::messages;

#[derive(Clone, Debug, PartialEq)]
pub enum UpdateEvent {
    Start { chat: ChatId },
    Text { chat: ChatId, text: String },
    Callback { chat: ChatId, message_id: i64, callback_id: String, data: String },
    Unsupported,
}

impl UpdateEvent {
    pub fn from_update(update: Update) -> Self {
        if let Some(message) = update.message {
            let chat = ChatId(message.chat.id);
            return match message.text {
                Some(text) if text.trim().starts_with("/start") => Self::Start { chat },
                Some(text) => Self::Text { chat, text },
                None => Self::Unsupported,
            };
        }

        if let Some(callback) = update.callback_query {
            if let Some(message) = callback.message {
                return Self::Callback {
                    chat: ChatId(message.chat.id),
                    message_id: message.message_id,
                    callback_id: callback.id,
                    data: callback.data.unwrap_or_default(),
                };
            }
        }

        Self::Unsupported
    }

    pub fn kind(&self) -> UpdateKind {
        match self {
            Self::Start { .. } => UpdateKind::Start,
            Self::Text { .. } => UpdateKind::Text,
            Self::Callback { .. } => UpdateKind::Callback,
            Self::Unsupported => UpdateKind::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    Start,
    Text,
    Callback,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Telegram(#[from] TelegramError),
    #[error("document rendering failed: {0}")]
    Render(String),
}

#[async_trait]
pub trait UpdateHandler: Send + Sync {
    fn kinds(&self) -> &'static [UpdateKind];
    async fn handle(&self, event: &UpdateEvent) -> Result<HandlerResult, HandlerError>;
}

#[derive(Default)]
pub struct UpdateDispatcher {
    handlers: HashMap<UpdateKind, Arc<dyn UpdateHandler>>,
}

impl UpdateDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn UpdateHandler>) {
        for kind in handler.kinds() {
            self.handlers.insert(*kind, handler.clone());
        }
    }

    pub async fn dispatch(&self, event: &UpdateEvent) -> Result<HandlerResult, HandlerError> {
        let Some(handler) = self.handlers.get(&event.kind()) else {
            return Ok(HandlerResult::Ignored);
        };
        handler.handle(event).await
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Outbound side of the chat, kept behind a trait so the flow is testable
/// without the Bot API.
#[async_trait]
pub trait ChatPort: Send + Sync {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<SentMessage, TelegramError>;
    async fn edit_text(&self, chat: ChatId, message_id: i64, text: &str)
        -> Result<(), TelegramError>;
    async fn delete(&self, chat: ChatId, message_id: i64) -> Result<(), TelegramError>;
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError>;
    async fn send_file(
        &self,
        chat: ChatId,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TelegramError>;
}

#[async_trait]
impl ChatPort for BotApi {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<SentMessage, TelegramError> {
        self.send_message(chat, text, keyboard).await
    }

    async fn edit_text(
        &self,
        chat: ChatId,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.edit_message_text(chat, message_id, text).await
    }

    async fn delete(&self, chat: ChatId, message_id: i64) -> Result<(), TelegramError> {
        self.delete_message(chat, message_id).await
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.answer_callback_query(callback_id, text).await
    }

    async fn send_file(
        &self,
        chat: ChatId,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TelegramError> {
        self.send_document(chat, file_name, content_type, bytes, caption).await
    }
}

/// The whole bot conversation: capture an order, preview it, print the
/// documents or reset. One draft order per chat.
pub struct OrderFlowHandler {
    chat: Arc<dyn ChatPort>,
    intake: Arc<OrderIntake>,
    sessions: Arc<SessionStore>,
    catalog: Arc<Catalog>,
    documents: Arc<DocumentGenerator>,
}

impl OrderFlowHandler {
    pub fn new(
        chat: Arc<dyn ChatPort>,
        intake: Arc<OrderIntake>,
        sessions: Arc<SessionStore>,
        catalog: Arc<Catalog>,
        documents: Arc<DocumentGenerator>,
    ) -> Self {
        Self { chat, intake, sessions, catalog, documents }
    }

    async fn on_start(&self, chat: ChatId) -> Result<HandlerResult, HandlerError> {
        self.sessions.clear(chat);
        self.chat.send_text(chat, messages::greeting(), None).await?;
        Ok(HandlerResult::Processed)
    }

    async fn on_text(&self, chat: ChatId, text: &str) -> Result<HandlerResult, HandlerError> {
        let placeholder = self.chat.send_text(chat, messages::thinking(), None).await?;

        let outcome = match self.sessions.current(chat) {
            Some(current) => self.intake.correction(text, &current).await,
            None => self.intake.fresh_order(text).await,
        };

        // Best effort; a stale placeholder is cosmetic.
        let _ = self.chat.delete(chat, placeholder.message_id).await;

        match outcome {
            Ok(order) => {
                info!(chat_id = chat.0, "order captured");
                let summary = messages::order_summary(&order, &self.catalog);
                self.sessions.replace(chat, order);
                self.chat
                    .send_text(chat, &summary, Some(&messages::confirm_keyboard()))
                    .await?;
            }
            Err(error) => {
                warn!(chat_id = chat.0, error = %error, "intake failed");
                self.chat.send_text(chat, messages::not_understood(), None).await?;
            }
        }

        Ok(HandlerResult::Processed)
    }

    async fn on_callback(
        &self,
        chat: ChatId,
        message_id: i64,
        callback_id: &str,
        data: &str,
    ) -> Result<HandlerResult, HandlerError> {
        match data {
            messages::CALLBACK_CANCEL => {
                self.sessions.clear(chat);
                self.chat.edit_text(chat, message_id, messages::order_reset()).await?;
                self.chat.answer_callback(callback_id, None).await?;
                Ok(HandlerResult::Processed)
            }
            messages::CALLBACK_PRINT_DOCS => {
                let Some(order) = self.sessions.current(chat) else {
                    self.chat.answer_callback(callback_id, Some(messages::no_order_yet())).await?;
                    return Ok(HandlerResult::Processed);
                };

                self.chat.edit_text(chat, message_id, messages::generating_documents()).await?;
                self.chat.answer_callback(callback_id, None).await?;

                self.deliver_documents(chat, &order).await?;

                self.sessions.take(chat);
                self.chat.send_text(chat, messages::documents_done(), None).await?;
                Ok(HandlerResult::Processed)
            }
            _ => {
                self.chat.answer_callback(callback_id, None).await?;
                Ok(HandlerResult::Ignored)
            }
        }
    }

    async fn deliver_documents(
        &self,
        chat: ChatId,
        order: &smeta_core::order::Order,
    ) -> Result<(), HandlerError> {
        for (kind, caption) in [
            (DocumentKind::Proposal, "Commercial proposal"),
            (DocumentKind::Estimate, "Estimate + instructions"),
        ] {
            let output = self
                .documents
                .render_order(order, &self.catalog, kind)
                .await
                .map_err(|e| HandlerError::Render(e.to_string()))?;

            let file_name =
                format!("{}_{}.{}", kind.file_stem(), order.client_name, output.extension());
            let content_type = output.content_type();
            self.chat
                .send_file(chat, &file_name, content_type, output.into_bytes(), caption)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateHandler for OrderFlowHandler {
    fn kinds(&self) -> &'static [UpdateKind] {
        &[UpdateKind::Start, UpdateKind::Text, UpdateKind::Callback]
    }

    async fn handle(&self, event: &UpdateEvent) -> Result<HandlerResult, HandlerError> {
        match event {
            UpdateEvent::Start { chat } => self.on_start(*chat).await,
            UpdateEvent::Text { chat, text } => self.on_text(*chat, text).await,
            UpdateEvent::Callback { chat, message_id, callback_id, data } => {
                self.on_callback(*chat, *message_id, callback_id, data).await
            }
            UpdateEvent::Unsupported => Ok(HandlerResult::Ignored),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use smeta_agent::fallback::RuleBasedExtractor;
    use smeta_agent::intake::OrderIntake;
    use smeta_core::catalog::Catalog;
    use smeta_core::config::{CompanyConfig, DocumentsConfig};
    use smeta_core::order::Order;
    use smeta_core::session::{ChatId, SessionStore};
    use smeta_docs::DocumentGenerator;

    use crate::api::{Chat, IncomingMessage, InlineKeyboard, SentMessage, TelegramError, Update};
    use crate::messages;

    use super::{
        ChatPort, HandlerResult, OrderFlowHandler, UpdateDispatcher, UpdateEvent, UpdateHandler,
    };

    #[derive(Default)]
    struct RecordingPort {
        state: Mutex<Recorded>,
    }

    #[derive(Default)]
    struct Recorded {
        sent: Vec<(String, bool)>,
        edited: Vec<String>,
        deleted: Vec<i64>,
        callbacks: Vec<Option<String>>,
        files: Vec<String>,
        next_message_id: i64,
    }

    impl RecordingPort {
        async fn sent(&self) -> Vec<(String, bool)> {
            self.state.lock().await.sent.clone()
        }

        async fn files(&self) -> Vec<String> {
            self.state.lock().await.files.clone()
        }
    }

    #[async_trait]
    impl ChatPort for RecordingPort {
        async fn send_text(
            &self,
            _chat: ChatId,
            text: &str,
            keyboard: Option<&InlineKeyboard>,
        ) -> Result<SentMessage, TelegramError> {
            let mut state = self.state.lock().await;
            state.sent.push((text.to_string(), keyboard.is_some()));
            state.next_message_id += 1;
            Ok(SentMessage { message_id: state.next_message_id })
        }

        async fn edit_text(
            &self,
            _chat: ChatId,
            _message_id: i64,
            text: &str,
        ) -> Result<(), TelegramError> {
            self.state.lock().await.edited.push(text.to_string());
            Ok(())
        }

        async fn delete(&self, _chat: ChatId, message_id: i64) -> Result<(), TelegramError> {
            self.state.lock().await.deleted.push(message_id);
            Ok(())
        }

        async fn answer_callback(
            &self,
            _callback_id: &str,
            text: Option<&str>,
        ) -> Result<(), TelegramError> {
            self.state.lock().await.callbacks.push(text.map(str::to_string));
            Ok(())
        }

        async fn send_file(
            &self,
            _chat: ChatId,
            file_name: &str,
            _content_type: &str,
            _bytes: Vec<u8>,
            _caption: &str,
        ) -> Result<(), TelegramError> {
            self.state.lock().await.files.push(file_name.to_string());
            Ok(())
        }
    }

    fn documents_config() -> DocumentsConfig {
        DocumentsConfig {
            template_dir: PathBuf::from("templates"),
            asset_dir: PathBuf::from("assets"),
            company: CompanyConfig {
                name: "VLG Septik".to_string(),
                phone: "+7 (960) 879-13-62".to_string(),
                email: "vlg-septik@yandex.ru".to_string(),
                website: "www.vlg-septik.ru".to_string(),
            },
        }
    }

    fn handler_with(port: Arc<RecordingPort>, sessions: Arc<SessionStore>) -> OrderFlowHandler {
        OrderFlowHandler::new(
            port,
            Arc::new(OrderIntake::new(None, Arc::new(RuleBasedExtractor::new()))),
            sessions,
            Arc::new(Catalog::builtin()),
            Arc::new(DocumentGenerator::with_embedded_templates(&documents_config())),
        )
    }

    #[test]
    fn updates_parse_into_events() {
        let update = Update {
            update_id: 1,
            message: Some(IncomingMessage {
                message_id: 10,
                chat: Chat { id: 42 },
                text: Some("/start".to_string()),
            }),
            callback_query: None,
        };
        assert_eq!(UpdateEvent::from_update(update), UpdateEvent::Start { chat: ChatId(42) });

        let update = Update { update_id: 2, message: None, callback_query: None };
        assert_eq!(UpdateEvent::from_update(update), UpdateEvent::Unsupported);
    }

    #[tokio::test]
    async fn start_resets_the_session_and_greets() {
        let port = Arc::new(RecordingPort::default());
        let sessions = Arc::new(SessionStore::new());
        sessions.replace(ChatId(42), Order::default());

        let handler = handler_with(port.clone(), sessions.clone());
        let result = handler.handle(&UpdateEvent::Start { chat: ChatId(42) }).await.expect("ok");

        assert_eq!(result, HandlerResult::Processed);
        assert!(sessions.current(ChatId(42)).is_none());
        assert_eq!(port.sent().await, vec![(messages::greeting().to_string(), false)]);
    }

    #[tokio::test]
    async fn text_captures_an_order_and_previews_it_with_keyboard() {
        let port = Arc::new(RecordingPort::default());
        let sessions = Arc::new(SessionStore::new());
        let handler = handler_with(port.clone(), sessions.clone());

        let event = UpdateEvent::Text {
            chat: ChatId(42),
            text: "client Ivan, clay, 10 meters, drill the foundation".to_string(),
        };
        handler.handle(&event).await.expect("ok");

        let order = sessions.current(ChatId(42)).expect("draft stored");
        assert_eq!(order.client_name, "Ivan");
        assert!(order.diamond_drilling);

        let sent = port.sent().await;
        // Placeholder first, then the summary with the confirm keyboard.
        assert_eq!(sent[0].0, messages::thinking());
        assert!(sent[1].0.contains("ORDER SUMMARY"));
        assert!(sent[1].1);
    }

    #[tokio::test]
    async fn cancel_callback_drops_the_draft() {
        let port = Arc::new(RecordingPort::default());
        let sessions = Arc::new(SessionStore::new());
        sessions.replace(ChatId(42), Order::default());

        let handler = handler_with(port.clone(), sessions.clone());
        let event = UpdateEvent::Callback {
            chat: ChatId(42),
            message_id: 5,
            callback_id: "cb-1".to_string(),
            data: messages::CALLBACK_CANCEL.to_string(),
        };
        handler.handle(&event).await.expect("ok");

        assert!(sessions.current(ChatId(42)).is_none());
        assert_eq!(port.state.lock().await.edited, vec![messages::order_reset().to_string()]);
    }

    #[tokio::test]
    async fn print_docs_without_a_draft_only_answers_the_callback() {
        let port = Arc::new(RecordingPort::default());
        let handler = handler_with(port.clone(), Arc::new(SessionStore::new()));

        let event = UpdateEvent::Callback {
            chat: ChatId(42),
            message_id: 5,
            callback_id: "cb-2".to_string(),
            data: messages::CALLBACK_PRINT_DOCS.to_string(),
        };
        handler.handle(&event).await.expect("ok");

        assert!(port.files().await.is_empty());
        assert_eq!(
            port.state.lock().await.callbacks,
            vec![Some(messages::no_order_yet().to_string())]
        );
    }

    #[tokio::test]
    async fn print_docs_delivers_both_documents_and_clears_the_session() {
        let port = Arc::new(RecordingPort::default());
        let sessions = Arc::new(SessionStore::new());
        sessions.replace(
            ChatId(42),
            Order { client_name: "Ivan".to_string(), ..Order::default() },
        );

        let handler = handler_with(port.clone(), sessions.clone());
        let event = UpdateEvent::Callback {
            chat: ChatId(42),
            message_id: 5,
            callback_id: "cb-3".to_string(),
            data: messages::CALLBACK_PRINT_DOCS.to_string(),
        };
        handler.handle(&event).await.expect("ok");

        let files = port.files().await;
        assert_eq!(files.len(), 2);
        assert!(files[0].starts_with("proposal_Ivan"));
        assert!(files[1].starts_with("estimate_Ivan"));
        assert!(sessions.current(ChatId(42)).is_none());
        assert_eq!(port.sent().await.last().map(|(text, _)| text.clone()),
            Some(messages::documents_done().to_string()));
    }

    #[tokio::test]
    async fn dispatcher_ignores_unregistered_kinds() {
        let dispatcher = UpdateDispatcher::new();
        let result =
            dispatcher.dispatch(&UpdateEvent::Start { chat: ChatId(1) }).await.expect("ok");
        assert_eq!(result, HandlerResult::Ignored);
        assert_eq!(dispatcher.handler_count(), 0);
    }
}
