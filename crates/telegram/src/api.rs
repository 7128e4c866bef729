//! Minimal typed client for the Telegram Bot API methods the bot uses.

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use smeta_core::config::TelegramConfig;
use smeta_core::session::ChatId;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("failed to build telegram client: {0}")]
    Build(String),
    #[error("telegram request failed: {0}")]
    Request(String),
    #[error("telegram api rejected {method}: {description}")]
    Api { method: String, description: String },
}

impl From<reqwest::Error> for TelegramError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error.to_string())
    }
}

/// Bot API envelope: `ok` plus either `result` or `description`.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SentMessage {
    pub message_id: i64,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<&'a InlineKeyboard>,
}

#[derive(Serialize)]
struct EditMessageRequest<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    parse_mode: &'a str,
}

#[derive(Serialize)]
struct DeleteMessageRequest {
    chat_id: i64,
    message_id: i64,
}

#[derive(Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[derive(Serialize)]
struct GetUpdatesRequest {
    offset: i64,
    timeout: u64,
}

pub struct BotApi {
    http: reqwest::Client,
    method_base: String,
}

impl BotApi {
    pub fn new(config: &TelegramConfig) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            // Long-poll requests hold the connection for `poll_timeout_secs`;
            // the client timeout must outlive them.
            .timeout(std::time::Duration::from_secs(config.poll_timeout_secs + 15))
            .build()
            .map_err(|e| TelegramError::Build(e.to_string()))?;

        let method_base = format!(
            "{}/bot{}",
            config.api_base.trim_end_matches('/'),
            config.bot_token.expose_secret()
        );

        Ok(Self { http, method_base })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.method_base)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: &impl Serialize,
    ) -> Result<T, TelegramError> {
        let response = self.http.post(self.url(method)).json(body).send().await?;
        let envelope: ApiEnvelope<T> = response.json().await?;
        unwrap_envelope(method, envelope)
    }

    pub async fn get_updates(&self, offset: i64, timeout: u64) -> Result<Vec<Update>, TelegramError> {
        self.call("getUpdates", &GetUpdatesRequest { offset, timeout }).await
    }

    pub async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<SentMessage, TelegramError> {
        self.call(
            "sendMessage",
            &SendMessageRequest {
                chat_id: chat.0,
                text,
                parse_mode: "Markdown",
                reply_markup: keyboard,
            },
        )
        .await
    }

    pub async fn edit_message_text(
        &self,
        chat: ChatId,
        message_id: i64,
        text: &str,
    ) -> Result<(), TelegramError> {
        self.call::<serde_json::Value>(
            "editMessageText",
            &EditMessageRequest { chat_id: chat.0, message_id, text, parse_mode: "Markdown" },
        )
        .await
        .map(|_| ())
    }

    pub async fn delete_message(&self, chat: ChatId, message_id: i64) -> Result<(), TelegramError> {
        self.call::<serde_json::Value>(
            "deleteMessage",
            &DeleteMessageRequest { chat_id: chat.0, message_id },
        )
        .await
        .map(|_| ())
    }

    pub async fn answer_callback_query(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.call::<serde_json::Value>(
            "answerCallbackQuery",
            &AnswerCallbackRequest { callback_query_id: callback_id, text },
        )
        .await
        .map(|_| ())
    }

    /// Upload a generated document from memory.
    pub async fn send_document(
        &self,
        chat: ChatId,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<(), TelegramError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| TelegramError::Request(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat.0.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let response =
            self.http.post(self.url("sendDocument")).multipart(form).send().await?;
        let envelope: ApiEnvelope<serde_json::Value> = response.json().await?;
        unwrap_envelope::<serde_json::Value>("sendDocument", envelope).map(|_| ())
    }
}

fn unwrap_envelope<T>(method: &str, envelope: ApiEnvelope<T>) -> Result<T, TelegramError> {
    if envelope.ok {
        envelope.result.ok_or_else(|| TelegramError::Api {
            method: method.to_string(),
            description: "ok response without result".to_string(),
        })
    } else {
        Err(TelegramError::Api {
            method: method.to_string(),
            description: envelope.description.unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiEnvelope, unwrap_envelope, Update};

    #[test]
    fn parses_message_and_callback_updates() {
        let raw = r#"[
            {"update_id": 7, "message": {"message_id": 1, "chat": {"id": 42}, "text": "hello"}},
            {"update_id": 8, "callback_query": {"id": "cb-1", "data": "print_docs",
                "message": {"message_id": 2, "chat": {"id": 42}}}}
        ]"#;

        let updates: Vec<Update> = serde_json::from_str(raw).expect("updates");
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().and_then(|m| m.text.as_deref()), Some("hello"));
        let callback = updates[1].callback_query.as_ref().expect("callback");
        assert_eq!(callback.data.as_deref(), Some("print_docs"));
        assert_eq!(callback.message.as_ref().map(|m| m.chat.id), Some(42));
    }

    #[test]
    fn error_envelope_carries_the_api_description() {
        let envelope: ApiEnvelope<serde_json::Value> =
            serde_json::from_str(r#"{"ok": false, "description": "Bad Request: chat not found"}"#)
                .expect("envelope");

        let error = unwrap_envelope("sendMessage", envelope).expect_err("must fail");
        assert!(error.to_string().contains("chat not found"));
    }
}
