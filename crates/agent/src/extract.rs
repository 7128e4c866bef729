//! LLM-backed extraction: fixed instruction sets that turn a foreman's
//! message into Order-schema JSON, plus the completion parsing that digs
//! the JSON object out of whatever prose surrounds it.

use std::fmt::Write as _;

use async_trait::async_trait;
use thiserror::Error;

use smeta_core::catalog::Catalog;
use smeta_core::order::{Order, OrderError, OrderPatch};

use crate::llm::{LlmClient, LlmError};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("completion contained no JSON object")]
    MissingJson,
    #[error("completion JSON did not match the order schema: {0}")]
    MalformedCompletion(String),
    #[error(transparent)]
    InvalidOrder(#[from] OrderError),
    #[error("this extractor does not handle corrections")]
    CorrectionsUnsupported,
    #[error("order state could not be serialized: {0}")]
    StateSerialization(String),
}

/// One extraction strategy. `available` is the capability check the intake
/// orchestrator selects by; it must be cheap and side-effect free.
#[async_trait]
pub trait OrderExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn available(&self) -> bool {
        true
    }

    fn handles_corrections(&self) -> bool {
        false
    }

    async fn extract_order(&self, text: &str) -> Result<Order, ExtractError>;

    async fn extract_correction(
        &self,
        _text: &str,
        _current: &Order,
    ) -> Result<OrderPatch, ExtractError> {
        Err(ExtractError::CorrectionsUnsupported)
    }
}

pub struct LlmExtractor<C> {
    client: C,
    service_hints: String,
}

impl<C> LlmExtractor<C>
where
    C: LlmClient,
{
    pub fn new(client: C, catalog: &Catalog) -> Self {
        Self { client, service_hints: render_service_hints(catalog) }
    }

    fn order_system_prompt(&self) -> String {
        format!(
            "You are an estimate calculator for septic system installations. \
Turn the foreman's message into JSON.\n\n{hints}\n\
JSON STRUCTURE:\n\
{{\n\
  \"client_name\": \"name (or omit)\",\n\
  \"address\": \"address (or omit)\",\n\
  \"product_id\": \"tver_08\" (default) | \"tver_11\" | \"eurolos\",\n\
  \"soil\": \"sand\" (default) | \"clay\",\n\
  \"pipe_length\": integer meters (default 5),\n\
  \"diamond_drilling\": boolean,\n\
  \"custom_items\": [\n\
    {{ \"service_key\": \"manual_sand_transport\", \"qty\": 5 }},\n\
    {{ \"name\": \"Dismantle old outhouse\", \"price\": 3000, \"qty\": 1 }}\n\
  ]\n\
}}\n\
When a phrase matches a listed service, use its service_key and a qty. \
Otherwise add a free-form item with name and a reasonable whole-ruble price. \
Return ONLY the JSON object.",
            hints = self.service_hints
        )
    }

    fn correction_system_prompt(&self) -> String {
        format!(
            "You are editing an existing septic installation order.\n\n{hints}\n\
UPDATE RULES:\n\
1. NEGATIONS: \"no drilling needed\" means \"diamond_drilling\": false.\n\
2. CHANGES: when the name, address, product, soil or meters change, set the new value.\n\
3. ADDITIONS: put newly requested services into \"custom_items\" \
(use a service_key when one fits). Never restate services that are already \
on the order, and never remove any unless explicitly asked.\n\n\
Return ONLY a JSON object with the fields that changed plus any newly added \
custom_items.",
            hints = self.service_hints
        )
    }
}

#[async_trait]
impl<C> OrderExtractor for LlmExtractor<C>
where
    C: LlmClient,
{
    fn name(&self) -> &'static str {
        "llm"
    }

    fn handles_corrections(&self) -> bool {
        true
    }

    async fn extract_order(&self, text: &str) -> Result<Order, ExtractError> {
        let completion = self
            .client
            .complete(&self.order_system_prompt(), &format!("Order: {text}"))
            .await?;

        let order: Order = parse_completion(&completion)?;
        order.validate()?;
        Ok(order)
    }

    async fn extract_correction(
        &self,
        text: &str,
        current: &Order,
    ) -> Result<OrderPatch, ExtractError> {
        let state = serde_json::to_string(current)
            .map_err(|error| ExtractError::StateSerialization(error.to_string()))?;

        let mut user_content = String::new();
        let _ = writeln!(user_content, "CURRENT ORDER JSON:\n{state}");
        let _ = write!(user_content, "\nUSER CORRECTION:\n{text}");

        let completion =
            self.client.complete(&self.correction_system_prompt(), &user_content).await?;
        parse_completion(&completion)
    }
}

fn render_service_hints(catalog: &Catalog) -> String {
    let mut hints =
        String::from("EXTRA SERVICES (use these keys in custom_items service_key):\n");
    for (key, hint) in catalog.service_hints() {
        let _ = writeln!(hints, "- \"{key}\": {hint}.");
    }
    hints
}

/// Completions often wrap the JSON in prose or a markdown fence; take the
/// span from the first `{` to the last `}` and parse that.
fn parse_completion<T>(completion: &str) -> Result<T, ExtractError>
where
    T: serde::de::DeserializeOwned,
{
    let start = completion.find('{').ok_or(ExtractError::MissingJson)?;
    let end = completion.rfind('}').ok_or(ExtractError::MissingJson)?;
    if end < start {
        return Err(ExtractError::MissingJson);
    }

    serde_json::from_str(&completion[start..=end])
        .map_err(|error| ExtractError::MalformedCompletion(error.to_string()))
}
