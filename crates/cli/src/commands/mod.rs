pub mod catalog;
pub mod config;
pub mod doctor;
pub mod estimate;
pub mod render;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Catalog source shared by the order-file commands: explicit path beats
/// the compiled-in price list.
fn load_catalog(
    path: Option<&std::path::Path>,
) -> Result<smeta_core::catalog::Catalog, smeta_core::catalog::CatalogError> {
    match path {
        Some(path) => smeta_core::catalog::Catalog::load(path),
        None => Ok(smeta_core::catalog::Catalog::builtin()),
    }
}

fn load_order(path: &std::path::Path) -> Result<smeta_core::order::Order, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|error| format!("could not read order file `{}`: {error}", path.display()))?;
    let order: smeta_core::order::Order = serde_json::from_str(&raw)
        .map_err(|error| format!("order file `{}` is not a valid order: {error}", path.display()))?;
    order.validate().map_err(|error| error.to_string())?;
    Ok(order)
}
