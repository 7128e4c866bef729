//! Rule-based extraction: fixed keyword and token rules for when the LLM is
//! unconfigured or down. Deliberately coarse, fresh orders only; corrections
//! need the language model's understanding of the existing order.

use async_trait::async_trait;

use smeta_core::catalog::{ProductId, SoilType};
use smeta_core::order::{CustomItem, Order};

use crate::extract::{ExtractError, OrderExtractor};

#[derive(Clone, Debug, Default)]
pub struct RuleBasedExtractor;

impl RuleBasedExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> Order {
        let normalized = text.to_lowercase();
        let tokens = tokenize(&normalized);

        let mut order = Order {
            client_name: extract_client_name(text).unwrap_or_else(|| "Client".to_string()),
            product_id: extract_product(&normalized),
            soil: extract_soil(&normalized),
            diamond_drilling: extract_drilling(&normalized),
            ..Order::default()
        };

        if let Some(address) = extract_address(text) {
            order.address = address;
        }
        if let Some(meters) = extract_pipe_length(&tokens) {
            order.pipe_length_m = meters;
        }
        if normalized.contains("haul") || normalized.contains("take away the soil") {
            order.custom_items.push(CustomItem::FreeForm {
                name: Some("Soil haul-away".to_string()),
                unit_price: Some(5000),
                qty: Some(1),
            });
        }

        order
    }
}

#[async_trait]
impl OrderExtractor for RuleBasedExtractor {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn extract_order(&self, text: &str) -> Result<Order, ExtractError> {
        let order = self.parse(text);
        order.validate()?;
        Ok(order)
    }
}

fn tokenize(normalized: &str) -> Vec<&str> {
    normalized
        .split(|ch: char| !ch.is_alphanumeric() && ch != '.')
        .filter(|token| !token.is_empty())
        .collect()
}

fn extract_product(normalized: &str) -> ProductId {
    let wants_big = ["1.1", "big one", "eleven", "one-one"]
        .iter()
        .any(|keyword| normalized.contains(keyword));

    if wants_big {
        ProductId("tver_11".to_string())
    } else if normalized.contains("eurolos") {
        ProductId("eurolos".to_string())
    } else {
        ProductId("tver_08".to_string())
    }
}

fn extract_soil(normalized: &str) -> SoilType {
    let heavy = ["clay", "loam", "heavy soil", "hard ground"]
        .iter()
        .any(|keyword| normalized.contains(keyword));
    // Anything unrecognized is priced at the sand rate.
    if heavy {
        SoilType::Clay
    } else {
        SoilType::Sand
    }
}

fn extract_drilling(normalized: &str) -> bool {
    ["drill", "bore", "foundation", "through the wall"]
        .iter()
        .any(|keyword| normalized.contains(keyword))
}

fn extract_pipe_length(tokens: &[&str]) -> Option<u32> {
    // "<number> m|meter|meters" as adjacent tokens, or a glued "15m".
    for window in tokens.windows(2) {
        if let [value, unit] = window {
            if is_meter_unit(unit) {
                if let Ok(meters) = value.parse::<u32>() {
                    return Some(meters);
                }
            }
        }
    }

    tokens.iter().find_map(|token| {
        let digits: String = token.chars().take_while(char::is_ascii_digit).collect();
        let rest = &token[digits.len()..];
        if !digits.is_empty() && is_meter_unit(rest) {
            digits.parse().ok()
        } else {
            None
        }
    })
}

fn is_meter_unit(token: &str) -> bool {
    matches!(token, "m" | "meter" | "meters" | "metre" | "metres")
}

fn extract_client_name(text: &str) -> Option<String> {
    let mut words = text.split_whitespace().peekable();
    while let Some(word) = words.next() {
        let keyword = word.trim_matches(|ch: char| !ch.is_alphanumeric()).to_lowercase();
        if matches!(keyword.as_str(), "client" | "customer" | "named") {
            let name = words.next()?.trim_matches(|ch: char| !ch.is_alphabetic());
            if name.is_empty() {
                return None;
            }
            return Some(capitalize(name));
        }
    }
    None
}

fn extract_address(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    for (index, word) in words.iter().enumerate() {
        let keyword = word.trim_matches(|ch: char| !ch.is_alphanumeric()).to_lowercase();
        if matches!(keyword.as_str(), "address" | "snt" | "street" | "village" | "town") {
            let tail: Vec<&str> = words[index..].iter().take(4).copied().collect();
            let address = tail.join(" ").trim_matches(|ch: char| ch == ',' || ch == '.').to_string();
            if address.len() > keyword.len() + 2 {
                return Some(address);
            }
        }
    }
    None
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
