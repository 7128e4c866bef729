//! User-visible texts and keyboards. Every string the bot sends lives here
//! so handlers stay free of copy.

use smeta_core::catalog::{Catalog, SoilType};
use smeta_core::order::{CustomItem, Order};

use crate::api::{InlineButton, InlineKeyboard};

pub const CALLBACK_PRINT_DOCS: &str = "print_docs";
pub const CALLBACK_CANCEL: &str = "cancel";

pub fn greeting() -> &'static str {
    "Hi! I am the estimate bot.\n\n\
     I know the full price list. Dictate the order:\n\
     _\"Ivan, Tver 0.8, sand. Sand has to be carried by hand, about 15 m.\"_"
}

pub fn thinking() -> &'static str {
    "Thinking..."
}

pub fn not_understood() -> &'static str {
    "I did not get that. Try rephrasing."
}

pub fn order_reset() -> &'static str {
    "Order reset."
}

pub fn generating_documents() -> &'static str {
    "Generating documents (proposal + estimate)..."
}

pub fn documents_done() -> &'static str {
    "Done! Ready for the next order."
}

pub fn no_order_yet() -> &'static str {
    "No order data."
}

pub fn confirm_keyboard() -> InlineKeyboard {
    InlineKeyboard {
        inline_keyboard: vec![
            vec![InlineButton {
                text: "Print documents".to_string(),
                callback_data: CALLBACK_PRINT_DOCS.to_string(),
            }],
            vec![InlineButton {
                text: "Reset".to_string(),
                callback_data: CALLBACK_CANCEL.to_string(),
            }],
        ],
    }
}

/// Chat preview of the captured order, shown above the confirm keyboard.
pub fn order_summary(order: &Order, catalog: &Catalog) -> String {
    let product = catalog.product(&order.product_id);
    let soil = match order.soil {
        SoilType::Sand => "Sand",
        SoilType::Clay => "Clay",
    };
    let drilling = if order.diamond_drilling { "YES" } else { "NO" };

    let mut summary = format!(
        "*ORDER SUMMARY:*\n\
         {client} | {address}\n\
         {product}\n\
         {soil} | Pipe run: {pipe} m\n\
         Drilling: {drilling}\n",
        client = order.client_name,
        address = order.address,
        product = product.name,
        soil = soil,
        pipe = order.pipe_length_m,
        drilling = drilling,
    );

    if !order.custom_items.is_empty() {
        summary.push_str("\n*Extra services:*\n");
        for item in &order.custom_items {
            summary.push_str(&custom_item_line(item, catalog));
            summary.push('\n');
        }
    }

    summary.push_str(
        "\nIf everything is right, print. Otherwise send a correction \
         (e.g. _'remove the drilling'_).",
    );
    summary
}

fn custom_item_line(item: &CustomItem, catalog: &Catalog) -> String {
    match item {
        CustomItem::CatalogRef { service_key, name, unit_price, qty } => {
            let qty = qty.unwrap_or(1).max(1);
            match catalog.service(service_key) {
                Some(entry) => {
                    format!("- {} (x{qty}) - {} rub.", entry.name, entry.unit_price)
                }
                // Unresolved key: show whatever the intake side supplied.
                None => {
                    let name = name.as_deref().unwrap_or(service_key.0.as_str());
                    match unit_price {
                        Some(price) => format!("- {name} (x{qty}) - {price} rub."),
                        None => format!("- {name} (x{qty}) - per price list"),
                    }
                }
            }
        }
        CustomItem::FreeForm { name, unit_price, qty } => {
            let qty = qty.unwrap_or(1).max(1);
            let name = name.as_deref().unwrap_or("Additional service");
            match unit_price {
                Some(price) => format!("- {name} (x{qty}) - {price} rub."),
                None => format!("- {name} (x{qty}) - per price list"),
            }
        }
    }
}
