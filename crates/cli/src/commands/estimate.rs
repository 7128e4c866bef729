use std::path::Path;

use smeta_core::estimate::{build_estimate, EstimateResult};
use smeta_core::order::Order;

use super::CommandResult;

pub fn run(order_path: &Path, catalog_path: Option<&Path>, json_output: bool) -> CommandResult {
    let order = match super::load_order(order_path) {
        Ok(order) => order,
        Err(message) => return CommandResult::failure("estimate", "order", message, 2),
    };

    let catalog = match super::load_catalog(catalog_path) {
        Ok(catalog) => catalog,
        Err(error) => return CommandResult::failure("estimate", "catalog", error.to_string(), 2),
    };

    let estimate = match build_estimate(&order, &catalog) {
        Ok(estimate) => estimate,
        Err(error) => return CommandResult::failure("estimate", "pricing", error.to_string(), 1),
    };

    let output = if json_output {
        match serde_json::to_string_pretty(&serde_json::json!({
            "order": order,
            "estimate": estimate,
        })) {
            Ok(rendered) => rendered,
            Err(error) => {
                return CommandResult::failure("estimate", "serialization", error.to_string(), 1)
            }
        }
    } else {
        render_human(&order, &estimate)
    };

    CommandResult { exit_code: 0, output }
}

fn render_human(order: &Order, estimate: &EstimateResult) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Estimate for {} ({})", order.client_name, order.address));

    for (index, line) in estimate.lines.iter().enumerate() {
        lines.push(format!(
            "{:>2}. {}  {} {} x {} = {}",
            index + 1,
            line.name,
            line.quantity,
            line.unit,
            line.unit_price,
            line.total,
        ));
    }

    lines.push(format!("TOTAL: {} rub", estimate.grand_total));
    lines.join("\n")
}
