use std::fs;
use std::path::Path;

use smeta_core::config::{AppConfig, DocumentsConfig, LoadOptions};
use smeta_docs::{DocumentGenerator, DocumentKind};

use crate::DocumentKindArg;

use super::CommandResult;

pub fn run(
    order_path: &Path,
    kind: DocumentKindArg,
    out_path: &Path,
    catalog_path: Option<&Path>,
) -> CommandResult {
    let order = match super::load_order(order_path) {
        Ok(order) => order,
        Err(message) => return CommandResult::failure("render", "order", message, 2),
    };

    let catalog = match super::load_catalog(catalog_path) {
        Ok(catalog) => catalog,
        Err(error) => return CommandResult::failure("render", "catalog", error.to_string(), 2),
    };

    // Document settings come from the config file when present; the bot
    // token is not needed here, so a missing config falls back to defaults.
    let documents_config = AppConfig::load(LoadOptions::default())
        .map(|config| config.documents)
        .unwrap_or_else(|_| AppConfig::default().documents);
    let generator = build_generator(&documents_config);

    let kind = match kind {
        DocumentKindArg::Proposal => DocumentKind::Proposal,
        DocumentKindArg::Estimate => DocumentKind::Estimate,
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "render",
                "runtime",
                format!("failed to initialize async runtime: {error}"),
                1,
            );
        }
    };

    let output = match runtime.block_on(generator.render_order(&order, &catalog, kind)) {
        Ok(output) => output,
        Err(error) => return CommandResult::failure("render", "render", error.to_string(), 1),
    };

    // The produced format decides the extension: HTML fallback must not be
    // written under a .pdf name.
    let out_path = out_path.with_extension(output.extension());
    let format = output.extension();
    if let Err(error) = fs::write(&out_path, output.into_bytes()) {
        return CommandResult::failure(
            "render",
            "io",
            format!("could not write `{}`: {error}", out_path.display()),
            1,
        );
    }

    CommandResult::success(
        "render",
        format!("wrote {format} document to `{}`", out_path.display()),
    )
}

fn build_generator(config: &DocumentsConfig) -> DocumentGenerator {
    if config.template_dir.is_dir() {
        match DocumentGenerator::new(config) {
            Ok(generator) => return generator,
            Err(error) => {
                eprintln!(
                    "template directory `{}` failed to load ({error}), using embedded templates",
                    config.template_dir.display()
                );
            }
        }
    }

    DocumentGenerator::with_embedded_templates(config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn renders_estimate_document_to_requested_path() {
        let mut order_file = tempfile::NamedTempFile::new().expect("temp order");
        order_file
            .write_all(br#"{"client_name": "Ivan", "address": "Moscow"}"#)
            .expect("write order");
        let out_dir = tempfile::tempdir().expect("temp dir");
        let out = out_dir.path().join("smeta.pdf");

        let result = run(order_file.path(), DocumentKindArg::Estimate, &out, None);

        assert_eq!(result.exit_code, 0, "output: {}", result.output);
        // wkhtmltopdf may be absent, in which case the fallback is HTML.
        let produced: Vec<_> = fs::read_dir(out_dir.path())
            .expect("read out dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(produced.len(), 1);
        let name = produced[0].to_string_lossy().to_string();
        assert!(name == "smeta.pdf" || name == "smeta.html", "produced: {name}");
    }

    #[test]
    fn rejects_unreadable_order() {
        let out_dir = tempfile::tempdir().expect("temp dir");
        let out = out_dir.path().join("smeta.pdf");

        let result = run(Path::new("missing/order.json"), DocumentKindArg::Proposal, &out, None);

        assert_eq!(result.exit_code, 2);
        assert!(result.output.contains("\"error_class\":\"order\""), "output: {}", result.output);
    }
}
