//! HTML template rendering and PDF conversion via external wkhtmltopdf.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;

use tera::Tera;
use tokio::process::Command;
use tracing::{error, info, warn};

use smeta_core::catalog::Catalog;
use smeta_core::config::{CompanyConfig, DocumentsConfig};
use smeta_core::estimate::{build_estimate, EstimateError};
use smeta_core::order::Order;

use crate::view::document_context;

/// Register custom Tera filters used by document templates.
///
/// - `money`: integer rubles with thin-space thousands grouping,
///   e.g. `152500 | money` renders `152 500`
pub fn register_template_filters(tera: &mut Tera) {
    tera.register_filter("money", tera_money_filter);
}

fn tera_money_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let amount = value
        .as_i64()
        .ok_or_else(|| tera::Error::msg("money filter expects an integer amount"))?;

    Ok(tera::Value::String(group_thousands(amount)))
}

fn group_thousands(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if amount < 0 {
        grouped.push('-');
    }
    let lead = digits.len() % 3;
    for (index, ch) in digits.chars().enumerate() {
        if index != 0 && index % 3 == lead % 3 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}

/// Which of the two customer documents to render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    /// Marketing-heavy commercial proposal with the station presentation.
    Proposal,
    /// Strict itemized estimate with signature lines and appendix pages.
    Estimate,
}

impl DocumentKind {
    pub fn template_name(self) -> &'static str {
        match self {
            Self::Proposal => "proposal.html.tera",
            Self::Estimate => "estimate.html.tera",
        }
    }

    /// File stem used for downloads and temp files.
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Proposal => "proposal",
            Self::Estimate => "estimate",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    #[error(transparent)]
    Estimate(#[from] EstimateError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rendered document: PDF bytes when wkhtmltopdf is available, HTML when
/// no converter was discovered at startup.
pub enum DocumentOutput {
    Pdf(Vec<u8>),
    Html(String),
}

impl DocumentOutput {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf(_) => "pdf",
            Self::Html(_) => "html",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Pdf(_) => "application/pdf",
            Self::Html(_) => "text/html; charset=utf-8",
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Pdf(bytes) => bytes,
            Self::Html(html) => html.into_bytes(),
        }
    }
}

pub struct DocumentGenerator {
    tera: Tera,
    company: CompanyConfig,
    asset_dir: PathBuf,
    wkhtmltopdf_path: Option<String>,
}

impl DocumentGenerator {
    /// Load templates from the configured directory.
    pub fn new(config: &DocumentsConfig) -> Result<Self, RenderError> {
        let glob = format!("{}/**/*.tera", config.template_dir.display());
        let mut tera = Tera::new(&glob).map_err(|e| RenderError::Template(e.to_string()))?;
        register_template_filters(&mut tera);

        Ok(Self {
            tera,
            company: config.company.clone(),
            asset_dir: config.asset_dir.clone(),
            wkhtmltopdf_path: discover_wkhtmltopdf(),
        })
    }

    /// Generator backed by the compiled-in templates; used when no template
    /// directory is deployed and in tests.
    pub fn with_embedded_templates(config: &DocumentsConfig) -> Self {
        let mut tera = Tera::default();
        register_template_filters(&mut tera);

        tera.add_raw_template(
            "proposal.html.tera",
            include_str!("../../../templates/proposal.html.tera"),
        )
        .expect("embedded proposal template is valid");
        tera.add_raw_template(
            "estimate.html.tera",
            include_str!("../../../templates/estimate.html.tera"),
        )
        .expect("embedded estimate template is valid");

        Self {
            tera,
            company: config.company.clone(),
            asset_dir: config.asset_dir.clone(),
            wkhtmltopdf_path: discover_wkhtmltopdf(),
        }
    }

    /// Price the order and render the requested document.
    pub async fn render_order(
        &self,
        order: &Order,
        catalog: &Catalog,
        kind: DocumentKind,
    ) -> Result<DocumentOutput, RenderError> {
        let estimate = build_estimate(order, catalog)?;
        let context = document_context(order, catalog, &estimate, &self.company, &self.asset_dir);

        let html = self
            .tera
            .render(kind.template_name(), &context)
            .map_err(|e| RenderError::Template(e.to_string()))?;

        // HTML output is reserved for deployments without a converter; a
        // discovered converter that fails is a rendering error, not a
        // silent downgrade.
        if let Some(converter) = self.wkhtmltopdf_path.as_deref() {
            let pdf_bytes = convert_html_to_pdf(&html, converter, kind).await?;
            return Ok(DocumentOutput::Pdf(pdf_bytes));
        }

        Ok(DocumentOutput::Html(html))
    }

    pub fn pdf_capable(&self) -> bool {
        self.wkhtmltopdf_path.is_some()
    }

    #[cfg(test)]
    fn without_converter(mut self) -> Self {
        self.wkhtmltopdf_path = None;
        self
    }

    #[cfg(test)]
    fn with_converter(mut self, path: &str) -> Self {
        self.wkhtmltopdf_path = Some(path.to_string());
        self
    }
}

fn discover_wkhtmltopdf() -> Option<String> {
    match which::which("wkhtmltopdf") {
        Ok(path) => {
            let path = path.to_string_lossy().to_string();
            info!(path = %path, "wkhtmltopdf found");
            Some(path)
        }
        Err(_) => {
            warn!("wkhtmltopdf not found in PATH, documents will render as HTML");
            None
        }
    }
}

async fn convert_html_to_pdf(
    html: &str,
    converter: &str,
    kind: DocumentKind,
) -> Result<Vec<u8>, RenderError> {
    let temp_dir = std::env::temp_dir();
    let token = uuid::Uuid::new_v4();
    let html_path = temp_dir.join(format!("{}_{token}.html", kind.file_stem()));
    let pdf_path = temp_dir.join(format!("{}_{token}.pdf", kind.file_stem()));

    tokio::fs::write(&html_path, html).await?;

    let result = Command::new(converter)
        .arg("--page-size")
        .arg("A4")
        .arg("--margin-top")
        .arg("10mm")
        .arg("--margin-bottom")
        .arg("10mm")
        .arg("--margin-left")
        .arg("10mm")
        .arg("--margin-right")
        .arg("10mm")
        .arg("--encoding")
        .arg("utf-8")
        .arg("--enable-local-file-access")
        .arg(&html_path)
        .arg(&pdf_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(output) => output,
        Err(e) => {
            let _ = tokio::fs::remove_file(&html_path).await;
            return Err(e.into());
        }
    };

    let outcome = if output.status.success() {
        tokio::fs::read(&pdf_path).await.map_err(RenderError::from)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        error!(stderr = %stderr, "wkhtmltopdf failed");
        Err(RenderError::Conversion(stderr))
    };

    let _ = tokio::fs::remove_file(&html_path).await;
    let _ = tokio::fs::remove_file(&pdf_path).await;

    if let Ok(pdf_bytes) = &outcome {
        info!(size = pdf_bytes.len(), document = kind.file_stem(), "PDF generated");
    }

    outcome
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use smeta_core::catalog::{Catalog, ServiceKey, SoilType};
    use smeta_core::config::{CompanyConfig, DocumentsConfig};
    use smeta_core::order::{CustomItem, Order};

    use super::{group_thousands, DocumentGenerator, DocumentKind, DocumentOutput};

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

    fn sample_order() -> Order {
        Order {
            client_name: "Ivan Petrov".to_string(),
            address: "SNT Berezka 14".to_string(),
            soil: SoilType::Clay,
            pipe_length_m: 10,
            diamond_drilling: true,
            ..Order::default()
        }
    }

    #[test]
    fn groups_thousands_with_spaces() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(152_500), "152 500");
        assert_eq!(group_thousands(1_234_567), "1 234 567");
        assert_eq!(group_thousands(-4500), "-4 500");
    }

    #[tokio::test]
    async fn proposal_renders_html_without_converter() {
        let generator =
            DocumentGenerator::with_embedded_templates(&documents_config()).without_converter();
        let catalog = Catalog::builtin();

        let output = generator
            .render_order(&sample_order(), &catalog, DocumentKind::Proposal)
            .await
            .expect("render");

        match output {
            DocumentOutput::Html(html) => {
                assert!(html.contains("Ivan Petrov"));
                assert!(html.contains("Commercial proposal"));
                assert!(html.contains(&catalog.default_product().name));
            }
            DocumentOutput::Pdf(_) => panic!("expected HTML without a converter"),
        }
    }

    #[tokio::test]
    async fn failing_converter_is_an_error_not_an_html_downgrade() {
        // `false` exits non-zero without writing a PDF, standing in for a
        // discovered converter that breaks at conversion time.
        let generator =
            DocumentGenerator::with_embedded_templates(&documents_config()).with_converter("false");
        let catalog = Catalog::builtin();

        let result = generator.render_order(&sample_order(), &catalog, DocumentKind::Proposal).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn estimate_renders_numbered_table_and_appendix() {
        let generator =
            DocumentGenerator::with_embedded_templates(&documents_config()).without_converter();
        let catalog = Catalog::builtin();

        let mut order = sample_order();
        order.custom_items.push(CustomItem::CatalogRef {
            service_key: ServiceKey("cable_laying".to_string()),
            name: None,
            unit_price: None,
            qty: Some(20),
        });

        let output = generator
            .render_order(&order, &catalog, DocumentKind::Estimate)
            .await
            .expect("render");

        match output {
            DocumentOutput::Html(html) => {
                assert!(html.contains("Appendix No. 1"));
                assert!(html.contains("SNT Berezka 14"));
                // Drilling plus the cable run both made it into the table.
                assert!(html.contains("Diamond drilling"));
                assert!(html.contains("page-break"));
                assert!(html.contains("Client signature"));
            }
            DocumentOutput::Pdf(_) => panic!("expected HTML without a converter"),
        }
    }

    #[test]
    fn output_metadata_matches_variant() {
        let pdf = DocumentOutput::Pdf(vec![1, 2, 3]);
        assert_eq!(pdf.extension(), "pdf");
        assert_eq!(pdf.content_type(), "application/pdf");

        let html = DocumentOutput::Html("<html></html>".to_string());
        assert_eq!(html.extension(), "html");
        assert_eq!(html.into_bytes(), b"<html></html>".to_vec());
    }
}
