//! Document rendering for installation estimates.
//!
//! Two customer-facing documents exist for the same priced order:
//!
//! - **Proposal** — a marketing-heavy commercial proposal with the station
//!   presentation (photo, specs, selling points) and a simplified cost table.
//! - **Estimate** — a strict itemized work estimate ("Appendix No. 1") with a
//!   numbered six-column table, signature lines, and the installation
//!   instructions appended as extra pages.
//!
//! Both render through Tera HTML templates and convert to PDF with
//! `wkhtmltopdf` when it is on `PATH`; otherwise the rendered HTML is
//! returned as-is for browser printing.

pub mod generator;
pub mod view;

pub use generator::{DocumentGenerator, DocumentKind, DocumentOutput, RenderError};
