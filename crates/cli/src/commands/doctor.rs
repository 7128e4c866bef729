use serde::Serialize;
use smeta_core::catalog::Catalog;
use smeta_core::config::{AppConfig, LlmProvider, LoadOptions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(DoctorCheck {
                name: "telegram_token_readiness",
                status: CheckStatus::Pass,
                details: "token format validated by config contract".to_string(),
            });
            checks.push(check_llm(&config));
            checks.push(check_catalog(&config));
            checks.push(check_templates(&config));
            checks.push(check_assets(&config));
            checks.push(check_pdf_converter());
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in [
                "telegram_token_readiness",
                "llm_readiness",
                "catalog",
                "templates",
                "assets",
                "pdf_converter",
            ] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let any_fail = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let overall_status = if any_fail { CheckStatus::Fail } else { CheckStatus::Pass };
    let summary = if any_fail {
        "doctor: one or more readiness checks failed".to_string()
    } else {
        "doctor: all readiness checks passed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm(config: &AppConfig) -> DoctorCheck {
    match config.llm.provider {
        LlmProvider::Disabled => DoctorCheck {
            name: "llm_readiness",
            status: CheckStatus::Skipped,
            details: "llm provider disabled, extraction uses rules only".to_string(),
        },
        // api key and base url are enforced by config validation, which
        // already passed when this check runs.
        LlmProvider::OpenaiCompatible => DoctorCheck {
            name: "llm_readiness",
            status: CheckStatus::Pass,
            details: format!("model `{}` with credentials validated by config", config.llm.model),
        },
    }
}

fn check_catalog(config: &AppConfig) -> DoctorCheck {
    let loaded = match config.catalog.path.as_deref() {
        Some(path) => Catalog::load(path),
        None => Ok(Catalog::builtin()),
    };

    match loaded {
        Ok(catalog) => DoctorCheck {
            name: "catalog",
            status: CheckStatus::Pass,
            details: format!(
                "{} products, {} services",
                catalog.products().len(),
                catalog.services().len()
            ),
        },
        Err(error) => {
            DoctorCheck { name: "catalog", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn check_templates(config: &AppConfig) -> DoctorCheck {
    let dir = &config.documents.template_dir;
    if dir.is_dir() {
        DoctorCheck {
            name: "templates",
            status: CheckStatus::Pass,
            details: format!("template directory `{}` present", dir.display()),
        }
    } else {
        DoctorCheck {
            name: "templates",
            status: CheckStatus::Skipped,
            details: format!(
                "template directory `{}` missing, embedded templates will be used",
                dir.display()
            ),
        }
    }
}

fn check_assets(config: &AppConfig) -> DoctorCheck {
    let dir = &config.documents.asset_dir;
    if dir.is_dir() {
        DoctorCheck {
            name: "assets",
            status: CheckStatus::Pass,
            details: format!("asset directory `{}` present", dir.display()),
        }
    } else {
        DoctorCheck {
            name: "assets",
            status: CheckStatus::Fail,
            details: format!(
                "asset directory `{}` missing, product images will not resolve",
                dir.display()
            ),
        }
    }
}

fn check_pdf_converter() -> DoctorCheck {
    match which::which("wkhtmltopdf") {
        Ok(path) => DoctorCheck {
            name: "pdf_converter",
            status: CheckStatus::Pass,
            details: format!("wkhtmltopdf found at `{}`", path.display()),
        },
        // HTML output is a supported degradation, so absence is not a failure.
        Err(_) => DoctorCheck {
            name: "pdf_converter",
            status: CheckStatus::Skipped,
            details: "wkhtmltopdf not found, documents fall back to HTML".to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
