pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "smeta",
    about = "Estimate bot operator CLI",
    long_about = "Price orders, render documents, inspect the catalog and configuration, \
                  and run readiness checks without the bot.",
    after_help = "Examples:\n  smeta estimate --order order.json\n  smeta render --order order.json --kind estimate --out smeta.pdf\n  smeta doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DocumentKindArg {
    Proposal,
    Estimate,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Price an order file and print the line items and total")]
    Estimate {
        #[arg(long, help = "Order JSON file")]
        order: PathBuf,
        #[arg(long, help = "Catalog TOML file (compiled-in catalog when omitted)")]
        catalog: Option<PathBuf>,
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Render a proposal or estimate document for an order file")]
    Render {
        #[arg(long, help = "Order JSON file")]
        order: PathBuf,
        #[arg(long, value_enum, help = "Document to render")]
        kind: DocumentKindArg,
        #[arg(long, help = "Output path; the extension follows the produced format")]
        out: PathBuf,
        #[arg(long, help = "Catalog TOML file (compiled-in catalog when omitted)")]
        catalog: Option<PathBuf>,
    },
    #[command(about = "List catalog products and services")]
    Catalog {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Inspect effective configuration values with secret redaction")]
    Config,
    #[command(about = "Validate config, template, asset and converter readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Estimate { order, catalog, json } => {
            commands::estimate::run(&order, catalog.as_deref(), json)
        }
        Command::Render { order, kind, out, catalog } => {
            commands::render::run(&order, kind, &out, catalog.as_deref())
        }
        Command::Catalog { json } => {
            commands::CommandResult { exit_code: 0, output: commands::catalog::run(json) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
