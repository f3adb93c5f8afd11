//! Trellis CLI - Compile filter parameters for queries and dashboards
//!
//! Usage:
//!   trellis card <params.json> [--metadata <snapshot.json>]
//!   trellis dashboard <params.json> [--dashcards <dashcards.json>]
//!   trellis check <params.json> --scope card|dashboard
//!
//! Examples:
//!   trellis card demos/order_filters.json --metadata demos/metadata.json
//!   trellis dashboard demos/sales_filters.json --dashcards demos/sales_cards.json
//!   trellis check demos/sales_filters.json --scope dashboard

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use trellis::compile::{
    compile_dashboard_layout, compile_dashboard_parameters, compile_query_parameters,
    CompileOptions,
};
use trellis::config::Settings;
use trellis::metadata::SnapshotMetadataProvider;
use trellis::params::{schema, Scope};
use trellis::validation::{check_business_rules, CompileResult};

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Trellis - Compile name-addressed filters into host query and dashboard parameters")]
#[command(version)]
struct Cli {
    /// Metadata snapshot to validate references against (overrides config)
    #[arg(short, long, global = true)]
    metadata: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile query parameters and their template tags
    Card {
        /// JSON file holding a list of parameter specs
        file: PathBuf,
    },

    /// Compile dashboard parameters, optionally linking dashcards
    Dashboard {
        /// JSON file holding a list of parameter specs
        file: PathBuf,

        /// JSON file holding a list of dashcards to link
        #[arg(short, long)]
        dashcards: Option<PathBuf>,
    },

    /// Run the schema and business-rule stages without metadata lookups
    Check {
        /// JSON file holding a list of parameter specs
        file: PathBuf,

        /// Scope the specs are checked for
        #[arg(short, long, default_value = "card")]
        scope: ScopeArg,
    },
}

#[derive(Clone, ValueEnum)]
enum ScopeArg {
    /// Parameters of a single native query
    Card,
    /// Parameters of a dashboard
    Dashboard,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Card => Scope::Query,
            ScopeArg::Dashboard => Scope::Dashboard,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings);

    let options = CompileOptions::from_settings(&settings);

    match cli.command {
        Commands::Card { file } => {
            let Some(provider) = load_provider(cli.metadata, &settings).await else {
                return ExitCode::FAILURE;
            };
            let Some(raw) = read_json_list(&file) else {
                return ExitCode::FAILURE;
            };
            report(compile_query_parameters(&raw, &provider, options).await)
        }
        Commands::Dashboard { file, dashcards } => {
            let Some(provider) = load_provider(cli.metadata, &settings).await else {
                return ExitCode::FAILURE;
            };
            let Some(raw) = read_json_list(&file) else {
                return ExitCode::FAILURE;
            };
            match dashcards {
                Some(path) => {
                    let Some(cards) = read_json_list(&path) else {
                        return ExitCode::FAILURE;
                    };
                    report(compile_dashboard_layout(&raw, &cards, &provider, options).await)
                }
                None => report(compile_dashboard_parameters(&raw, &provider, options).await),
            }
        }
        Commands::Check { file, scope } => {
            let Some(raw) = read_json_list(&file) else {
                return ExitCode::FAILURE;
            };
            cmd_check(&raw, scope.into())
        }
    }
}

/// `RUST_LOG` wins over the configured filter. Logs go to stderr.
fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn load_provider(
    flag: Option<PathBuf>,
    settings: &Settings,
) -> Option<SnapshotMetadataProvider> {
    let path = match flag {
        Some(path) => Some(path),
        None => match settings.metadata.snapshot_path() {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Error resolving metadata snapshot path: {}", e);
                return None;
            }
        },
    };

    let Some(path) = path else {
        tracing::warn!("no metadata snapshot configured; every reference lookup will fail");
        return Some(SnapshotMetadataProvider::new());
    };

    match SnapshotMetadataProvider::load(&path).await {
        Ok(provider) => Some(provider),
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn read_json_list(file: &Path) -> Option<Vec<Value>> {
    let source = match fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", file.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<Value>(&source) {
        Ok(Value::Array(items)) => Some(items),
        Ok(_) => {
            eprintln!("Error: '{}' must contain a JSON list", file.display());
            None
        }
        Err(e) => {
            eprintln!("Error parsing '{}': {}", file.display(), e);
            None
        }
    }
}

fn cmd_check(raw: &[Value], scope: Scope) -> ExitCode {
    let checked = schema::parse_parameters(raw, scope)
        .and_then(|specs| check_business_rules(&specs, scope).map(|_| specs.len()));

    match checked {
        Ok(count) => {
            println!("OK: {} {} parameter(s) are valid", count, scope);
            ExitCode::SUCCESS
        }
        Err(failure) => {
            print_json(&failure);
            ExitCode::FAILURE
        }
    }
}

fn report<T: Serialize>(result: CompileResult<T>) -> ExitCode {
    match result {
        Ok(compiled) => {
            print_json(&compiled);
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("Compilation failed: {}", failure);
            print_json(&failure);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}
