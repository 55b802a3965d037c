//! Overlook CLI: inspect identifiers, scopes and engine configuration.
//!
//! Usage:
//!   overlook parse-id <identifier> [--json]
//!   overlook scope <account> [region]
//!   overlook config [--path] [--file path]

use clap::{Parser, Subcommand};
use overlook::{format_scope, parse_identifier, parse_scope, EngineConfig};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(
    name = "overlook",
    version,
    about = "Uniform Get/List/Search adapters for cloud resource APIs"
)]
struct Cli {
    /// Log verbosity (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a fully-qualified resource identifier
    ParseId {
        identifier: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Format an account and optional region into a scope
    Scope {
        account: String,
        region: Option<String>,
    },
    /// Show the effective engine configuration
    Config {
        /// Only print where the configuration file is read from
        #[arg(long)]
        path: bool,
        /// Read this file instead of the default location
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

fn cmd_parse_id(identifier: &str, json: bool) -> i32 {
    let parsed = match parse_identifier(identifier) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if json {
        match serde_json::to_string_pretty(&parsed) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
        return 0;
    }

    println!("{:<12}  {}", "scheme", parsed.scheme);
    println!("{:<12}  {}", "partition", parsed.partition);
    println!("{:<12}  {}", "service", parsed.service);
    println!("{:<12}  {}", "region", parsed.region);
    println!("{:<12}  {}", "account", parsed.account_id);
    println!("{:<12}  {}", "resource", parsed.resource);
    println!("{:<12}  {}", "resource id", parsed.resource_id());
    println!("{:<12}  {}", "scope", parsed.scope());
    0
}

fn cmd_scope(account: &str, region: Option<&str>) -> i32 {
    let scope = format_scope(account, region.unwrap_or_default());
    let (parsed_account, parsed_region) = parse_scope(&scope);
    tracing::debug!(scope = %scope, account = parsed_account, region = ?parsed_region, "formatted scope");
    println!("{}", scope);
    0
}

fn cmd_config(path_only: bool, file: Option<PathBuf>) -> i32 {
    if path_only {
        match file.or_else(EngineConfig::default_path) {
            Some(path) => {
                println!("{}", path.display());
                return 0;
            }
            None => {
                eprintln!("Error: no configuration directory on this platform");
                return 1;
            }
        }
    }

    let loaded = match file {
        Some(path) => EngineConfig::load(&path),
        None => EngineConfig::load_or_default(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    match config.to_yaml() {
        Ok(yaml) => {
            print!("{}", yaml);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: could not install log subscriber: {}", e);
    }

    let code = match cli.command {
        Commands::ParseId { identifier, json } => cmd_parse_id(&identifier, json),
        Commands::Scope { account, region } => cmd_scope(&account, region.as_deref()),
        Commands::Config { path, file } => cmd_config(path, file),
    };
    std::process::exit(code);
}
