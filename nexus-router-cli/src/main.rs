//! # nexus-router
//!
//! Developer tooling for nexus-router procedure collections.
//!
//! ## Usage
//!
//! ```bash
//! # List every collection and procedure under ./src
//! nexus-router scan
//!
//! # Machine readable report
//! nexus-router scan --json
//!
//! # Fail (exit code 2) when the procedures would not compile into a router
//! nexus-router check
//!
//! # Emit the static registration table
//! nexus-router generate --output src/procedures_gen.rs
//!
//! # Preview without writing
//! nexus-router generate --dry-run
//!
//! # Initialize configuration
//! nexus-router init
//! ```

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use nexus_router::discovery::{scan, scan_verbose};
use nexus_router::{CancellationSignal, DiscoveryResult, OnInvalidExport};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use nexus_router_cli::{
    config::{CONFIG_FILENAME, CliArgs, Config, ConfigManager},
    error::CliError,
    generator::RegistrationGenerator,
    logging,
    report::ScanReport,
    writer::{FileWriter, WriteResult},
};

#[derive(Parser)]
#[command(name = "nexus-router")]
#[command(author, version, about = "Discover, check and register nexus-router procedures", long_about = None)]
struct Cli {
    /// Log discovery details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List discovered collections, warnings and conflicts
    Scan {
        #[command(flatten)]
        discovery: DiscoveryArgs,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan and compile; exit with code 2 when the router would be rejected
    Check {
        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Generate the static registration table
    Generate {
        #[command(flatten)]
        discovery: DiscoveryArgs,

        /// Generated Rust file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Context type the procedures receive
        #[arg(long)]
        context_type: Option<String>,

        /// Preview changes without writing files
        #[arg(long)]
        dry_run: bool,
    },

    /// Initialize a new nexus-router configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = CONFIG_FILENAME)]
        output: PathBuf,

        /// Overwrite existing configuration file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct DiscoveryArgs {
    /// Directory to scan
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Only load files whose root-relative path matches this glob
    #[arg(long)]
    filter: Option<String>,

    /// ignore, warn or error
    #[arg(long)]
    on_invalid_export: Option<OnInvalidExport>,

    /// Do not descend into sub-directories
    #[arg(long)]
    no_recursive: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl DiscoveryArgs {
    fn load(&self, output: Option<PathBuf>, context_type: Option<String>) -> Result<Config, CliError> {
        let config = ConfigManager::load(self.config.as_deref())?;
        let config = ConfigManager::merge_cli_args(
            config,
            &CliArgs {
                root: self.root.clone(),
                filter: self.filter.clone(),
                on_invalid_export: self.on_invalid_export,
                no_recursive: self.no_recursive,
                output,
                context_type,
            },
        );
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{} {:#}", "Warning:".yellow(), e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_error(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Scan { discovery, json } => cmd_scan(discovery, json).await,
        Commands::Check { discovery } => cmd_check(discovery).await,
        Commands::Generate {
            discovery,
            output,
            context_type,
            dry_run,
        } => cmd_generate(discovery, output, context_type, dry_run).await,
        Commands::Init { output, force } => cmd_init(output, force),
    }
}

/// Run a scan that Ctrl+C cancels.
///
/// Non-strict scans record `error`-policy exports as warnings instead of failing.
async fn discover(config: &Config, strict: bool) -> Result<DiscoveryResult, CliError> {
    let signal = Arc::new(CancellationSignal::new());
    let options = config.discovery.options()?.cancellation(signal.clone());

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal.cancel();
        }
    });

    let root = &config.discovery.root;
    let result = if strict {
        scan(root, &options).await
    } else {
        scan_verbose(root, &options).await
    };
    interrupt.abort();

    Ok(result?)
}

/// Scan command implementation.
async fn cmd_scan(args: DiscoveryArgs, json: bool) -> Result<(), CliError> {
    let config = args.load(None, None)?;
    if !json {
        println!("{}", "Scanning for procedure collections...".cyan());
    }

    let result = discover(&config, false).await?;
    let report = ScanReport::new(&config.discovery.root, &result);

    if json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report.render_text());
    }
    Ok(())
}

/// Check command implementation.
async fn cmd_check(args: DiscoveryArgs) -> Result<(), CliError> {
    let config = args.load(None, None)?;
    println!("{}", "Checking procedure collections...".cyan());

    let result = discover(&config, true).await?;
    let report = ScanReport::new(&config.discovery.root, &result);
    print!("{}", report.render_text());

    if report.is_rejected() {
        println!("{} Router would be rejected", "✗".red());
        return Err(CliError::Validation(format!(
            "{} routing conflict(s)",
            report.conflicts.len()
        )));
    }

    println!("{} No routing conflicts", "✓".green());
    Ok(())
}

/// Generate command implementation.
async fn cmd_generate(
    args: DiscoveryArgs,
    output: Option<PathBuf>,
    context_type: Option<String>,
    dry_run: bool,
) -> Result<(), CliError> {
    let config = args.load(output, context_type)?;
    println!("{}", "Scanning for procedure collections...".cyan());

    let result = discover(&config, true).await?;
    println!(
        "  Found {} collection(s), {} procedure(s) in {} file(s)",
        result.collections.len().to_string().green(),
        result.procedure_count().to_string().green(),
        result.scanned_files.len()
    );
    for warning in &result.warnings {
        println!("  {} {}", "warning".yellow(), warning);
    }

    println!("{}", "Generating registration table...".cyan());
    let generator = RegistrationGenerator::new(config.codegen.clone());
    let table = generator.generate(&result.collections)?;

    let writer = FileWriter::new(dry_run);
    match writer.write(&config.codegen.output, &table.content)? {
        WriteResult::Written { path, bytes } => {
            println!(
                "{} Written {} bytes to {}",
                "✓".green(),
                bytes,
                path.display()
            );
        }
        WriteResult::Unchanged { path } => {
            println!("{} {} is up to date", "✓".green(), path.display());
        }
        WriteResult::DryRun { content, path } => {
            println!(
                "{} Would write to {}:",
                "[dry-run]".yellow(),
                path.display()
            );
            println!("{}", "─".repeat(60).dimmed());
            println!("{}", content);
            println!("{}", "─".repeat(60).dimmed());
        }
    }

    Ok(())
}

/// Init command implementation.
fn cmd_init(output: PathBuf, force: bool) -> Result<(), CliError> {
    if output.exists() && !force {
        println!("  Use --force to overwrite");
        return Err(CliError::Validation(format!(
            "Configuration file already exists: {}",
            output.display()
        )));
    }

    std::fs::write(&output, ConfigManager::default_config_content())?;

    println!(
        "{} Created configuration file: {}",
        "✓".green(),
        output.display()
    );

    Ok(())
}

/// Print an error with formatting.
fn print_error(error: &CliError) {
    eprintln!("{} {}", "Error:".red().bold(), error);
}
