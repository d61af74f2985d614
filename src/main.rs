// Copyright 2026 Portico Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use portico_runtime::cli;
use portico_runtime::cli::fetch_cmd::FetchKind;

#[derive(Parser)]
#[command(
    name = "portico",
    about = "Portico — academic portal fetcher driving a real browser",
    version,
    after_help = "Run 'portico <command> --help' for details on each command.\nThe portal password is read from PORTICO_SECRET (or the variable named by --secret-env)."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify portal credentials without fetching any dataset
    Login {
        /// Student identifier (enrollment number or national ID)
        identifier: String,
        /// Environment variable holding the portal password
        #[arg(long, default_value = "PORTICO_SECRET")]
        secret_env: String,
    },
    /// Fetch current-term grades
    Grades {
        /// Student identifier (enrollment number or national ID)
        identifier: String,
        /// Environment variable holding the portal password
        #[arg(long, default_value = "PORTICO_SECRET")]
        secret_env: String,
    },
    /// Fetch the full academic transcript
    Transcript {
        /// Student identifier (enrollment number or national ID)
        identifier: String,
        /// Environment variable holding the portal password
        #[arg(long, default_value = "PORTICO_SECRET")]
        secret_env: String,
    },
    /// Fetch the degree curriculum matrix
    Curriculum {
        /// Student identifier (enrollment number or national ID)
        identifier: String,
        /// Environment variable holding the portal password
        #[arg(long, default_value = "PORTICO_SECRET")]
        secret_env: String,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("PORTICO_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("PORTICO_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("PORTICO_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("PORTICO_NO_COLOR", "1");
    }

    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Login {
            identifier,
            secret_env,
        } => cli::fetch_cmd::run_login(&identifier, &secret_env).await,
        Commands::Grades {
            identifier,
            secret_env,
        } => cli::fetch_cmd::run_fetch(FetchKind::Grades, &identifier, &secret_env).await,
        Commands::Transcript {
            identifier,
            secret_env,
        } => cli::fetch_cmd::run_fetch(FetchKind::Transcript, &identifier, &secret_env).await,
        Commands::Curriculum {
            identifier,
            secret_env,
        } => cli::fetch_cmd::run_fetch(FetchKind::Curriculum, &identifier, &secret_env).await,
        Commands::Doctor => cli::doctor::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "portico", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}

/// Logs go to stderr so `--json` output on stdout stays parseable.
/// `PORTICO_LOG` takes a full filter spec and overrides `--verbose`.
fn init_tracing(verbose: bool) {
    let directive = if verbose {
        "portico_runtime=debug"
    } else {
        "portico_runtime=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_env("PORTICO_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
