//! sheet-sync command line entry point.

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use sheet_sync::{interval_from_minutes, JobRegistry};
use sheet_sync_cli::commands;
use sheet_sync_cli::config::{resolve_config, target_from, FlagOverrides};
use sheet_sync_cli::Output;

#[derive(Parser)]
#[command(
    name = "sheet-sync",
    about = "Export realtime database records to a spreadsheet endpoint",
    version
)]
struct Cli {
    /// JSON config file (also SHEET_SYNC_CONFIG, or ./sheet-sync.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Spreadsheet endpoint URL.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Realtime database root URL.
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Database auth token.
    #[arg(long, global = true)]
    auth_token: Option<String>,

    /// Read records from a JSON file instead of the realtime database.
    #[arg(long, global = true)]
    store_file: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Which record goes to which sheet.
#[derive(Args)]
struct TargetArgs {
    /// Store path of the record, e.g. `bottles/user1`.
    #[arg(long)]
    path: String,

    /// Spreadsheet id.
    #[arg(long)]
    sheet_id: String,

    /// Sheet (tab) name. Defaults to the configured name, then `Sheet1`.
    #[arg(long)]
    sheet_name: Option<String>,

    /// Range whose top-left cell receives the grid. Defaults to `A1`.
    #[arg(long)]
    range: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the reference spreadsheet endpoint.
    #[cfg(feature = "endpoint")]
    Serve {
        /// Listen address (host:port).
        #[arg(long, default_value = "127.0.0.1:8787")]
        addr: String,

        /// Only accept the spreadsheet ids given with --spreadsheet.
        #[arg(long)]
        strict: bool,

        /// Spreadsheet id known to the endpoint (repeatable).
        #[arg(long = "spreadsheet")]
        spreadsheets: Vec<String>,
    },

    /// Sync one record now.
    Sync {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Sync a record now and then on a fixed interval until Ctrl-C.
    Watch {
        #[command(flatten)]
        target: TargetArgs,

        /// Minutes between syncs. Defaults to the configured interval.
        #[arg(long)]
        interval_minutes: Option<u64>,
    },

    /// Format a JSON record (file or stdin) and print the grid.
    Format {
        /// Record file; reads stdin when omitted.
        file: Option<PathBuf>,
    },

    /// Fetch the endpoint's liveness payload.
    Ping,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   sheet-sync completions bash > ~/.local/share/bash-completion/completions/sheet-sync
    ///   sheet-sync completions zsh > ~/.zfunc/_sheet-sync
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let out = Output::new(cli.json);
    let flags = FlagOverrides {
        endpoint: cli.endpoint.clone(),
        database_url: cli.database_url.clone(),
        auth_token: cli.auth_token.clone(),
    };

    match cli.command {
        #[cfg(feature = "endpoint")]
        Commands::Serve {
            addr,
            strict,
            spreadsheets,
        } => {
            use sheet_sync_cli::endpoint::{EndpointServer, SheetBook};

            let book = if strict {
                if spreadsheets.is_empty() {
                    anyhow::bail!("--strict needs at least one --spreadsheet id");
                }
                SheetBook::strict(spreadsheets)
            } else {
                SheetBook::open()
            };
            EndpointServer::new(book).run(&addr).await?;
        }

        Commands::Sync { target } => {
            let config = resolve_config(cli.config.as_deref(), &flags)?;
            let orchestrator = commands::build_orchestrator(&config, cli.store_file.as_deref())?;
            let target = target_from(
                &config,
                &target.path,
                &target.sheet_id,
                target.sheet_name.as_deref(),
                target.range.as_deref(),
            );
            let outcome = commands::sync(&orchestrator, &target, out).await?;
            if !outcome.success {
                std::process::exit(1);
            }
        }

        Commands::Watch {
            target,
            interval_minutes,
        } => {
            let config = resolve_config(cli.config.as_deref(), &flags)?;
            let orchestrator = commands::build_orchestrator(&config, cli.store_file.as_deref())?;
            let target = target_from(
                &config,
                &target.path,
                &target.sheet_id,
                target.sheet_name.as_deref(),
                target.range.as_deref(),
            );
            let interval = interval_from_minutes(interval_minutes.unwrap_or(config.interval_minutes));
            let registry = JobRegistry::new(orchestrator).with_policy(config.overlap);

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("failed to listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
            };
            if let Some(job) = commands::watch(&registry, target, interval, out, shutdown).await? {
                out.print(&job)?;
            }
        }

        Commands::Format { file } => {
            let text = commands::read_input(file.as_deref())?;
            let grid = commands::format_record(&text)?;
            out.print_grid(&grid)?;
        }

        Commands::Ping => {
            let config = resolve_config(cli.config.as_deref(), &flags)?;
            let sender = commands::build_sender(&config)?;
            commands::ping(&sender, out).await?;
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "sheet-sync", &mut std::io::stdout());
        }
    }

    Ok(())
}
