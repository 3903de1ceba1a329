mod commands;

use clap::{Parser, Subcommand};
use commands::{EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_RESOLUTION_ERROR, EXIT_STORE_ERROR};
use quarry_core::{ChannelVersionMode, Installation};
use quarry_resolve::{QuarryConfig, CONFIG_FILE};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "quarry",
    version,
    about = "Curated artifact installation with revertible history"
)]
struct Cli {
    /// Installation root directory.
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Resolution config file (defaults to quarry.toml in the root, if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install a manifest into an empty installation.
    Install {
        /// Path to the manifest file.
        manifest: PathBuf,
    },
    /// Find or apply updates allowed by the curation policies.
    Update {
        #[command(subcommand)]
        action: UpdateAction,
    },
    /// List revisions, newest first.
    History,
    /// Show what changed between a revision and the current state.
    Changes {
        /// Revision ID or unique prefix.
        revision: String,
    },
    /// Restore the manifest of a revision as a new ROLLBACK revision.
    Revert {
        /// Revision ID or unique prefix.
        revision: String,
    },
    /// List manifest versions published for a channel.
    ChannelVersions {
        /// Channel name from the config.
        channel: String,
        /// List every published version instead of only newer ones.
        #[arg(long, default_value_t = false)]
        available: bool,
    },
    /// Verify the revision journal and stored snapshots.
    Verify,
}

#[derive(Debug, Subcommand)]
enum UpdateAction {
    /// Show proposed updates without applying them.
    List,
    /// Apply every proposed update as a new UPDATE revision.
    Perform {
        /// Apply updates that lower an installed version.
        #[arg(long, default_value_t = false)]
        allow_downgrades: bool,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("QUARRY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .init();

    let result = load_config(&cli.root, cli.config.as_deref())
        .and_then(|config| {
            Installation::open(&cli.root, config).map_err(|e| commands::describe(&e))
        })
        .and_then(|installation| dispatch(&installation, cli.command, cli.json));

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(exit_code_for(&msg))
        }
    }
}

fn dispatch(installation: &Installation, command: Commands, json: bool) -> Result<u8, String> {
    match command {
        Commands::Install { manifest } => commands::install::run(installation, &manifest, json),
        Commands::Update { action } => match action {
            UpdateAction::List => commands::update::list(installation, json),
            UpdateAction::Perform { allow_downgrades } => {
                commands::update::perform(installation, allow_downgrades, json)
            }
        },
        Commands::History => commands::history::run(installation, json),
        Commands::Changes { revision } => commands::changes::run(installation, &revision, json),
        Commands::Revert { revision } => commands::revert::run(installation, &revision, json),
        Commands::ChannelVersions { channel, available } => {
            let mode = if available {
                ChannelVersionMode::Available
            } else {
                ChannelVersionMode::Newer
            };
            commands::channel_versions::run(installation, &channel, mode, json)
        }
        Commands::Verify => commands::verify::run(installation, json),
    }
}

fn load_config(root: &Path, explicit: Option<&Path>) -> Result<QuarryConfig, String> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let candidate = root.join(CONFIG_FILE);
            if !candidate.exists() {
                debug!("no {CONFIG_FILE} in {}, using defaults", root.display());
                return Ok(QuarryConfig::default());
            }
            candidate
        }
    };
    debug!("loading config from {}", path.display());
    QuarryConfig::load(&path).map_err(|e| e.to_string())
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("configuration error:") || msg.starts_with("manifest error:") {
        EXIT_CONFIG_ERROR
    } else if msg.starts_with("store error:") || msg.starts_with("cannot lock installation") {
        EXIT_STORE_ERROR
    } else if msg.starts_with("resolution error:") {
        EXIT_RESOLUTION_ERROR
    } else {
        EXIT_FAILURE
    }
}
