//! SharkFin command line
//!
//! Evaluates access checks and manages direct grants and blocks against the
//! configured graph relation store.

use clap::{Parser, Subcommand};
use shark_fin::{
    access::{AccessRequest, SharkFin},
    config::{AppConfig, LogFormat, load_config},
    store::HttpGraphStore,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// SharkFin - layered access decisions over ranked actions and layer policies
#[derive(Parser, Debug)]
#[command(name = "shark-fin")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SHARKFIN_CONFIG")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error); overrides [logging].level
    #[arg(long, env = "SHARKFIN_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decide whether a user may perform an action
    Check {
        #[arg(long)]
        user: String,
        #[arg(long)]
        action: String,
        /// Layer path, e.g. school.classroom
        #[arg(long)]
        layer: Option<String>,
        /// Layer variant, e.g. staff
        #[arg(long)]
        variant: Option<String>,
        /// Node path, e.g. s1.c7
        #[arg(long)]
        node: Option<String>,
        /// Treat the user as the owner of the node
        #[arg(long)]
        owner: bool,
    },
    /// Grant direct access to a node
    Grant {
        #[arg(long)]
        user: String,
        #[arg(long)]
        node: String,
        #[arg(long)]
        action: String,
    },
    /// Remove direct access (grant or block) from a node
    Revoke {
        #[arg(long)]
        user: String,
        #[arg(long)]
        node: String,
    },
    /// Block a user on every node path containing the prefix
    Block {
        #[arg(long)]
        user: String,
        #[arg(long)]
        node: String,
        /// Record a direct block on this exact node instead
        #[arg(long)]
        direct: bool,
    },
    /// Lift a prefix block
    Unblock {
        #[arg(long)]
        user: String,
        #[arg(long)]
        node: String,
    },
    /// Print ranks and layer policies as loaded
    Layers,
}

fn init_logging(config: &AppConfig, cli_level: Option<&str>) {
    let level = cli_level.unwrap_or(config.logging.level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

fn print_layers(engine: &SharkFin) -> anyhow::Result<()> {
    println!("# actions");
    for (action, rank) in engine.ranks().ordered() {
        println!("{} = {}", action, rank);
    }

    for entry in engine.layers().entries() {
        println!();
        println!("[{}._{}]", entry.layer, entry.variant);
        print!("{}", toml::to_string(entry.policy)?);
    }
    Ok(())
}

async fn run(args: Args, config: AppConfig) -> anyhow::Result<ExitCode> {
    let store = Arc::new(
        HttpGraphStore::new(&config.store)
            .inspect_err(|e| error!(error = %e, "Failed to create graph store client"))?,
    );

    let engine = SharkFin::from_config(&config.access, store)
        .inspect_err(|e| error!(error = %e, "Failed to create access engine"))?;

    match args.command {
        Command::Check {
            user,
            action,
            layer,
            variant,
            node,
            owner,
        } => {
            let request = AccessRequest {
                layer,
                variant,
                user_id: user,
                node_id: node,
                action,
                is_owner: owner,
            };
            let decision = engine.decide(&request).await?;
            let verdict = if decision.is_granted() {
                "granted"
            } else {
                "denied"
            };
            println!("{}: {}", verdict, decision.rule());
            return Ok(if decision.is_granted() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            });
        }
        Command::Grant { user, node, action } => {
            engine.add_direct_access(&user, &node, &action).await?;
            info!(user = %user, node = %node, action = %action, "Direct access granted");
        }
        Command::Revoke { user, node } => {
            engine.remove_direct_access(&user, &node).await?;
            info!(user = %user, node = %node, "Direct access removed");
        }
        Command::Block { user, node, direct } => {
            if direct {
                engine.block_direct_access(&user, &node).await?;
            } else {
                engine.block_user(&user, &node).await?;
            }
        }
        Command::Unblock { user, node } => {
            engine.unblock_user(&user, &node).await?;
        }
        Command::Layers => print_layers(&engine)?,
    }

    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration before logging so [logging] can shape the subscriber
    let config = load_config(args.config.as_deref())?;

    init_logging(&config, args.log_level.as_deref());

    info!(
        version = env!("CARGO_PKG_VERSION"),
        store = %config.store.url,
        "Starting shark-fin"
    );

    run(args, config).await
}
