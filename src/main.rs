use anyhow::Result;
use clap::{Parser, Subcommand};
use gamedock::config::Paths;
use gamedock::{App, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gamedock")]
#[command(
    author,
    version = "0.2.1",
    about = "A CLI game library manager and launcher for Windows games on Linux"
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Games root override for this invocation
    #[arg(long)]
    games_root: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rescan the install root and rebuild the catalog
    Scan,

    /// List the current catalog
    List,

    /// Search one or all categories
    Search {
        /// Query string; empty returns the full catalog
        query: String,
        /// Category: all, library, bay, apps, peers
        #[arg(long, default_value = "all")]
        category: String,
        /// Maximum results per category (max 50)
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Show metadata for an IGDB game id
    Info {
        /// IGDB game id
        igdb_id: u64,
    },

    /// Launch a title inside its prefix
    Launch {
        /// Title id or exact title name
        title: String,
        /// Explicit launch target (defaults to the first candidate)
        #[arg(long)]
        exe: Option<String>,
    },

    /// Show paths, credentials and runtime checks
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set the games root directory
    SetRoot { path: String },
    /// Set IGDB (Twitch) API credentials
    SetCredentials {
        client_id: String,
        client_secret: String,
    },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "gamedock=info",
        1 => "gamedock=debug",
        2 => "gamedock=trace",
        _ => "trace",
    };

    let log_dir = std::env::var_os("HOME")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".gamedock");

    std::fs::create_dir_all(&log_dir).ok();
    let log_file = log_dir.join("gamedock.log");

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .expect("Failed to open log file");

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::sync::Arc::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    // Load configuration
    let mut config = Config::load().await?;
    if let Some(games_root) = cli.games_root.as_deref() {
        let trimmed = games_root.trim();
        if trimmed.is_empty() {
            anyhow::bail!("--games-root cannot be empty");
        }
        config.games_root_override = Some(trimmed.to_string());
        config.paths = Paths::with_games_root(trimmed.into());
    }

    // Config mutations happen before the app spins up its components.
    if let Commands::Config { action } = &cli.command {
        match action {
            ConfigCommands::Show => {
                let app = App::new(config)?;
                return app.cmd_config_show();
            }
            ConfigCommands::SetRoot { path } => {
                config.set_games_root(path).await?;
                println!("Games root set to {path}");
                return Ok(());
            }
            ConfigCommands::SetCredentials {
                client_id,
                client_secret,
            } => {
                config.set_credentials(client_id, client_secret).await?;
                println!("IGDB credentials saved");
                return Ok(());
            }
        }
    }

    let app = App::new(config)?;

    match cli.command {
        Commands::Scan => app.cmd_scan().await?,
        Commands::List => app.cmd_list().await?,
        Commands::Search {
            query,
            category,
            limit,
        } => app.cmd_search(&query, &category, limit).await?,
        Commands::Info { igdb_id } => app.cmd_info(igdb_id).await?,
        Commands::Launch { title, exe } => app.cmd_launch(&title, exe.as_deref()).await?,
        Commands::Status => app.cmd_status().await?,
        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}
