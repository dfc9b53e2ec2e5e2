use anyhow::Result;
use clap::{Parser, Subcommand};
use gdmods::config::Paths;
use gdmods::lifecycle::ModEvent;
use gdmods::{App, Config};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gdmods")]
#[command(
    author,
    version = gdmods::APP_VERSION,
    about = "Validate Grim Dawn mod layouts and extract game databases"
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify every entry of a mod directory
    Check {
        dir: PathBuf,
        /// Mod name used for the mods/<name>/ prefix (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Rearrange a mod directory into the canonical layout
    Fix {
        dir: PathBuf,
        #[arg(long)]
        name: Option<String>,
        /// Print the planned changes without touching the disk
        #[arg(long)]
        dry_run: bool,
    },

    /// Extract archives with the game's archive tool and merge the results
    Extract {
        /// Destination directory (cleared before merging)
        #[arg(long)]
        dest: PathBuf,
        /// Archive tool override
        #[arg(long)]
        tool: Option<String>,
        #[arg(required = true)]
        archives: Vec<PathBuf>,
    },

    /// Extract the base game databases into the data directory
    ExtractGame {
        /// Extract even when the record says the data is current
        #[arg(long)]
        force: bool,
    },

    /// Print the content digest of a directory
    Hash {
        dir: PathBuf,
        #[arg(long)]
        recursive: bool,
    },

    /// Inspect or write extraction records
    Record {
        #[command(subcommand)]
        action: RecordCommands,
    },

    /// Notify about mod changes
    Mod {
        #[command(subcommand)]
        action: ModCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum RecordCommands {
    /// Show a record file
    Show { file: PathBuf },
    /// Write a record file
    Write {
        file: PathBuf,
        #[arg(long)]
        checksum: String,
        #[arg(long)]
        game_version: String,
    },
}

#[derive(Subcommand)]
enum ModCommands {
    /// A mod was installed at <path>
    Installed { name: String, path: PathBuf },
    /// A mod was removed
    Removed { name: String },
    /// A mod was enabled or disabled
    State {
        name: String,
        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set the Grim Dawn installation directory
    SetGameDir { dir: String },
    /// Set the archive tool path
    SetTool { path: String },
    /// Set the game version stored in extraction records
    SetGameVersion { version: String },
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "gdmods=info",
        1 => "gdmods=debug",
        2 => "gdmods=trace",
        _ => "trace",
    };

    let log_file = Paths::new().log_file();
    if let Some(log_dir) = log_file.parent() {
        std::fs::create_dir_all(log_dir).ok();
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .expect("Failed to open log file");

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
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

    let config = Config::load().await?;
    let app = App::new(config).await?;
    let _hub_logger = app.spawn_hub_logger();

    match cli.command {
        Commands::Check { dir, name } => {
            app.cmd_check(&dir, name.as_deref()).await?;
        }
        Commands::Fix { dir, name, dry_run } => {
            app.cmd_fix(&dir, name.as_deref(), dry_run).await?
        }
        Commands::Extract {
            dest,
            tool,
            archives,
        } => app.cmd_extract(&dest, tool.as_deref(), &archives).await?,
        Commands::ExtractGame { force } => app.cmd_extract_game(force).await?,
        Commands::Hash { dir, recursive } => app.cmd_hash(&dir, recursive).await?,
        Commands::Record { action } => match action {
            RecordCommands::Show { file } => app.cmd_record_show(&file).await?,
            RecordCommands::Write {
                file,
                checksum,
                game_version,
            } => app.cmd_record_write(&file, &checksum, &game_version).await?,
        },
        Commands::Mod { action } => {
            let event = match action {
                ModCommands::Installed { name, path } => ModEvent::Installed { name, path },
                ModCommands::Removed { name } => ModEvent::Removed { name },
                ModCommands::State { name, active } => ModEvent::StateChanged { name, active },
            };
            app.cmd_mod_event(event).await?
        }
        Commands::Config { action } => match action {
            ConfigCommands::Show => app.cmd_config_show().await?,
            ConfigCommands::SetGameDir { dir } => app.cmd_config_set_game_dir(&dir).await?,
            ConfigCommands::SetTool { path } => app.cmd_config_set_tool(&path).await?,
            ConfigCommands::SetGameVersion { version } => {
                app.cmd_config_set_game_version(&version).await?
            }
        },
    }

    Ok(())
}
