use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use faceops_client::{ApiClient, Config, FileSessionStore, Session};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod prompt;

#[derive(Parser)]
#[command(name = "faceops", about = "Operator console for the face-recognition backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Read the password from the first line of stdin
        #[arg(long)]
        password_stdin: bool,
    },
    /// Forget the stored session
    Logout,
    /// Show who the stored session belongs to
    Whoami,
    /// Show backend health
    Health,
    /// User counts, backend state and recent registrations
    Dashboard,
    /// Manage registered users
    #[command(subcommand)]
    Users(UsersCommand),
    /// Register one identity per subfolder of DIR
    Bulk {
        dir: PathBuf,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Only list what would be registered
        #[arg(long)]
        dry_run: bool,
    },
    /// Search for the closest registered face
    Test {
        #[command(flatten)]
        source: ImageSource,
        /// Keep the matched user's stored face at this path
        #[arg(long)]
        save_reference: Option<PathBuf>,
    },
    /// List V4L2 capture devices
    Cameras,
}

#[derive(Subcommand)]
enum UsersCommand {
    /// List users, optionally filtered by name or identity id
    List {
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Register a user from one face image
    Register {
        #[arg(short, long)]
        name: String,
        #[command(flatten)]
        source: ImageSource,
    },
    /// Rename or (de)activate a user
    Update {
        id: i64,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long, conflicts_with = "inactive")]
        active: bool,
        #[arg(long)]
        inactive: bool,
    },
    /// Delete a user
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Download the stored, aligned face crop of a user
    Thumbnail {
        identity_id: String,
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// Where a face image comes from.
#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct ImageSource {
    /// Image file (jpg, jpeg, png, bmp)
    #[arg(long)]
    pub image: Option<PathBuf>,
    /// Capture a still from the configured camera
    #[arg(long)]
    pub camera: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;
    tracing::debug!(api = %config.api_base_url, data_dir = %config.data_dir.display(), "configuration loaded");

    let session = Session::hydrate(FileSessionStore::new(config.session_path()))
        .context("reading stored session")?;
    let mut client = ApiClient::new(&config, session).context("building API client")?;

    match cli.command {
        Commands::Login {
            username,
            password_stdin,
        } => commands::login(&mut client, username, password_stdin).await,
        Commands::Logout => commands::logout(&mut client),
        Commands::Whoami => commands::whoami(&client).await,
        Commands::Health => commands::health(&client).await,
        Commands::Dashboard => commands::dashboard(&client).await,
        Commands::Users(cmd) => match cmd {
            UsersCommand::List { filter } => commands::list_users(&client, filter.as_deref()).await,
            UsersCommand::Register { name, source } => {
                commands::register(&client, &config, &name, &source).await
            }
            UsersCommand::Update {
                id,
                name,
                active,
                inactive,
            } => {
                let is_active = match (active, inactive) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                commands::update(&client, id, name, is_active).await
            }
            UsersCommand::Delete { id, yes } => commands::delete(&client, id, yes).await,
            UsersCommand::Thumbnail { identity_id, out } => {
                commands::thumbnail(&client, &identity_id, &out).await
            }
        },
        Commands::Bulk { dir, yes, dry_run } => commands::bulk(&client, &dir, yes, dry_run).await,
        Commands::Test {
            source,
            save_reference,
        } => commands::face_test(&client, &config, &source, save_reference.as_deref()).await,
        Commands::Cameras => {
            commands::cameras();
            Ok(())
        }
    }
}
