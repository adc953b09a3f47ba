//! `hostel-server` entry point.
//!
//! ## Modes
//!
//! - **`serve`** (default): open the database, apply migrations and serve
//!   HTTP until Ctrl+C.
//! - **`migrate`**: apply migrations and exit.
//! - **`add-user`**: create an account and print its id. This is how the
//!   first admin gets an id to put in `X-Hostel-User`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hostel_core::users::{self, NewUser};
use hostel_core::{HostelConfig, Role, db, sql};
use hostel_server::App;
use hostel_server::http;

#[derive(Debug, Parser)]
#[command(name = "hostel-server", version, about = "Hostel back-office HTTP service")]
struct Cli {
    /// Path to hostel.toml (defaults to $HOSTEL_CONFIG, then ~/.config/hostel/hostel.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Listen address, overriding `[server] bind`.
    #[arg(long, global = true)]
    bind: Option<String>,

    /// SQLite database path, overriding `db_path`.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Option<Command>,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Serve the HTTP API (default).
    Serve,

    /// Apply pending schema migrations and exit.
    Migrate,

    /// Create an account and print its id.
    AddUser(AddUserArgs),
}

#[derive(Debug, Parser)]
struct AddUserArgs {
    #[arg(long)]
    username: String,

    /// admin, warden, deputy_rt, mess_staff or student
    #[arg(long, default_value = "admin")]
    role: String,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<HostelConfig> {
        let mut config = HostelConfig::load(self.config.as_deref())?;
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(db) = &self.db {
            config.db_path = db.display().to_string();
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    match cli.cmd.unwrap_or(Command::Serve) {
        Command::Serve => serve(config),
        Command::Migrate => migrate(config),
        Command::AddUser(args) => add_user(config, &args),
    }
}

#[tokio::main]
async fn serve(config: HostelConfig) -> anyhow::Result<()> {
    tracing::info!("hostel-server v{} starting", env!("CARGO_PKG_VERSION"));

    let bind = config.server.bind.clone();
    let workers = config.server.workers;
    let app = Arc::new(App::open(config).context("failed to open database")?);
    let handle = http::start(app, &bind, workers)?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    tracing::info!("Signal received, shutting down");

    tokio::task::spawn_blocking(move || handle.shutdown()).await?;
    tracing::info!("hostel-server exiting cleanly");
    Ok(())
}

fn migrate(config: HostelConfig) -> anyhow::Result<()> {
    let app = App::open(config)?;
    let conn = app.conn()?;
    let version = db::schema_version(&conn)?;
    tracing::info!(version, "database is at the latest schema");
    Ok(())
}

fn add_user(config: HostelConfig, args: &AddUserArgs) -> anyhow::Result<()> {
    let role: Role = sql::parse_field("role", &args.role)?;
    let app = App::open(config)?;
    let conn = app.conn()?;
    let user = users::create_user(
        &conn,
        &NewUser {
            username: args.username.clone(),
            role: Some(role),
            ..NewUser::default()
        },
    )?;
    println!("{}", user.id);
    Ok(())
}
