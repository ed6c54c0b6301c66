use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use devlabd::{config::DaemonConfig, rest, storage::Storage, AppContext};

#[derive(Parser)]
#[command(
    name = "devlabd",
    about = "DevLab — project management REST backend daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// REST server port
    #[arg(long, env = "DEVLAB_PORT")]
    port: Option<u16>,

    /// Data directory for config and the SQLite database
    #[arg(long, env = "DEVLAB_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Bind address (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "DEVLAB_BIND")]
    bind_address: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DEVLAB_LOG")]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the REST server (default when no subcommand given).
    Serve,
    /// Manage user accounts — the provisioning path for identities.
    ///
    /// User records are otherwise only writable through the admin API;
    /// this is how the first staff account comes to exist.
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage API bearer tokens.
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user account.
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        /// Grant the staff (admin) flag.
        #[arg(long)]
        staff: bool,
    },
    /// List all user accounts.
    List,
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a bearer token for a user and print it.
    Issue {
        #[arg(long)]
        user_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log.clone().unwrap_or_else(|| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(format!("devlabd={log_level}"))
        .compact()
        .init();

    let config = Arc::new(DaemonConfig::load(
        args.data_dir.clone(),
        args.port,
        args.bind_address.clone(),
    ));
    let storage = Arc::new(
        Storage::new_with_slow_query(&config.data_dir, config.slow_query_ms).await?,
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!(
                data_dir = %config.data_dir.display(),
                "devlabd v{} starting",
                env!("CARGO_PKG_VERSION")
            );
            let ctx = Arc::new(AppContext::new(config, storage));
            rest::start_rest_server(ctx).await
        }
        Command::User { action } => match action {
            UserAction::Add {
                username,
                email,
                staff,
            } => {
                let user = storage.create_user(&username, &email, staff).await?;
                println!(
                    "created user {} (id {}{})",
                    user.username,
                    user.id,
                    if user.is_staff { ", staff" } else { "" }
                );
                Ok(())
            }
            UserAction::List => {
                for user in storage.list_users().await? {
                    println!(
                        "{:>5}  {}{}  <{}>",
                        user.id,
                        user.username,
                        if user.is_staff { " [staff]" } else { "" },
                        user.email
                    );
                }
                Ok(())
            }
        },
        Command::Token { action } => match action {
            TokenAction::Issue { user_id } => {
                let token = storage.issue_token(user_id).await?;
                println!("{token}");
                Ok(())
            }
        },
    }
}
