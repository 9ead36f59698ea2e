//! # campus-session
//!
//! CLI for driving the campus session synchronizer against a local
//! development backend.
//!
//! ## Commands
//!
//! - `sign-up`: Create an account and its profile
//! - `sign-in`: Sign in with an existing account
//! - `log-out`: Sign out
//! - `update`: Edit the signed-in profile
//! - `status`: Show the current session
//!
//! ## Example
//!
//! ```bash
//! campus-session sign-up --email sam@campus.edu --name Sam --role student
//! campus-session status
//! campus-session update --phone 555-0100
//! campus-session log-out
//! ```
//!
//! Navigation intents are printed as `navigate: <route>` lines. Logs go to
//! stderr; set `RUST_LOG` or pass `-v` for more.

use anyhow::Result;
use campus_session_types::Role;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod backend;
mod commands;
mod config;

use commands::{log_out, sign_in, sign_up, status, update};

/// Campus session synchronizer CLI.
#[derive(Parser, Debug)]
#[command(name = "campus-session")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory holding the backend files, the session snapshot and
    /// session.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account and its profile
    SignUp {
        /// Sign-in email
        #[arg(long, short)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(long, short)]
        password: Option<String>,

        /// Display name
        #[arg(long, short)]
        name: String,

        /// Role (student, faculty, parent, admin, ...)
        #[arg(long, short, default_value = "student")]
        role: String,
    },

    /// Sign in with an existing account
    SignIn {
        /// Sign-in email
        #[arg(long, short)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Sign out
    LogOut,

    /// Edit the signed-in profile
    Update {
        /// New display name
        #[arg(long)]
        name: Option<String>,

        /// New email
        #[arg(long)]
        email: Option<String>,

        /// New phone number
        #[arg(long)]
        phone: Option<String>,
    },

    /// Show the current session
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Determine data directory
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => config::default_data_dir()?,
    };
    config::prepare_data_dir(&data_dir).await?;

    match cli.command {
        Commands::SignUp {
            email,
            password,
            name,
            role,
        } => {
            sign_up::run(&data_dir, &email, password, &name, Role::from(role)).await?;
        }
        Commands::SignIn { email, password } => {
            sign_in::run(&data_dir, &email, password).await?;
        }
        Commands::LogOut => {
            log_out::run(&data_dir).await?;
        }
        Commands::Update { name, email, phone } => {
            update::run(&data_dir, update::UpdateArgs { name, email, phone }).await?;
        }
        Commands::Status => {
            status::run(&data_dir).await?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
