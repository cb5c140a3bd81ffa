//! Command-line interface.
//!
//! ```text
//! portico [--config config.toml] [COMMAND]
//!
//!   (none)        version, OS, architecture and CPU count
//!   server        run the HTTP server
//!   monitor       run the server with a live per-route request table
//!   createuser    add a user
//!   setpassword   change a user's password
//!   migrate       up | down | step <n>
//!   hexkey        random hex key for SESSION_KEY
//! ```
//!
//! Commands return a [`Failure`] carrying a BSD sysexits code; `main` turns
//! it into the process exit status.

mod info;
mod keys;
mod migrate;
mod server;
mod users;

use std::fmt;
use std::path::PathBuf;

use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};

use crate::config::Config;

pub use info::print_system_info;
pub use keys::generate_hex_key;

#[derive(Debug, Parser)]
#[command(name = "portico", version)]
#[command(about = "Server-rendered web application with sessions, CSRF and rate-limited login")]
pub struct Cli {
    /// Path to the TOML config file; a missing file means defaults plus environment
    #[arg(short, long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP server
    Server,
    /// Run the server and print per-route request statistics every second instead of request logs
    Monitor,
    /// Create a new user
    Createuser {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short = 'f', long = "first-name")]
        first_name: String,
        #[arg(short = 'l', long = "last-name")]
        last_name: String,
    },
    /// Set the password of an existing user
    Setpassword {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Apply or revert database migrations
    Migrate {
        #[command(subcommand)]
        direction: MigrateCommand,
    },
    /// Print a random hex encoded key
    Hexkey {
        /// Key length in bytes
        #[arg(
            short,
            long,
            default_value_t = 64,
            value_parser = RangedU64ValueParser::<usize>::new().range(1..=keys::MAX_KEY_LEN as u64)
        )]
        length: usize,
    },
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum MigrateCommand {
    /// Apply all pending migrations
    Up,
    /// Revert all applied migrations
    Down,
    /// Apply N pending migrations, or revert -N applied ones
    Step {
        #[arg(allow_negative_numbers = true)]
        n: i64,
    },
}

impl Command {
    /// Commands that run the HTTP server.
    pub fn serves_http(&self) -> bool {
        matches!(self, Command::Server | Command::Monitor)
    }
}

/// A failed command: what went wrong and the exit code to report.
#[derive(Debug)]
pub struct Failure {
    pub code: exitcode::ExitCode,
    pub error: anyhow::Error,
}

impl Failure {
    pub fn new(code: exitcode::ExitCode, error: impl Into<anyhow::Error>) -> Self {
        Self {
            code,
            error: error.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.error)
    }
}

pub type CliResult = Result<(), Failure>;

/// Attach an exit code and context to an error.
pub trait OrExit<T> {
    fn or_exit(self, code: exitcode::ExitCode, context: &'static str) -> Result<T, Failure>;
}

impl<T, E> OrExit<T> for Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn or_exit(self, code: exitcode::ExitCode, context: &'static str) -> Result<T, Failure> {
        self.map_err(|e| Failure::new(code, e.into().context(context)))
    }
}

/// Run the selected command.
pub async fn run(command: Option<Command>, config: Config) -> CliResult {
    match command {
        None => {
            print_system_info(&mut std::io::stdout()).or_exit(exitcode::IOERR, "write failed")
        }
        Some(Command::Server) => server::serve(config, None).await,
        Some(Command::Monitor) => server::monitor(config).await,
        Some(Command::Createuser {
            email,
            password,
            first_name,
            last_name,
        }) => users::create_user(&config, email, password, first_name, last_name).await,
        Some(Command::Setpassword { email, password }) => {
            users::set_password(&config, email, password).await
        }
        Some(Command::Migrate { direction }) => migrate::migrate(&config, direction).await,
        Some(Command::Hexkey { length }) => keys::print_hex_key(length),
    }
}
