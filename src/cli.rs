//! Command-line interface definitions.
//!
//! Credentials never go on the command line; they are read from the
//! environment variable named by `--env-var`.

use clap::{Args, Parser, Subcommand};

use crate::quark::DEFAULT_TIMEOUT_SECS;

/// Environment variable holding the account blocks.
pub const DEFAULT_ENV_VAR: &str = "COOKIE_QUARK";

/// Main CLI structure for the Quark check-in tool.
#[derive(Parser)]
#[command(name = "quark-checkin", version, about = "Quark drive daily growth check-in")]
pub struct Cli {
    /// Environment variable to read accounts from
    #[arg(long, global = true, default_value = DEFAULT_ENV_VAR)]
    pub env_var: String,

    /// The subcommand to execute (defaults to `sign`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Check in every configured account
    Sign(SignArgs),
    /// Parse accounts and print them with masked credentials, without network calls
    Accounts,
}

#[derive(Args)]
pub struct SignArgs {
    /// Pause between accounts in seconds (0 disables)
    #[arg(long, default_value_t = 2)]
    pub delay: u64,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
}

impl Default for SignArgs {
    fn default() -> Self {
        Self {
            delay: 2,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}
