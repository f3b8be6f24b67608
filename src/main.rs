//! Quark Check-in
//!
//! Claims the daily Quark drive capacity reward for one or more accounts.
//! Built for scheduled runners: the exit code is non-zero whenever an
//! account was skipped or failed.
//!
//! # Usage
//!
//! ```bash
//! export COOKIE_QUARK="user=main
//! kps=...
//! sign=...
//! vcode=..."
//!
//! # Check in every account
//! quark-checkin sign --delay 2 --timeout 20
//!
//! # Inspect what was parsed, without touching the network
//! quark-checkin accounts
//! ```

mod account;
mod checkin;
mod cli;
mod commands;
mod error;
mod quark;
mod utils;

use clap::Parser;
use cli::Cli;

#[tokio::main]
async fn main() {
    pretty_env_logger::init();
    log::info!("Application started version={}", env!("CARGO_PKG_VERSION"));
    let cli = Cli::parse();

    if let Err(e) = commands::run(cli).await {
        log::error!("Application error: {}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
