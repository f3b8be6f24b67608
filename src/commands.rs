//! Command execution logic.
//!
//! Reads the account variable, then either runs the check-in for every
//! account or lists the parsed accounts.

use std::time::Duration;

use crate::account::{self, AccountParam};
use crate::checkin::Runner;
use crate::cli::{Cli, Commands, SignArgs};
use crate::quark::QuarkClient;
use crate::utils;

/// Executes the CLI command specified in the parsed arguments.
///
/// # Errors
///
/// Returns `Err(String)` if:
/// - No account could be parsed from the environment variable
/// - The HTTP client cannot be built
/// - Any account was skipped or failed (the message lists each of them)
pub async fn run(cli: Cli) -> Result<(), String> {
    let raw = std::env::var(&cli.env_var).ok();
    let accounts = account::parse_accounts(raw.as_deref());

    match cli.command {
        Some(Commands::Accounts) => list_accounts(&cli.env_var, &accounts),
        Some(Commands::Sign(args)) => sign(&cli.env_var, &accounts, &args).await,
        None => sign(&cli.env_var, &accounts, &SignArgs::default()).await,
    }
}

async fn sign(env_var: &str, accounts: &[AccountParam], args: &SignArgs) -> Result<(), String> {
    println!("---------- 夸克网盘开始签到 (Quark check-in started) [{}] ----------", utils::now_timestamp());

    if accounts.is_empty() {
        return Err(format!("未检测到 {env_var} 环境变量或其中没有账号 (no accounts found in {env_var})"));
    }
    println!("✅ 检测到共 {} 个夸克账号 ({} accounts detected)", accounts.len(), accounts.len());

    let client = QuarkClient::new(Duration::from_secs(args.timeout)).map_err(|e| {
        log::error!("Failed to build HTTP client: {}", e);
        format!("无法创建 HTTP 客户端: {e}")
    })?;
    let runner = Runner::new(client, Duration::from_secs(args.delay));
    let report = runner.run(accounts).await;

    println!(
        "\n---------- 夸克网盘签到结束 (finished): 成功 {} / 跳过 {} / 失败 {} ----------",
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len()
    );

    match report.failure_summary() {
        Some(summary) => Err(summary),
        None => Ok(()),
    }
}

fn list_accounts(env_var: &str, accounts: &[AccountParam]) -> Result<(), String> {
    if accounts.is_empty() {
        return Err(format!("未检测到 {env_var} 环境变量或其中没有账号 (no accounts found in {env_var})"));
    }

    println!("检测到 {} 个账号 (accounts) in {env_var}:", accounts.len());
    for (index, account) in accounts.iter().enumerate() {
        let masked = |value: &Option<String>| value.as_deref().map_or_else(|| "-".to_string(), utils::mask_secret);
        let status = match account.credentials() {
            Ok(_) => "ready".to_string(),
            Err(e) => e.to_string(),
        };
        println!(
            "{}. {}\n   kps:    {}\n   sign:   {}\n   vcode:  {}\n   cookie: {}\n   status: {}",
            index + 1,
            account.user,
            masked(&account.kps),
            masked(&account.sign),
            masked(&account.vcode),
            if account.cookie.is_some() { "set" } else { "-" },
            status
        );
    }
    Ok(())
}
