//! Check-in runner.
//!
//! Processes accounts one after another: validate credentials, query the
//! growth info, sign if today's sign is still open. Every error is local to
//! its account and ends up in the [`RunReport`].
//!
//! JSON fields are looked up with a fixed fallback order:
//! - message: `message`, then `msg`, then `未知返回`
//! - payload: `data`, then `result`, then the whole body
//!
//! A field only counts when it is truthy (non-null, non-empty, non-zero).

use std::time::Duration;

use serde_json::{Map, Value};

use crate::account::{AccountParam, Credentials};
use crate::error::{CheckinError, Result, Stage};
use crate::quark::{ApiReply, GrowthApi};
use crate::utils;

const UNKNOWN_MESSAGE: &str = "未知返回";
const MISSING_CODE: &str = "缺失 (missing)";

/// Result of processing one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Skipped(String),
    Failed(String),
}

/// Per-account outcomes, in processing order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub succeeded: Vec<(String, String)>,
    pub skipped: Vec<(String, String)>,
    pub failed: Vec<(String, String)>,
}

impl RunReport {
    fn record(&mut self, user: &str, outcome: Outcome) {
        let user = user.to_string();
        match outcome {
            Outcome::Success(detail) => self.succeeded.push((user, detail)),
            Outcome::Skipped(reason) => self.skipped.push((user, reason)),
            Outcome::Failed(reason) => self.failed.push((user, reason)),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.skipped.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }

    /// Lists every skipped and failed account, or `None` if all succeeded.
    pub fn failure_summary(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }

        let count = self.skipped.len() + self.failed.len();
        let mut lines = vec![format!("{count} 个账号需要处理 ({count} accounts need attention)")];
        lines.extend(
            self.skipped
                .iter()
                .map(|(user, reason)| format!("  ⏭️ [{user}] 跳过: {reason}")),
        );
        lines.extend(
            self.failed
                .iter()
                .map(|(user, reason)| format!("  ❌ [{user}] 失败: {reason}")),
        );
        Some(lines.join("\n"))
    }
}

/// Growth state read from the info payload.
#[derive(Debug, Default, PartialEq)]
struct GrowthInfo {
    is_vip: bool,
    signed_today: bool,
    total_capacity: Option<u64>,
    daily_reward: Option<u64>,
    progress: Option<(u64, u64)>,
}

impl GrowthInfo {
    fn from_payload(payload: &Map<String, Value>) -> Self {
        let cap_sign = payload.get("cap_sign");
        let cap_field = |key: &str| cap_sign.and_then(|c| c.get(key)).and_then(Value::as_u64);

        Self {
            is_vip: payload.get("88VIP").and_then(Value::as_bool).unwrap_or(false),
            signed_today: cap_sign
                .and_then(|c| c.get("sign_daily"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            total_capacity: payload.get("total_capacity").and_then(Value::as_u64),
            daily_reward: cap_field("sign_daily_reward"),
            progress: cap_field("sign_progress").zip(cap_field("sign_target")),
        }
    }

    fn identity(&self) -> &'static str {
        if self.is_vip { "88VIP" } else { "普通用户" }
    }
}

/// Sequential runner over all accounts.
pub struct Runner<A> {
    api: A,
    delay: Duration,
}

impl<A: GrowthApi> Runner<A> {
    /// Creates a runner that waits `delay` between accounts.
    pub fn new(api: A, delay: Duration) -> Self {
        Self { api, delay }
    }

    /// Processes every account and returns the aggregated report.
    pub async fn run(&self, accounts: &[AccountParam]) -> RunReport {
        let mut report = RunReport::default();

        for (index, account) in accounts.iter().enumerate() {
            if index > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            println!(
                "\n👉 开始处理第 {} 个账号 (account {}/{}): {}",
                index + 1,
                index + 1,
                accounts.len(),
                account.user
            );

            let outcome = self.process(account).await;
            match &outcome {
                Outcome::Success(detail) => println!("✅ [{}] {}", account.user, detail),
                Outcome::Skipped(reason) => println!("⏭️ [{}] 跳过 (skipped): {}", account.user, reason),
                Outcome::Failed(reason) => println!("❌ [{}] 失败 (failed): {}", account.user, reason),
            }
            report.record(&account.user, outcome);
        }

        log::info!(
            "Check-in finished total={} succeeded={} skipped={} failed={}",
            report.total(),
            report.succeeded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    /// Processes one account, classifying any error.
    pub async fn process(&self, account: &AccountParam) -> Outcome {
        match self.check_in(account).await {
            Ok(detail) => Outcome::Success(detail),
            Err(e) if e.is_skip() => Outcome::Skipped(e.to_string()),
            Err(e) => {
                log::error!("Check-in failed user={}: {}", account.user, e);
                Outcome::Failed(e.to_string())
            }
        }
    }

    async fn check_in(&self, account: &AccountParam) -> Result<String> {
        let credentials = account.credentials()?;
        let cookie = account.cookie.as_deref();

        let reply = self.api.growth_info(&credentials, cookie).await?;
        let info_body = expect_ok(Stage::Info, &account.user, &reply)?;
        let payload = payload_object(info_body).ok_or_else(|| CheckinError::UnexpectedShape {
            stage: Stage::Info,
            detail: "data 字段不是对象 (data is not an object)".to_string(),
        })?;
        let info = GrowthInfo::from_payload(payload);

        println!(
            "ℹ️ [{}] 身份: {} | 总容量: {}{}",
            account.user,
            info.identity(),
            info.total_capacity.map_or_else(|| "未知".to_string(), utils::format_capacity),
            info.progress
                .map(|(done, target)| format!(" | 连签进度: {done}/{target}"))
                .unwrap_or_default()
        );

        if info.signed_today {
            return Ok(format!(
                "今日已签到 (already signed today){}",
                reward_suffix(info.daily_reward)
            ));
        }

        self.sign(account, &credentials, cookie).await
    }

    async fn sign(&self, account: &AccountParam, credentials: &Credentials, cookie: Option<&str>) -> Result<String> {
        let reply = self.api.growth_sign(credentials, cookie).await?;
        let body = expect_ok(Stage::Sign, &account.user, &reply)?;

        let reward = payload_object(body)
            .and_then(|payload| payload.get("sign_daily_reward"))
            .and_then(Value::as_u64);

        Ok(format!("签到成功 (signed){}", reward_suffix(reward)))
    }
}

/// Logs the reply and checks the HTTP status and business `code`.
fn expect_ok<'a>(stage: Stage, user: &str, reply: &'a ApiReply) -> Result<&'a Value> {
    println!("ℹ️ [{user}] {stage} HTTP 状态码: {}", reply.status);
    println!("🔍 [{user}] {stage} 返回数据: {}", reply.body);

    if !reply.is_ok() {
        return Err(CheckinError::HttpStatus {
            stage,
            status: reply.status,
        });
    }

    if let Some(code) = business_code(stage, &reply.body) {
        return Err(CheckinError::Business {
            stage,
            code,
            message: message(&reply.body),
        });
    }

    Ok(&reply.body)
}

/// Returns the `code` when it signals an error.
///
/// Zero is always fine. An absent or null code is tolerated for the info
/// query only; a sign reply must carry `code == 0` to count as signed.
fn business_code(stage: Stage, body: &Value) -> Option<String> {
    match body.get("code") {
        None | Some(Value::Null) if stage == Stage::Sign => Some(MISSING_CODE.to_string()),
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) if n.as_i64() == Some(0) => None,
        Some(Value::String(s)) if s.trim() == "0" => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

/// `message`, then `msg`, then a fixed placeholder.
fn message(body: &Value) -> String {
    ["message", "msg"]
        .into_iter()
        .filter_map(|key| body.get(key))
        .find(|value| is_truthy(value))
        .map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| UNKNOWN_MESSAGE.to_string())
}

/// `data`, then `result`, then the whole body; `None` if that is not an object.
fn payload_object(body: &Value) -> Option<&Map<String, Value>> {
    ["data", "result"]
        .into_iter()
        .filter_map(|key| body.get(key))
        .find(|value| is_truthy(value))
        .unwrap_or(body)
        .as_object()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn reward_suffix(reward: Option<u64>) -> String {
    reward
        .map(|bytes| format!(", 获得 {}", utils::format_capacity(bytes)))
        .unwrap_or_default()
}
