//! Error kinds for a single account's check-in.
//!
//! Every variant is caught by the runner and turned into a per-account
//! outcome; none of them aborts the run.

use thiserror::Error;

/// Which of the two growth calls produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Info,
    Sign,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Info => f.write_str("查询成长信息"),
            Stage::Sign => f.write_str("签到"),
        }
    }
}

#[derive(Error, Debug)]
pub enum CheckinError {
    #[error("请求失败 (request failed): {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{stage} HTTP 状态码 {status}")]
    HttpStatus { stage: Stage, status: u16 },

    #[error("{stage} 接口返回错误 code={code}, message={message}")]
    Business {
        stage: Stage,
        code: String,
        message: String,
    },

    #[error("缺少必要参数 (missing): {}", .0.join(", "))]
    Validation(Vec<&'static str>),

    #[error("{stage} 返回结构异常: {detail}")]
    UnexpectedShape { stage: Stage, detail: String },
}

impl CheckinError {
    /// Validation problems mean the account was never attempted.
    pub fn is_skip(&self) -> bool {
        matches!(self, CheckinError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, CheckinError>;
