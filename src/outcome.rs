//! Outcome classification
//!
//! Maps raw submission/execution failures and timeouts onto the closed set
//! of user-facing messages. Program error codes and log markers are a
//! versioned contract of the on-chain program, so they live in a
//! configurable [`OutcomeTable`] rather than in the mint flow.

use serde::{Deserialize, Serialize};

use crate::candy_machine::errors::program_error_message;
use crate::chain::ExecutionError;
use crate::types::Severity;

pub const SOLD_OUT_MESSAGE: &str = "SOLD OUT!";
pub const NOT_STARTED_MESSAGE: &str = "Minting period hasn't started yet.";
pub const INSUFFICIENT_FUNDS_MESSAGE: &str =
    "Insufficient funds to mint. Please fund your wallet.";
pub const TIMEOUT_MESSAGE: &str = "Transaction Timeout! Please try again.";
pub const FALLBACK_MESSAGE: &str = "Minting failed! Please try again!";
pub const SUCCESS_MESSAGE: &str = "Congratulations! Mint succeeded!";

/// Everything known about why a mint did not succeed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureDetail {
    /// Custom program error code
    pub code: Option<u32>,
    /// Message the program itself attaches to `code`
    pub human_message: Option<String>,
    /// Raw error text from the node, wallet or transport
    pub message: Option<String>,
    pub logs: Vec<String>,
}

impl FailureDetail {
    /// Deadline passed with nothing known about the transaction
    pub fn timeout() -> Self {
        Self::default()
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn from_execution(err: &ExecutionError) -> Self {
        Self {
            code: err.code,
            human_message: err
                .code
                .and_then(program_error_message)
                .map(str::to_string),
            message: Some(err.message.clone()).filter(|m| !m.is_empty()),
            logs: err.logs.clone(),
        }
    }

    fn mentions(&self, marker: &str) -> bool {
        self.message.as_deref().is_some_and(|m| m.contains(marker))
            || self.logs.iter().any(|line| line.contains(marker))
    }

    fn is_silent(&self) -> bool {
        self.human_message.is_none() && self.message.is_none() && self.logs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Matcher {
    ProgramCode(u32),
    /// Substring of the error message or any program log line
    LogMarker(String),
}

impl Matcher {
    fn matches(&self, detail: &FailureDetail) -> bool {
        match self {
            Matcher::ProgramCode(code) => detail.code == Some(*code),
            Matcher::LogMarker(marker) => detail.mentions(marker),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRule {
    #[serde(flatten)]
    pub matcher: Matcher,
    pub message: String,
    /// Force a fresh sale-state load after reporting
    #[serde(default)]
    pub reload: bool,
}

/// Ordered rule table; first match wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTable {
    #[serde(default = "default_rules")]
    pub rules: Vec<OutcomeRule>,
    #[serde(default = "default_timeout_message")]
    pub timeout_message: String,
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
    #[serde(default = "default_success_message")]
    pub success_message: String,
}

fn default_rules() -> Vec<OutcomeRule> {
    vec![
        OutcomeRule {
            matcher: Matcher::ProgramCode(311),
            message: SOLD_OUT_MESSAGE.to_string(),
            reload: true,
        },
        OutcomeRule {
            matcher: Matcher::ProgramCode(312),
            message: NOT_STARTED_MESSAGE.to_string(),
            reload: false,
        },
        OutcomeRule {
            matcher: Matcher::LogMarker("0x137".to_string()),
            message: SOLD_OUT_MESSAGE.to_string(),
            reload: false,
        },
        OutcomeRule {
            matcher: Matcher::LogMarker("0x135".to_string()),
            message: INSUFFICIENT_FUNDS_MESSAGE.to_string(),
            reload: false,
        },
    ]
}

fn default_timeout_message() -> String {
    TIMEOUT_MESSAGE.to_string()
}

fn default_fallback_message() -> String {
    FALLBACK_MESSAGE.to_string()
}

fn default_success_message() -> String {
    SUCCESS_MESSAGE.to_string()
}

impl Default for OutcomeTable {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            timeout_message: default_timeout_message(),
            fallback_message: default_fallback_message(),
            success_message: default_success_message(),
        }
    }
}

/// Message shown to the user for one terminal mint attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub text: String,
    pub severity: Severity,
    pub reload: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OutcomeClassifier {
    table: OutcomeTable,
}

impl OutcomeClassifier {
    pub fn new(table: OutcomeTable) -> Self {
        Self { table }
    }

    pub fn success(&self) -> UserMessage {
        UserMessage {
            text: self.table.success_message.clone(),
            severity: Severity::Success,
            reload: false,
        }
    }

    pub fn classify(&self, detail: &FailureDetail) -> UserMessage {
        let error = |text: &str, reload: bool| UserMessage {
            text: text.to_string(),
            severity: Severity::Error,
            reload,
        };

        if let Some(rule) = self.table.rules.iter().find(|r| r.matcher.matches(detail)) {
            return error(&rule.message, rule.reload);
        }
        if detail.is_silent() {
            return error(&self.table.timeout_message, false);
        }
        match &detail.human_message {
            Some(human) => error(human, false),
            None => error(&self.table.fallback_message, false),
        }
    }
}
