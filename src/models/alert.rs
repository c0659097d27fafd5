use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Alert,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Alert => write!(f, "alert"),
        }
    }
}

/// Alert categories subject to cooldown or one-shot suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertType {
    Claimable,
    Resolved,
    Closing,
    Odds,
}

impl AlertType {
    /// Key used in the persisted `lastAlerted` map.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Claimable => "claimable",
            AlertType::Resolved => "resolved",
            AlertType::Closing => "closing",
            AlertType::Odds => "odds",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing alert. Serializes to the webhook payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_account: Option<String>,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            severity,
            message: message.into(),
            timestamp,
            subject_key: None,
            related_account: None,
        }
    }

    pub fn with_subject(mut self, subject_key: impl Into<String>) -> Self {
        self.subject_key = Some(subject_key.into());
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.related_account = Some(account.into());
        self
    }
}
