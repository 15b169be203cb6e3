//! # Unit Status
//!
//! Workload status reported back to the host after each reconciliation pass

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the operator unit.
///
/// `Blocked` means a human has to add a relation, `Waiting` means a
/// dependency is still coming up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "name", content = "message", rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Unknown,
    Blocked(String),
    Waiting(String),
    Active,
}

impl UnitStatus {
    pub fn blocked(message: impl Into<String>) -> Self {
        Self::Blocked(message.into())
    }

    pub fn waiting(message: impl Into<String>) -> Self {
        Self::Waiting(message.into())
    }

    pub fn name(&self) -> &'static str {
        match self {
            UnitStatus::Unknown => "unknown",
            UnitStatus::Blocked(_) => "blocked",
            UnitStatus::Waiting(_) => "waiting",
            UnitStatus::Active => "active",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            UnitStatus::Blocked(msg) | UnitStatus::Waiting(msg) => msg,
            UnitStatus::Unknown | UnitStatus::Active => "",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, UnitStatus::Active)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            "" => write!(f, "{}", self.name()),
            msg => write!(f, "{}: {}", self.name(), msg),
        }
    }
}

/// Status together with the time it was last set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub status: UnitStatus,
    pub last_update: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(status: UnitStatus) -> Self {
        Self {
            status,
            last_update: Utc::now(),
        }
    }
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self::new(UnitStatus::Unknown)
    }
}
