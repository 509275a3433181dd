//! Health records for registered team servers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Last observed health of a team server
///
/// Serialized as a plain string: `""` before the first poll, `"ok"`, or
/// `"error: <reason>"`.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum HealthStatus {
    /// Not polled yet
    #[default]
    Pending,
    /// Last poll returned a message
    Ok,
    /// Last poll failed
    Error(String),
}

const ERROR_PREFIX: &str = "error: ";

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Ok)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, HealthStatus::Error(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Pending => Ok(()),
            HealthStatus::Ok => f.write_str("ok"),
            HealthStatus::Error(reason) => write!(f, "{}{}", ERROR_PREFIX, reason),
        }
    }
}

impl From<HealthStatus> for String {
    fn from(status: HealthStatus) -> Self {
        status.to_string()
    }
}

impl From<String> for HealthStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "" => HealthStatus::Pending,
            "ok" => HealthStatus::Ok,
            _ => HealthStatus::Error(
                s.strip_prefix(ERROR_PREFIX)
                    .map(str::to_string)
                    .unwrap_or(s),
            ),
        }
    }
}

/// Registered address and last known health of one team
///
/// `message` is only set while `status` is [`HealthStatus::Ok`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    /// Normalized server address, always ending in `/`
    pub address: String,
    pub status: HealthStatus,
    /// Body of the last successful poll
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Registration this record belongs to; monitors from an earlier
    /// registration of the same team must not write to it
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl HealthRecord {
    pub(crate) fn new(address: String, generation: u64) -> Self {
        Self {
            address,
            status: HealthStatus::Pending,
            message: None,
            generation,
        }
    }

    /// Copy without the message, for listings visible to every team
    pub fn without_message(&self) -> Self {
        Self {
            message: None,
            ..self.clone()
        }
    }

    pub(crate) fn record_ok(&mut self, message: String) {
        self.status = HealthStatus::Ok;
        self.message = Some(message);
    }

    pub(crate) fn record_error(&mut self, reason: String) {
        self.status = HealthStatus::Error(reason);
        self.message = None;
    }
}
