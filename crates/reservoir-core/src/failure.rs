//! Failure records observed on raw connections

use serde::{Deserialize, Serialize};

/// An error (or warning) raised by an operation on a raw connection.
///
/// Carries the vendor error code and/or the SQLSTATE so a classifier can
/// decide whether the connection survives. Records are short-lived: they are
/// handed to the pool on release and consumed there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Five character SQLSTATE, if the backend reported one
    pub sql_state: Option<String>,
    /// Vendor-specific error code
    pub vendor_code: Option<i32>,
    /// Human readable message
    pub message: String,
}

impl FailureRecord {
    /// Create a record with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            sql_state: None,
            vendor_code: None,
            message: message.into(),
        }
    }

    /// Create a record carrying a SQLSTATE.
    pub fn with_sql_state(sql_state: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sql_state: Some(sql_state.into()),
            vendor_code: None,
            message: message.into(),
        }
    }

    /// Create a record carrying a vendor error code.
    pub fn with_vendor_code(vendor_code: i32, message: impl Into<String>) -> Self {
        Self {
            sql_state: None,
            vendor_code: Some(vendor_code),
            message: message.into(),
        }
    }

    /// The two character SQLSTATE class, e.g. `08` for connection exceptions.
    pub fn sql_state_class(&self) -> Option<&str> {
        self.sql_state.as_deref().and_then(|state| state.get(..2))
    }
}

impl std::fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.sql_state, self.vendor_code) {
            (Some(state), Some(code)) => write!(f, "[{} / {}] {}", state, code, self.message),
            (Some(state), None) => write!(f, "[{}] {}", state, self.message),
            (None, Some(code)) => write!(f, "[{}] {}", code, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}
