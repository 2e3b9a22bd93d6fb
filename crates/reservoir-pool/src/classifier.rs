//! Failure classification
//!
//! Decides whether a connection that reported an error may go back into
//! service. Two policies are built in: [`EmptyClassifier`] never condemns a
//! connection and [`FatalClassifier`] condemns it on any error.
//! [`SqlStateClassifier`] keys the decision on SQLSTATE classes and vendor
//! codes, and any `Fn(&FailureRecord) -> FailureClass` closure can be used as
//! a custom policy.

use std::sync::Arc;

use reservoir_core::FailureRecord;
use serde::{Deserialize, Serialize};

/// Outcome of classifying a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// The connection is still usable
    Transient,
    /// The connection must be discarded
    Fatal,
}

impl FailureClass {
    pub fn is_fatal(&self) -> bool {
        matches!(self, FailureClass::Fatal)
    }
}

/// Policy deciding whether a failure condemns its connection
pub trait FailureClassifier: Send + Sync {
    fn classify(&self, failure: &FailureRecord) -> FailureClass;
}

impl<F> FailureClassifier for F
where
    F: Fn(&FailureRecord) -> FailureClass + Send + Sync,
{
    fn classify(&self, failure: &FailureRecord) -> FailureClass {
        self(failure)
    }
}

/// Treats every failure as transient
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyClassifier;

impl FailureClassifier for EmptyClassifier {
    fn classify(&self, _failure: &FailureRecord) -> FailureClass {
        FailureClass::Transient
    }
}

/// Treats every failure as fatal
#[derive(Debug, Clone, Copy, Default)]
pub struct FatalClassifier;

impl FailureClassifier for FatalClassifier {
    fn classify(&self, _failure: &FailureRecord) -> FailureClass {
        FailureClass::Fatal
    }
}

/// Vendor-code driven policy.
///
/// A failure is fatal when its SQLSTATE matches one of the fatal states
/// exactly, when its two character SQLSTATE class is a fatal class, or when
/// its vendor code is listed. Everything else is transient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlStateClassifier {
    fatal_classes: Vec<String>,
    fatal_states: Vec<String>,
    fatal_codes: Vec<i32>,
}

impl SqlStateClassifier {
    /// A classifier with no fatal entries at all
    pub fn empty() -> Self {
        Self {
            fatal_classes: Vec::new(),
            fatal_states: Vec::new(),
            fatal_codes: Vec::new(),
        }
    }

    /// Mark a whole SQLSTATE class (first two characters) as fatal
    pub fn with_fatal_class(mut self, class: impl Into<String>) -> Self {
        self.fatal_classes.push(class.into());
        self
    }

    /// Mark one exact SQLSTATE as fatal
    pub fn with_fatal_state(mut self, state: impl Into<String>) -> Self {
        self.fatal_states.push(state.into());
        self
    }

    /// Mark a vendor error code as fatal
    pub fn with_fatal_code(mut self, code: i32) -> Self {
        self.fatal_codes.push(code);
        self
    }
}

impl Default for SqlStateClassifier {
    /// Connection exceptions (class `08`), administrator shutdown/crash
    /// (`57P01`..`57P03`) and too-many-connections (`53300`)
    fn default() -> Self {
        Self::empty()
            .with_fatal_class("08")
            .with_fatal_state("57P01")
            .with_fatal_state("57P02")
            .with_fatal_state("57P03")
            .with_fatal_state("53300")
    }
}

impl FailureClassifier for SqlStateClassifier {
    fn classify(&self, failure: &FailureRecord) -> FailureClass {
        if let Some(state) = failure.sql_state.as_deref() {
            if self.fatal_states.iter().any(|s| s.eq_ignore_ascii_case(state)) {
                return FailureClass::Fatal;
            }
        }
        if let Some(class) = failure.sql_state_class() {
            if self.fatal_classes.iter().any(|c| c.eq_ignore_ascii_case(class)) {
                return FailureClass::Fatal;
            }
        }
        if let Some(code) = failure.vendor_code {
            if self.fatal_codes.contains(&code) {
                return FailureClass::Fatal;
            }
        }
        FailureClass::Transient
    }
}

/// Built-in classifier selection as it appears in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierKind {
    #[default]
    Empty,
    Fatal,
    SqlState,
}

impl ClassifierKind {
    /// Instantiate the selected policy
    pub fn build(&self) -> Arc<dyn FailureClassifier> {
        match self {
            ClassifierKind::Empty => Arc::new(EmptyClassifier),
            ClassifierKind::Fatal => Arc::new(FatalClassifier),
            ClassifierKind::SqlState => Arc::new(SqlStateClassifier::default()),
        }
    }
}
