//! Transaction isolation levels

use serde::{Deserialize, Serialize};

/// Transaction isolation level of a connection.
///
/// The five standard levels carry the conventional integer values used by
/// SQL driver APIs. Any other integer is a vendor-specific level and is kept
/// as `Custom`. Two levels are equal exactly when their integer values are
/// equal, so `Custom(2)` and `ReadCommitted` are the same level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "IsolationRepr", into = "IsolationRepr")]
pub enum IsolationLevel {
    None,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Custom(i32),
}

impl IsolationLevel {
    pub const NONE: i32 = 0;
    pub const READ_UNCOMMITTED: i32 = 1;
    pub const READ_COMMITTED: i32 = 2;
    pub const REPEATABLE_READ: i32 = 4;
    pub const SERIALIZABLE: i32 = 8;

    /// Map a raw level to its named variant when there is one.
    ///
    /// ```
    /// use reservoir_core::IsolationLevel;
    ///
    /// assert_eq!(IsolationLevel::from_level(4), IsolationLevel::RepeatableRead);
    /// assert_eq!(IsolationLevel::from_level(42), IsolationLevel::Custom(42));
    /// ```
    pub fn from_level(level: i32) -> Self {
        match level {
            Self::NONE => IsolationLevel::None,
            Self::READ_UNCOMMITTED => IsolationLevel::ReadUncommitted,
            Self::READ_COMMITTED => IsolationLevel::ReadCommitted,
            Self::REPEATABLE_READ => IsolationLevel::RepeatableRead,
            Self::SERIALIZABLE => IsolationLevel::Serializable,
            other => IsolationLevel::Custom(other),
        }
    }

    /// The raw integer value sent to and read from the connection.
    pub fn level(&self) -> i32 {
        match self {
            IsolationLevel::None => Self::NONE,
            IsolationLevel::ReadUncommitted => Self::READ_UNCOMMITTED,
            IsolationLevel::ReadCommitted => Self::READ_COMMITTED,
            IsolationLevel::RepeatableRead => Self::REPEATABLE_READ,
            IsolationLevel::Serializable => Self::SERIALIZABLE,
            IsolationLevel::Custom(level) => *level,
        }
    }

    /// Whether this level is one of the five standard levels.
    pub fn is_standard(&self) -> bool {
        !matches!(Self::from_level(self.level()), IsolationLevel::Custom(_))
    }

    fn name(&self) -> Option<&'static str> {
        match Self::from_level(self.level()) {
            IsolationLevel::None => Some("none"),
            IsolationLevel::ReadUncommitted => Some("read_uncommitted"),
            IsolationLevel::ReadCommitted => Some("read_committed"),
            IsolationLevel::RepeatableRead => Some("repeatable_read"),
            IsolationLevel::Serializable => Some("serializable"),
            IsolationLevel::Custom(_) => None,
        }
    }
}

impl PartialEq for IsolationLevel {
    fn eq(&self, other: &Self) -> bool {
        self.level() == other.level()
    }
}

impl Eq for IsolationLevel {}

impl std::hash::Hash for IsolationLevel {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.level().hash(state);
    }
}

impl From<i32> for IsolationLevel {
    fn from(level: i32) -> Self {
        Self::from_level(level)
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name.to_uppercase()),
            None => write!(f, "CUSTOM({})", self.level()),
        }
    }
}

/// Wire form: standard levels by name, anything else by number.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum IsolationRepr {
    Named(String),
    Level(i32),
}

impl From<IsolationLevel> for IsolationRepr {
    fn from(level: IsolationLevel) -> Self {
        match level.name() {
            Some(name) => IsolationRepr::Named(name.to_string()),
            None => IsolationRepr::Level(level.level()),
        }
    }
}

impl TryFrom<IsolationRepr> for IsolationLevel {
    type Error = String;

    fn try_from(repr: IsolationRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            IsolationRepr::Level(level) => Ok(IsolationLevel::from_level(level)),
            IsolationRepr::Named(name) => {
                match name.to_ascii_lowercase().replace('-', "_").as_str() {
                    "none" => Ok(IsolationLevel::None),
                    "read_uncommitted" => Ok(IsolationLevel::ReadUncommitted),
                    "read_committed" => Ok(IsolationLevel::ReadCommitted),
                    "repeatable_read" => Ok(IsolationLevel::RepeatableRead),
                    "serializable" => Ok(IsolationLevel::Serializable),
                    other => Err(format!("unknown isolation level '{}'", other)),
                }
            }
        }
    }
}
