use std::fmt;

use serde::{Deserialize, Serialize};

/// A user's right on a shared component instance
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccessRight {
    Consume,
    Edit,
    Custom(String),
}

impl AccessRight {
    pub fn as_str(&self) -> &str {
        match self {
            AccessRight::Consume => "consume",
            AccessRight::Edit => "edit",
            AccessRight::Custom(right) => right,
        }
    }
}

impl From<&str> for AccessRight {
    fn from(value: &str) -> Self {
        match value {
            "consume" => AccessRight::Consume,
            "edit" => AccessRight::Edit,
            other => AccessRight::Custom(other.to_string()),
        }
    }
}

impl From<String> for AccessRight {
    fn from(value: String) -> Self {
        AccessRight::from(value.as_str())
    }
}

impl From<AccessRight> for String {
    fn from(right: AccessRight) -> Self {
        right.as_str().to_string()
    }
}

impl fmt::Display for AccessRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
