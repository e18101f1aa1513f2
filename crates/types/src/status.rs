use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Workflow status as reported by `GET /api/workflows/v1/{id}/status`.
///
/// Unrecognized status strings are kept verbatim in [`WorkflowStatus::Other`]
/// so newer server versions do not break status parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkflowStatus {
    Submitted,
    OnHold,
    Running,
    Aborting,
    Aborted,
    Succeeded,
    Failed,
    Other(String),
}

impl WorkflowStatus {
    /// The status string used on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Submitted => "Submitted",
            Self::OnHold => "On Hold",
            Self::Running => "Running",
            Self::Aborting => "Aborting",
            Self::Aborted => "Aborted",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Statuses that end a wait with a failure: `Failed`, `Aborted`, `Aborting`.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Aborted | Self::Aborting)
    }
}

impl From<&str> for WorkflowStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "Submitted" => Self::Submitted,
            "On Hold" => Self::OnHold,
            "Running" => Self::Running,
            "Aborting" => Self::Aborting,
            "Aborted" => Self::Aborted,
            "Succeeded" => Self::Succeeded,
            "Failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for WorkflowStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for WorkflowStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from(raw.as_str()))
    }
}
