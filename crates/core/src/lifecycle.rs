use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state shared by schedulers (and reported for grabber slots).
///
/// `Pending` means construction failed and the unit is eligible for the
/// owner's retry sweep. `Running` means its polling loops are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Pending,
    Running,
}

impl ComponentState {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
        }
    }
}
