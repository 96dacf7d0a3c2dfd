//! Task status states and the transition table
//!
//! Completed is terminal; every other status can move to any status but
//! itself.

use serde::{Deserialize, Serialize};

/// Status of a task in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    /// Not yet started
    #[default]
    Pending,
    /// Being worked on
    Active,
    /// Waiting on something external
    Blocked,
    /// Done. Terminal - no transitions out.
    Completed,
}

impl Status {
    /// All statuses, in display rank order
    pub const ALL: [Status; 4] = [Self::Pending, Self::Active, Self::Blocked, Self::Completed];

    /// Human-readable display name
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Active => "Active",
            Self::Blocked => "Blocked",
            Self::Completed => "Completed",
        }
    }

    /// Check whether a transition to `next` is allowed
    pub fn can_transition_to(self, next: Status) -> bool {
        match self {
            Self::Completed => false,
            _ => next != self,
        }
    }

    /// Statuses reachable from this one
    pub fn valid_transitions(self) -> Vec<Status> {
        Self::ALL
            .iter()
            .copied()
            .filter(|next| self.can_transition_to(*next))
            .collect()
    }

    /// Check if this status is terminal
    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "blocked" => Ok(Self::Blocked),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        // Every pair: allowed iff source is not Completed and target differs
        for from in Status::ALL {
            for to in Status::ALL {
                let expected = from != Status::Completed && to != from;
                assert_eq!(from.can_transition_to(to), expected, "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_completed_is_terminal() {
        assert!(Status::Completed.is_terminal());
        assert!(Status::Completed.valid_transitions().is_empty());
        assert!(!Status::Pending.is_terminal());
    }

    #[test]
    fn test_valid_transitions() {
        let from_pending = Status::Pending.valid_transitions();
        assert_eq!(from_pending, vec![Status::Active, Status::Blocked, Status::Completed]);
    }

    #[test]
    fn test_status_ordering() {
        assert!(Status::Pending < Status::Active);
        assert!(Status::Active < Status::Blocked);
        assert!(Status::Blocked < Status::Completed);
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&Status::Blocked).unwrap();
        assert_eq!(json, "\"BLOCKED\"");

        let status: Status = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(status, Status::Pending);
    }
}
