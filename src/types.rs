//! Common types shared by the mint flow and the storefront session

use serde::{Deserialize, Serialize};

/// Alert severity shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Error,
    Info,
}

/// UI-facing projection of the last terminal mint attempt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertState {
    pub open: bool,
    pub message: String,
    pub severity: Option<Severity>,
}

impl AlertState {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            open: true,
            message: message.into(),
            severity: Some(severity),
        }
    }

    /// Same alert, dismissed
    pub fn closed(&self) -> Self {
        Self {
            open: false,
            ..self.clone()
        }
    }
}

/// Lifecycle of one mint attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintStatus {
    Building,
    Submitted,
    Confirming,
    Succeeded,
    Failed,
    TimedOut,
}

impl MintStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MintStatus::Succeeded | MintStatus::Failed | MintStatus::TimedOut
        )
    }

    pub fn can_transition_to(self, next: MintStatus) -> bool {
        use MintStatus::*;
        matches!(
            (self, next),
            (Building, Submitted)
                | (Building, Failed)
                | (Submitted, Confirming)
                | (Submitted, Failed)
                | (Confirming, Succeeded)
                | (Confirming, Failed)
                | (Confirming, TimedOut)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MintStatus::Building => "building",
            MintStatus::Submitted => "submitted",
            MintStatus::Confirming => "confirming",
            MintStatus::Succeeded => "succeeded",
            MintStatus::Failed => "failed",
            MintStatus::TimedOut => "timed_out",
        }
    }
}

/// Events the session publishes to whatever drives the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Sale state is stale (sold out); reload before allowing another mint
    ReloadRequested,
    AlertChanged(AlertState),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(MintStatus::Building.can_transition_to(MintStatus::Submitted));
        assert!(MintStatus::Confirming.can_transition_to(MintStatus::TimedOut));
        assert!(!MintStatus::Building.can_transition_to(MintStatus::Succeeded));
        assert!(!MintStatus::Succeeded.can_transition_to(MintStatus::Failed));
        assert!(!MintStatus::TimedOut.can_transition_to(MintStatus::Confirming));
        assert!(MintStatus::Failed.is_terminal());
        assert!(!MintStatus::Confirming.is_terminal());
    }

    #[test]
    fn test_alert_serializes_lowercase_severity() {
        let alert = AlertState::new("SOLD OUT!", Severity::Error);
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["severity"], "error");
        assert_eq!(json["open"], true);
        assert!(!alert.closed().open);
    }
}
