//! Canonical swap status state machine and provider vocabulary mapping

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical lifecycle status of a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    Quoting,
    Quoted,
    AwaitingDeposit,
    DepositDetected,
    Confirming,
    Swapping,
    Completing,
    Completed,
    Failed,
    Refunded,
    /// Tracking lookup inconclusive; neither progress nor error
    Unknown,
}

/// Provider status strings (upper-cased) and their canonical meaning
const PROVIDER_STATUS_TABLE: &[(&str, SwapStatus)] = &[
    ("PENDING", SwapStatus::AwaitingDeposit),
    ("PENDING_DEPOSIT", SwapStatus::AwaitingDeposit),
    ("INCOMPLETE_DEPOSIT", SwapStatus::AwaitingDeposit),
    ("AWAITING_DEPOSIT", SwapStatus::AwaitingDeposit),
    ("KNOWN_DEPOSIT_TX", SwapStatus::DepositDetected),
    ("DEPOSIT_DETECTED", SwapStatus::DepositDetected),
    ("PROCESSING", SwapStatus::Confirming),
    ("CONFIRMING", SwapStatus::Confirming),
    ("SWAPPING", SwapStatus::Swapping),
    ("COMPLETING", SwapStatus::Completing),
    ("SUCCESS", SwapStatus::Completed),
    ("COMPLETED", SwapStatus::Completed),
    ("REFUNDED", SwapStatus::Refunded),
    ("FAILED", SwapStatus::Failed),
];

impl SwapStatus {
    /// Map a provider status string; unmapped states degrade to `Unknown`
    pub fn from_provider(raw: &str) -> SwapStatus {
        let raw = raw.trim().to_ascii_uppercase();
        PROVIDER_STATUS_TABLE
            .iter()
            .find(|(name, _)| *name == raw)
            .map(|(_, status)| *status)
            .unwrap_or(SwapStatus::Unknown)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SwapStatus::Completed | SwapStatus::Failed | SwapStatus::Refunded
        )
    }

    /// Position in the forward progression. Terminal alternates rank with
    /// `Completed`; `Unknown` has no rank.
    pub fn rank(&self) -> Option<u8> {
        match self {
            SwapStatus::Quoting => Some(0),
            SwapStatus::Quoted => Some(1),
            SwapStatus::AwaitingDeposit => Some(2),
            SwapStatus::DepositDetected => Some(3),
            SwapStatus::Confirming => Some(4),
            SwapStatus::Swapping => Some(5),
            SwapStatus::Completing => Some(6),
            SwapStatus::Completed | SwapStatus::Failed | SwapStatus::Refunded => Some(7),
            SwapStatus::Unknown => None,
        }
    }

    /// Whether a record currently in `self` may move to `next`
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        if self.is_terminal() || next == SwapStatus::Unknown || *self == next {
            return false;
        }
        match (self.rank(), next.rank()) {
            (Some(current), Some(next)) => next > current,
            // Any known status supersedes an unknown one
            (None, Some(_)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Quoting => "quoting",
            SwapStatus::Quoted => "quoted",
            SwapStatus::AwaitingDeposit => "awaiting_deposit",
            SwapStatus::DepositDetected => "deposit_detected",
            SwapStatus::Confirming => "confirming",
            SwapStatus::Swapping => "swapping",
            SwapStatus::Completing => "completing",
            SwapStatus::Completed => "completed",
            SwapStatus::Failed => "failed",
            SwapStatus::Refunded => "refunded",
            SwapStatus::Unknown => "unknown",
        }
    }

    /// Text for a status display; `Unknown` renders as a neutral state
    pub fn display_label(&self) -> &'static str {
        match self {
            SwapStatus::Quoting => "Fetching quote",
            SwapStatus::Quoted => "Quote ready",
            SwapStatus::AwaitingDeposit => "Waiting for deposit",
            SwapStatus::DepositDetected => "Deposit detected",
            SwapStatus::Confirming => "Confirming deposit",
            SwapStatus::Swapping => "Swapping",
            SwapStatus::Completing => "Sending funds",
            SwapStatus::Completed => "Completed",
            SwapStatus::Failed => "Failed",
            SwapStatus::Refunded => "Refunded",
            SwapStatus::Unknown => "Checking…",
        }
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quoting" => Ok(SwapStatus::Quoting),
            "quoted" => Ok(SwapStatus::Quoted),
            "awaiting_deposit" => Ok(SwapStatus::AwaitingDeposit),
            "deposit_detected" => Ok(SwapStatus::DepositDetected),
            "confirming" => Ok(SwapStatus::Confirming),
            "swapping" => Ok(SwapStatus::Swapping),
            "completing" => Ok(SwapStatus::Completing),
            "completed" => Ok(SwapStatus::Completed),
            "failed" => Ok(SwapStatus::Failed),
            "refunded" => Ok(SwapStatus::Refunded),
            "unknown" => Ok(SwapStatus::Unknown),
            other => Err(format!("unknown swap status: {other}")),
        }
    }
}

/// Result of a single tracking lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: SwapStatus,
    pub settlement_tx_ref: Option<String>,
    pub error: Option<String>,
    pub from_amount: Option<String>,
    pub to_amount: Option<String>,
}

impl StatusSnapshot {
    pub fn new(status: SwapStatus) -> Self {
        Self {
            status,
            settlement_tx_ref: None,
            error: None,
            from_amount: None,
            to_amount: None,
        }
    }

    pub fn unknown() -> Self {
        Self::new(SwapStatus::Unknown)
    }

    pub fn with_tx_ref(mut self, tx_ref: impl Into<String>) -> Self {
        self.settlement_tx_ref = Some(tx_ref.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_vocabulary() {
        assert_eq!(SwapStatus::from_provider("SUCCESS"), SwapStatus::Completed);
        assert_eq!(SwapStatus::from_provider("completed"), SwapStatus::Completed);
        assert_eq!(
            SwapStatus::from_provider("PENDING_DEPOSIT"),
            SwapStatus::AwaitingDeposit
        );
        assert_eq!(
            SwapStatus::from_provider("INCOMPLETE_DEPOSIT"),
            SwapStatus::AwaitingDeposit
        );
        assert_eq!(SwapStatus::from_provider("PROCESSING"), SwapStatus::Confirming);
        assert_eq!(SwapStatus::from_provider("REFUNDED"), SwapStatus::Refunded);
        assert_eq!(SwapStatus::from_provider("FAILED"), SwapStatus::Failed);
    }

    #[test]
    fn test_unmapped_status_is_unknown() {
        assert_eq!(SwapStatus::from_provider("TELEPORTING"), SwapStatus::Unknown);
        assert_eq!(SwapStatus::from_provider(""), SwapStatus::Unknown);
    }

    #[test]
    fn test_terminal_states_never_transition() {
        for terminal in [
            SwapStatus::Completed,
            SwapStatus::Failed,
            SwapStatus::Refunded,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(SwapStatus::AwaitingDeposit));
            assert!(!terminal.can_transition_to(SwapStatus::Completed));
        }
    }

    #[test]
    fn test_transitions_move_forward_only() {
        assert!(SwapStatus::AwaitingDeposit.can_transition_to(SwapStatus::Confirming));
        assert!(SwapStatus::Swapping.can_transition_to(SwapStatus::Refunded));
        assert!(!SwapStatus::Swapping.can_transition_to(SwapStatus::AwaitingDeposit));
        assert!(!SwapStatus::Swapping.can_transition_to(SwapStatus::Unknown));
        assert!(SwapStatus::Unknown.can_transition_to(SwapStatus::AwaitingDeposit));
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            SwapStatus::AwaitingDeposit,
            SwapStatus::Completing,
            SwapStatus::Unknown,
        ] {
            assert_eq!(status.as_str().parse::<SwapStatus>().unwrap(), status);
        }
        assert_eq!(SwapStatus::Unknown.display_label(), "Checking…");
    }
}
