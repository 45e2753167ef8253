//! Swap lifecycle events
//!
//! Emitted by the engine and the background monitor whenever a swap is
//! created or its tracked status changes.

use crate::swap::{ActiveSwap, SwapStatus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

const DEFAULT_CAPACITY: usize = 256;

/// Events emitted over a swap's lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwapEvent {
    /// Intent published and recorded
    Created {
        swap_id: String,
        deposit_address: Option<String>,
        at: DateTime<Utc>,
    },

    /// Non-terminal forward transition
    StatusChanged {
        swap_id: String,
        from: SwapStatus,
        to: SwapStatus,
        at: DateTime<Utc>,
    },

    Completed {
        swap_id: String,
        settlement_tx_ref: Option<String>,
        to_amount: String,
        at: DateTime<Utc>,
    },

    Failed {
        swap_id: String,
        reason: String,
        at: DateTime<Utc>,
    },

    Refunded {
        swap_id: String,
        at: DateTime<Utc>,
    },

    /// Poll budget exhausted without a terminal status
    TrackingAbandoned {
        swap_id: String,
        last_status: SwapStatus,
        polls: u32,
        at: DateTime<Utc>,
    },
}

impl SwapEvent {
    pub fn created(swap: &ActiveSwap) -> Self {
        SwapEvent::Created {
            swap_id: swap.id.clone(),
            deposit_address: swap.deposit_address.clone(),
            at: swap.created_at,
        }
    }

    /// Event for a swap that just moved out of `from`
    pub fn transition(swap: &ActiveSwap, from: SwapStatus, at: DateTime<Utc>) -> Self {
        let swap_id = swap.id.clone();
        match swap.status {
            SwapStatus::Completed => SwapEvent::Completed {
                swap_id,
                settlement_tx_ref: swap.settlement_tx_ref.clone(),
                to_amount: swap
                    .settled_to_amount
                    .clone()
                    .unwrap_or_else(|| swap.to_amount.clone()),
                at,
            },
            SwapStatus::Failed => SwapEvent::Failed {
                swap_id,
                reason: swap.error.clone().unwrap_or_default(),
                at,
            },
            SwapStatus::Refunded => SwapEvent::Refunded { swap_id, at },
            to => SwapEvent::StatusChanged {
                swap_id,
                from,
                to,
                at,
            },
        }
    }

    pub fn swap_id(&self) -> &str {
        match self {
            SwapEvent::Created { swap_id, .. }
            | SwapEvent::StatusChanged { swap_id, .. }
            | SwapEvent::Completed { swap_id, .. }
            | SwapEvent::Failed { swap_id, .. }
            | SwapEvent::Refunded { swap_id, .. }
            | SwapEvent::TrackingAbandoned { swap_id, .. } => swap_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SwapEvent::Created { .. } => "Created",
            SwapEvent::StatusChanged { .. } => "StatusChanged",
            SwapEvent::Completed { .. } => "Completed",
            SwapEvent::Failed { .. } => "Failed",
            SwapEvent::Refunded { .. } => "Refunded",
            SwapEvent::TrackingAbandoned { .. } => "TrackingAbandoned",
        }
    }
}

/// Fan-out of swap events to any number of subscribers
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SwapEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: SwapEvent) {
        trace!("Publishing {} for swap {}", event.name(), event.swap_id());
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
