//! Error types for the Payguard gate
//!
//! Every failure is explicit and carries the stage that produced it. Gating
//! failures are raised before any side effect; execution failures carry the
//! protocol they occurred on.

use thiserror::Error;

use crate::intent::Protocol;
use crate::verdict::GateLayer;

/// Result type for gate operations
pub type Result<T> = std::result::Result<T, GateError>;

/// The gate error taxonomy
///
/// Stable string identifiers are exposed via [`GateError::code`] so callers
/// can match on failure class without parsing display strings.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    /// A deterministic policy rule rejected the intent
    #[error("Policy violation ({policy}): value {value} against limit {limit}")]
    PolicyViolation {
        /// Rule name, e.g. "maxPerTransaction"
        policy: String,
        /// Offending value (amount, recipient, running total)
        value: serde_json::Value,
        /// Configured limit or matched pattern
        limit: serde_json::Value,
    },

    /// The firewall or the human gate blocked the intent
    #[error("Firewall blocked at {layer} (confidence {confidence:.2}): {reason}")]
    FirewallBlocked {
        layer: GateLayer,
        confidence: f64,
        reason: String,
    },

    /// No registered adapter matches the resolved protocol
    #[error("No adapter registered for protocol {protocol}")]
    NoAdapter { protocol: Protocol },

    /// The adapter raised during execution
    #[error("Payment failed on {protocol}: {message}")]
    PaymentFailed {
        protocol: Protocol,
        /// Backend transaction id, when the failure happened after issuance
        transaction_id: Option<String>,
        message: String,
    },
}

impl GateError {
    /// Stable identifier for the failure class
    pub fn code(&self) -> &'static str {
        match self {
            Self::PolicyViolation { .. } => "POLICY_VIOLATION",
            Self::FirewallBlocked { .. } => "FIREWALL_BLOCKED",
            Self::NoAdapter { .. } => "NO_ADAPTER",
            Self::PaymentFailed { .. } => "PAYMENT_FAILED",
        }
    }
}
