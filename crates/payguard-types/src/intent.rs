//! Payment intent and result types
//!
//! A [`PaymentIntent`] is the unit of work flowing through the gate: a
//! uniquely identified request to pay some amount to some recipient. Callers
//! submit an [`IntentRequest`]; the gate stamps identity and time.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The closed set of payment protocols the gate can route to.
///
/// Represented as a tagged variant rather than a free string so the routing
/// table stays exhaustive. `Unknown` captures tags that fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// HTTP micro-payment flow (HTTP 402 style endpoints)
    X402,
    /// Agent-to-agent payments (`agent://` and `did:` recipients)
    Ap2,
    /// Merchant / commerce flows
    Acp,
    /// Escrow-backed settlement
    Escrow,
    /// Unrecognized tag
    Unknown,
}

impl Protocol {
    /// Stable lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X402 => "x402",
            Self::Ap2 => "ap2",
            Self::Acp => "acp",
            Self::Escrow => "escrow",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a tag case-insensitively; anything unrecognized maps to `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "x402" => Self::X402,
            "ap2" => Self::Ap2,
            "acp" => Self::Acp,
            "escrow" => Self::Escrow,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single escrow milestone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// What must be delivered
    pub description: String,
    /// Amount released when the milestone completes
    pub amount: f64,
    /// Duration string or ISO timestamp
    pub deadline: String,
}

/// Escrow configuration attached to an intent
///
/// Presence is consulted by both the policy engine (escrow threshold) and the
/// router (escrow protocol inference).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowTerms {
    /// Duration string (e.g. "7d") or ISO timestamp
    pub deadline: String,
    /// Evaluator identity: an address, or the literal token "auto"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluator: Option<String>,
    /// Ordered milestones, empty when the escrow releases in one step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<Milestone>,
}

/// A caller-facing payment request, before the gate stamps identity and time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRequest {
    /// Recipient: a URI, an on-chain address, or a scheme-prefixed identifier
    pub to: String,
    /// Non-negative amount in currency units
    pub amount: f64,
    /// Free-form currency code
    pub currency: String,
    /// Free-text purpose
    #[serde(default)]
    pub purpose: String,
    /// Explicit protocol tag; detected from the recipient shape when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    /// Escrow terms, when the payment must settle through escrow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escrow: Option<EscrowTerms>,
    /// Open-ended metadata forwarded to adapters
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl IntentRequest {
    /// Create a request with the four mandatory fields
    pub fn new(
        to: impl Into<String>,
        amount: f64,
        currency: impl Into<String>,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            amount,
            currency: currency.into(),
            purpose: purpose.into(),
            protocol: None,
            escrow: None,
            metadata: HashMap::new(),
        }
    }
}

/// A uniquely identified, timestamped payment intent
///
/// Invariant: once created, an intent is mutated only to fill a detected
/// protocol tag. Neither the firewall nor the policy engine edits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Process-unique id with a time-monotonic prefix
    pub id: String,
    /// Recipient identifier
    pub to: String,
    /// Non-negative amount in currency units
    pub amount: f64,
    /// Free-form currency code
    pub currency: String,
    /// Free-text purpose
    pub purpose: String,
    /// Protocol tag, filled by detection when absent on the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    /// Escrow terms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escrow: Option<EscrowTerms>,
    /// Open-ended metadata forwarded to adapters
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Creation time, epoch milliseconds UTC
    pub created_at_ms: i64,
}

impl PaymentIntent {
    /// Stamp a request with identity and time
    pub fn from_request(request: IntentRequest, id: String, created_at_ms: i64) -> Self {
        Self {
            id,
            to: request.to,
            amount: request.amount,
            currency: request.currency,
            purpose: request.purpose,
            protocol: request.protocol,
            escrow: request.escrow,
            metadata: request.metadata,
            created_at_ms,
        }
    }
}

/// The outcome reported by a payment adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResult {
    /// Whether the backend accepted the payment
    pub success: bool,
    /// Backend transaction id, when one was issued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Protocol the payment was executed over
    pub protocol: Protocol,
    /// Echo of the intent amount
    pub amount: f64,
    /// Echo of the intent currency
    pub currency: String,
    /// Echo of the intent recipient
    pub to: String,
    /// Execution time, epoch milliseconds UTC
    pub timestamp_ms: i64,
    /// Escrow identifier, for escrow-backed settlements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escrow_id: Option<String>,
    /// Backend error message on soft failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentResult {
    /// A successful result echoing the intent fields
    pub fn succeeded(intent: &PaymentIntent, protocol: Protocol, transaction_id: String) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id),
            protocol,
            amount: intent.amount,
            currency: intent.currency.clone(),
            to: intent.to.clone(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            escrow_id: None,
            error: None,
        }
    }

    /// A soft failure echoing the intent fields
    pub fn failed(intent: &PaymentIntent, protocol: Protocol, error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            protocol,
            amount: intent.amount,
            currency: intent.currency.clone(),
            to: intent.to.clone(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
            escrow_id: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_parse_case_insensitive() {
        assert_eq!(Protocol::parse("X402"), Protocol::X402);
        assert_eq!(Protocol::parse("Escrow"), Protocol::Escrow);
        assert_eq!(Protocol::parse(" ap2 "), Protocol::Ap2);
        assert_eq!(Protocol::parse("sepa"), Protocol::Unknown);
    }

    #[test]
    fn test_intent_stamping_preserves_request_fields() {
        let mut request = IntentRequest::new("agent://vendor", 25.0, "USDC", "API usage");
        request
            .metadata
            .insert("category".to_string(), serde_json::json!("services"));

        let intent = PaymentIntent::from_request(request, "pi_test".to_string(), 1_700_000_000_000);
        assert_eq!(intent.id, "pi_test");
        assert_eq!(intent.to, "agent://vendor");
        assert_eq!(intent.amount, 25.0);
        assert_eq!(intent.metadata["category"], serde_json::json!("services"));
    }

    #[test]
    fn test_protocol_serde_wire_names() {
        let json = serde_json::to_string(&Protocol::Escrow).unwrap();
        assert_eq!(json, "\"escrow\"");
        let back: Protocol = serde_json::from_str("\"x402\"").unwrap();
        assert_eq!(back, Protocol::X402);
    }
}
