//! Verdict and drift types
//!
//! Every gating layer reports its decision as a [`FirewallVerdict`] so the
//! gate can treat classifier, policy, drift, and human outcomes uniformly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The pipeline layer a verdict originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GateLayer {
    /// Pattern / injection classifier
    #[serde(rename = "classifier")]
    Classifier,
    /// Deterministic policy engine
    #[serde(rename = "policy")]
    Policy,
    /// Structured-intent mismatch or origin drift
    #[serde(rename = "intent-diff")]
    IntentDiff,
    /// Human approval gate
    #[serde(rename = "human")]
    Human,
}

impl GateLayer {
    /// Stable wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classifier => "classifier",
            Self::Policy => "policy",
            Self::IntentDiff => "intent-diff",
            Self::Human => "human",
        }
    }
}

impl fmt::Display for GateLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One layer's decision about an intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallVerdict {
    /// Whether the intent may proceed
    pub allowed: bool,
    /// Layer that produced the verdict
    pub layer: GateLayer,
    /// Human-readable reason
    pub reason: String,
    /// Confidence in [0, 1], when the layer computes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Layer-specific diagnostic detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl FirewallVerdict {
    /// Create a passing verdict
    pub fn allow(layer: GateLayer, reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            layer,
            reason: reason.into(),
            confidence: None,
            details: None,
        }
    }

    /// Create a blocking verdict
    pub fn block(layer: GateLayer, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            layer,
            reason: reason.into(),
            confidence: None,
            details: None,
        }
    }

    /// Attach a confidence score
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Attach diagnostic detail
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// How far a single field has drifted from the original instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftSeverity {
    Low,
    Medium,
    High,
}

/// A single drifted field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftIndicator {
    /// Field name: amount, recipient, currency, or purpose
    pub field: String,
    /// Value extracted from the original instruction
    pub original: String,
    /// Value on the current intent
    pub current: String,
    pub severity: DriftSeverity,
}

/// Aggregate comparison between a current intent and the original instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentDiffResult {
    /// Mean of per-field scores, in [0, 1], rounded to three decimals
    pub similarity: f64,
    /// Fields whose score fell below their drift threshold
    pub indicators: Vec<DriftIndicator>,
}
