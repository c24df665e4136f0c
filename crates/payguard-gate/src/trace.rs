//! Gate decision trace for audit
//!
//! A bounded in-memory log of pipeline phase transitions. Recording is
//! infallible and has no side effect beyond memory; durability is out of
//! scope for the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline phase a trace event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStage {
    Firewall,
    Policy,
    Approval,
    Route,
    Execute,
    Record,
}

/// One recorded phase transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateTraceEvent {
    pub timestamp: DateTime<Utc>,
    pub stage: GateStage,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Bounded append-only trace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateTrace {
    pub created_at: DateTime<Utc>,
    pub events: Vec<GateTraceEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,
}

impl GateTrace {
    pub fn new(max_entries: Option<usize>) -> Self {
        Self {
            created_at: Utc::now(),
            events: Vec::new(),
            max_entries,
        }
    }

    /// Append an event, dropping the oldest entries past the bound
    pub fn record(
        &mut self,
        stage: GateStage,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) {
        self.events.push(GateTraceEvent {
            timestamp: Utc::now(),
            stage,
            message: message.into(),
            data,
        });
        if let Some(max) = self.max_entries {
            if self.events.len() > max {
                let overflow = self.events.len() - max;
                self.events.drain(0..overflow);
            }
        }
    }
}
