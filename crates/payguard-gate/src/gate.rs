//! The payment gate
//!
//! `pay` is the hot path: stamp, firewall, policy, human gate, protocol
//! detection, adapter routing, execution, spend recording. The six stages
//! run strictly in order within one call; any gating failure raises a typed
//! error before the adapter is touched or a counter moves.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use payguard_firewall::{FirewallConfig, TransactionFirewall};
use payguard_policy::{PolicyConfig, PolicyEngine};
use payguard_types::{
    FirewallVerdict, GateError, GateLayer, IntentRequest, PaymentIntent, PaymentResult, Protocol,
    Result,
};

use crate::adapter::{AdapterRegistry, PaymentAdapter};
use crate::protocol::detect_protocol;
use crate::trace::{GateStage, GateTrace};

/// The human-approval seam
///
/// Invoked for every intent above the configured approval threshold; a
/// `false` return rejects the payment.
#[async_trait]
pub trait ApprovalHook: Send + Sync {
    async fn approve(&self, intent: &PaymentIntent) -> bool;
}

/// Gate construction options
pub struct GateConfig {
    /// Opaque wallet descriptor, forwarded to adapters via [`PaymentGate::wallet`]
    pub wallet: serde_json::Value,
    pub policy: PolicyConfig,
    /// Firewall options; `None` (or `enabled: false`) skips the firewall
    pub firewall: Option<FirewallConfig>,
    /// Adapters registered at construction
    pub adapters: Vec<Arc<dyn PaymentAdapter>>,
    /// Human approver; required whenever the policy demands approval
    pub approver: Option<Arc<dyn ApprovalHook>>,
    /// Bound on the in-memory decision trace
    pub trace_max_entries: Option<usize>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            wallet: serde_json::Value::Null,
            policy: PolicyConfig::default(),
            firewall: Some(FirewallConfig::default()),
            adapters: Vec::new(),
            approver: None,
            trace_max_entries: Some(256),
        }
    }
}

/// The gate orchestrator
pub struct PaymentGate {
    wallet: serde_json::Value,
    policy: PolicyEngine,
    firewall: Option<TransactionFirewall>,
    registry: AdapterRegistry,
    approver: Option<Arc<dyn ApprovalHook>>,
    trace: Mutex<GateTrace>,
}

impl PaymentGate {
    pub fn new(config: GateConfig) -> Self {
        let firewall = config.firewall.and_then(|firewall_config| {
            if firewall_config.enabled {
                Some(TransactionFirewall::new(firewall_config))
            } else {
                None
            }
        });
        Self {
            wallet: config.wallet,
            policy: PolicyEngine::new(config.policy),
            firewall,
            registry: AdapterRegistry::with_adapters(config.adapters),
            approver: config.approver,
            trace: Mutex::new(GateTrace::new(config.trace_max_entries)),
        }
    }

    /// The wallet descriptor, opaque to the core
    pub fn wallet(&self) -> &serde_json::Value {
        &self.wallet
    }

    /// The policy engine, for spend inspection and `reset`
    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    /// The firewall, when one is configured and enabled
    pub fn firewall(&self) -> Option<&TransactionFirewall> {
        self.firewall.as_ref()
    }

    /// Append an adapter to the registry
    pub fn register_adapter(&mut self, adapter: Arc<dyn PaymentAdapter>) {
        self.registry.register(adapter);
    }

    /// Snapshot of the decision trace
    pub fn trace(&self) -> GateTrace {
        self.trace.lock().clone()
    }

    /// Execute a payment request through the full pipeline
    pub async fn pay(&self, request: IntentRequest) -> Result<PaymentResult> {
        let mut intent = self.stamp(request);
        info!(intent = %intent.id, to = %intent.to, amount = intent.amount, "payment intent created");

        self.run_firewall(&intent).await?;
        self.run_policy(&intent)?;
        self.run_approval(&intent).await?;

        let protocol = self.resolve_protocol(&mut intent);
        let adapter = self
            .registry
            .find(protocol.as_str())
            .ok_or(GateError::NoAdapter { protocol })?;
        self.record_trace(
            GateStage::Route,
            "adapter resolved",
            Some(json!({ "protocol": protocol, "adapter": adapter.name() })),
        );

        match adapter.execute(&intent).await {
            Ok(result) => {
                if result.success {
                    self.policy.record_transaction(&intent);
                    self.record_trace(
                        GateStage::Record,
                        "spend recorded",
                        Some(json!({ "intent": intent.id, "amount": intent.amount })),
                    );
                    info!(intent = %intent.id, protocol = %protocol, "payment executed");
                } else {
                    // Soft failure: propagated unchanged, spend not recorded
                    warn!(
                        intent = %intent.id,
                        protocol = %protocol,
                        error = result.error.as_deref().unwrap_or("unspecified"),
                        "payment declined by backend"
                    );
                    self.record_trace(
                        GateStage::Execute,
                        "payment declined",
                        Some(json!({ "intent": intent.id, "error": result.error })),
                    );
                }
                Ok(result)
            }
            Err(err) => {
                self.record_trace(
                    GateStage::Execute,
                    "adapter failed",
                    Some(json!({ "intent": intent.id, "error": err.to_string() })),
                );
                Err(GateError::PaymentFailed {
                    protocol,
                    transaction_id: None,
                    message: err.to_string(),
                })
            }
        }
    }

    /// Dry-run a request: same gating as `pay`, no execution, no recording
    pub async fn check(&self, request: IntentRequest) -> FirewallVerdict {
        let mut intent = self.stamp(request);

        if let Some(firewall) = &self.firewall {
            let verdict = firewall.evaluate(&intent).await;
            if !verdict.allowed {
                return verdict;
            }
        }

        let verdict = self.policy.evaluate(&intent);
        if !verdict.allowed {
            return verdict;
        }

        if self.policy.requires_human_approval(&intent) {
            return FirewallVerdict::allow(GateLayer::Human, "human approval required")
                .with_details(json!({ "requiresHumanApproval": true }));
        }

        let protocol = self.resolve_protocol(&mut intent);
        if self.registry.find(protocol.as_str()).is_none() {
            return FirewallVerdict::block(
                GateLayer::Policy,
                format!("no adapter registered for protocol {}", protocol),
            );
        }

        FirewallVerdict::allow(GateLayer::Policy, "all gating checks passed")
    }

    fn stamp(&self, request: IntentRequest) -> PaymentIntent {
        PaymentIntent::from_request(request, next_intent_id(), Utc::now().timestamp_millis())
    }

    async fn run_firewall(&self, intent: &PaymentIntent) -> Result<()> {
        let Some(firewall) = &self.firewall else {
            return Ok(());
        };
        let verdict = firewall.evaluate(intent).await;
        self.record_trace(
            GateStage::Firewall,
            "firewall evaluated",
            Some(json!({ "allowed": verdict.allowed, "layer": verdict.layer })),
        );
        if verdict.allowed {
            info!(intent = %intent.id, "firewall passed");
            return Ok(());
        }
        warn!(intent = %intent.id, layer = %verdict.layer, reason = %verdict.reason, "firewall blocked");
        Err(GateError::FirewallBlocked {
            layer: verdict.layer,
            confidence: verdict.confidence.unwrap_or(1.0),
            reason: verdict.reason,
        })
    }

    fn run_policy(&self, intent: &PaymentIntent) -> Result<()> {
        let verdict = self.policy.evaluate(intent);
        self.record_trace(
            GateStage::Policy,
            "policy evaluated",
            Some(json!({ "allowed": verdict.allowed, "reason": verdict.reason })),
        );
        if verdict.allowed {
            info!(intent = %intent.id, "policy passed");
            return Ok(());
        }
        warn!(intent = %intent.id, reason = %verdict.reason, "policy blocked");

        let details = verdict.details.unwrap_or_default();
        Err(GateError::PolicyViolation {
            policy: details
                .get("policy")
                .and_then(|value| value.as_str())
                .unwrap_or("unknown")
                .to_string(),
            value: details.get("value").cloned().unwrap_or_default(),
            limit: details.get("limit").cloned().unwrap_or_default(),
        })
    }

    async fn run_approval(&self, intent: &PaymentIntent) -> Result<()> {
        if !self.policy.requires_human_approval(intent) {
            return Ok(());
        }

        let Some(approver) = &self.approver else {
            warn!(intent = %intent.id, "human approval required but no approver configured");
            return Err(GateError::FirewallBlocked {
                layer: GateLayer::Human,
                confidence: 1.0,
                reason: "human approval required but no approver configured".to_string(),
            });
        };

        let approved = approver.approve(intent).await;
        self.record_trace(
            GateStage::Approval,
            "human approval requested",
            Some(json!({ "intent": intent.id, "approved": approved })),
        );
        if approved {
            info!(intent = %intent.id, "human approver accepted");
            Ok(())
        } else {
            warn!(intent = %intent.id, "human approver rejected");
            Err(GateError::FirewallBlocked {
                layer: GateLayer::Human,
                confidence: 1.0,
                reason: "rejected by human approver".to_string(),
            })
        }
    }

    /// Fill a missing protocol tag from the intent shape
    fn resolve_protocol(&self, intent: &mut PaymentIntent) -> Protocol {
        match intent.protocol {
            Some(protocol) => protocol,
            None => {
                let detected = detect_protocol(intent);
                intent.protocol = Some(detected);
                detected
            }
        }
    }

    fn record_trace(&self, stage: GateStage, message: &str, data: Option<serde_json::Value>) {
        self.trace.lock().record(stage, message, data);
    }
}

/// Printable, process-unique, time-monotonic intent id
fn next_intent_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let uuid = Uuid::new_v4().simple().to_string();
    format!("pi_{:x}{}", millis, &uuid[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_ids_are_unique_and_prefixed() {
        let a = next_intent_id();
        let b = next_intent_id();
        assert!(a.starts_with("pi_"));
        assert_ne!(a, b);
    }
}
