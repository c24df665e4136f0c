//! The deterministic policy engine
//!
//! `evaluate` runs a fixed-order rule sequence and returns the first failing
//! rule's verdict. Spend is recorded separately by the gate, and only after a
//! successful execution.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use payguard_types::{FirewallVerdict, GateLayer, PaymentIntent};

use crate::glob::GlobPattern;
use crate::ledger::SpendLedger;

/// Spending policy bounds; absent fields disable the corresponding check
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Hard cap on a single transaction
    pub max_per_transaction: Option<f64>,
    /// Rolling cap per UTC calendar day
    pub max_daily: Option<f64>,
    /// Rolling cap per UTC calendar month
    pub max_monthly: Option<f64>,
    /// Amounts above this must carry escrow terms
    pub require_escrow_above: Option<f64>,
    /// Amounts above this require a human approver
    pub require_human_approval_above: Option<f64>,
    /// Minimum wall-clock gap between recorded transactions
    pub cooldown_ms: Option<i64>,
    /// Recipient allowlist globs; when set, at least one must match
    pub allowed_recipients: Option<Vec<String>>,
    /// Recipient blocklist globs; any match blocks, ahead of the allowlist
    pub blocked_recipients: Option<Vec<String>>,
    /// Permitted values for `metadata.category`
    pub allowed_categories: Option<Vec<String>>,
}

/// Deterministic rule evaluation plus rolling spend state
///
/// The ledger sits behind a mutex so the engine can be driven through
/// `&self` from async tasks; the lock is never held across an await. The
/// check-then-record window is not atomic across concurrent `pay` calls,
/// which is tolerated: the engine is meant to be driven by a single logical
/// actor (see DESIGN.md).
pub struct PolicyEngine {
    config: PolicyConfig,
    allowed: Vec<GlobPattern>,
    blocked: Vec<GlobPattern>,
    ledger: Mutex<SpendLedger>,
}

impl PolicyEngine {
    /// Build an engine, precompiling all glob patterns
    pub fn new(config: PolicyConfig) -> Self {
        let compile = |patterns: &Option<Vec<String>>| {
            patterns
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(|p| GlobPattern::compile(p))
                .collect()
        };
        let allowed = compile(&config.allowed_recipients);
        let blocked = compile(&config.blocked_recipients);
        Self {
            config,
            allowed,
            blocked,
            ledger: Mutex::new(SpendLedger::new()),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Run every configured rule in fixed order and return the first failure
    ///
    /// Order: maxPerTransaction, maxDaily, maxMonthly, blockedRecipients,
    /// allowedRecipients, allowedCategories, cooldownMs, requireEscrowAbove.
    pub fn evaluate(&self, intent: &PaymentIntent) -> FirewallVerdict {
        if let Some(max) = self.config.max_per_transaction {
            if intent.amount > max {
                return Self::violation(
                    "maxPerTransaction",
                    format!("amount {} exceeds per-transaction limit {}", intent.amount, max),
                    json!(intent.amount),
                    json!(max),
                );
            }
        }

        if let Some(max) = self.config.max_daily {
            let spent = self.ledger.lock().daily_total(intent.created_at_ms);
            if spent + intent.amount > max {
                return Self::violation(
                    "maxDaily",
                    format!(
                        "daily spend {} plus amount {} exceeds daily limit {}",
                        spent, intent.amount, max
                    ),
                    json!(spent + intent.amount),
                    json!(max),
                );
            }
        }

        if let Some(max) = self.config.max_monthly {
            let spent = self.ledger.lock().monthly_total(intent.created_at_ms);
            if spent + intent.amount > max {
                return Self::violation(
                    "maxMonthly",
                    format!(
                        "monthly spend {} plus amount {} exceeds monthly limit {}",
                        spent, intent.amount, max
                    ),
                    json!(spent + intent.amount),
                    json!(max),
                );
            }
        }

        // Blocklist wins over allowlist when a recipient matches both
        if let Some(pattern) = self.blocked.iter().find(|p| p.matches(&intent.to)) {
            return Self::violation(
                "blockedRecipients",
                format!("recipient {} matches blocked pattern {}", intent.to, pattern.source()),
                json!(intent.to),
                json!(pattern.source()),
            );
        }

        if self.config.allowed_recipients.is_some()
            && !self.allowed.iter().any(|p| p.matches(&intent.to))
        {
            return Self::violation(
                "allowedRecipients",
                format!("recipient {} matches no allowed pattern", intent.to),
                json!(intent.to),
                json!(self.config.allowed_recipients),
            );
        }

        if let Some(categories) = &self.config.allowed_categories {
            if let Some(serde_json::Value::String(category)) = intent.metadata.get("category") {
                if !categories.iter().any(|c| c == category) {
                    return Self::violation(
                        "allowedCategories",
                        format!("category {} is not in the allowed list", category),
                        json!(category),
                        json!(categories),
                    );
                }
            }
        }

        if let Some(cooldown) = self.config.cooldown_ms {
            let last = self.ledger.lock().last_transaction_ms();
            if let Some(last) = last {
                let elapsed = Utc::now().timestamp_millis() - last;
                if elapsed < cooldown {
                    return Self::violation(
                        "cooldownMs",
                        format!("only {}ms since last transaction, cooldown is {}ms", elapsed, cooldown),
                        json!(elapsed),
                        json!(cooldown),
                    );
                }
            }
        }

        if let Some(threshold) = self.config.require_escrow_above {
            if intent.amount > threshold && intent.escrow.is_none() {
                return Self::violation(
                    "requireEscrowAbove",
                    format!("amount {} exceeds escrow threshold {} with no escrow terms", intent.amount, threshold),
                    json!(intent.amount),
                    json!(threshold),
                );
            }
        }

        FirewallVerdict::allow(GateLayer::Policy, "all policy checks passed")
    }

    /// Whether the intent must pass the human-approval gate
    ///
    /// Strictly greater-than: the boundary value does not require approval.
    pub fn requires_human_approval(&self, intent: &PaymentIntent) -> bool {
        self.config
            .require_human_approval_above
            .is_some_and(|threshold| intent.amount > threshold)
    }

    /// Add a successful payment to the spend buckets keyed by the intent's
    /// UTC timestamp
    pub fn record_transaction(&self, intent: &PaymentIntent) {
        self.ledger.lock().record(intent.amount, intent.created_at_ms);
        tracing::info!(
            intent = %intent.id,
            amount = intent.amount,
            "transaction recorded"
        );
    }

    /// Total recorded on the UTC day containing `timestamp_ms`
    pub fn daily_spent(&self, timestamp_ms: i64) -> f64 {
        self.ledger.lock().daily_total(timestamp_ms)
    }

    /// Total recorded in the UTC month containing `timestamp_ms`
    pub fn monthly_spent(&self, timestamp_ms: i64) -> f64 {
        self.ledger.lock().monthly_total(timestamp_ms)
    }

    /// Clear all spend state, indistinguishable from a fresh engine
    pub fn reset(&self) {
        self.ledger.lock().reset();
    }

    fn violation(
        policy: &str,
        reason: String,
        value: serde_json::Value,
        limit: serde_json::Value,
    ) -> FirewallVerdict {
        FirewallVerdict::block(GateLayer::Policy, reason).with_details(json!({
            "policy": policy,
            "value": value,
            "limit": limit,
        }))
    }
}
