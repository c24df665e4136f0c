//! Payguard Firewall - Untrusted-text defenses for payment intents
//!
//! An agent's textual reasoning is untrusted: an attacker who can influence
//! the agent's inputs can steer it to pay the wrong party or the wrong
//! amount. This crate holds the text-facing layers of the gate:
//!
//! - [`extract_intent`] parses free text into structured fields
//! - [`PatternClassifier`] scores text against weighted injection rules
//! - [`DriftComparator`] measures divergence from the user's original
//!   instruction
//! - [`TransactionFirewall`] composes the three into one verdict per intent
//!
//! The firewall fails open by default on classifier errors because the
//! deterministic policy engine downstream is the hard floor; the
//! `fail_closed` knob inverts that.

pub mod classifier;
pub mod drift;
pub mod extract;
pub mod firewall;

pub use classifier::{
    Classification, ClassifierError, InjectionClassifier, InjectionRule, PatternClassifier,
    RuleMatch, RuleSeverity,
};
pub use drift::DriftComparator;
pub use extract::{extract_intent, StructuredIntent};
pub use firewall::{BlockHook, FirewallConfig, TransactionFirewall};
