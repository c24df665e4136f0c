//! Payguard Types - Canonical domain types for the transaction firewall
//!
//! This crate contains the foundational types shared by every Payguard crate,
//! with zero dependencies on the other payguard crates. It defines:
//!
//! - Payment intents, escrow terms, and the closed protocol tag set
//! - Firewall verdicts and drift indicators
//! - The stable gate error taxonomy
//!
//! # Key Principle
//!
//! **Agents may PROPOSE payments, NEVER EXECUTE money.**
//!
//! An intent is an untrusted proposal until the gate has run every
//! deterministic check against it. Nothing in this crate mutates an intent
//! after creation except filling a detected protocol tag.

pub mod error;
pub mod intent;
pub mod verdict;

pub use error::{GateError, Result};
pub use intent::{
    EscrowTerms, IntentRequest, Milestone, PaymentIntent, PaymentResult, Protocol,
};
pub use verdict::{
    DriftIndicator, DriftSeverity, FirewallVerdict, GateLayer, IntentDiffResult,
};
