//! Payguard Policy - Deterministic spending controls
//!
//! The policy engine is the hard floor of the gate: a fixed-order sequence of
//! deterministic checks no amount of adversarial text can argue away. It
//! enforces per-transaction, rolling daily/monthly, recipient, category,
//! cooldown, and escrow-threshold rules, and owns the running spend ledger.
//!
//! Checks always run in the same order and the first failing rule wins, so
//! callers can rely on which rule a verdict cites.

pub mod engine;
pub mod glob;
pub mod ledger;

pub use engine::{PolicyConfig, PolicyEngine};
pub use glob::GlobPattern;
pub use ledger::SpendLedger;
