//! Payguard Gate - The payment pipeline orchestrator
//!
//! The gate owns the hot path: stamp the request, run the firewall, run the
//! deterministic policy engine, gate on human approval, resolve a protocol,
//! route to an adapter, execute, and record spend only on success. Every
//! gating failure is raised as a typed error before any side effect.

pub mod adapter;
pub mod gate;
pub mod protocol;
pub mod trace;

pub use adapter::{AdapterError, AdapterRegistry, PaymentAdapter};
pub use gate::{ApprovalHook, GateConfig, PaymentGate};
pub use protocol::detect_protocol;
pub use trace::{GateStage, GateTrace, GateTraceEvent};
