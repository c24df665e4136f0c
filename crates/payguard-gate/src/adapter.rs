//! The adapter port and registry
//!
//! Backends plug into the gate through [`PaymentAdapter`]. The registry owns
//! adapters exclusively; adapters hold no reference back to the gate.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use payguard_types::{PaymentIntent, PaymentResult};

/// Error raised by an adapter during execution
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("Adapter execution failed: {0}")]
    Execution(String),
}

/// The shape every payment backend must implement
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Identifier the gate routes on (matched case-insensitively against the
    /// resolved protocol)
    fn name(&self) -> &str;

    /// Cheap, side-effect-free capability probe
    ///
    /// Informational for consumers; routing matches by name only (see
    /// DESIGN.md).
    fn can_handle(&self, intent: &PaymentIntent) -> bool;

    /// Execute the payment against the backend
    ///
    /// A declined payment is a returned result with `success == false`; an
    /// `Err` means the backend itself failed.
    async fn execute(&self, intent: &PaymentIntent) -> Result<PaymentResult, AdapterError>;
}

/// Ordered adapter registry with deterministic lookup
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn PaymentAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adapters(adapters: Vec<Arc<dyn PaymentAdapter>>) -> Self {
        Self { adapters }
    }

    /// Append an adapter; on a name collision the earlier registration wins
    pub fn register(&mut self, adapter: Arc<dyn PaymentAdapter>) {
        self.adapters.push(adapter);
    }

    /// First adapter whose lowercased name equals the resolved protocol
    pub fn find(&self, protocol: &str) -> Option<Arc<dyn PaymentAdapter>> {
        let wanted = protocol.to_lowercase();
        self.adapters
            .iter()
            .find(|adapter| adapter.name().to_lowercase() == wanted)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters
            .iter()
            .map(|adapter| adapter.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedAdapter {
        name: String,
        tag: &'static str,
    }

    #[async_trait]
    impl PaymentAdapter for NamedAdapter {
        fn name(&self) -> &str {
            &self.name
        }

        fn can_handle(&self, _intent: &PaymentIntent) -> bool {
            true
        }

        async fn execute(&self, intent: &PaymentIntent) -> Result<PaymentResult, AdapterError> {
            Ok(PaymentResult::succeeded(
                intent,
                payguard_types::Protocol::X402,
                self.tag.to_string(),
            ))
        }
    }

    fn adapter(name: &str, tag: &'static str) -> Arc<dyn PaymentAdapter> {
        Arc::new(NamedAdapter {
            name: name.to_string(),
            tag,
        })
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut registry = AdapterRegistry::new();
        registry.register(adapter("X402", "a"));
        assert!(registry.find("x402").is_some());
        assert!(registry.find("X402").is_some());
        assert!(registry.find("ap2").is_none());
    }

    #[tokio::test]
    async fn test_first_registration_wins_on_collision() {
        let mut registry = AdapterRegistry::new();
        registry.register(adapter("x402", "first"));
        registry.register(adapter("x402", "second"));

        let found = registry.find("x402").unwrap();
        // Execute to observe which instance was resolved
        let intent = PaymentIntent::from_request(
            payguard_types::IntentRequest::new("https://example.com", 1.0, "USD", "test"),
            "pi_reg_test".to_string(),
            0,
        );
        let result = found.execute(&intent).await.unwrap();
        assert_eq!(result.transaction_id.as_deref(), Some("first"));
    }
}
