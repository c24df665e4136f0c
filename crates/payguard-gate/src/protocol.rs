//! Protocol detection from the recipient shape
//!
//! Applied only when an intent carries no explicit protocol tag. The table
//! is ordered and the first match wins; `x402` is the default.

use payguard_types::{PaymentIntent, Protocol};

const MERCHANT_PREFIXES: &[&str] = &["merchant:", "shop:", "store:"];
const MERCHANT_SUFFIXES: &[&str] = &[".merchant", ".shop"];

/// Derive a protocol tag from the intent's escrow terms and recipient shape
pub fn detect_protocol(intent: &PaymentIntent) -> Protocol {
    if intent.escrow.is_some() {
        return Protocol::Escrow;
    }

    let to = intent.to.to_lowercase();
    if to.starts_with("http://") || to.starts_with("https://") {
        return Protocol::X402;
    }
    if MERCHANT_PREFIXES.iter().any(|prefix| to.starts_with(prefix))
        || MERCHANT_SUFFIXES.iter().any(|suffix| to.ends_with(suffix))
    {
        return Protocol::Acp;
    }
    if to.starts_with("agent://") || to.starts_with("did:") {
        return Protocol::Ap2;
    }

    Protocol::X402
}

#[cfg(test)]
mod tests {
    use super::*;
    use payguard_types::{EscrowTerms, IntentRequest};

    fn intent(to: &str) -> PaymentIntent {
        PaymentIntent::from_request(
            IntentRequest::new(to, 10.0, "USDC", "test"),
            "pi_proto_test".to_string(),
            0,
        )
    }

    #[test]
    fn test_escrow_terms_win_over_recipient_shape() {
        let mut escrowed = intent("https://pay.example.com");
        escrowed.escrow = Some(EscrowTerms {
            deadline: "7d".to_string(),
            evaluator: None,
            milestones: vec![],
        });
        assert_eq!(detect_protocol(&escrowed), Protocol::Escrow);
    }

    #[test]
    fn test_http_recipients_route_to_x402() {
        assert_eq!(detect_protocol(&intent("https://pay.example.com")), Protocol::X402);
        assert_eq!(detect_protocol(&intent("http://pay.example.com")), Protocol::X402);
    }

    #[test]
    fn test_merchant_shapes_route_to_acp() {
        assert_eq!(detect_protocol(&intent("merchant:coffee-shop")), Protocol::Acp);
        assert_eq!(detect_protocol(&intent("SHOP:books")), Protocol::Acp);
        assert_eq!(detect_protocol(&intent("store:games")), Protocol::Acp);
        assert_eq!(detect_protocol(&intent("acme.MERCHANT")), Protocol::Acp);
        assert_eq!(detect_protocol(&intent("acme.shop")), Protocol::Acp);
    }

    #[test]
    fn test_agent_and_did_route_to_ap2() {
        assert_eq!(detect_protocol(&intent("agent://api.verified")), Protocol::Ap2);
        assert_eq!(detect_protocol(&intent("did:key:z6Mkf")), Protocol::Ap2);
    }

    #[test]
    fn test_bare_address_defaults_to_x402() {
        assert_eq!(
            detect_protocol(&intent("0x52908400098527886E0F7030069857D2E4169EE7")),
            Protocol::X402
        );
    }
}
