//! Rule-based intent extraction
//!
//! Parses free text into the structured fields a payment intent carries, so
//! the firewall can cross-check what the text *says* against what the intent
//! *does*. Extraction is deterministic; every rule is a regex over the input.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Structured fields recovered from free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredIntent {
    pub amount: Option<f64>,
    /// Normalized currency code, e.g. "USDC"
    pub currency: Option<String>,
    pub recipient: Option<String>,
    /// Normalized duration ("2h") or named time ("tomorrow")
    pub deadline: Option<String>,
    /// What remains of the text once matched spans and filler words are gone
    pub purpose: Option<String>,
    /// The original input
    pub raw: String,
}

static DOLLAR_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)").unwrap());

static AMOUNT_THEN_CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b([0-9][0-9,]*(?:\.[0-9]+)?)\s*(usdc|usd|ethereum|ether|eth|solana|sol|bitcoin|btc|dai|matic|avax|dollars?)\b",
    )
    .unwrap()
});

static CURRENCY_THEN_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(usdc|usd|ethereum|ether|eth|solana|sol|bitcoin|btc|dai|matic|avax)\s*([0-9][0-9,]*(?:\.[0-9]+)?)\b",
    )
    .unwrap()
});

static AGENT_URI: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"agent://[^\s]+").unwrap());
static HEX_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"0x[a-fA-F0-9]{40}").unwrap());
static ENS_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[a-zA-Z0-9][a-zA-Z0-9-]*\.eth\b").unwrap());
static HTTP_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").unwrap());

static WITHIN_DEADLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bwithin\s+([0-9]+)\s*(minutes?|mins?|hours?|hrs?|days?|weeks?|m|h|d|w)\b")
        .unwrap()
});

static BY_DEADLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bby\s+(tomorrow|tonight|end\s+of\s+(?:day|week|month)|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .unwrap()
});

static BARE_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b([0-9]+)\s*(minutes?|mins?|hours?|hrs?|days?|weeks?|m|h|d|w)\b").unwrap()
});

const FILLER_WORDS: &[&str] = &["pay", "send", "transfer", "to", "for", "within", "by"];

fn currency_alias(token: &str) -> Option<&'static str> {
    match token.to_lowercase().as_str() {
        "usd" | "dollar" | "dollars" => Some("USD"),
        "usdc" => Some("USDC"),
        "eth" | "ether" | "ethereum" => Some("ETH"),
        "sol" | "solana" => Some("SOL"),
        "btc" | "bitcoin" => Some("BTC"),
        "dai" => Some("DAI"),
        "matic" => Some("MATIC"),
        "avax" => Some("AVAX"),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

fn unit_letter(unit: &str) -> String {
    unit.to_lowercase()
        .chars()
        .next()
        .map(String::from)
        .unwrap_or_default()
}

/// Parse free text into a [`StructuredIntent`]
pub fn extract_intent(text: &str) -> StructuredIntent {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut amount: Option<f64> = None;
    let mut currency: Option<String> = None;

    // Amount/currency resolution is layered: bare dollar form first, an
    // amount with a trailing currency token overrides it (unless the token
    // is just the word "dollars"), and a leading currency token only fills
    // gaps left by the first two.
    if let Some(caps) = DOLLAR_AMOUNT.captures(text) {
        if let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) {
            if let Some(value) = parse_number(num.as_str()) {
                amount = Some(value);
                currency = Some("USD".to_string());
                spans.push((whole.start(), whole.end()));
            }
        }
    }

    if let Some(caps) = AMOUNT_THEN_CURRENCY.captures(text) {
        if let (Some(whole), Some(num), Some(token)) = (caps.get(0), caps.get(1), caps.get(2)) {
            let is_dollar_word = token.as_str().to_lowercase().starts_with("dollar");
            if let (Some(value), Some(code)) =
                (parse_number(num.as_str()), currency_alias(token.as_str()))
            {
                if is_dollar_word {
                    if amount.is_none() {
                        amount = Some(value);
                        currency = Some(code.to_string());
                    }
                } else {
                    amount = Some(value);
                    currency = Some(code.to_string());
                }
                spans.push((whole.start(), whole.end()));
            }
        }
    }

    if amount.is_none() {
        if let Some(caps) = CURRENCY_THEN_AMOUNT.captures(text) {
            if let (Some(whole), Some(token), Some(num)) = (caps.get(0), caps.get(1), caps.get(2)) {
                if let (Some(value), Some(code)) =
                    (parse_number(num.as_str()), currency_alias(token.as_str()))
                {
                    amount = Some(value);
                    currency = Some(code.to_string());
                    spans.push((whole.start(), whole.end()));
                }
            }
        }
    }

    // Recipient: first matching shape wins
    let recipient = [&*AGENT_URI, &*HEX_ADDRESS, &*ENS_NAME, &*HTTP_URL]
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| {
            spans.push((m.start(), m.end()));
            m.as_str().to_string()
        });

    // Deadline: explicit "within", then a named "by" time, then a bare duration
    let deadline = if let Some(caps) = WITHIN_DEADLINE.captures(text) {
        match (caps.get(0), caps.get(1), caps.get(2)) {
            (Some(whole), Some(num), Some(unit)) => {
                spans.push((whole.start(), whole.end()));
                Some(format!("{}{}", num.as_str(), unit_letter(unit.as_str())))
            }
            _ => None,
        }
    } else if let Some(caps) = BY_DEADLINE.captures(text) {
        match (caps.get(0), caps.get(1)) {
            (Some(whole), Some(token)) => {
                spans.push((whole.start(), whole.end()));
                let normalized = token
                    .as_str()
                    .to_lowercase()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                Some(normalized)
            }
            _ => None,
        }
    } else if let Some(caps) = BARE_DURATION.captures(text) {
        match (caps.get(0), caps.get(1), caps.get(2)) {
            (Some(whole), Some(num), Some(unit)) => {
                spans.push((whole.start(), whole.end()));
                Some(format!("{}{}", num.as_str(), unit_letter(unit.as_str())))
            }
            _ => None,
        }
    } else {
        None
    };

    let purpose = residual_purpose(text, &mut spans);

    StructuredIntent {
        amount,
        currency,
        recipient,
        deadline,
        purpose,
        raw: text.to_string(),
    }
}

/// The input with all matched spans blanked, filler words removed, `$`
/// stripped, and whitespace collapsed; empty becomes None
fn residual_purpose(text: &str, spans: &mut Vec<(usize, usize)>) -> Option<String> {
    spans.sort_unstable();
    let mut masked = String::with_capacity(text.len());
    let mut cursor = 0;
    for &(start, end) in spans.iter() {
        if start > cursor {
            masked.push_str(&text[cursor..start]);
            masked.push(' ');
        }
        cursor = cursor.max(end);
    }
    if cursor < text.len() {
        masked.push_str(&text[cursor..]);
    }

    let cleaned = masked
        .replace('$', "")
        .split_whitespace()
        .filter(|token| !FILLER_WORDS.contains(&token.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_dollar_form_defaults_to_usd() {
        let parsed = extract_intent("pay $1,250.50 for compute credits");
        assert_eq!(parsed.amount, Some(1250.50));
        assert_eq!(parsed.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_trailing_currency_token_overrides_dollar_form() {
        let parsed = extract_intent("send 50 USDC to agent://api-provider.verified");
        assert_eq!(parsed.amount, Some(50.0));
        assert_eq!(parsed.currency.as_deref(), Some("USDC"));
        assert_eq!(
            parsed.recipient.as_deref(),
            Some("agent://api-provider.verified")
        );
    }

    #[test]
    fn test_dollar_word_does_not_override() {
        let parsed = extract_intent("pay $20 dollars");
        assert_eq!(parsed.amount, Some(20.0));
        assert_eq!(parsed.currency.as_deref(), Some("USD"));

        let parsed = extract_intent("pay 5 dollars");
        assert_eq!(parsed.amount, Some(5.0));
        assert_eq!(parsed.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_leading_currency_fills_gap_only() {
        let parsed = extract_intent("settle the USDC 75 invoice");
        assert_eq!(parsed.amount, Some(75.0));
        assert_eq!(parsed.currency.as_deref(), Some("USDC"));
    }

    #[test]
    fn test_currency_aliases_normalize() {
        assert_eq!(
            extract_intent("send 0.5 ether now").currency.as_deref(),
            Some("ETH")
        );
        assert_eq!(
            extract_intent("buy 2 bitcoin").currency.as_deref(),
            Some("BTC")
        );
        assert_eq!(
            extract_intent("stake 10 solana").currency.as_deref(),
            Some("SOL")
        );
    }

    #[test]
    fn test_recipient_ladder_order() {
        let parsed = extract_intent(
            "route via agent://broker.verified or 0x52908400098527886E0F7030069857D2E4169EE7",
        );
        assert_eq!(parsed.recipient.as_deref(), Some("agent://broker.verified"));

        let parsed = extract_intent("pay 0x52908400098527886E0F7030069857D2E4169EE7 today");
        assert_eq!(
            parsed.recipient.as_deref(),
            Some("0x52908400098527886E0F7030069857D2E4169EE7")
        );

        let parsed = extract_intent("tip vitalik.eth for the talk");
        assert_eq!(parsed.recipient.as_deref(), Some("vitalik.eth"));

        let parsed = extract_intent("checkout at https://shop.example.com/cart");
        assert_eq!(
            parsed.recipient.as_deref(),
            Some("https://shop.example.com/cart")
        );
    }

    #[test]
    fn test_deadline_ladder() {
        assert_eq!(
            extract_intent("finish within 2 hours").deadline.as_deref(),
            Some("2h")
        );
        assert_eq!(
            extract_intent("done by end of  week").deadline.as_deref(),
            Some("end of week")
        );
        assert_eq!(
            extract_intent("deliver by Friday please").deadline.as_deref(),
            Some("friday")
        );
        assert_eq!(
            extract_intent("expires in 30 min").deadline.as_deref(),
            Some("30m")
        );
    }

    #[test]
    fn test_residual_purpose_drops_matched_spans_and_fillers() {
        let parsed = extract_intent("pay 50 USDC to agent://api.verified for API usage");
        assert_eq!(parsed.purpose.as_deref(), Some("API usage"));
    }

    #[test]
    fn test_fully_consumed_text_yields_no_purpose() {
        let parsed = extract_intent("send 50 USDC to agent://api.verified");
        assert_eq!(parsed.purpose, None);
    }

    #[test]
    fn test_plain_text_has_no_structured_fields() {
        let parsed = extract_intent("monthly subscription renewal");
        assert_eq!(parsed.amount, None);
        assert_eq!(parsed.currency, None);
        assert_eq!(parsed.recipient, None);
        assert_eq!(parsed.deadline, None);
        assert_eq!(
            parsed.purpose.as_deref(),
            Some("monthly subscription renewal")
        );
        assert_eq!(parsed.raw, "monthly subscription renewal");
    }
}
