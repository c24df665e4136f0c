//! Intent-drift comparison
//!
//! Compares a current intent against the user's original stated instruction.
//! The original is extracted once at construction and memoized; only fields
//! the original actually mentions are scored.

use payguard_types::{DriftIndicator, DriftSeverity, IntentDiffResult, PaymentIntent};

use crate::extract::{extract_intent, StructuredIntent};

/// Stop words dropped before purpose similarity is computed
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "to", "for", "of", "in", "on", "at", "is", "it", "and", "or", "but", "with",
    "from", "by", "as", "this", "that", "pay", "send", "transfer", "please", "i", "my", "me",
    "want",
];

/// Per-field drift comparator seeded with the original instruction
#[derive(Debug, Clone)]
pub struct DriftComparator {
    original: StructuredIntent,
}

impl DriftComparator {
    /// Extract and memoize the original instruction
    pub fn new(original_instruction: &str) -> Self {
        Self {
            original: extract_intent(original_instruction),
        }
    }

    /// The memoized extraction
    pub fn original(&self) -> &StructuredIntent {
        &self.original
    }

    /// Score the current intent field by field against the original
    ///
    /// The similarity is the mean of the present-field scores, rounded to
    /// three decimals. An indicator is emitted whenever a field score falls
    /// below 0.8 (purpose: 0.5).
    pub fn check(&self, intent: &PaymentIntent) -> IntentDiffResult {
        let mut scores = Vec::new();
        let mut indicators = Vec::new();

        if let Some(original_amount) = self.original.amount {
            let score = amount_similarity(original_amount, intent.amount);
            scores.push(score);
            if score < 0.8 {
                indicators.push(DriftIndicator {
                    field: "amount".to_string(),
                    original: format_amount(original_amount),
                    current: format_amount(intent.amount),
                    severity: severity_for(score, 0.3),
                });
            }
        }

        if let Some(original_recipient) = &self.original.recipient {
            let score = recipient_similarity(original_recipient, &intent.to);
            scores.push(score);
            if score < 0.8 {
                indicators.push(DriftIndicator {
                    field: "recipient".to_string(),
                    original: original_recipient.clone(),
                    current: intent.to.clone(),
                    severity: severity_for(score, 0.3),
                });
            }
        }

        if let Some(original_currency) = &self.original.currency {
            let score = if original_currency.eq_ignore_ascii_case(&intent.currency) {
                1.0
            } else {
                0.0
            };
            scores.push(score);
            if score < 0.8 {
                indicators.push(DriftIndicator {
                    field: "currency".to_string(),
                    original: original_currency.clone(),
                    current: intent.currency.clone(),
                    // A currency swap is suspicious but not amount-scaled
                    severity: DriftSeverity::Medium,
                });
            }
        }

        if let Some(original_purpose) = &self.original.purpose {
            let score = jaccard_similarity(original_purpose, &intent.purpose);
            scores.push(score);
            if score < 0.5 {
                indicators.push(DriftIndicator {
                    field: "purpose".to_string(),
                    original: original_purpose.clone(),
                    current: intent.purpose.clone(),
                    severity: severity_for(score, 0.2),
                });
            }
        }

        let similarity = if scores.is_empty() {
            1.0
        } else {
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            (mean * 1000.0).round() / 1000.0
        };

        IntentDiffResult {
            similarity,
            indicators,
        }
    }
}

fn severity_for(score: f64, high_below: f64) -> DriftSeverity {
    if score < high_below {
        DriftSeverity::High
    } else {
        DriftSeverity::Medium
    }
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{}", amount)
    }
}

/// Ratio ladder over min/max, with explicit zero handling
fn amount_similarity(original: f64, current: f64) -> f64 {
    if original == 0.0 && current == 0.0 {
        return 1.0;
    }
    if original == 0.0 || current == 0.0 {
        return 0.0;
    }
    let ratio = original.min(current) / original.max(current);
    if ratio >= 0.99 {
        1.0
    } else if ratio >= 0.9 {
        0.8
    } else if ratio >= 0.5 {
        0.5
    } else {
        ratio
    }
}

/// Equality, substring, and shared-host ladder
fn recipient_similarity(original: &str, current: &str) -> f64 {
    let a = original.trim().to_lowercase();
    let b = current.trim().to_lowercase();
    if a == b {
        return 1.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return 0.7;
    }
    if let (Some(host_a), Some(host_b)) = (extract_host(&a), extract_host(&b)) {
        if host_a == host_b {
            return 0.6;
        }
    }
    0.0
}

/// The domain after `https://`, `http://`, or `agent://`
fn extract_host(uri: &str) -> Option<&str> {
    let rest = uri
        .strip_prefix("https://")
        .or_else(|| uri.strip_prefix("http://"))
        .or_else(|| uri.strip_prefix("agent://"))?;
    rest.split('/').next()
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() > 1 && !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity over tokenized words
fn jaccard_similarity(a: &str, b: &str) -> f64 {
    use std::collections::HashSet;

    let set_a: HashSet<String> = tokenize(a).into_iter().collect();
    let set_b: HashSet<String> = tokenize(b).into_iter().collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::*;
    use payguard_types::IntentRequest;

    fn intent(to: &str, amount: f64, currency: &str, purpose: &str) -> PaymentIntent {
        PaymentIntent::from_request(
            IntentRequest::new(to, amount, currency, purpose),
            "pi_drift_test".to_string(),
            1_700_000_000_000,
        )
    }

    #[test]
    fn test_identical_intent_scores_one_with_no_drift() {
        let comparator =
            DriftComparator::new("Pay 50 USDC to agent://api-provider.verified for API usage");
        let result = comparator.check(&intent(
            "agent://api-provider.verified",
            50.0,
            "USDC",
            "API usage",
        ));
        assert_eq!(result.similarity, 1.0);
        assert!(result.indicators.is_empty());
    }

    #[test]
    fn test_amount_ratio_ladder() {
        assert_eq!(amount_similarity(100.0, 100.0), 1.0);
        assert_eq!(amount_similarity(100.0, 99.5), 1.0);
        assert_eq!(amount_similarity(100.0, 92.0), 0.8);
        assert_eq!(amount_similarity(100.0, 60.0), 0.5);
        assert_eq!(amount_similarity(100.0, 10.0), 0.1);
        assert_eq!(amount_similarity(0.0, 0.0), 1.0);
        assert_eq!(amount_similarity(0.0, 5.0), 0.0);
    }

    #[test]
    fn test_amount_blowup_flags_high_severity() {
        let comparator = DriftComparator::new("Pay 50 USDC to agent://api.verified");
        let result = comparator.check(&intent("agent://api.verified", 5000.0, "USDC", ""));
        let drift = result
            .indicators
            .iter()
            .find(|i| i.field == "amount")
            .expect("amount drift expected");
        assert_eq!(drift.severity, DriftSeverity::High);
        assert_eq!(drift.original, "50");
        assert_eq!(drift.current, "5000");
    }

    #[test]
    fn test_recipient_ladder() {
        assert_eq!(
            recipient_similarity("agent://api.verified", "AGENT://API.VERIFIED"),
            1.0
        );
        assert_eq!(
            recipient_similarity("agent://api.verified", "agent://api.verified/payments"),
            0.7
        );
        assert_eq!(
            recipient_similarity("https://pay.example.com/a", "https://pay.example.com/b"),
            0.6
        );
        assert_eq!(
            recipient_similarity("agent://api.verified", "agent://evil.unverified"),
            0.0
        );
    }

    #[test]
    fn test_currency_swap_is_always_medium() {
        let comparator = DriftComparator::new("Pay 50 USDC to agent://api.verified");
        let result = comparator.check(&intent("agent://api.verified", 50.0, "ETH", ""));
        let drift = result
            .indicators
            .iter()
            .find(|i| i.field == "currency")
            .expect("currency drift expected");
        assert_eq!(drift.severity, DriftSeverity::Medium);
    }

    #[test]
    fn test_purpose_jaccard_ignores_stop_words() {
        assert_eq!(
            jaccard_similarity("pay for the API usage", "API usage"),
            1.0
        );
        assert_eq!(jaccard_similarity("", ""), 1.0);
        assert_eq!(jaccard_similarity("API usage", ""), 0.0);
        assert!(jaccard_similarity("API usage fees", "GPU rental fees") < 0.5);
    }

    #[test]
    fn test_only_fields_present_in_original_are_scored() {
        // The original names no amount and no currency; wildly different
        // values on the intent must not count against it
        let comparator = DriftComparator::new("settle the invoice with agent://billing.verified");
        let result = comparator.check(&intent(
            "agent://billing.verified",
            99999.0,
            "BTC",
            "settle the invoice with",
        ));
        assert!(result.similarity > 0.9, "similarity {}", result.similarity);
    }

    #[test]
    fn test_similarity_rounds_to_three_decimals() {
        let comparator = DriftComparator::new("Pay 50 USDC to agent://api.verified for data");
        let result = comparator.check(&intent("agent://api.verified", 30.0, "USDC", "data"));
        // amount 0.5? no: 30/50 = 0.6 -> 0.5 band; fields: amount 0.5,
        // recipient 1.0, currency 1.0, purpose 1.0 -> mean 0.875
        assert_eq!(result.similarity, 0.875);
    }
}
