//! Weighted regex injection classifier
//!
//! The default classifier scores text against an ordered list of rules. Rules
//! are additive: every matching rule contributes its severity weight and the
//! sum is clamped to 1.0, so the probability is monotonic in the number of
//! matches. A custom classifier (e.g. an ML endpoint) can replace the default
//! via the [`InjectionClassifier`] trait.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How strongly a rule match indicates injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleSeverity {
    High,
    Medium,
    Low,
}

impl RuleSeverity {
    /// Additive probability weight
    pub fn weight(&self) -> f64 {
        match self {
            Self::High => 0.4,
            Self::Medium => 0.2,
            Self::Low => 0.1,
        }
    }
}

/// A single injection detection rule
#[derive(Debug, Clone)]
pub struct InjectionRule {
    pattern: Regex,
    pub severity: RuleSeverity,
    pub description: String,
}

impl InjectionRule {
    /// Compile a rule from a pattern string
    pub fn new(
        pattern: &str,
        severity: RuleSeverity,
        description: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            severity,
            description: description.into(),
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// One matched rule in a classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleMatch {
    pub description: String,
    pub severity: RuleSeverity,
}

/// Classifier output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    /// Injection probability in [0, 1]
    pub injection_probability: f64,
    /// Every matched rule, in rule order
    pub details: Vec<RuleMatch>,
}

impl Classification {
    /// A clean result
    pub fn clean() -> Self {
        Self {
            injection_probability: 0.0,
            details: Vec::new(),
        }
    }
}

/// Error from a classifier backend
#[derive(Debug, Clone, Error)]
pub enum ClassifierError {
    #[error("Classifier failed: {0}")]
    Failed(String),
}

/// The injectable classifier seam
///
/// Implementations may suspend (e.g. to call an external scoring service);
/// the built-in pattern classifier never does.
#[async_trait]
pub trait InjectionClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierError>;
}

/// The built-in weighted regex classifier
pub struct PatternClassifier {
    rules: Vec<InjectionRule>,
    enabled: bool,
}

// (pattern, severity, description) triples for the built-in catalogue.
// Five categories: instruction override, financial manipulation, hidden
// content, encoding/eval tricks, social engineering.
const BUILTIN_RULES: &[(&str, RuleSeverity, &str)] = &[
    // --- Direct instruction override ---
    (
        r"(?i)\bignore\s+(?:all\s+|any\s+)?(?:previous\s+|prior\s+|above\s+|earlier\s+)?(?:instructions?|rules?|prompts?|directives?|limits?)\b",
        RuleSeverity::High,
        "instruction override: ignore previous instructions",
    ),
    (
        r"(?i)\bdisregard\s+(?:all\s+|any\s+)?(?:previous|prior|above|your|the)\b",
        RuleSeverity::High,
        "instruction override: disregard directive",
    ),
    (
        r"(?i)\byou\s+are\s+now\b",
        RuleSeverity::High,
        "instruction override: role reassignment",
    ),
    (
        r"(?i)\bforget\s+(?:everything|all|your)\b",
        RuleSeverity::High,
        "instruction override: forget context",
    ),
    (
        r"(?i)\bnew\s+instructions?\b",
        RuleSeverity::Medium,
        "instruction override: new instructions announced",
    ),
    (
        r"(?i)\bsystem\s+prompt\b",
        RuleSeverity::Medium,
        "instruction override: system prompt reference",
    ),
    // --- Financial manipulation ---
    (
        r"(?i)\btransfer\s+(?:all|everything|(?:all\s+)?(?:the\s+)?funds?)\b",
        RuleSeverity::High,
        "financial manipulation: transfer all funds",
    ),
    (
        r"(?i)\bsend\s+(?:all|everything|max(?:imum)?)\b",
        RuleSeverity::High,
        "financial manipulation: send everything",
    ),
    (
        r"(?i)\b(?:drain|empty)\s+(?:the\s+)?(?:wallet|account|funds|balance)\b",
        RuleSeverity::High,
        "financial manipulation: drain wallet",
    ),
    (
        r"(?i)\bchange\s+(?:the\s+)?(?:recipient|address|wallet|payee|destination)\b",
        RuleSeverity::High,
        "financial manipulation: change recipient",
    ),
    (
        r"(?i)\b(?:send|transfer|pay)\b.{0,30}\b0x[a-fA-F0-9]{6}",
        RuleSeverity::High,
        "financial manipulation: raw address embedded in text",
    ),
    (
        r"(?i)\b(?:no|without|unlimited)\s+limits?\b",
        RuleSeverity::High,
        "financial manipulation: limit removal",
    ),
    (
        r"(?i)\bbypass\b.{0,40}\b(?:limits?|approvals?|checks?|polic(?:y|ies)|validation|security)\b",
        RuleSeverity::High,
        "financial manipulation: bypass controls",
    ),
    // --- Hidden content ---
    (
        r"[\x{200B}\x{200C}\x{200D}\x{FEFF}]",
        RuleSeverity::High,
        "hidden content: zero-width characters",
    ),
    (
        r"<!--[\s\S]*?-->",
        RuleSeverity::Medium,
        "hidden content: HTML comment",
    ),
    (
        r"(?i)\[(?:system|admin|hidden)\]",
        RuleSeverity::Medium,
        "hidden content: bracketed authority tag",
    ),
    // --- Encoding / eval tricks ---
    (
        r"(?i)\b(?:base64|rot13|hex)[\s-]*(?:decode|encoded?|:)",
        RuleSeverity::Medium,
        "encoding trick: encoded payload",
    ),
    (
        r"(?i)\beval\s*\(",
        RuleSeverity::High,
        "encoding trick: eval call",
    ),
    (
        r"(?i)\bexec(?:ute)?\s*\(",
        RuleSeverity::Medium,
        "encoding trick: exec call",
    ),
    // --- Social engineering / privilege escalation ---
    (
        r"(?i)\bas\s+(?:an?\s+)?(?:admin|administrator|root|superuser)\b",
        RuleSeverity::Medium,
        "social engineering: admin impersonation",
    ),
    (
        r"(?i)\byour\s+(?:developer|creator|owner|operator)\s+(?:said|told|approved|authorized)\b",
        RuleSeverity::Medium,
        "social engineering: authority appeal",
    ),
    (
        r"(?i)\b(?:override|disable|skip)\s+(?:the\s+)?(?:security|safety|validation|verification|firewall|approval)\b",
        RuleSeverity::High,
        "social engineering: disable safeguards",
    ),
    (
        r"(?i)\bpretend\s+(?:to\s+be|you\s+are)\b",
        RuleSeverity::Medium,
        "social engineering: persona switch",
    ),
    (
        r"(?i)\bdo\s+not\s+(?:tell|inform|alert|notify)\b",
        RuleSeverity::Medium,
        "social engineering: concealment request",
    ),
    (
        r"(?i)\bthis\s+is\s+(?:just\s+)?a\s+test\b",
        RuleSeverity::Low,
        "social engineering: test framing",
    ),
    (
        r"(?i)\burgent(?:ly)?\b",
        RuleSeverity::Low,
        "social engineering: urgency pressure",
    ),
];

impl PatternClassifier {
    /// Build the classifier with the built-in rule catalogue
    pub fn new() -> Self {
        Self::with_rules(Vec::new())
    }

    /// Build with the built-in catalogue plus custom rules appended
    pub fn with_rules(custom: Vec<InjectionRule>) -> Self {
        let mut rules = builtin_rules();
        rules.extend(custom);
        Self {
            rules,
            enabled: true,
        }
    }

    /// A classifier that treats every input as probability 0
    pub fn disabled() -> Self {
        Self {
            rules: Vec::new(),
            enabled: false,
        }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Score text against every rule; matches are additive, clamped to 1.0
    pub fn classify_text(&self, text: &str) -> Classification {
        if !self.enabled {
            return Classification::clean();
        }

        let mut probability = 0.0;
        let mut details = Vec::new();
        for rule in &self.rules {
            if rule.is_match(text) {
                probability += rule.severity.weight();
                details.push(RuleMatch {
                    description: rule.description.clone(),
                    severity: rule.severity,
                });
            }
        }

        Classification {
            injection_probability: probability.min(1.0),
            details,
        }
    }
}

impl Default for PatternClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InjectionClassifier for PatternClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifierError> {
        Ok(self.classify_text(text))
    }
}

fn builtin_rules() -> Vec<InjectionRule> {
    BUILTIN_RULES
        .iter()
        .filter_map(|&(pattern, severity, description)| {
            InjectionRule::new(pattern, severity, description).ok()
        })
        .collect()
}
