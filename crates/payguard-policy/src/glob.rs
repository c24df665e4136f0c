//! Shell-style glob matching for recipient and category patterns
//!
//! Supports `*` (zero or more characters) and `?` (exactly one character).
//! Patterns are compiled once at policy construction time; the source string
//! is kept alongside the matcher for diagnostic detail.

use regex::Regex;

/// A compiled glob pattern
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    matcher: Option<Regex>,
}

/// Regex metacharacters that must be escaped when translating a glob
const META: &[char] = &[
    '.', '+', '^', '$', '{', '}', '(', ')', '|', '[', ']', '\\',
];

impl GlobPattern {
    /// Compile a glob pattern
    ///
    /// A pattern without wildcards skips regex compilation entirely and
    /// matches by string equality. If compilation fails the pattern also
    /// falls back to exact equality.
    pub fn compile(pattern: &str) -> Self {
        let source = pattern.to_string();
        if !pattern.contains('*') && !pattern.contains('?') {
            return Self {
                source,
                matcher: None,
            };
        }

        let mut translated = String::with_capacity(pattern.len() * 2 + 2);
        translated.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => translated.push_str(".*"),
                '?' => translated.push('.'),
                c if META.contains(&c) => {
                    translated.push('\\');
                    translated.push(c);
                }
                c => translated.push(c),
            }
        }
        translated.push('$');

        Self {
            source,
            matcher: Regex::new(&translated).ok(),
        }
    }

    /// The original pattern string
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Test an input against the pattern
    pub fn matches(&self, input: &str) -> bool {
        if self.source == "*" {
            return true;
        }
        match &self.matcher {
            Some(re) => re.is_match(input),
            None => self.source == input,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_without_wildcards() {
        let glob = GlobPattern::compile("agent://vendor.verified");
        assert!(glob.matches("agent://vendor.verified"));
        assert!(!glob.matches("agent://vendor.verified.evil"));
    }

    #[test]
    fn test_star_matches_any_span() {
        let glob = GlobPattern::compile("agent://*.verified");
        assert!(glob.matches("agent://api-provider.verified"));
        assert!(glob.matches("agent://.verified"));
        assert!(!glob.matches("agent://api-provider.unverified"));
    }

    #[test]
    fn test_universal_star() {
        let glob = GlobPattern::compile("*");
        assert!(glob.matches(""));
        assert!(glob.matches("anything at all"));
    }

    #[test]
    fn test_question_mark_matches_exactly_one() {
        let glob = GlobPattern::compile("v?");
        assert!(glob.matches("v1"));
        assert!(!glob.matches("v12"));
        assert!(!glob.matches("v"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let glob = GlobPattern::compile("https://pay.example.com/*");
        assert!(glob.matches("https://pay.example.com/checkout"));
        // The dot must not act as a regex wildcard
        assert!(!glob.matches("https://payXexample.com/checkout"));
    }
}
