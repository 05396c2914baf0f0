//! PII redaction applied to human-readable text before it is persisted
//! or handed to notification consumers.
//!
//! The filter is a deterministic, ordered list of (pattern, replacement)
//! pairs so new PII classes can be added without touching call sites.

use regex::Regex;

/// Replacement written over SSN-shaped matches.
const SSN_MASK: &str = "***-**-****";

/// One redaction rule.
struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

/// Deterministic text transform masking sensitive values.
pub struct PiiFilter {
    rules: Vec<Rule>,
}

impl Default for PiiFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiFilter {
    /// Filter with the standard rule set: U.S. SSN shapes.
    pub fn new() -> Self {
        // Pattern literals are compile-time constants; a failure here is a
        // programming error, not input-dependent.
        let rules = vec![Rule {
            pattern: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("valid SSN pattern"),
            replacement: SSN_MASK,
        }];
        Self { rules }
    }

    /// Apply every rule in order. Pure and total; the output of one rule
    /// never re-matches, making the whole transform idempotent.
    pub fn redact(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for rule in &self.rules {
            masked = rule
                .pattern
                .replace_all(&masked, rule.replacement)
                .into_owned();
        }
        masked
    }

    /// Redact an optional field; absence maps to an empty string.
    pub fn redact_opt(&self, text: Option<&str>) -> String {
        match text {
            Some(t) => self.redact(t),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_ssn() {
        let filter = PiiFilter::new();
        let out = filter.redact("SSN on file: 123-45-6789, confirmed.");
        assert_eq!(out, "SSN on file: ***-**-****, confirmed.");
    }

    #[test]
    fn test_masks_multiple_ssns() {
        let filter = PiiFilter::new();
        let out = filter.redact("primary 111-22-3333 spouse 444-55-6666");
        assert!(!out.contains("111-22-3333"));
        assert!(!out.contains("444-55-6666"));
        assert_eq!(out.matches(SSN_MASK).count(), 2);
    }

    #[test]
    fn test_idempotent() {
        let filter = PiiFilter::new();
        let once = filter.redact("id 987-65-4321 end");
        let twice = filter.redact(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_leaves_non_matching_text_alone() {
        let filter = PiiFilter::new();
        // Phone-shaped and partial sequences are not SSNs.
        let text = "call 555-0100, ref 12-34-5678, claim 1234-56-7890x";
        assert_eq!(filter.redact(text), text);
    }

    #[test]
    fn test_redact_opt_none_is_empty() {
        let filter = PiiFilter::new();
        assert_eq!(filter.redact_opt(None), "");
        assert_eq!(filter.redact_opt(Some("plain")), "plain");
    }
}
