use anyhow::{Context, Result};
use regex::Regex;

/// A compiled sequence-style template. Literal characters must match exactly and
/// every run of digits in the template accepts any run of one or more digits.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    /// Compiles `template`; blank templates yield `None`.
    pub fn compile(template: &str) -> Result<Option<Self>> {
        let template = template.trim().to_lowercase();
        if template.is_empty() {
            return Ok(None);
        }
        let expr = format!("^{}$", wildcard_digits(&regex::escape(&template)));
        let regex = Regex::new(&expr)
            .with_context(|| format!("failed to compile question style: {}", template))?;
        Ok(Some(Self { regex }))
    }

    pub fn test(&self, normalized: &str) -> bool {
        self.regex.is_match(normalized)
    }
}

fn wildcard_digits(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut in_digits = false;
    for ch in escaped.chars() {
        if ch.is_ascii_digit() {
            if !in_digits {
                out.push_str("[0-9]+");
                in_digits = true;
            }
            continue;
        }
        in_digits = false;
        out.push(ch);
    }
    out
}

/// All patterns registered for a session; a token is a label when any of them matches.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn push(&mut self, pattern: Pattern) {
        self.patterns.push(pattern);
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.test(normalized))
    }
}

impl FromIterator<Pattern> for PatternSet {
    fn from_iter<I: IntoIterator<Item = Pattern>>(iter: I) -> Self {
        Self {
            patterns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled(template: &str) -> Pattern {
        Pattern::compile(template)
            .expect("compile")
            .expect("non-empty template")
    }

    #[test]
    fn dotted_template_matches_whole_token_only() {
        let pattern = compiled("Q.1");
        assert!(pattern.test("q.1"));
        assert!(pattern.test("q.23"));
        assert!(!pattern.test("q1"));
        assert!(!pattern.test("qa.1"));
        assert!(!pattern.test("q.1x"));
        assert!(!pattern.test("xq.1"));
        assert!(!pattern.test("q."));
    }

    #[test]
    fn template_without_digits_is_a_literal() {
        let pattern = compiled("header");
        assert!(pattern.test("header"));
        assert!(!pattern.test("header1"));
        assert!(!pattern.test("headers"));
    }

    #[test]
    fn every_digit_run_becomes_a_wildcard() {
        let pattern = compiled("1.2)");
        assert!(pattern.test("14.3)"));
        assert!(!pattern.test("14.)"));
        assert!(!pattern.test("14x3)"));
    }

    #[test]
    fn blank_templates_are_skipped() {
        assert!(Pattern::compile("").expect("compile").is_none());
        assert!(Pattern::compile("   ").expect("compile").is_none());
    }

    #[test]
    fn set_matches_when_any_pattern_matches() {
        let set: PatternSet = ["q1", "1"].iter().map(|t| compiled(t)).collect();
        assert_eq!(set.len(), 2);
        assert!(set.matches("q7"));
        assert!(set.matches("42"));
        assert!(!set.matches("q.7"));
        assert!(!PatternSet::default().matches("q1"));
    }
}
