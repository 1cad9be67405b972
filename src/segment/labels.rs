use std::collections::HashSet;

use crate::normalize::normalize;
use crate::ocr::RawToken;
use crate::pattern::PatternSet;

/// A token accepted as a question-number marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    /// Top of the label in page pixels.
    pub top: u32,
}

/// Normalized tokens that are never labels, whatever the patterns say.
#[derive(Debug, Clone, Default)]
pub struct BannedTokens {
    tokens: HashSet<String>,
}

impl BannedTokens {
    /// Normalizes and stores `word`; blank input is ignored.
    pub fn insert(&mut self, word: &str) {
        let word = word.trim();
        if word.is_empty() {
            return;
        }
        self.tokens.insert(normalize(word));
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.tokens.contains(normalized)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for BannedTokens {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut banned = Self::default();
        for word in iter {
            banned.insert(word.as_ref());
        }
        banned
    }
}

/// Keeps tokens whose normalized text is not banned and matches a pattern, ordered
/// top to bottom. Tokens at the same height keep their detection order.
pub fn filter_and_sort(
    tokens: Vec<RawToken>,
    banned: &BannedTokens,
    patterns: &PatternSet,
) -> Vec<Label> {
    let mut labels: Vec<Label> = tokens
        .into_iter()
        .filter_map(|token| {
            let text = normalize(&token.text);
            if banned.contains(&text) || !patterns.matches(&text) {
                return None;
            }
            Some(Label {
                text,
                top: token.top,
            })
        })
        .collect();
    labels.sort_by_key(|label| label.top);
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Pattern;

    fn patterns(templates: &[&str]) -> PatternSet {
        templates
            .iter()
            .filter_map(|template| Pattern::compile(&normalize(template)).expect("compile"))
            .collect()
    }

    #[test]
    fn matching_tokens_are_sorted_by_top() {
        let tokens = vec![
            RawToken::word("Q.3", 500),
            RawToken::word("Q.1", 100),
            RawToken::word("Marks", 120),
            RawToken::word("O2", 300),
        ];
        let labels = filter_and_sort(tokens, &BannedTokens::default(), &patterns(&["Q.1"]));
        let found: Vec<_> = labels.iter().map(|l| (l.text.as_str(), l.top)).collect();
        assert_eq!(found, vec![("q1", 100), ("q2", 300), ("q3", 500)]);
    }

    #[test]
    fn banned_tokens_win_over_patterns() {
        let pattern_set = patterns(&["q1"]);
        let banned: BannedTokens = ["page", "Q.99"].into_iter().collect();
        assert!(banned.contains(""));

        let tokens = vec![
            RawToken::word("Page", 10),
            RawToken::word("Q.99", 20),
            RawToken::word("Q.4", 30),
        ];
        let labels = filter_and_sort(tokens, &banned, &pattern_set);
        assert_eq!(
            labels,
            vec![Label {
                text: "q4".to_string(),
                top: 30
            }]
        );
    }

    #[test]
    fn ties_keep_detection_order() {
        let tokens = vec![
            RawToken::word("7", 200),
            RawToken::word("5", 200),
            RawToken::word("6", 100),
        ];
        let labels = filter_and_sort(tokens, &BannedTokens::default(), &patterns(&["1"]));
        let found: Vec<_> = labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(found, vec!["6", "7", "5"]);
    }

    #[test]
    fn nothing_matches_without_patterns() {
        let tokens = vec![RawToken::word("Q.1", 10)];
        let labels = filter_and_sort(tokens, &BannedTokens::default(), &PatternSet::default());
        assert!(labels.is_empty());
    }

    #[test]
    fn blank_banned_words_are_ignored() {
        let banned: BannedTokens = ["  ", ""].into_iter().collect();
        assert!(banned.is_empty());
    }
}
