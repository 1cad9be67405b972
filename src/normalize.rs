//! Canonicalizes OCR text so that question labels compare equal despite the
//! usual recognition confusions (`Q`/`0`, `Q`/`O`, `Q`/`®`).

const NOISE: &[char] = &['(', ')', '[', ']', '{', '}', '|'];

/// Normalizes a raw OCR token or an operator-supplied template/banned word.
///
/// The result only ever contains ASCII digits, `q` and `.`, and
/// `normalize(&normalize(x)) == normalize(x)` holds for every input.
pub fn normalize(text: &str) -> String {
    let lowered = text.trim().to_lowercase();
    let chars: Vec<char> = lowered.chars().filter(|ch| !NOISE.contains(ch)).collect();

    // Neighbours are read from the unmodified snapshot.
    let mut fixed: Vec<char> = chars
        .iter()
        .enumerate()
        .map(|(idx, &ch)| {
            if ch != '0' {
                return ch;
            }
            let prev = idx.checked_sub(1).and_then(|i| chars.get(i));
            let next = chars.get(idx + 1);
            if is_digit(prev) || is_digit(next) {
                '0'
            } else {
                'q'
            }
        })
        .collect();

    for idx in 0..fixed.len() {
        let ch = fixed[idx];
        if (ch == 'o' || ch == '®')
            && fixed
                .get(idx + 1)
                .is_some_and(|next| next.is_ascii_digit() || *next == '.')
        {
            fixed[idx] = 'q';
        }
    }

    let kept: String = fixed
        .into_iter()
        .filter(|ch| ch.is_ascii_digit() || *ch == 'q' || *ch == '.')
        .collect();
    collapse_leading_separator(kept)
}

fn is_digit(ch: Option<&char>) -> bool {
    ch.is_some_and(|ch| ch.is_ascii_digit())
}

// q.14 -> q14
fn collapse_leading_separator(value: String) -> String {
    match value.strip_prefix('q') {
        Some(rest) if rest.starts_with('.') => format!("q{}", rest.trim_start_matches('.')),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_case_whitespace_and_bracket_noise() {
        assert_eq!(normalize("  (Q12) "), "q12");
        assert_eq!(normalize("[Q.3]|"), "q3");
        assert_eq!(normalize("{q7}"), "q7");
    }

    #[test]
    fn isolated_zero_reads_as_q() {
        assert_eq!(normalize("0.5"), "q5");
        assert_eq!(normalize("05"), "05");
        assert_eq!(normalize("10"), "10");
        assert_eq!(normalize("0"), "q");
        assert_eq!(normalize("a0b"), "q");
    }

    #[test]
    fn zero_adjacency_uses_the_original_neighbours() {
        // Both zeros neighbour a digit in the raw text, so neither is rewritten.
        assert_eq!(normalize("007"), "007");
        assert_eq!(normalize("00"), "00");
        assert_eq!(normalize("0x0"), "qq");
    }

    #[test]
    fn letter_o_and_registered_sign_become_q() {
        assert_eq!(normalize("O1"), "q1");
        assert_eq!(normalize("®12"), "q12");
        assert_eq!(normalize("o.4"), "q4");
        assert_eq!(normalize("of"), "");
    }

    #[test]
    fn separator_after_leading_q_is_removed() {
        assert_eq!(normalize("Q.1"), "q1");
        assert_eq!(normalize("Q..1"), "q1");
        assert_eq!(normalize("Q 1."), "q1.");
        assert_eq!(normalize("1.2"), "1.2");
    }

    #[test]
    fn only_digits_q_and_dot_survive() {
        assert_eq!(normalize("Page"), "");
        assert_eq!(normalize("Question-5:"), "q5");
        assert_eq!(normalize("Sec 2.1"), "2.1");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "Q.1",
            "'q.1",
            "q..1",
            "a q.1",
            "O1",
            "0.5",
            "(0)",
            "5a0",
            "®.7",
            "Page 10",
            "  Q 0 1 ",
            "q.q.1",
            "ΣQ.9",
            "",
            "...",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "input {sample:?}");
        }
    }
}
