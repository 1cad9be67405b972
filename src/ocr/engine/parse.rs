use crate::ocr::{DetectionLevel, RawToken};

/// Parses tesseract TSV output into tokens of every level, in output order.
pub(super) fn parse_tsv_tokens(tsv: &str) -> Vec<RawToken> {
    let mut tokens = Vec::new();

    for (idx, row) in tsv.lines().enumerate() {
        if idx == 0 {
            continue;
        }
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 8 {
            continue;
        }
        let Some(level) = cols[0]
            .trim()
            .parse::<i32>()
            .ok()
            .and_then(DetectionLevel::from_code)
        else {
            continue;
        };
        let Ok(top) = cols[7].trim().parse::<u32>() else {
            continue;
        };
        let text = cols.get(11).map(|value| value.trim()).unwrap_or("");
        tokens.push(RawToken {
            level,
            text: text.to_string(),
            top,
        });
    }

    tokens
}
