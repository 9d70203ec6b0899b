use serde_json::Value;
use thiserror::Error;

/// Extraction failures are typed so callers can tell "page layout changed"
/// apart from "object literal is malformed". The old scripts returned an
/// empty map for both.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("marker {0:?} not found in document")]
    MarkerNotFound(String),
    #[error("no object literal after marker {0:?}")]
    ObjectNotFound(String),
    #[error("unbalanced braces: {depth} still open at end of document")]
    UnbalancedBraces { depth: usize },
    #[error("unterminated string inside object literal")]
    UnterminatedString,
    #[error("extracted object is not valid json: {0}")]
    InvalidJson(String),
}

/// Locates `marker` in `html` and returns the first `{...}` object literal
/// after it, found by brace counting. Braces inside string literals (single
/// or double quoted, with backslash escapes) don't count.
///
/// Vendor pages embed their data as a JS object inside a `<script>` block;
/// the literal is JSON-compatible in practice, so the slice can be handed to
/// serde_json as-is.
pub fn extract_object<'a>(html: &'a str, marker: &str) -> Result<&'a str, ScrapeError> {
    let marker_at = html
        .find(marker)
        .ok_or_else(|| ScrapeError::MarkerNotFound(marker.to_string()))?;
    let tail = &html[marker_at + marker.len()..];
    let open = tail
        .find('{')
        .ok_or_else(|| ScrapeError::ObjectNotFound(marker.to_string()))?;
    let object = &tail[open..];

    let mut depth = 0usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    for (idx, ch) in object.char_indices() {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => in_string = Some(ch),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&object[..=idx]);
                }
            }
            _ => {}
        }
    }
    if in_string.is_some() {
        return Err(ScrapeError::UnterminatedString);
    }
    Err(ScrapeError::UnbalancedBraces { depth })
}

/// `extract_object` plus a serde_json parse of the slice.
pub fn extract_json_value(html: &str, marker: &str) -> Result<Value, ScrapeError> {
    let slice = extract_object(html, marker)?;
    serde_json::from_str(slice).map_err(|err| ScrapeError::InvalidJson(err.to_string()))
}
