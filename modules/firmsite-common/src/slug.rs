/// Lowercase, ASCII-only, hyphen-delimited form of `text`.
///
/// Punctuation is dropped outright (so `"M&A"` becomes `"ma"`), whitespace and
/// hyphen runs become a single `-`, and no hyphen survives at either end.
/// Idempotent: a slug normalizes to itself.
pub fn normalize_slug(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut pending_dash = false;

    for c in lower.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else if c.is_whitespace() || c == '-' {
            pending_dash = true;
        }
    }

    out
}

pub fn normalize_slug_opt(text: Option<&str>) -> String {
    text.map(normalize_slug).unwrap_or_default()
}
