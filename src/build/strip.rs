const FENCE: &str = "```";

/// Longest info string accepted after an opening fence (` ```html `, ` ```tsx `).
const MAX_INFO_LEN: usize = 16;

/// Removes one leading and one trailing markdown code fence, then trims.
/// Applying it to its own output changes nothing.
pub fn strip_code_fences(text: &str) -> String {
    let mut current = text.trim();
    loop {
        let next = strip_once(current);
        if next.len() == current.len() {
            return current.to_string();
        }
        current = next;
    }
}

fn strip_once(text: &str) -> &str {
    let mut out = text;
    if let Some(rest) = out.strip_prefix(FENCE) {
        out = strip_info_string(rest);
    }
    if let Some(rest) = out.strip_suffix(FENCE) {
        out = rest;
    }
    out.trim()
}

fn strip_info_string(rest: &str) -> &str {
    let info_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '+' || c == '_'))
        .unwrap_or(rest.len());
    if info_len <= MAX_INFO_LEN {
        &rest[info_len..]
    } else {
        rest
    }
}
