//! Extraction of the first JSON object from model output.
//!
//! Models sometimes wrap JSON in markdown fences or add commentary around
//! it. Naive brace scanning finds the first balanced `{...}` block; strings
//! containing braces are handled by tracking quote/escape state.

/// The first balanced JSON object in `text`, or None when there is none.
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    let start = trimmed.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in trimmed[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&trimmed[start..start + i + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
