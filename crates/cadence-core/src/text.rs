//! Log formatting helpers.

/// Cut `input` to at most `max_chars` characters, noting the original length.
pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

pub fn truncate_json_for_log(value: &serde_json::Value, max_chars: usize) -> String {
    truncate_for_log(&value.to_string(), max_chars)
}
