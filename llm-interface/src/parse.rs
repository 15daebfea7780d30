use serde::de::DeserializeOwned;

/// Removes a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "markdown", ...) on the opening line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parses the first JSON object in a model reply. Models sometimes add prose
/// before or after the object.
pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let text = strip_code_fences(raw);
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

pub fn clamp_score(score: f64) -> f64 {
    if score.is_finite() {
        (score.clamp(0.0, 100.0) * 10.0).round() / 10.0
    } else {
        0.0
    }
}
