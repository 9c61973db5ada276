//! Recovering structured values from free-form generator text

use serde::de::DeserializeOwned;

use super::StructuredResponse;

/// Extract the body of the first fenced block tagged `lang`, or of the first
/// untagged block when `lang` is `None`.
///
/// Handles:
/// - ```json / ```yaml blocks
/// - Generic ``` blocks
/// - A missing closing fence (the rest of the text is taken)
pub fn extract_fenced_block(text: &str, lang: Option<&str>) -> Option<String> {
    let mut search_from = 0;

    while let Some(rel) = text[search_from..].find("```") {
        let open = search_from + rel;
        let after_ticks = &text[open + 3..];
        let line_end = after_ticks.find('\n').unwrap_or(after_ticks.len());
        let tag = after_ticks[..line_end].trim();

        let body_start = open + 3 + (line_end + 1).min(after_ticks.len());
        let body = &text[body_start..];
        let body_end = body.find("```").unwrap_or(body.len());

        let matches = match lang {
            Some(wanted) => tag.eq_ignore_ascii_case(wanted),
            None => true,
        };
        if matches {
            return Some(body[..body_end].trim().to_string());
        }

        // Skip past this block's closing fence
        search_from = (body_start + body_end + 3).min(text.len());
        if search_from >= text.len() {
            break;
        }
    }

    None
}

/// Best-effort recovery of a JSON object from a response.
///
/// Tries, in order: the whole text as JSON, a ```json block, any fenced
/// block, the outermost `{...}` span, and finally a ```yaml block.
pub fn extract_json_value(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(value) = parse_object(trimmed) {
        return Some(value);
    }

    for lang in [Some("json"), None] {
        if let Some(block) = extract_fenced_block(trimmed, lang) {
            if let Some(value) = parse_object(&block) {
                return Some(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Some(value) = parse_object(&trimmed[start..=end]) {
                return Some(value);
            }
        }
    }

    let yaml = extract_fenced_block(trimmed, Some("yaml"))?;
    let value: serde_json::Value = serde_yaml::from_str(yaml.trim_start_matches("---")).ok()?;
    value.is_object().then_some(value)
}

/// Decode a structured response into `T`.
///
/// Uses the contract value when the backend honored it, otherwise falls back
/// to [`extract_json_value`] on the raw text. The error string is meant to be
/// echoed back to the generator on retry.
pub fn decode_structured<T: DeserializeOwned>(response: &StructuredResponse) -> Result<T, String> {
    let value = match &response.value {
        Some(value) => value.clone(),
        None => extract_json_value(&response.raw)
            .ok_or_else(|| "response did not contain a JSON object".to_string())?,
    };
    serde_json::from_value(value).map_err(|e| format!("response does not match the schema: {}", e))
}

fn parse_object(text: &str) -> Option<serde_json::Value> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .filter(|v| v.is_object())
}
