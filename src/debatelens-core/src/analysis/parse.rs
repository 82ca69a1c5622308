//! Strict parsing of LLM output.
//!
//! Models wrap JSON in code fences or surround it with prose, so every parser
//! first strips fences and locates the outermost JSON value before handing it
//! to `serde_json`. Each parser returns a tagged `Result`; callers own the
//! fallback.

use serde_json::Value;

use crate::error::ParseError;
use crate::model::Fallacy;

/// Remove a surrounding markdown code fence (```json ... ```), if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the language tag line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Slice from the first `open` to the last `close`, inclusive.
fn outermost<'a>(text: &'a str, open: char, close: char) -> Option<&'a str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Locate and parse the outermost JSON array in `raw`.
pub fn extract_json_array(raw: &str) -> Result<Vec<Value>, ParseError> {
    let text = strip_code_fences(raw);
    let slice = outermost(text, '[', ']').ok_or(ParseError::NotFound("array"))?;
    match serde_json::from_str::<Value>(slice) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(other) => Err(ParseError::Shape(format!("expected array, got {}", other))),
        Err(e) => Err(ParseError::InvalidJson(e.to_string())),
    }
}

/// Locate and parse the outermost JSON object in `raw`.
pub fn extract_json_object(raw: &str) -> Result<serde_json::Map<String, Value>, ParseError> {
    let text = strip_code_fences(raw);
    let slice = outermost(text, '{', '}').ok_or(ParseError::NotFound("object"))?;
    match serde_json::from_str::<Value>(slice) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ParseError::Shape(format!("expected object, got {}", other))),
        Err(e) => Err(ParseError::InvalidJson(e.to_string())),
    }
}

/// Parse a JSON array of short strings (claims, rebuttals).
///
/// Objects carrying a `text` or `claim` string are accepted too. Blank and
/// non-string entries are dropped; the result is capped at `max`.
pub fn parse_string_list(raw: &str, max: usize) -> Result<Vec<String>, ParseError> {
    let items = extract_json_array(raw)?;
    Ok(items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => ["text", "claim", "rebuttal"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str)),
            _ => None,
        })
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .take(max)
        .map(str::to_string)
        .collect())
}

/// Parse `[{type, explanation, severity}]`, dropping malformed entries.
///
/// The type is normalised to snake case and severity is rounded and clamped
/// to 1..=10. Returns the valid entries (capped at `max`) and the number
/// dropped.
pub fn parse_fallacies(raw: &str, max: usize) -> Result<(Vec<Fallacy>, usize), ParseError> {
    let items = extract_json_array(raw)?;
    let total = items.len();
    let valid: Vec<Fallacy> = items.iter().filter_map(validate_fallacy).collect();
    let dropped = total - valid.len();
    Ok((valid.into_iter().take(max).collect(), dropped))
}

fn validate_fallacy(item: &Value) -> Option<Fallacy> {
    let map = item.as_object()?;
    let kind = map.get("type")?.as_str()?.trim();
    if kind.is_empty() {
        return None;
    }
    let explanation = map.get("explanation")?.as_str()?.trim().to_string();
    let severity = map.get("severity")?.as_f64()?;
    if !severity.is_finite() {
        return None;
    }

    Some(Fallacy {
        kind: normalize_kind(kind),
        explanation,
        severity: severity.round().clamp(1.0, 10.0) as u8,
    })
}

/// `"Ad Hominem"` / `"ad-hominem"` -> `"ad_hominem"`.
pub fn normalize_kind(kind: &str) -> String {
    kind.trim()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// A `{score, reasoning}` judgement.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredJudgement {
    /// Clamped to 0..=100.
    pub score: f64,
    pub reasoning: String,
}

/// Parse `{score: number, reasoning: string}`. Numeric strings are accepted
/// for `score`; `reasoning` is optional.
pub fn parse_score(raw: &str) -> Result<ScoredJudgement, ParseError> {
    let map = extract_json_object(raw)?;
    let score = match map.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .ok_or_else(|| ParseError::Shape("missing numeric \"score\"".to_string()))?;

    let reasoning = map
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();

    Ok(ScoredJudgement {
        score: score.clamp(0.0, 100.0),
        reasoning,
    })
}
