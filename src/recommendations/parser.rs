//! Structured extraction of topic recommendations from raw LLM text.
//!
//! Two strategies are tried in order: a JSON array (optionally wrapped in a
//! markdown code fence), then a numbered list with `Format:` / `Angle:` /
//! `Hashtags:` detail lines; numbered items without any detail line are skipped.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::Recommendation;

/// Format assigned to numbered-list records that omit a `Format:` line
const DEFAULT_FORMAT: &str = "Insight";

static NUMBERED_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\.\s+(.+?)\s*$").expect("valid numbered-line regex"));

static HASHTAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\w+").expect("valid hashtag regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("response is not a JSON array")]
    NotJsonArray,
    #[error("no valid recommendations found")]
    NoValidRecords,
}

/// Parse an LLM response into at most `limit` records.
///
/// Returns the JSON-path error when neither strategy yields a record.
pub fn parse_recommendations(raw: &str, limit: usize) -> Result<Vec<Recommendation>, ParseError> {
    parse_json(raw, limit).or_else(|json_err| parse_numbered(raw, limit).map_err(|_| json_err))
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` fence and a trailing ```` ``` ````.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(i) if rest[..i].trim().chars().all(|c| c.is_ascii_alphanumeric()) => &rest[i + 1..],
            _ => rest,
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

pub fn parse_json(raw: &str, limit: usize) -> Result<Vec<Recommendation>, ParseError> {
    let body = strip_code_fences(raw);

    let value: Value = serde_json::from_str(body)
        .or_else(|_| {
            // Models sometimes wrap the array in a sentence
            embedded_array(body)
                .ok_or(ParseError::NotJsonArray)
                .and_then(|slice| serde_json::from_str(slice).map_err(|_| ParseError::NotJsonArray))
        })?;

    let items = value.as_array().ok_or(ParseError::NotJsonArray)?;

    let records: Vec<Recommendation> = items
        .iter()
        .filter_map(validate_record)
        .take(limit)
        .collect();

    if records.is_empty() {
        return Err(ParseError::NoValidRecords);
    }
    Ok(records)
}

fn embedded_array(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

/// Structural filter: every required field present and non-empty.
fn validate_record(item: &Value) -> Option<Recommendation> {
    let id = match item.get("id")? {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let text_field = |name: &str| {
        item.get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    let title = text_field("title")?;
    let format = text_field("format")?;
    let angle = text_field("angle")?;

    let hashtags = item
        .get("hashtags")?
        .as_array()?
        .iter()
        .map(|tag| tag.as_str().map(str::to_string))
        .collect::<Option<Vec<String>>>()?;

    Some(Recommendation {
        id,
        title,
        format,
        angle: Some(angle),
        hashtags,
    })
}

#[derive(Debug, Default)]
struct NumberedDraft {
    title: String,
    format: Option<String>,
    angle: Option<String>,
    hashtags: Vec<String>,
    /// Set once a `Format:` / `Angle:` / `Hashtags:` line is seen
    has_details: bool,
}

impl NumberedDraft {
    fn finish(self, position: usize) -> Option<Recommendation> {
        // A bare numbered list (e.g. suggestions inside a refusal) is not a topic
        if self.title.is_empty() || !self.has_details {
            return None;
        }
        Some(Recommendation {
            id: format!("topic-{}", position),
            title: self.title,
            format: self.format.unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
            angle: self.angle,
            hashtags: self.hashtags,
        })
    }
}

pub fn parse_numbered(raw: &str, limit: usize) -> Result<Vec<Recommendation>, ParseError> {
    let mut records = Vec::new();
    let mut current: Option<NumberedDraft> = None;

    let flush = |draft: Option<NumberedDraft>, records: &mut Vec<Recommendation>| {
        if let Some(record) = draft.and_then(|d| d.finish(records.len() + 1)) {
            records.push(record);
        }
    };

    for line in raw.lines() {
        if let Some(caps) = NUMBERED_LINE.captures(line) {
            flush(current.take(), &mut records);
            current = Some(NumberedDraft {
                title: clean_title(&caps[2]),
                ..NumberedDraft::default()
            });
            continue;
        }

        let Some(draft) = current.as_mut() else {
            continue;
        };
        let Some((label, value)) = detail_line(line) else {
            continue;
        };

        match label.as_str() {
            "format" if !value.is_empty() => {
                draft.format = Some(value);
                draft.has_details = true;
            }
            "angle" if !value.is_empty() => {
                draft.angle = Some(value);
                draft.has_details = true;
            }
            "hashtags" => {
                draft.hashtags = HASHTAG
                    .find_iter(&value)
                    .map(|m| m.as_str().to_string())
                    .collect();
                draft.has_details = true;
            }
            "title" if draft.title.is_empty() => draft.title = value,
            _ => {}
        }
    }
    flush(current.take(), &mut records);

    records.truncate(limit);
    if records.is_empty() {
        return Err(ParseError::NoValidRecords);
    }
    Ok(records)
}

/// `"  - **Format**: Story"` → `("format", "Story")`
fn detail_line(line: &str) -> Option<(String, String)> {
    let trimmed = line.trim().trim_start_matches(['-', '•', '*', ' ']);
    let (label, value) = trimmed.split_once(':')?;
    let label = label.replace('*', "").trim().to_lowercase();
    let value = value.trim().trim_matches('*').trim().to_string();
    Some((label, value))
}

fn clean_title(raw: &str) -> String {
    let unstarred = raw.replace("**", "");
    let text = unstarred.trim();
    let text = match text.split_once(':') {
        Some((label, rest)) if label.trim().eq_ignore_ascii_case("title") => rest.trim(),
        _ => text,
    };
    text.trim_matches(|c| c == '"' || c == '\'').trim().to_string()
}
