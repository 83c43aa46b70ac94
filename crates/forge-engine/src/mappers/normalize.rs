use forge_contracts::ideas::{SimilarProject, DEFAULT_DEGEN_SCORE};
use serde_json::{Map, Value};

pub(crate) fn value_as_non_empty_string(value: Option<&Value>) -> Option<String> {
    let raw = value
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

pub(crate) fn text_or(obj: &Map<String, Value>, key: &str, fallback: &str) -> String {
    value_as_non_empty_string(obj.get(key)).unwrap_or_else(|| fallback.to_string())
}

/// Integer score in 0..=100. Numbers and numeric strings are rounded and
/// clamped; anything else yields the default.
pub(crate) fn degen_score(value: Option<&Value>) -> u8 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(score) if score.is_finite() => score.round().clamp(0.0, 100.0) as u8,
        _ => DEFAULT_DEGEN_SCORE,
    }
}

/// `None` unless the value is an array. Scalars inside are stringified and
/// blank entries dropped.
pub(crate) fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let rows = value.and_then(Value::as_array)?;
    Some(
        rows.iter()
            .filter_map(|row| match row {
                Value::Null => None,
                Value::String(text) => Some(text.trim().to_string()),
                other => Some(display_string(Some(other))),
            })
            .filter(|text| !text.is_empty())
            .collect(),
    )
}

/// Renders any JSON value as display text: strings verbatim, null as empty,
/// everything else pretty-printed.
pub(crate) fn display_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

pub(crate) fn optional_display(value: Option<&Value>) -> Option<String> {
    let text = display_string(value);
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

pub(crate) fn bool_or(value: Option<&Value>, fallback: bool) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => true,
            "false" | "no" => false,
            _ => fallback,
        },
        _ => fallback,
    }
}

pub(crate) fn similar_projects(value: Option<&Value>) -> Vec<SimilarProject> {
    let Some(rows) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| match row {
            Value::String(name) if !name.trim().is_empty() => Some(SimilarProject {
                name: name.trim().to_string(),
                url: None,
                description: None,
            }),
            Value::Object(obj) => Some(SimilarProject {
                name: value_as_non_empty_string(obj.get("name"))?,
                url: value_as_non_empty_string(obj.get("url")),
                description: value_as_non_empty_string(obj.get("description")),
            }),
            _ => None,
        })
        .collect()
}
