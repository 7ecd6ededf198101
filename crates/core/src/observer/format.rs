use serde_json::Value;

const INLINE_WIDTH: usize = 60;

/// Renders a value for a log line.
///
/// Objects become `key: value` lines with keys padded to the longest one,
/// arrays become `index: value` lines. Anything that spans several lines or
/// is longer than 60 characters starts on a new line.
pub fn format_data(data: &Value) -> String {
    let text = match data {
        Value::Object(map) => {
            let width =
                map.keys().map(|key| key.chars().count()).max().unwrap_or(0);
            map.iter()
                .map(|(key, value)| {
                    format!("{key:<width$}: {}", scalar(value))
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        Value::Array(items) => {
            let width = items.len().saturating_sub(1).to_string().len();
            items
                .iter()
                .enumerate()
                .map(|(idx, value)| format!("{idx:>width$}: {}", scalar(value)))
                .collect::<Vec<_>>()
                .join("\n")
        }
        other => scalar(other),
    };
    format_text(text)
}

/// Same as [`format_data`] for plain text.
#[inline]
pub fn format_text(text: String) -> String {
    let mut lines = text.split('\n');
    let first_len = lines.next().map_or(0, |line| line.chars().count());
    if lines.next().is_some() || first_len > INLINE_WIDTH {
        format!("\n{text}")
    } else {
        text
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
