use formats::Feature;
use serde_json::{Map, Number, Value};

/// Builds the HTML popup body for one feature.
///
/// One `<b>name</b> : value<br>` line per property, in document order. A
/// feature without properties yields an empty string.
pub fn build_popup_content(feature: &Feature) -> String {
    let mut content = String::new();
    for (name, value) in popup_lines(&feature.properties) {
        content.push_str("<b>");
        content.push_str(&name);
        content.push_str("</b> : ");
        content.push_str(&value);
        content.push_str("<br>");
    }
    content
}

/// `(name, rendered value)` pairs in document order.
pub fn popup_lines(properties: &Map<String, Value>) -> Vec<(String, String)> {
    properties
        .iter()
        .map(|(name, value)| (name.clone(), render_value(value)))
        .collect()
}

/// Renders a property value the way string concatenation does in a browser.
///
/// Whole floats drop the fraction (`7.0` -> `7`) and arrays join their items
/// with `,`, nulls inside arrays becoming empty. Objects render as compact
/// JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => render_number(n),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => render_value(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn render_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        // `-0` prints as `0`.
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
