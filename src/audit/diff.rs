//! Change summaries between two snapshots of the same entity
//!
//! Used by the history views to describe what a MODIFIED revision changed
//! relative to the revision before it.

use serde_json::Value;

/// Fields that change on every commit and carry no information of their own
const BOOKKEEPING_FIELDS: &[&str] = &["version", "last_modified_by", "last_modified_date"];

/// One-line summary of top-level field changes
///
/// Bookkeeping fields (version, last-modified stamp) are left out.
pub fn summarize_changes(before: &Value, after: &Value) -> Option<String> {
    let changes: Vec<String> = field_changes(before, after, "")
        .into_iter()
        .filter(|(field, _)| !BOOKKEEPING_FIELDS.contains(&field.as_str()))
        .map(|(_, change)| change)
        .collect();

    if changes.is_empty() {
        None
    } else {
        Some(changes.join(", "))
    }
}

/// Every changed field, recursing into nested objects and arrays
///
/// Returns `(field path, "path: old -> new")` pairs.
pub fn field_changes(before: &Value, after: &Value, prefix: &str) -> Vec<(String, String)> {
    let mut changes = Vec::new();

    match (before, after) {
        (Value::Object(before_obj), Value::Object(after_obj)) => {
            for (key, before_val) in before_obj {
                let path = join_path(prefix, key);
                match after_obj.get(key) {
                    Some(after_val) if before_val == after_val => {}
                    Some(after_val) if before_val.is_object() && after_val.is_object() => {
                        changes.extend(field_changes(before_val, after_val, &path));
                    }
                    Some(after_val) => {
                        let line = format!(
                            "{}: {} -> {}",
                            path,
                            format_value(before_val),
                            format_value(after_val)
                        );
                        changes.push((path, line));
                    }
                    None => {
                        let line = format!("{}: {} -> (removed)", path, format_value(before_val));
                        changes.push((path, line));
                    }
                }
            }

            for (key, after_val) in after_obj {
                if !before_obj.contains_key(key) {
                    let path = join_path(prefix, key);
                    let line = format!("{}: (added) -> {}", path, format_value(after_val));
                    changes.push((path, line));
                }
            }
        }
        (Value::Array(before_arr), Value::Array(after_arr))
            if before_arr.len() == after_arr.len() =>
        {
            for (i, (b, a)) in before_arr.iter().zip(after_arr.iter()).enumerate() {
                if b != a {
                    changes.extend(field_changes(b, a, &format!("{}[{}]", prefix, i)));
                }
            }
        }
        _ => {
            if before != after {
                let line = format!(
                    "{}: {} -> {}",
                    prefix,
                    format_value(before),
                    format_value(after)
                );
                changes.push((prefix.to_string(), line));
            }
        }
    }

    changes
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Format a JSON value for human-readable display
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            if s.chars().count() > 50 {
                let head: String = s.chars().take(47).collect();
                format!("\"{}...\"", head)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}
