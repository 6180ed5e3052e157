//! `KEY="value"` text format used by namespace and cluster definitions.

use indexmap::IndexMap;

use crate::errors::{ConsoleError, ConsoleResult};

/// Ordered key/value pairs of one definition file.
pub type ConfMap = IndexMap<String, String>;

/// Parse definition text.
///
/// Blank lines, `#` comments and lines without `=` are ignored. Keys and
/// values are trimmed, and surrounding double then single quotes are stripped
/// from values.
pub fn parse_conf(text: &str) -> ConfMap {
    let mut map = ConfMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"').trim_matches('\'');
        map.insert(key.trim().to_string(), value.to_string());
    }
    map
}

/// Render definition text with every value double-quoted, one per line.
pub fn render_conf(map: &ConfMap) -> String {
    let mut out = String::new();
    for (key, value) in map {
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(value);
        out.push_str("\"\n");
    }
    out
}

/// Every value must fit on one line inside its double quotes.
pub(crate) fn validate_conf(map: &ConfMap) -> ConsoleResult<()> {
    match map.iter().find(|(_, value)| value.contains(['\n', '\r', '"'])) {
        Some((key, _)) => Err(ConsoleError::InvalidArgument {
            reason: format!("value for {key} may not contain line breaks or double quotes"),
        }),
        None => Ok(()),
    }
}

/// `"true"` (any case, surrounding whitespace ignored) is true; everything else is false.
pub(crate) fn is_true(value: Option<&String>) -> bool {
    value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}

pub(crate) fn bool_str(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}
