use crate::error;

use serde_json::Value;

/// Separator between composite sort-key segments.
pub const KEY_SEPARATOR: &str = "#";

/// Prefix rendered in front of version values inside sort keys.
///
/// A raw integer form is unsafe for lexicographic range scans (version 10
/// would sort before version 2), so every generation of a sort key renders
/// the version segment as `version_{value}`, including version `0`.
pub const VERSION_PREFIX: &str = "version_";

/// The physical attribute name of the version segment.
pub const VERSION_ATTRIBUTE: &str = "version";

/// Ordered attribute lists whose values are concatenated into the primary
/// and secondary-index sort keys.
///
/// Construction stops at the first missing attribute, leaving a prefix that
/// still serves `begins_with` range queries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SortKeyRecipes {
    /// Recipe for the secondary-index sort key, if configured.
    pub gsi_sk1: Option<Vec<String>>,
    /// Recipe for the primary sort key.
    pub sk: Vec<String>,
}

/// Render one sort-key segment from a scalar attribute value.
///
/// Version values get the disambiguating [`VERSION_PREFIX`]; everything else
/// is rendered verbatim. Non-scalar values cannot participate in a sort key.
pub fn render_segment(physical_name: &str, value: &Value) -> error::Result<String> {
    let rendered = match value {
        Value::Bool(value) => value.to_string(),
        Value::Number(value) => value.to_string(),
        Value::String(value) => value.clone(),
        Value::Array(_) | Value::Null | Value::Object(_) => {
            return Err(error::Error::MalformedEntity);
        }
    };
    if physical_name == VERSION_ATTRIBUTE {
        Ok(format!("{VERSION_PREFIX}{rendered}"))
    } else {
        Ok(rendered)
    }
}

/// Trim a trailing separator left over from a truncated recipe, so the value
/// is usable as a `begins_with` argument.
pub fn trim_trailing_separator(value: &str) -> &str {
    value.strip_suffix(KEY_SEPARATOR).unwrap_or(value)
}
