//! JSON output formatter

use super::FormatError;
use crate::models::ImportMap;

/// Format import results as pretty-printed JSON
pub fn format_json(data: &ImportMap) -> Result<String, FormatError> {
    serde_json::to_string_pretty(data).map_err(FormatError::from)
}

/// Format import results as compact JSON
pub fn format_json_compact(data: &ImportMap) -> Result<String, FormatError> {
    serde_json::to_string(data).map_err(FormatError::from)
}
