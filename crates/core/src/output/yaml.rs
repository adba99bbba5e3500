//! YAML output formatter

use crate::models::ImportMap;
use crate::output::FormatError;

/// Format import results as YAML
pub fn format_yaml(data: &ImportMap) -> Result<String, FormatError> {
    serde_yaml::to_string(data).map_err(FormatError::from)
}
