//! Field validation shared by parent and child records.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation errors raised before a record is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Name is empty after trim.
    BlankName,
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName => write!(f, "name must not be blank"),
        }
    }
}

impl Error for ModelError {}

/// Trims `name` and rejects blank input.
pub fn normalize_name(name: impl Into<String>) -> Result<String, ModelError> {
    let name = name.into();
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ModelError::BlankName);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::{normalize_name, ModelError};

    #[test]
    fn normalize_name_trims_surrounding_whitespace() {
        assert_eq!(normalize_name("  renamed ").unwrap(), "renamed");
        assert_eq!(normalize_name("kept").unwrap(), "kept");
    }

    #[test]
    fn normalize_name_rejects_blank() {
        assert_eq!(normalize_name(" \t ").unwrap_err(), ModelError::BlankName);
        assert_eq!(normalize_name("").unwrap_err(), ModelError::BlankName);
    }
}
