use std::hash::Hash;

/// Lowercased string wrapper for case-insensitive comparisons and map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CaseInsensitiveString(String);

impl CaseInsensitiveString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CaseInsensitiveString {
    fn from(value: &str) -> Self {
        Self(value.to_lowercase())
    }
}

impl std::fmt::Display for CaseInsensitiveString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn log_internal_error(error: impl std::fmt::Display) {
    tracing::error!("internal error: {:#}", error);
}
