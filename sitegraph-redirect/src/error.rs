use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedirectError {
    #[error("Invalid rule '{id}': {reason}")]
    InvalidRule { id: String, reason: String },

    #[error("Duplicate rule id: {0}")]
    DuplicateRuleId(String),
}

impl RedirectError {
    pub(crate) fn invalid_rule(id: &str, reason: impl Into<String>) -> Self {
        RedirectError::InvalidRule {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RedirectError>;
