use crate::books_repository::ValidationError;

const READ_KEYWORD: &str = "SELECT";

/// Statement that passed the read only check.
///
/// The check is lexical: the trimmed statement has to start with `SELECT`,
/// compared case insensitively. It is not a parser, a statement such as
/// `SELECT ... ; DELETE ...` passes it, so it must be combined with
/// single statement execution (prepared statements never run more than one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyStatement(String);

impl ReadOnlyStatement {
    pub fn parse(statement: &str) -> Result<Self, ValidationError> {
        let trimmed = statement.trim();
        let starts_with_read = trimmed
            .get(..READ_KEYWORD.len())
            .map(|prefix| prefix.eq_ignore_ascii_case(READ_KEYWORD))
            .unwrap_or_default();
        if !starts_with_read {
            tracing::error!("Attempted non-SELECT query execution blocked.");
            return Err(ValidationError::NotReadOnly);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
