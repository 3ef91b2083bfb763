use thiserror::Error;

/// Failure to parse a selector string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unexpected character {found:?} at offset {offset} in {source_text:?}")]
    UnexpectedChar {
        source_text: String,
        offset: usize,
        found: char,
    },

    #[error("expected an identifier at offset {offset} in {source_text:?}")]
    MissingIdent { source_text: String, offset: usize },

    #[error("unterminated attribute matcher starting at offset {offset} in {source_text:?}")]
    UnterminatedAttribute { source_text: String, offset: usize },

    #[error("unterminated string starting at offset {offset} in {source_text:?}")]
    UnterminatedString { source_text: String, offset: usize },
}
