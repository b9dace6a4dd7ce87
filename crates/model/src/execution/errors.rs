use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MappingParseError {
    #[error("mapping is empty")]
    Empty,

    #[error("malformed mapping entry '{0}', expected field=column")]
    MalformedEntry(String),

    #[error("field '{0}' is mapped more than once")]
    DuplicateField(String),

    #[error("column '{0}' is mapped more than once")]
    DuplicateColumn(String),
}
