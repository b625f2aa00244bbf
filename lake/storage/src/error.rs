use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Connection or transaction failure. Writes may be retried.
    Unavailable,
    /// The requested block or extrinsic does not exist.
    NotFound,
    /// The statement was refused by the database (constraint violation,
    /// invalid value).
    Rejected,
    /// A stored row cannot be mapped back to the model.
    Corrupt,
    /// Invalid storage configuration.
    Configuration,
}

impl StoreError {
    /// Whether the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

impl error_stack::Context for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable => f.write_str("storage unavailable"),
            StoreError::NotFound => f.write_str("not found"),
            StoreError::Rejected => f.write_str("statement rejected by storage"),
            StoreError::Corrupt => f.write_str("stored data cannot be decoded"),
            StoreError::Configuration => f.write_str("invalid storage configuration"),
        }
    }
}
