use std::fmt;

/// The block document cannot be normalized.
///
/// Never retried: the same document always fails the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedBlockError {
    /// The source returned a block for a different height.
    HeightMismatch,
    /// The block number is not a non-negative integer.
    InvalidNumber,
    /// `finalized`, `success` or `paysFee` is not a boolean.
    NonBooleanFlag,
}

impl error_stack::Context for MalformedBlockError {}

impl fmt::Display for MalformedBlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedBlockError::HeightMismatch => {
                f.write_str("malformed block: height does not match the requested one")
            }
            MalformedBlockError::InvalidNumber => f.write_str("malformed block: invalid number"),
            MalformedBlockError::NonBooleanFlag => {
                f.write_str("malformed block: flag is not a boolean")
            }
        }
    }
}
