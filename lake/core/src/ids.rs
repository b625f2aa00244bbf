//! Block-local identifiers.
//!
//! Extrinsics are identified by `{number}-{ordinal}` (zero-based position in
//! the block), events by `{number}-{seq}` (one-based, see
//! [`crate::EventSequence`]).
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExtrinsicId {
    pub number: u64,
    pub ordinal: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId {
    pub number: u64,
    pub seq: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidIdError(String);

impl ExtrinsicId {
    pub fn new(number: u64, ordinal: u32) -> Self {
        Self { number, ordinal }
    }
}

impl EventId {
    pub fn new(number: u64, seq: u32) -> Self {
        Self { number, seq }
    }
}

impl fmt::Display for ExtrinsicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.number, self.ordinal)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.number, self.seq)
    }
}

impl FromStr for ExtrinsicId {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, ordinal) = split_id(s)?;
        Ok(Self { number, ordinal })
    }
}

impl FromStr for EventId {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (number, seq) = split_id(s)?;
        Ok(Self { number, seq })
    }
}

fn split_id(s: &str) -> Result<(u64, u32), InvalidIdError> {
    let (number, position) = s
        .split_once('-')
        .ok_or_else(|| InvalidIdError(s.to_string()))?;
    let number = number
        .parse::<u64>()
        .map_err(|_| InvalidIdError(s.to_string()))?;
    let position = position
        .parse::<u32>()
        .map_err(|_| InvalidIdError(s.to_string()))?;
    Ok((number, position))
}

impl fmt::Display for InvalidIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid block-local id: {:?}", self.0)
    }
}

impl std::error::Error for InvalidIdError {}

#[cfg(test)]
mod tests {
    use super::{EventId, ExtrinsicId};

    #[test]
    pub fn test_id_display() {
        assert_eq!(ExtrinsicId::new(100, 0).to_string(), "100-0");
        assert_eq!(EventId::new(100, 12).to_string(), "100-12");
    }

    #[test]
    pub fn test_id_parse() {
        assert_eq!(
            "100-1".parse::<ExtrinsicId>().unwrap(),
            ExtrinsicId::new(100, 1)
        );
        assert_eq!("7-10".parse::<EventId>().unwrap(), EventId::new(7, 10));
        assert!("100".parse::<EventId>().is_err());
        assert!("100-x".parse::<EventId>().is_err());
        assert!("-1".parse::<ExtrinsicId>().is_err());
        assert!("1-2-3".parse::<ExtrinsicId>().is_err());
    }

    #[test]
    pub fn test_id_numeric_order() {
        let mut ids = vec![EventId::new(100, 10), EventId::new(100, 2)];
        ids.sort();
        assert_eq!(ids[0].to_string(), "100-2");
    }
}
