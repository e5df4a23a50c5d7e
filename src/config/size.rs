use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ByteSizeError {
    #[error("size is empty")]
    Empty,
    #[error("size must start with a number")]
    NoNumber,
    #[error("could not parse size as integer: {0}")]
    InvalidNumber(ParseIntError),
    #[error("size has an invalid unit: {0}")]
    InvalidUnit(String),
    #[error("size must not be negative")]
    Negative,
    #[error("size is too large")]
    Overflow,
}

/// An amount of bytes, as used for request and response size limits.
///
/// Parses plain integers as well as human-readable forms like `5M`, `512kb` or `10MiB`. Single
/// letter and `xB` units are decimal multiples, `xi` and `xiB` units are binary multiples.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const fn mb(n: u64) -> Self {
        ByteSize(n * 1_000_000)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<i64> for ByteSize {
    type Error = ByteSizeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u64::try_from(value)
            .map(ByteSize)
            .map_err(|_| ByteSizeError::Negative)
    }
}

impl FromStr for ByteSize {
    type Err = ByteSizeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(ByteSizeError::Empty);
        }
        if value.starts_with('-') {
            return Err(ByteSizeError::Negative);
        }

        let split = value
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(value.len());
        if split == 0 {
            return Err(ByteSizeError::NoNumber);
        }
        let count: u64 = value[..split]
            .parse()
            .map_err(ByteSizeError::InvalidNumber)?;

        let multiplier: u64 = match value[split..].trim_start().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" => 1_000,
            "m" | "mb" => 1_000_000,
            "g" | "gb" => 1_000_000_000,
            "t" | "tb" => 1_000_000_000_000,
            "ki" | "kib" => 1 << 10,
            "mi" | "mib" => 1 << 20,
            "gi" | "gib" => 1 << 30,
            "ti" | "tib" => 1 << 40,
            _ => return Err(ByteSizeError::InvalidUnit(value[split..].to_owned())),
        };

        count
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or(ByteSizeError::Overflow)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
