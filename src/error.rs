use thiserror::Error;

use crate::zones::constraint::Clock;

/// Precondition violations rejected at the boundary of the engine.
/// Empty zones and saturated bounds are results, never errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    /// Two operands do not have the same number of clocks.
    #[error("dimension mismatch: expected {expected} but found {found}")]
    DimensionMismatch { expected: Clock, found: Clock },

    /// A clock index is not below the dimension.
    #[error("clock {clock} is out of range for dimension {dimension}")]
    ClockOutOfRange { clock: Clock, dimension: Clock },

    /// The reference clock was used where a free clock is required.
    #[error("the reference clock can not be used here")]
    ReferenceClock,

    /// A raw matrix does not hold `dimension × dimension` bounds.
    #[error("matrix of {length} bounds does not match dimension {dimension}")]
    MalformedMatrix { length: usize, dimension: Clock },

    /// A max-bound vector does not match the dimension.
    #[error("max bounds for {found} clocks do not match dimension {expected}")]
    BoundsMismatch { expected: Clock, found: usize },

    /// The dimension has to include the reference clock.
    #[error("the dimension must be at least 1")]
    InvalidDimension,
}

pub type Result<T> = std::result::Result<T, ZoneError>;
