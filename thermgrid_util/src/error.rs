use heapless::Vec;
use thiserror::Error;

use crate::MAX_WINDOW;

pub type Result<T> = core::result::Result<T, Error>;

/// How a caller should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The link or bus produced nothing usable. Retry with a fresh window.
    Transport,
    /// Data arrived but did not form a valid frame. Retry with a fresh window.
    Protocol,
    /// The caller asked for something that can never succeed.
    Validation,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("no packets received")]
    NoPackets,

    #[error("sensor bus error: {0}")]
    Bus(&'static str),

    #[error("sensor not initialised")]
    SensorUnavailable,

    #[error("found no complete frame sequence, tags: {tags:?}")]
    NoCompleteFrame { tags: Vec<Option<u8>, MAX_WINDOW> },

    #[error("invalid marker byte: expected {expected}, got {got}")]
    InvalidMarker { expected: u8, got: u8 },

    #[error("row id mismatch: expected {expected}, got {got}")]
    RowIdMismatch { expected: u8, got: u8 },

    #[error("invalid row payload length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("empty degree range: min {min_deg} equals max {max_deg}")]
    InvalidRange { min_deg: f64, max_deg: f64 },

    #[error("unrecognized unit {0:?}")]
    UnknownUnit(heapless::String<8>),

    #[error("window size {size} outside 1..={max}")]
    InvalidWindow { size: usize, max: usize },

    #[error("unsupported spline degree {0}")]
    UnsupportedDegree(u8),

    #[error("grid has no cells")]
    EmptyGrid,

    #[error("spline degree {degree} needs more than {points} points on its axis")]
    DegreeExceedsGrid { degree: u8, points: usize },

    #[error("invalid smoothing penalty {0}")]
    InvalidPenalty(f64),

    #[error("frame rate must be 1 or 10, got {0}")]
    InvalidFrameRate(u8),

    #[error("output buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoPackets | Error::Bus(_) | Error::SensorUnavailable => ErrorKind::Transport,
            Error::NoCompleteFrame { .. }
            | Error::InvalidMarker { .. }
            | Error::RowIdMismatch { .. }
            | Error::InvalidLength { .. } => ErrorKind::Protocol,
            Error::InvalidRange { .. }
            | Error::UnknownUnit(_)
            | Error::InvalidWindow { .. }
            | Error::UnsupportedDegree(_)
            | Error::EmptyGrid
            | Error::DegreeExceedsGrid { .. }
            | Error::InvalidPenalty(_)
            | Error::InvalidFrameRate(_)
            | Error::BufferTooSmall { .. } => ErrorKind::Validation,
        }
    }

    /// Transport and protocol failures clear up with a fresh packet window.
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Validation
    }

    /// Observed tag sequence for frame assembly failures.
    pub fn tags(&self) -> Option<&[Option<u8>]> {
        match self {
            Error::NoCompleteFrame { tags } => Some(tags),
            _ => None,
        }
    }
}
