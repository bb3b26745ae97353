#![warn(missing_docs)]
//! Beamtrace specific error structures
use std::{error::Error, fmt::Display};

/// Beamtrace application specific Result type
pub type BtResult<T> = std::result::Result<T, BeamtraceError>;

/// Errors that can be returned by various beamtrace functions.
#[derive(Debug, PartialEq, Eq)]
pub enum BeamtraceError {
    /// structurally invalid beamline element (bad coordinates, malformed
    /// boundary shape, unimplemented reflectivity mode)
    Element(String),
    /// invalid surface descriptor (degenerate quadric, bad mesh grid, ...)
    Surface(String),
    /// degenerate sampling input (non-monotonic axes, all-zero grid)
    Sampling(String),
    /// errors not falling in one of the categories above
    Other(String),
}

impl Display for BeamtraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Element(m) => write!(f, "Element:{m}"),
            Self::Surface(m) => write!(f, "Surface:{m}"),
            Self::Sampling(m) => write!(f, "Sampling:{m}"),
            Self::Other(m) => write!(f, "Other:{m}"),
        }
    }
}
impl Error for BeamtraceError {}

impl std::convert::From<String> for BeamtraceError {
    fn from(msg: String) -> Self {
        Self::Other(msg)
    }
}
