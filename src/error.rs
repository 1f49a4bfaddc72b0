//! Crate-wide error type.
//!
//! Every unit's fallible entry point (`init`, `update_settings`, `process`,
//! `load_ext`, ...) returns `Result<T, Error>`. The variants mirror the error
//! kinds a C caller would see as status codes; here they carry enough context
//! to be useful without forcing every call site to match on strings.

use std::fmt;

/// Crate-wide error type.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Allocation failure.
    #[error("out of memory")]
    OutOfMemory,

    /// A parameter was outside its documented domain.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Unit was used before `init` or after being torn down.
    #[error("unit used in an invalid state")]
    BadState,

    /// Nil pointers, invalid sizes, or mismatched buffer shapes.
    #[error("bad arguments: {0}")]
    BadArguments(String),

    /// An archive entry (SFZ opcode target, LSPC chunk) was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Format mismatch while loading a sample.
    #[error("incompatible format: {0}")]
    Incompatible(String),

    /// The ray-tracer was cooperatively cancelled mid-run.
    #[error("cancelled")]
    Cancelled,

    /// A progress callback requested a stop.
    #[error("break point requested by callback")]
    BreakPoint,

    /// An internal invariant was violated. Should be unreachable.
    #[error("corrupted internal state: {0}")]
    Corrupted(String),

    /// A sub-operation had nothing to contribute. Internal control flow only;
    /// never surfaced to a caller (kept here so internal `Result` plumbing
    /// can share one error type).
    #[error("skip")]
    Skip,

    /// I/O failure while loading a sample or archive.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl Error {
    pub fn invalid(msg: impl fmt::Display) -> Self {
        Error::InvalidValue(msg.to_string())
    }
    pub fn bad_args(msg: impl fmt::Display) -> Self {
        Error::BadArguments(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
