//! Coarse classification shared by every error type in the workspace.
//!
//! Each module keeps its own `thiserror` enum with precise variants; callers
//! that only need to decide "drop the instruction" versus "this is a bug"
//! match on [`ErrorKind`] instead.

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller passed a value outside the accepted domain.
    InvalidArgument,
    /// The operation referenced an unknown node, connection or ratio.
    NotFound,
    /// An internal postcondition failed. Indicates a logic bug.
    InvariantViolation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::NotFound => "not found",
            ErrorKind::InvariantViolation => "invariant violation",
        };
        f.write_str(name)
    }
}
