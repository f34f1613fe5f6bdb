use std::fmt;

use crate::ids::LineId;

/// Crate-wide error type. One variant per kind in the error handling design;
/// hand-rolled rather than pulled in from a derive-macro error crate, to
/// match this codebase's own wire/codec error style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// The session has no logged-in user.
    NotLoggedIn,
    /// `ensureEditablePage` found the page non-editable for this user.
    Forbidden { project: String, title: String },
    /// An `_insert`/`_update`/`_delete` anchor id is absent from the current
    /// line list.
    MissingAnchor { id: LineId },
    /// The diff-to-ops cursor ran past the end of the pre-image on a
    /// non-append change.
    BadAnchor { line_no: usize },
    /// The push pipeline exhausted its conflict-retry budget.
    PushExhausted { attempts: u32 },
    /// The room's socket was already disconnected via `cleanup()`.
    RoomClosed,
    /// The underlying duplex transport dropped, or a request was rejected.
    Transport(String),
    /// A change-op or envelope failed to decode: ambiguous or missing
    /// discriminant keys, or malformed JSON.
    Codec(String),
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotLoggedIn => write!(f, "not logged in"),
            Self::Forbidden { project, title } => {
                write!(f, "forbidden: {project}/{title} is not editable")
            }
            Self::MissingAnchor { id } => write!(f, "missing anchor line: {id}"),
            Self::BadAnchor { line_no } => {
                write!(f, "bad anchor: cursor ran past end of line {line_no}")
            }
            Self::PushExhausted { attempts } => {
                write!(f, "push exhausted after {attempts} attempt(s)")
            }
            Self::RoomClosed => write!(f, "room is closed"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Codec(msg) => write!(f, "codec error: {msg}"),
        }
    }
}

impl std::error::Error for RoomError {}

pub type RoomResult<T> = Result<T, RoomError>;
