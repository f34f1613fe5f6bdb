//! Core data model for the Scrapbox-style collaborative page-editing
//! client: lines, line ids, change-ops, the page mirror, and the crate-wide
//! error type.
//!
//! This crate has no I/O and no async: it is pure data plus the invariants
//! in the page mirror and the id factory. `roomline-diff` and
//! `roomline-core` build on top of it.

pub mod apply;
pub mod change;
pub mod error;
pub mod ids;
pub mod line;
pub mod mirror;

pub use apply::{apply, ApplyContext};
pub use change::ChangeOp;
pub use error::{RoomError, RoomResult};
pub use ids::{
    new_line_id, time_of, CommitId, InsertAnchor, LineId, PageId, ProjectId, TimeSource, UnixSeconds,
    UserId,
};
pub use line::Line;
pub use mirror::{description_slice, description_texts_of, PageMirror, DESCRIPTION_LINE_COUNT};
