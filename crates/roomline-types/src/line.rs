use serde::{Deserialize, Serialize};

use crate::ids::{LineId, UnixSeconds, UserId};

/// One line of a page mirror.
///
/// By server convention the first line of a page's `lines` is the page
/// title; nothing in this type enforces that, it is a property of the
/// sequence the mirror holds (see `PageMirror`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub id: LineId,
    pub text: String,
    pub user_id: UserId,
    pub created: UnixSeconds,
    pub updated: UnixSeconds,
}

impl Line {
    pub fn new(id: LineId, text: impl Into<String>, user_id: UserId, stamp: UnixSeconds) -> Self {
        Self {
            id,
            text: text.into(),
            user_id,
            created: stamp,
            updated: stamp,
        }
    }
}
