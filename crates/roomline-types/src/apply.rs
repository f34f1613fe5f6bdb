//! The commit applier (§4.4): a pure function mutating a line list per a
//! change-op batch. Used both by the Page Room to compute trial post-images
//! and to patch the mirror on an incoming remote commit.

use crate::error::RoomError;
use crate::ids::{time_of, InsertAnchor, TimeSource, UserId};
use crate::line::Line;

/// `{ updated, userId }` from §4.4: `updated` is whatever carries the commit
/// timestamp (a plain unix-seconds value for a local push, a `CommitId` for
/// a notification already ack'd by the server).
pub struct ApplyContext<'a, T: TimeSource> {
    pub updated: &'a T,
    pub user_id: &'a UserId,
}

impl<'a, T: TimeSource> ApplyContext<'a, T> {
    pub fn new(updated: &'a T, user_id: &'a UserId) -> Self {
        Self { updated, user_id }
    }
}

/// Applies `changes` to `lines` left-to-right, returning the resulting list.
///
/// `title`/`descriptions`/`deleted` ops are opaque here (server-side
/// semantics) and are skipped without error — the applier only ever sees
/// them because a caller appended them to a batch it is about to submit, not
/// because it produced them itself.
pub fn apply<T: TimeSource>(
    lines: &[Line],
    changes: &[crate::change::ChangeOp],
    ctx: &ApplyContext<'_, T>,
) -> Result<Vec<Line>, RoomError> {
    use crate::change::ChangeOp;

    let mut out = lines.to_vec();

    for change in changes {
        match change {
            ChangeOp::Insert {
                anchor,
                line_id,
                text,
            } => {
                let stamp = time_of(line_id);
                let new_line = Line::new(line_id.clone(), text.clone(), ctx.user_id.clone(), stamp);
                match anchor {
                    InsertAnchor::End => {
                        tracing::debug!(%line_id, "apply: insert at end");
                        out.push(new_line);
                    }
                    InsertAnchor::Before(id) => {
                        let idx = out
                            .iter()
                            .position(|l| &l.id == id)
                            .ok_or_else(|| RoomError::MissingAnchor { id: id.clone() })?;
                        tracing::debug!(%line_id, before = %id, "apply: insert before anchor");
                        out.insert(idx, new_line);
                    }
                }
            }
            ChangeOp::Update { anchor, text } => {
                let line = out
                    .iter_mut()
                    .find(|l| &l.id == anchor)
                    .ok_or_else(|| RoomError::MissingAnchor { id: anchor.clone() })?;
                tracing::debug!(%anchor, "apply: update");
                line.text = text.clone();
                line.updated = time_of(ctx.updated);
            }
            ChangeOp::Delete { anchor } => {
                let idx = out
                    .iter()
                    .position(|l| &l.id == anchor)
                    .ok_or_else(|| RoomError::MissingAnchor { id: anchor.clone() })?;
                tracing::debug!(%anchor, "apply: delete");
                out.remove(idx);
            }
            ChangeOp::Title(_) | ChangeOp::Descriptions(_) | ChangeOp::DeletedPage => {}
        }
    }

    Ok(out)
}
