//! Anchors a folded edit script onto pre-image line-ids as change-ops
//! (§4.3): the diff-to-ops translator.

use roomline_types::{new_line_id, ChangeOp, InsertAnchor, Line, LineId, RoomError, UserId};

use crate::fold::{fold, FoldedTag};
use crate::ses::diff;

fn anchor_at(pre: &[Line], line_no: usize) -> InsertAnchor {
    match pre.get(line_no) {
        Some(line) => InsertAnchor::Before(line.id.clone()),
        None => InsertAnchor::End,
    }
}

fn require_concrete_anchor(anchor: &InsertAnchor, line_no: usize) -> Result<LineId, RoomError> {
    match anchor {
        InsertAnchor::Before(id) => Ok(id.clone()),
        InsertAnchor::End => Err(RoomError::BadAnchor { line_no }),
    }
}

/// Emits change-ops that, applied left-to-right to `pre`, yield `post`.
///
/// Only `pre[i].id` and `pre[i].text` are read. `post` is a plain text
/// sequence — the post-image of the document.
pub fn diff_to_changes(
    pre: &[Line],
    post: &[String],
    user_id: &UserId,
) -> Result<Vec<ChangeOp>, RoomError> {
    let left_texts: Vec<String> = pre.iter().map(|line| line.text.clone()).collect();
    let script = diff(&left_texts, post).script;
    let folded = fold(script);

    let mut changes = Vec::with_capacity(folded.len());
    let mut line_no = 0usize;
    let mut anchor = anchor_at(pre, line_no);

    for tag in folded {
        match tag {
            FoldedTag::Added(text) => {
                let line_id = new_line_id(user_id);
                tracing::debug!(anchor = %anchor, %line_id, "diff-to-ops: insert");
                changes.push(ChangeOp::Insert {
                    anchor: anchor.clone(),
                    line_id,
                    text,
                });
            }
            FoldedTag::Deleted(_) => {
                let concrete = require_concrete_anchor(&anchor, line_no)?;
                tracing::debug!(%concrete, "diff-to-ops: delete");
                changes.push(ChangeOp::Delete { anchor: concrete });
                line_no += 1;
                anchor = anchor_at(pre, line_no);
            }
            FoldedTag::Replaced { value, .. } => {
                let concrete = require_concrete_anchor(&anchor, line_no)?;
                tracing::debug!(%concrete, "diff-to-ops: update");
                changes.push(ChangeOp::Update {
                    anchor: concrete,
                    text: value,
                });
                line_no += 1;
                anchor = anchor_at(pre, line_no);
            }
            FoldedTag::Common(_) => {
                line_no += 1;
                anchor = anchor_at(pre, line_no);
            }
        }
    }

    Ok(changes)
}
