//! What feeds a push: either a fixed change-op batch (`insert`/`remove`/
//! `update`) or a whole-document patch function diffed against the current
//! mirror (`patch`). §4.6 "High-level ops" / "Push pipeline" steps 1-3.

use std::future::Future;
use std::pin::Pin;

use roomline_diff::diff_to_changes;
use roomline_types::{apply, description_texts_of, ApplyContext, ChangeOp, Line, PageMirror, RoomError, UnixSeconds, UserId};

/// `f(lines) -> string[]`, boxed so `PageRoom::patch` can accept any closure
/// (including one that suspends) without making the room generic over it.
pub type PatchFn = Box<dyn Fn(Vec<Line>) -> Pin<Box<dyn Future<Output = Vec<String>> + Send>> + Send + Sync>;

pub(crate) enum ChangeSource {
    Fixed(Vec<ChangeOp>),
    Patch(PatchFn),
}

/// Builds the full batch to submit (§4.6 steps 1-3): the caller's changes
/// (or the diff against a patch function's output), plus an auto-appended
/// `title` op if the first line changed or the page was never created, plus
/// an auto-appended `descriptions` op if lines 2..6 changed. Also returns
/// the trial post-image so the caller can swap it in on success.
pub(crate) async fn build_push_batch(
    mirror: &PageMirror,
    source: &ChangeSource,
    user_id: &UserId,
) -> Result<(Vec<ChangeOp>, Vec<Line>), RoomError> {
    let mut changes = match source {
        ChangeSource::Fixed(ops) => ops.clone(),
        ChangeSource::Patch(patch) => {
            let new_texts = patch(mirror.lines.clone()).await;
            diff_to_changes(&mirror.lines, &new_texts, user_id)?
        }
    };

    let updated = UnixSeconds::now();
    let ctx = ApplyContext::new(&updated, user_id);
    let changed_lines = apply(&mirror.lines, &changes, &ctx)?;

    let old_title = mirror.lines.first().map(|l| l.text.as_str()).unwrap_or("");
    let new_title = changed_lines.first().map(|l| l.text.as_str()).unwrap_or("");
    if old_title != new_title || !mirror.created {
        tracing::debug!(new_title, "push: synthesizing title op");
        changes.push(ChangeOp::Title(new_title.to_string()));
    }

    let old_desc = description_texts_of(&mirror.lines).join("\n");
    let new_desc = description_texts_of(&changed_lines).join("\n");
    if old_desc != new_desc {
        tracing::debug!("push: synthesizing descriptions op");
        changes.push(ChangeOp::Descriptions(description_texts_of(&changed_lines)));
    }

    Ok((changes, changed_lines))
}
