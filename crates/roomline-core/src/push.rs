//! The push pipeline (§4.6): submit a batch with optimistic concurrency,
//! and on conflict refetch the head and retry, bounded.
//!
//! Shared between the Page Room actor (`room.rs`) and the one-shot
//! `patch`/`deletePage` entry points (`api.rs`) — both push the same way,
//! they just differ in whether a room stays open afterward.

use roomline_types::{PageMirror, ProjectId, RoomError, UserId};
use roomline_wire::{CommitRequest, CommitResponse, METHOD_COMMIT};

use crate::change_source::{build_push_batch, ChangeSource};
use crate::collaborators::{ensure_editable_page, PageMetadataSource, RoomSocket};

pub const DEFAULT_PUSH_RETRIES: u32 = 3;

/// Identity and refetch coordinates a push needs but doesn't own.
pub(crate) struct PushParams<'a> {
    pub metadata: &'a dyn PageMetadataSource,
    pub socket: &'a dyn RoomSocket,
    pub project: &'a str,
    pub title: &'a str,
    pub project_id: &'a ProjectId,
    pub user_id: &'a UserId,
}

/// Runs `build_push_batch` → submit → on `Transport` error, refetch head
/// and retry (up to `retries` times), mutating `mirror` in place on
/// success. Fails `PushExhausted` once the retry budget runs out.
pub(crate) async fn push_with_retry(
    mirror: &mut PageMirror,
    source: ChangeSource,
    retries: u32,
    params: &PushParams<'_>,
) -> Result<(), RoomError> {
    let mut attempt = 0u32;
    loop {
        let (batch, changed_lines) = build_push_batch(mirror, &source, params.user_id).await?;

        let request = CommitRequest {
            project_id: params.project_id.clone(),
            parent_id: mirror.parent_id.clone(),
            page_id: mirror.page_id.clone(),
            user_id: params.user_id.clone(),
            changes: batch,
        };

        match params.socket.request(METHOD_COMMIT, request.to_data()).await {
            Ok(value) => {
                let response = CommitResponse::from_value(&value)?;
                tracing::info!(commit_id = %response.commit_id, "push committed");
                mirror.parent_id = response.commit_id;
                mirror.created = true;
                mirror.lines = changed_lines;
                return Ok(());
            }
            Err(RoomError::Transport(reason)) => {
                attempt += 1;
                tracing::warn!(attempt, retries, %reason, "push conflict, refetching head");
                if attempt > retries {
                    return Err(RoomError::PushExhausted { attempts: attempt });
                }
                refresh_head(mirror, params).await?;
            }
            Err(other) => return Err(other),
        }
    }
}

async fn refresh_head(mirror: &mut PageMirror, params: &PushParams<'_>) -> Result<(), RoomError> {
    let meta = ensure_editable_page(params.metadata, params.project, params.title).await?;
    mirror.parent_id = meta.commit_id;
    mirror.lines = meta.lines;
    mirror.created = meta.persistent;
    Ok(())
}
