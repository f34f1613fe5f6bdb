//! The one-shot variant of `patch` (§6 Public API surface): diffs and
//! pushes a single change without keeping a room open afterward. Joins,
//! pushes (with the same conflict-retry loop a `PageRoom` uses), and
//! disconnects.

use std::future::Future;
use std::pin::Pin;

use roomline_types::{PageMirror, RoomResult};
use roomline_wire::{room_join_page_data, METHOD_ROOM_JOIN};

use crate::change_source::ChangeSource;
use crate::collaborators::{ensure_editable_page, PageMetadataSource, SocketTransport};
use crate::push::{push_with_retry, PushParams, DEFAULT_PUSH_RETRIES};

/// `patch(project, title, f)`: the no-room one-shot edit. `f` receives the
/// page's current lines and returns the desired whole-document text.
pub async fn patch<F, Fut>(
    metadata: &dyn PageMetadataSource,
    transport: &dyn SocketTransport,
    project: &str,
    title: &str,
    f: F,
) -> RoomResult<()>
where
    F: Fn(Vec<roomline_types::Line>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<String>> + Send + 'static,
{
    let project_id = metadata.get_project_id(project).await?;
    let user_id = metadata.get_user_id().await?;
    let page = ensure_editable_page(metadata, project, title).await?;

    let socket = transport.connect().await?;
    socket
        .request(METHOD_ROOM_JOIN, room_join_page_data(&project_id, &page.id))
        .await?;

    let mut mirror = PageMirror::new(page.id, page.commit_id, page.persistent, page.lines);

    let boxed: crate::change_source::PatchFn = Box::new(move |lines| {
        Box::pin(f(lines)) as Pin<Box<dyn Future<Output = Vec<String>> + Send>>
    });

    let params = PushParams {
        metadata,
        socket: socket.as_ref(),
        project,
        title,
        project_id: &project_id,
        user_id: &user_id,
    };

    let result = push_with_retry(
        &mut mirror,
        ChangeSource::Patch(boxed),
        DEFAULT_PUSH_RETRIES,
        &params,
    )
    .await;

    socket.disconnect().await;
    result
}
