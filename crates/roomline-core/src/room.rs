//! The Page Room (§4.6): owns the mirror, runs the push pipeline, keeps a
//! background live-commit consumer alive under a reconnect supervisor
//! (§4.8), and hands out a subscription to incoming commits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;

use roomline_types::{
    apply, ApplyContext, ChangeOp, InsertAnchor, Line, LineId, PageId, PageMirror, ProjectId,
    RoomError, RoomResult, UserId,
};
use roomline_wire::{
    room_join_page_data, CommitNotification, EVENT_PAGE_COMMIT, METHOD_ROOM_JOIN,
};

use crate::change_source::{ChangeSource, PatchFn};
use crate::collaborators::{ensure_editable_page, PageLookup, PageMetadataSource, RoomSocket, SocketTransport};
use crate::push::{push_with_retry, PushParams, DEFAULT_PUSH_RETRIES};

const RECONNECT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const RECONNECT_MAX_BACKOFF: Duration = Duration::from_secs(30);
/// Depth of the `listenPageUpdate` fanout channel. Slow subscribers lag
/// rather than stall the consumer; `recv()` surfaces a `Lagged` error they
/// can log and keep reading past.
const PAGE_UPDATE_CHANNEL_CAPACITY: usize = 64;

struct RoomShared {
    mirror: Mutex<PageMirror>,
    socket: RwLock<Arc<dyn RoomSocket>>,
    closed: AtomicBool,
    updates: broadcast::Sender<CommitNotification>,
}

/// One joined page room (§4.6). Exclusively owns its mirror; the
/// background live-commit consumer and every mutating method serialize
/// through `shared.mirror`.
pub struct PageRoom {
    project: String,
    title: String,
    project_id: ProjectId,
    page_id: PageId,
    user_id: UserId,
    metadata: Arc<dyn PageMetadataSource>,
    transport: Arc<dyn SocketTransport>,
    shared: Arc<RoomShared>,
    consumer: JoinHandle<()>,
}

impl PageRoom {
    /// `join(project, title)` (§4.6 Lifecycle).
    pub async fn join(
        metadata: Arc<dyn PageMetadataSource>,
        transport: Arc<dyn SocketTransport>,
        project: impl Into<String>,
        title: impl Into<String>,
    ) -> RoomResult<PageRoom> {
        let project = project.into();
        let title = title.into();

        let (project_id, user_id, page) = tokio::try_join!(
            metadata.get_project_id(&project),
            metadata.get_user_id(),
            ensure_editable_page(metadata.as_ref(), &project, &title),
        )?;

        let socket = transport.connect().await?;
        socket
            .request(METHOD_ROOM_JOIN, room_join_page_data(&project_id, &page.id))
            .await?;
        let socket: Arc<dyn RoomSocket> = Arc::from(socket);
        tracing::info!(%project, %title, page_id = %page.id, "joined page room");

        let mirror = PageMirror::new(page.id.clone(), page.commit_id, page.persistent, page.lines);
        let (updates_tx, _) = broadcast::channel(PAGE_UPDATE_CHANNEL_CAPACITY);

        let shared = Arc::new(RoomShared {
            mirror: Mutex::new(mirror),
            socket: RwLock::new(socket.clone()),
            closed: AtomicBool::new(false),
            updates: updates_tx,
        });

        let consumer = spawn_live_commit_consumer(
            shared.clone(),
            transport.clone(),
            project_id.clone(),
            page.id.clone(),
        );

        Ok(PageRoom {
            project,
            title,
            project_id,
            page_id: page.id,
            user_id,
            metadata,
            transport,
            shared,
            consumer,
        })
    }

    pub fn page_id(&self) -> &PageId {
        &self.page_id
    }

    /// A snapshot of the mirror's current lines. Mostly useful for tests and
    /// diagnostics; callers driving edits should prefer `patch`.
    pub async fn current_lines(&self) -> Vec<Line> {
        self.shared.mirror.lock().await.lines.clone()
    }

    /// `insert(text, beforeId="_end")` (§4.6 High-level ops): splits `text`
    /// on `\n`/`\r\n`, one `_insert` per line, all anchored at `beforeId` so
    /// they land in order immediately before it.
    pub async fn insert(&self, text: &str, before_id: Option<LineId>) -> RoomResult<()> {
        let anchor = match before_id {
            Some(id) => InsertAnchor::Before(id),
            None => InsertAnchor::End,
        };

        let ops = text
            .split("\r\n")
            .flat_map(|segment| segment.split('\n'))
            .map(|line_text| ChangeOp::Insert {
                anchor: anchor.clone(),
                line_id: roomline_types::new_line_id(&self.user_id),
                text: line_text.to_string(),
            })
            .collect();

        self.push(ChangeSource::Fixed(ops)).await
    }

    /// `remove(lineId)`.
    pub async fn remove(&self, line_id: LineId) -> RoomResult<()> {
        self.push(ChangeSource::Fixed(vec![ChangeOp::Delete { anchor: line_id }]))
            .await
    }

    /// `update(text, lineId)`.
    pub async fn update(&self, line_id: LineId, text: impl Into<String>) -> RoomResult<()> {
        self.push(ChangeSource::Fixed(vec![ChangeOp::Update {
            anchor: line_id,
            text: text.into(),
        }]))
        .await
    }

    /// `patch(f)`: diffs `f`'s output against the current mirror and pushes
    /// the resulting ops. On conflict, the refresh re-invokes `f` against
    /// the refreshed lines (consistent-read semantics), handled inside
    /// `push_with_retry`/`build_push_batch`.
    pub async fn patch<F, Fut>(&self, f: F) -> RoomResult<()>
    where
        F: Fn(Vec<Line>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Vec<String>> + Send + 'static,
    {
        let boxed: PatchFn = Box::new(move |lines| {
            Box::pin(f(lines)) as std::pin::Pin<Box<dyn std::future::Future<Output = Vec<String>> + Send>>
        });
        self.push(ChangeSource::Patch(boxed)).await
    }

    /// `listenPageUpdate()`: a fresh receiver on the room's internal commit
    /// fanout. Multiple subscribers all see every notification; a slow
    /// subscriber sees `RecvError::Lagged` rather than stalling the room.
    pub fn listen_page_update(&self) -> broadcast::Receiver<CommitNotification> {
        self.shared.updates.subscribe()
    }

    /// `cleanup()`: disconnects the socket and stops the background
    /// consumer. Every subsequent call on this room fails `RoomClosed`.
    pub async fn cleanup(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.consumer.abort();
        let socket = self.shared.socket.read().await.clone();
        socket.disconnect().await;
        tracing::info!(project = %self.project, title = %self.title, "page room cleaned up");
    }

    async fn push(&self, source: ChangeSource) -> RoomResult<()> {
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(RoomError::RoomClosed);
        }

        let mut mirror = self.shared.mirror.lock().await;
        if self.shared.closed.load(Ordering::Acquire) {
            return Err(RoomError::RoomClosed);
        }

        let socket = self.shared.socket.read().await.clone();
        let params = PushParams {
            metadata: self.metadata.as_ref(),
            socket: socket.as_ref(),
            project: &self.project,
            title: &self.title,
            project_id: &self.project_id,
            user_id: &self.user_id,
        };

        push_with_retry(&mut mirror, source, DEFAULT_PUSH_RETRIES, &params).await
    }
}

impl Drop for PageRoom {
    fn drop(&mut self) {
        self.consumer.abort();
    }
}

fn spawn_live_commit_consumer(
    shared: Arc<RoomShared>,
    transport: Arc<dyn SocketTransport>,
    project_id: ProjectId,
    page_id: PageId,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut rx = shared.socket.read().await.subscribe(EVENT_PAGE_COMMIT);
        let mut backoff = RECONNECT_INITIAL_BACKOFF;

        loop {
            if shared.closed.load(Ordering::Acquire) {
                return;
            }

            match rx.recv().await {
                Ok(payload) => {
                    backoff = RECONNECT_INITIAL_BACKOFF;
                    apply_remote_commit(&shared, &payload).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "live-commit consumer lagged on socket events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    if shared.closed.load(Ordering::Acquire) {
                        return;
                    }
                    tracing::warn!(
                        project_id = %project_id,
                        page_id = %page_id,
                        backoff_ms = backoff.as_millis() as u64,
                        "commit stream closed, reconnecting after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(RECONNECT_MAX_BACKOFF);

                    match reconnect(&shared, transport.as_ref(), &project_id, &page_id).await {
                        Ok(new_rx) => rx = new_rx,
                        Err(err) => {
                            tracing::warn!(%err, "reconnect attempt failed, will retry");
                        }
                    }
                }
            }
        }
    })
}

async fn apply_remote_commit(shared: &RoomShared, payload: &serde_json::Value) {
    let notification = match CommitNotification::from_value(payload) {
        Ok(n) => n,
        Err(err) => {
            tracing::warn!(%err, "dropping malformed commit notification");
            return;
        }
    };

    let mut mirror = shared.mirror.lock().await;
    if mirror.parent_id == notification.id {
        // Our own push already advanced the mirror to this commit and swapped
        // in its post-image (`push_with_retry` does this synchronously, ahead
        // of this notification). Re-applying the same ops here would be a
        // double-apply: inserts would duplicate, deletes would miss their
        // anchor. Still forward the notification so other subscribers see it.
        drop(mirror);
        let _ = shared.updates.send(notification);
        return;
    }
    let ctx = ApplyContext::new(&notification.id, &notification.user_id);
    match apply(&mirror.lines, &notification.changes, &ctx) {
        Ok(new_lines) => {
            mirror.lines = new_lines;
            mirror.parent_id = notification.id.clone();
            mirror.created = true;
            tracing::info!(commit_id = %notification.id, "applied remote commit to mirror");
        }
        Err(err) => {
            tracing::error!(%err, commit_id = %notification.id, "remote commit failed to apply, marking room unusable");
            shared.closed.store(true, Ordering::Release);
        }
    }
    drop(mirror);

    let _ = shared.updates.send(notification);
}

async fn reconnect(
    shared: &RoomShared,
    transport: &dyn SocketTransport,
    project_id: &ProjectId,
    page_id: &PageId,
) -> RoomResult<broadcast::Receiver<serde_json::Value>> {
    let new_socket = transport.connect().await?;
    new_socket
        .request(METHOD_ROOM_JOIN, room_join_page_data(project_id, page_id))
        .await?;
    let new_socket: Arc<dyn RoomSocket> = Arc::from(new_socket);
    let rx = new_socket.subscribe(EVENT_PAGE_COMMIT);

    *shared.socket.write().await = new_socket;
    tracing::info!(%project_id, %page_id, "reconnected page room");
    Ok(rx)
}

/// `deletePage(project, title)` (§4.6): no-op if the page was never
/// materialized server-side; otherwise joins, pushes a singleton
/// `{deleted: true}` batch, and disconnects.
pub async fn delete_page(
    metadata: &dyn PageMetadataSource,
    transport: &dyn SocketTransport,
    project: &str,
    title: &str,
) -> RoomResult<()> {
    let page = match metadata.get_page(project, title).await? {
        PageLookup::Ok(page) => page,
        PageLookup::Denied => {
            return Err(RoomError::Forbidden {
                project: project.to_string(),
                title: title.to_string(),
            })
        }
    };

    if !page.persistent {
        tracing::debug!(%project, %title, "delete_page: page was never persisted, no-op");
        return Ok(());
    }

    let project_id = metadata.get_project_id(project).await?;
    let user_id = metadata.get_user_id().await?;

    let socket = transport.connect().await?;
    socket
        .request(METHOD_ROOM_JOIN, room_join_page_data(&project_id, &page.id))
        .await?;

    let mut mirror = PageMirror::new(page.id.clone(), page.commit_id, page.persistent, page.lines);
    let params = PushParams {
        metadata,
        socket: socket.as_ref(),
        project,
        title,
        project_id: &project_id,
        user_id: &user_id,
    };

    push_with_retry(
        &mut mirror,
        ChangeSource::Fixed(vec![ChangeOp::DeletedPage]),
        DEFAULT_PUSH_RETRIES,
        &params,
    )
    .await?;

    socket.disconnect().await;
    tracing::info!(%project, %title, "deleted page");
    Ok(())
}
