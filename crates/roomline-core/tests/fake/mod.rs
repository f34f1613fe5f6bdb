//! In-memory fakes for `PageMetadataSource`/`SocketTransport`/`RoomSocket`,
//! used to exercise the push pipeline, conflict retry, and the stream
//! subscriber without any real network or socket.io server.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex as TokioMutex};

use roomline_core::{PageLookup, PageMetadata, PageMetadataSource, RoomSocket, SocketTransport};
use roomline_types::{
    apply, ApplyContext, ChangeOp, CommitId, Line, LineId, PageId, ProjectId, RoomError, UnixSeconds,
    UserId,
};

struct PageState {
    commit_id: CommitId,
    lines: Vec<Line>,
    persistent: bool,
}

struct Inner {
    project_id: ProjectId,
    user_id: UserId,
    page_ids: TokioMutex<HashMap<(String, String), PageId>>,
    pages: TokioMutex<HashMap<PageId, PageState>>,
    deleted: TokioMutex<HashSet<PageId>>,
    fail_next_commits: TokioMutex<u32>,
    commit_seq: AtomicU64,
    channels: StdMutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl Inner {
    async fn get_or_create_page_id(&self, project: &str, title: &str) -> PageId {
        let mut ids = self.page_ids.lock().await;
        let key = (project.to_string(), title.to_string());
        if let Some(id) = ids.get(&key) {
            return id.clone();
        }
        let page_id = PageId::new(format!("page-{project}-{title}"));
        ids.insert(key, page_id.clone());

        let mut pages = self.pages.lock().await;
        pages.insert(
            page_id.clone(),
            PageState {
                commit_id: CommitId::new(format!("{:08x}{:016x}", 0u64, 0u64)),
                lines: vec![Line::new(
                    LineId::new("seedline00000000000000aa"),
                    title.to_string(),
                    self.user_id.clone(),
                    UnixSeconds(0),
                )],
                persistent: false,
            },
        );
        page_id
    }

    fn next_commit_id(&self) -> CommitId {
        let seq = self.commit_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        CommitId::new(format!("{now:08x}{seq:016x}"))
    }

    fn channel(&self, event: &str) -> broadcast::Sender<Value> {
        let mut channels = self.channels.lock().expect("channels mutex poisoned");
        channels
            .entry(event.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    async fn handle_commit(&self, data: Value) -> Result<Value, RoomError> {
        {
            let mut fail = self.fail_next_commits.lock().await;
            if *fail > 0 {
                *fail -= 1;
                return Err(RoomError::Transport("simulated conflict".into()));
            }
        }

        let page_id = PageId::new(
            data["pageId"]
                .as_str()
                .ok_or_else(|| RoomError::Codec("commit missing pageId".into()))?,
        );
        let parent_id = CommitId::new(
            data["parentId"]
                .as_str()
                .ok_or_else(|| RoomError::Codec("commit missing parentId".into()))?,
        );
        let user_id = UserId::new(
            data["userId"]
                .as_str()
                .ok_or_else(|| RoomError::Codec("commit missing userId".into()))?,
        );
        let changes_json = data["changes"].as_array().cloned().unwrap_or_default();
        let changes: Vec<ChangeOp> = changes_json
            .iter()
            .map(ChangeOp::from_json)
            .collect::<Result<_, _>>()?;

        let mut pages = self.pages.lock().await;
        let state = pages
            .get_mut(&page_id)
            .ok_or_else(|| RoomError::Codec("commit against unknown page".into()))?;

        if state.commit_id != parent_id {
            return Err(RoomError::Transport("stale parent".into()));
        }

        if changes.len() == 1 && matches!(changes[0], ChangeOp::DeletedPage) {
            pages.remove(&page_id);
            drop(pages);
            self.deleted.lock().await.insert(page_id);
            let commit_id = self.next_commit_id();
            let notification = json!({ "id": commit_id.as_str(), "userId": user_id.as_str(), "changes": changes_json });
            let _ = self.channel(roomline_wire::EVENT_PAGE_COMMIT).send(notification);
            return Ok(json!({ "commitId": commit_id.as_str() }));
        }

        let updated = UnixSeconds::now();
        let ctx = ApplyContext::new(&updated, &user_id);
        let new_lines = apply(&state.lines, &changes, &ctx)?;
        state.lines = new_lines;
        state.persistent = true;
        let commit_id = self.next_commit_id();
        state.commit_id = commit_id.clone();

        let notification = json!({ "id": commit_id.as_str(), "userId": user_id.as_str(), "changes": changes_json });
        let _ = self.channel(roomline_wire::EVENT_PAGE_COMMIT).send(notification);

        Ok(json!({ "commitId": commit_id.as_str() }))
    }
}

/// A cheaply-cloned handle to an in-memory fake "server". Implements both
/// collaborator traits, so a single instance can be passed wherever a
/// `PageMetadataSource` or `SocketTransport` is expected.
pub struct FakeBackend {
    inner: Arc<Inner>,
}

impl FakeBackend {
    pub fn new() -> Self {
        FakeBackend {
            inner: Arc::new(Inner {
                project_id: ProjectId::new("proj-id"),
                user_id: UserId::new("user-abcdef"),
                page_ids: TokioMutex::new(HashMap::new()),
                pages: TokioMutex::new(HashMap::new()),
                deleted: TokioMutex::new(HashSet::new()),
                fail_next_commits: TokioMutex::new(0),
                commit_seq: AtomicU64::new(0),
                channels: StdMutex::new(HashMap::new()),
            }),
        }
    }

    pub async fn is_persistent(&self, project: &str, title: &str) -> bool {
        let page_id = self.inner.get_or_create_page_id(project, title).await;
        let pages = self.inner.pages.lock().await;
        pages.get(&page_id).map(|s| s.persistent).unwrap_or(false)
    }

    pub async fn is_deleted(&self, project: &str, title: &str) -> bool {
        let ids = self.inner.page_ids.lock().await;
        match ids.get(&(project.to_string(), title.to_string())) {
            Some(page_id) => self.inner.deleted.lock().await.contains(page_id),
            None => false,
        }
    }

    pub async fn current_lines(&self, project: &str, title: &str) -> Vec<Line> {
        let page_id = self.inner.get_or_create_page_id(project, title).await;
        let pages = self.inner.pages.lock().await;
        pages.get(&page_id).map(|s| s.lines.clone()).unwrap_or_default()
    }

    /// Forces the next `n` commit attempts to fail with `Transport`,
    /// regardless of parentId. Used to exercise retry exhaustion.
    pub async fn fail_next_commits(&self, n: u32) {
        *self.inner.fail_next_commits.lock().await = n;
    }

    /// Mutates server state directly (no socket event emitted), as if
    /// another client had pushed a commit this room doesn't yet know
    /// about: the next push against the stale `parentId` is rejected and
    /// `ensureEditablePage` will observe this change on refetch.
    pub async fn push_remote_line(&self, project: &str, title: &str, text: &str) {
        let page_id = self.inner.get_or_create_page_id(project, title).await;
        let mut pages = self.inner.pages.lock().await;
        let state = pages.get_mut(&page_id).expect("page must exist");
        let seq = state.lines.len();
        let line = Line::new(
            LineId::new(format!("remoteline{seq:014}")),
            text,
            self.inner.user_id.clone(),
            UnixSeconds::now(),
        );
        state.lines.push(line);
        state.commit_id = self.inner.next_commit_id();
    }

    /// Same idea as `push_remote_line`, but removes a line out from under
    /// the room: the next push referencing that anchor will fail
    /// `MissingAnchor` once the refetch picks up the deletion.
    pub async fn remove_remote_line(&self, project: &str, title: &str, line_id: &LineId) {
        let page_id = self.inner.get_or_create_page_id(project, title).await;
        let mut pages = self.inner.pages.lock().await;
        let state = pages.get_mut(&page_id).expect("page must exist");
        state.lines.retain(|l| &l.id != line_id);
        state.commit_id = self.inner.next_commit_id();
    }

    pub fn emit_stream_event(&self, event: &str, payload: Value) {
        let _ = self.inner.channel(event).send(payload);
    }
}

#[async_trait]
impl PageMetadataSource for FakeBackend {
    async fn get_page(&self, project: &str, title: &str) -> Result<PageLookup, RoomError> {
        let page_id = self.inner.get_or_create_page_id(project, title).await;
        let pages = self.inner.pages.lock().await;
        let state = pages.get(&page_id).expect("created above");
        Ok(PageLookup::Ok(PageMetadata {
            id: page_id,
            commit_id: state.commit_id.clone(),
            lines: state.lines.clone(),
            persistent: state.persistent,
        }))
    }

    async fn get_project_id(&self, _project: &str) -> Result<ProjectId, RoomError> {
        Ok(self.inner.project_id.clone())
    }

    async fn get_user_id(&self) -> Result<UserId, RoomError> {
        Ok(self.inner.user_id.clone())
    }
}

#[async_trait]
impl SocketTransport for FakeBackend {
    async fn connect(&self) -> Result<Box<dyn RoomSocket>, RoomError> {
        Ok(Box::new(FakeSocket {
            inner: self.inner.clone(),
        }))
    }
}

struct FakeSocket {
    inner: Arc<Inner>,
}

#[async_trait]
impl RoomSocket for FakeSocket {
    async fn request(&self, method: &str, data: Value) -> Result<Value, RoomError> {
        match method {
            roomline_wire::METHOD_ROOM_JOIN => Ok(json!({})),
            roomline_wire::METHOD_COMMIT => self.inner.handle_commit(data).await,
            other => Err(RoomError::Codec(format!("fake socket: unknown method {other}"))),
        }
    }

    fn subscribe(&self, event: &str) -> broadcast::Receiver<Value> {
        self.inner.channel(event).subscribe()
    }

    async fn disconnect(&self) {}
}
