//! Injectable async interfaces to metadata-fetch and socket-transport
//! backends (§6), so the room/stream logic never owns I/O policy. Test
//! fixtures and production backends are interchangeable trait objects.

use async_trait::async_trait;
use serde_json::Value;

use roomline_types::{CommitId, Line, PageId, ProjectId, RoomError, UserId};

/// The result of `getPage`: either the page exists and is described here,
/// or it doesn't (a brand-new page the caller is about to create).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageMetadata {
    pub id: PageId,
    pub commit_id: CommitId,
    pub lines: Vec<Line>,
    /// False for a page that exists only as an in-memory shell (never
    /// committed server-side); mirrors `PageMirror::created`.
    pub persistent: bool,
}

/// Outcome of a page-metadata fetch: `Ok` on a fetchable page, `Denied` when
/// the page exists but this user may not edit it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageLookup {
    Ok(PageMetadata),
    Denied,
}

/// Resolves project/user identity and page metadata. Implementations talk
/// to whatever backend (HTTP API, local fixture) actually knows this.
#[async_trait]
pub trait PageMetadataSource: Send + Sync {
    async fn get_page(&self, project: &str, title: &str) -> Result<PageLookup, RoomError>;
    async fn get_project_id(&self, project: &str) -> Result<ProjectId, RoomError>;
    /// Fails `NotLoggedIn` for a guest session.
    async fn get_user_id(&self) -> Result<UserId, RoomError>;
}

/// `ensureEditablePage`: wraps `get_page`, turning `PageLookup::Denied` into
/// `RoomError::Forbidden`. Kept as a free function, not a trait method,
/// since it adds no I/O of its own.
pub async fn ensure_editable_page(
    source: &(dyn PageMetadataSource),
    project: &str,
    title: &str,
) -> Result<PageMetadata, RoomError> {
    match source.get_page(project, title).await? {
        PageLookup::Ok(meta) => Ok(meta),
        PageLookup::Denied => Err(RoomError::Forbidden {
            project: project.to_string(),
            title: title.to_string(),
        }),
    }
}

/// One joined room's duplex connection: request/response RPC plus
/// multiplexed event subscription.
#[async_trait]
pub trait RoomSocket: Send + Sync {
    async fn request(&self, method: &str, data: Value) -> Result<Value, RoomError>;
    /// Subscribes to a named event. Each call yields an independent
    /// receiver over the same broadcast, so multiple subscribers (the
    /// live-commit consumer, a `listenPageUpdate` caller) all see every
    /// message.
    fn subscribe(&self, event: &str) -> tokio::sync::broadcast::Receiver<Value>;
    async fn disconnect(&self);
}

/// Opens a fresh `RoomSocket`. Implementations own whatever transport
/// (socket.io client, in-memory fixture) backs the connection.
#[async_trait]
pub trait SocketTransport: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn RoomSocket>, RoomError>;
}
