//! Typed request/response/notification shapes for the socket transport,
//! and the JSON envelope builders/parsers that sit on top of the raw
//! change-op codec in `roomline-types` (§6).
//!
//! Only the shapes needed to drive the state machine are typed here — the
//! envelope transport itself is schema-less `serde_json::Value`, matching
//! §1's framing of socket.io handshake/JSON-schema concerns as external.

use serde_json::{json, Value};

use roomline_types::{ChangeOp, CommitId, PageId, ProjectId, RoomError, UserId};

/// Event name used for the socket.io-style request/response RPC.
pub const REQUEST_EVENT: &str = "socket.io-request";

/// `room:join` method name.
pub const METHOD_ROOM_JOIN: &str = "room:join";
/// `commit` method name.
pub const METHOD_COMMIT: &str = "commit";

/// Event a joined page room emits commit notifications on.
pub const EVENT_PAGE_COMMIT: &str = "commit";

/// Default project-stream event names (§4.7).
pub const STREAM_EVENT_EVENT: &str = "projectUpdatesStream:event";
pub const STREAM_EVENT_COMMIT: &str = "projectUpdatesStream:commit";

pub fn default_stream_events() -> Vec<String> {
    vec![STREAM_EVENT_EVENT.to_string(), STREAM_EVENT_COMMIT.to_string()]
}

/// Builds the `data` payload of a `room:join` request for a page room. The
/// `method` half of the envelope is `METHOD_ROOM_JOIN`, passed separately
/// to `RoomSocket::request`.
pub fn room_join_page_data(project_id: &ProjectId, page_id: &PageId) -> Value {
    json!({
        "projectId": project_id.as_str(),
        "pageId": page_id.as_str(),
        "projectUpdatesStream": false,
    })
}

/// Builds the `data` payload of a `room:join` request for a project-wide
/// update stream.
pub fn room_join_stream_data(project_id: &ProjectId) -> Value {
    json!({
        "projectId": project_id.as_str(),
        "pageId": Value::Null,
        "projectUpdatesStream": true,
    })
}

/// `commit { kind:"page", ... }` request payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitRequest {
    pub project_id: ProjectId,
    pub parent_id: CommitId,
    pub page_id: PageId,
    pub user_id: UserId,
    pub changes: Vec<ChangeOp>,
}

impl CommitRequest {
    /// Builds the `data` payload. The `method` half is `METHOD_COMMIT`.
    pub fn to_data(&self) -> Value {
        let changes: Vec<Value> = self.changes.iter().map(ChangeOp::to_json).collect();
        json!({
            "kind": "page",
            "projectId": self.project_id.as_str(),
            "parentId": self.parent_id.as_str(),
            "pageId": self.page_id.as_str(),
            "userId": self.user_id.as_str(),
            "changes": changes,
            "cursor": Value::Null,
            "freeze": true,
        })
    }
}

/// `{commitId}` commit acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitResponse {
    pub commit_id: CommitId,
}

impl CommitResponse {
    pub fn from_value(value: &Value) -> Result<Self, RoomError> {
        let commit_id = value
            .get("commitId")
            .and_then(Value::as_str)
            .ok_or_else(|| RoomError::Codec("commit response missing commitId".into()))?;
        Ok(Self {
            commit_id: CommitId::new(commit_id),
        })
    }
}

/// `{id, changes, userId}` incoming commit notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitNotification {
    pub id: CommitId,
    pub changes: Vec<ChangeOp>,
    pub user_id: UserId,
}

impl CommitNotification {
    pub fn from_value(value: &Value) -> Result<Self, RoomError> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| RoomError::Codec("commit notification missing id".into()))?;
        let user_id = value
            .get("userId")
            .and_then(Value::as_str)
            .ok_or_else(|| RoomError::Codec("commit notification missing userId".into()))?;
        let changes_arr = value
            .get("changes")
            .and_then(Value::as_array)
            .ok_or_else(|| RoomError::Codec("commit notification missing changes".into()))?;
        let changes = changes_arr
            .iter()
            .map(ChangeOp::from_json)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: CommitId::new(id),
            changes,
            user_id: UserId::new(user_id),
        })
    }
}
