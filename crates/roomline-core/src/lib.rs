//! The client-side collaborative page-editing core (§2, component F/G/I/K):
//! the Page Room actor, its push pipeline and reconnect supervisor, the
//! project-wide Stream Subscriber, and the one-shot `patch` entry point.
//!
//! Everything here is built on `roomline-types` (data model, applier, id
//! factory) and `roomline-diff` (SES diff, folder, diff-to-ops), and talks
//! to the outside world only through the collaborator traits in
//! [`collaborators`] — no HTTP client, no socket.io framing, lives here.

pub mod api;
mod change_source;
pub mod collaborators;
mod push;
pub mod room;
pub mod stream;

pub use api::patch;
pub use collaborators::{
    ensure_editable_page, PageLookup, PageMetadata, PageMetadataSource, RoomSocket, SocketTransport,
};
pub use room::{delete_page, PageRoom};
pub use stream::{listen_stream, StreamEvent, StreamSubscriber};
