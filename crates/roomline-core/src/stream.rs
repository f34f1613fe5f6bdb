//! The Stream Subscriber (§4.7): joins a project-wide update stream and
//! yields events from one or more named channels.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use roomline_types::{ProjectId, RoomResult};
use roomline_wire::{default_stream_events, room_join_stream_data, METHOD_ROOM_JOIN};

use crate::collaborators::{PageMetadataSource, SocketTransport};

/// Capacity of the merged event channel `listen_stream` hands out.
const STREAM_CHANNEL_CAPACITY: usize = 64;

/// One event from a project update stream: which named channel it arrived
/// on, plus the raw payload (schema-less per §1/§6).
#[derive(Clone, Debug)]
pub struct StreamEvent {
    pub event: String,
    pub payload: serde_json::Value,
}

/// A live subscription to a project's update stream. Modelled as a pull
/// handle (`recv`) rather than a native generator, per §9's guidance for
/// runtimes without them.
pub struct StreamSubscriber {
    socket: Box<dyn crate::collaborators::RoomSocket>,
    receiver: mpsc::Receiver<StreamEvent>,
    forwarders: Vec<JoinHandle<()>>,
}

impl StreamSubscriber {
    /// Pulls the next event, or `None` once the subscriber has been closed
    /// and every forwarder has drained.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.receiver.recv().await
    }

    /// Disconnects on consumer-requested termination (§4.7).
    pub async fn close(mut self) {
        for handle in self.forwarders.drain(..) {
            handle.abort();
        }
        self.socket.disconnect().await;
    }
}

/// `listenStream(project, ...eventNames)`: resolves `projectId`, opens a
/// socket, joins the project-wide room, then forwards every named event
/// (defaulting to both `projectUpdatesStream:event` and
/// `projectUpdatesStream:commit`) onto one merged channel.
pub async fn listen_stream(
    metadata: &dyn PageMetadataSource,
    transport: &dyn SocketTransport,
    project: &str,
    events: &[String],
) -> RoomResult<StreamSubscriber> {
    let project_id: ProjectId = metadata.get_project_id(project).await?;

    let socket = transport.connect().await?;
    socket
        .request(METHOD_ROOM_JOIN, room_join_stream_data(&project_id))
        .await?;
    tracing::info!(%project, %project_id, "joined project update stream");

    let events: Vec<String> = if events.is_empty() {
        default_stream_events()
    } else {
        events.to_vec()
    };

    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let mut forwarders = Vec::with_capacity(events.len());
    for event_name in events {
        let sub = socket.subscribe(&event_name);
        forwarders.push(spawn_forwarder(event_name, sub, tx.clone()));
    }
    drop(tx);

    Ok(StreamSubscriber {
        socket,
        receiver: rx,
        forwarders,
    })
}

fn spawn_forwarder(
    event_name: String,
    mut sub: broadcast::Receiver<serde_json::Value>,
    tx: mpsc::Sender<StreamEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match sub.recv().await {
                Ok(payload) => {
                    let event = StreamEvent {
                        event: event_name.clone(),
                        payload,
                    };
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, event = %event_name, "stream subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    })
}
