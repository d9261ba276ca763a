use std::sync::atomic::{AtomicU32, Ordering};
use system::ConnectionId;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

static CONNECTION_ID_SOURCE: AtomicU32 = AtomicU32::new(1);

/// Raw websocket payload. Re-broadcast verbatim with the type it arrived with.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Frame::Text(text) => text.as_bytes(),
            Frame::Binary(bin) => bin,
        }
    }
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Frame(Frame),
    Close,
}

pub type ConnectionTx = UnboundedSender<ConnectionEvent>;
pub type ConnectionRx = UnboundedReceiver<ConnectionEvent>;

/// Frames read from a connection after it was admitted into a session.
pub type IncomingTx = UnboundedSender<Frame>;
pub type IncomingRx = UnboundedReceiver<Frame>;

/// Egress side of a connection as seen by a session. Sending never waits:
/// the connection drains its own queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: ConnectionTx,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, tx: ConnectionTx) -> Self {
        Self { id, tx }
    }

    pub fn channel() -> (Self, ConnectionRx) {
        let (tx, rx) = unbounded_channel();
        let id = CONNECTION_ID_SOURCE.fetch_add(1, Ordering::Relaxed);
        (Self::new(id, tx), rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns false when the connection is already gone.
    pub fn send(&self, frame: Frame) -> bool {
        self.tx.send(ConnectionEvent::Frame(frame)).is_ok()
    }

    pub fn close(&self) {
        let _ = self.tx.send(ConnectionEvent::Close);
    }
}

/// A connection on its way into a session: where to write to it, and where
/// its further frames will arrive.
#[derive(Debug)]
pub struct Client {
    pub handle: ConnectionHandle,
    pub incoming: IncomingRx,
}

impl Client {
    pub fn new(handle: ConnectionHandle) -> (Self, IncomingTx) {
        let (tx, incoming) = unbounded_channel();
        (Self { handle, incoming }, tx)
    }
}
