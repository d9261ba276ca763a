use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use system::{ConnectionId, History, SessionId};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::connection_tx::{Client, ConnectionHandle, Frame, IncomingRx};
use crate::registry::RegistryRef;

/// Everything the router consumes, in arrival order.
#[derive(Debug)]
pub(crate) enum Routed {
    Frame { from: ConnectionId, frame: Frame },
    Join(Client),
    Leave(ConnectionId),
    Shutdown,
}

pub(crate) type InboundTx = UnboundedSender<Routed>;
pub(crate) type InboundRx = UnboundedReceiver<Routed>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Active(usize),
    Terminated,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: SessionId,
    pub members: usize,
    pub actions: usize,
    pub redo: usize,
}

#[derive(Default)]
struct Members {
    handles: HashMap<ConnectionId, ConnectionHandle>,
    terminated: bool,
}

pub struct Session {
    id: SessionId,
    members: Mutex<Members>,
    inbound: InboundTx,
    registry: RegistryRef,
    // published by the router, read by the admin listing
    action_count: AtomicUsize,
    redo_count: AtomicUsize,
}

impl Session {
    pub(crate) fn new(id: SessionId, registry: RegistryRef) -> (Arc<Self>, InboundRx) {
        let (inbound, rx) = unbounded_channel();
        let session = Arc::new(Self {
            id,
            members: Mutex::new(Members::default()),
            inbound,
            registry,
            action_count: AtomicUsize::new(0),
            redo_count: AtomicUsize::new(0),
        });
        (session, rx)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.members.lock().handles.len()
    }

    pub fn is_terminated(&self) -> bool {
        self.members.lock().terminated
    }

    /// Inserts the member and starts forwarding its frames into the session
    /// queue. A terminated session closes the connection instead.
    pub fn add_client(&self, client: Client) -> Membership {
        let Client { handle, incoming } = client;
        let connection_id = handle.id();
        let mut members = self.members.lock();
        if members.terminated {
            handle.close();
            return Membership::Terminated;
        }
        members.handles.insert(connection_id, handle);
        self.spawn_forwarder(connection_id, incoming);
        Membership::Active(members.handles.len())
    }

    /// Removing the last member tears the session down.
    pub fn remove_client(&self, connection_id: ConnectionId) -> Membership {
        let mut members = self.members.lock();
        if members.terminated {
            return Membership::Terminated;
        }
        if members.handles.remove(&connection_id).is_some() {
            log::debug!("Connection {} left session {}", connection_id, self.id);
        }
        if members.handles.is_empty() {
            drop(members);
            self.teardown();
            Membership::Terminated
        } else {
            Membership::Active(members.handles.len())
        }
    }

    /// Closes every member, frees the id in the registry and stops the router.
    /// Returns false if the session was already torn down.
    pub fn teardown(&self) -> bool {
        let handles = {
            let mut members = self.members.lock();
            if members.terminated {
                return false;
            }
            members.terminated = true;
            members.handles.drain().map(|(_, h)| h).collect::<Vec<_>>()
        };
        for handle in &handles {
            handle.close();
        }
        self.registry.release(self);
        let _ = self.inbound.send(Routed::Shutdown);
        log::info!("Session {} terminated", self.id);
        true
    }

    /// Sends `frame` to every member but `from`. Returns how many members
    /// accepted it; a gone member is skipped, never fatal.
    pub fn broadcast(&self, from: ConnectionId, frame: &Frame) -> usize {
        let members = self.members.lock();
        let mut delivered = 0;
        for (connection_id, handle) in members.handles.iter() {
            if *connection_id == from {
                continue;
            }
            if handle.send(frame.clone()) {
                delivered += 1;
            } else {
                log::warn!(
                    "Failed to deliver to connection {} in session {}",
                    connection_id,
                    self.id
                );
            }
        }
        delivered
    }

    pub fn send_to(&self, to: ConnectionId, frame: Frame) -> bool {
        self.members
            .lock()
            .handles
            .get(&to)
            .map_or(false, |handle| handle.send(frame))
    }

    /// Hands the client to the router, which adds it and sends the history
    /// snapshot in queue order. Gives the client back if the session is gone.
    pub(crate) fn join(&self, client: Client) -> Result<(), Client> {
        if self.is_terminated() {
            return Err(client);
        }
        match self.inbound.send(Routed::Join(client)) {
            Ok(()) => Ok(()),
            Err(err) => match err.0 {
                Routed::Join(client) => Err(client),
                _ => Ok(()),
            },
        }
    }

    pub(crate) fn publish_history(&self, history: &History) {
        self.action_count
            .store(history.actions().len(), Ordering::Relaxed);
        self.redo_count
            .store(history.redo_stack().len(), Ordering::Relaxed);
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.id.clone(),
            members: self.len(),
            actions: self.action_count.load(Ordering::Relaxed),
            redo: self.redo_count.load(Ordering::Relaxed),
        }
    }

    fn spawn_forwarder(&self, from: ConnectionId, mut incoming: IncomingRx) {
        let inbound = self.inbound.clone();
        tokio::spawn(async move {
            while let Some(frame) = incoming.recv().await {
                if inbound.send(Routed::Frame { from, frame }).is_err() {
                    return;
                }
            }
            let _ = inbound.send(Routed::Leave(from));
        });
    }
}
