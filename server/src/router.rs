use std::sync::Arc;

use system::{encode_history, ConnectionId, Envelope, History};

use crate::connection_tx::{Client, Frame};
use crate::session::{InboundRx, Membership, Routed, Session};

/// Single consumer of a session's queue. Owns the history, so nothing else
/// needs to lock it.
pub struct MessageRouter {
    session: Arc<Session>,
    inbound: InboundRx,
    history: History,
}

impl MessageRouter {
    pub(crate) fn new(session: Arc<Session>, inbound: InboundRx) -> Self {
        Self {
            session,
            inbound,
            history: History::new(),
        }
    }

    pub(crate) fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(mut self) {
        log::debug!("Router for session {} started", self.session.id());
        while let Some(routed) = self.inbound.recv().await {
            match routed {
                Routed::Frame { from, frame } => self.dispatch(from, frame),
                Routed::Join(client) => self.join(client),
                Routed::Leave(connection_id) => {
                    if let Membership::Terminated = self.session.remove_client(connection_id) {
                        break;
                    }
                }
                Routed::Shutdown => break,
            }
        }
        self.drain();
        log::debug!("Router for session {} stopped", self.session.id());
    }

    fn dispatch(&mut self, from: ConnectionId, frame: Frame) {
        let envelope = match Envelope::decode(frame.as_bytes()) {
            Ok(envelope) => envelope,
            Err(err) => {
                log::warn!(
                    "Dropping message from {} in session {}: {}",
                    from,
                    self.session.id(),
                    err
                );
                return;
            }
        };
        log::debug!("Session {} <- {}: {:?}", self.session.id(), from, envelope);

        match envelope {
            Envelope::Drawing(action) => {
                self.history.push(action);
                self.session.publish_history(&self.history);
                self.session.broadcast(from, &frame);
            }
            Envelope::GetHistory => self.send_history(from),
            Envelope::Undo => {
                self.history.undo();
                self.session.publish_history(&self.history);
                self.session.broadcast(from, &frame);
            }
            Envelope::Redo => {
                self.history.redo();
                self.session.publish_history(&self.history);
                self.session.broadcast(from, &frame);
            }
            Envelope::Unknown(kind) => {
                log::debug!("Ignoring {:?} in session {}", kind, self.session.id());
            }
        }
    }

    // Membership and snapshot change together here, so the joiner sees every
    // action exactly once: in the snapshot or live.
    fn join(&mut self, client: Client) {
        let connection_id = client.handle.id();
        if let Membership::Active(members) = self.session.add_client(client) {
            log::info!(
                "Connection {} joined session {} ({} members)",
                connection_id,
                self.session.id(),
                members
            );
            self.send_history(connection_id);
        }
    }

    fn send_history(&self, to: ConnectionId) {
        match encode_history(&self.history) {
            Ok(text) => {
                if !self.session.send_to(to, Frame::Text(text)) {
                    log::debug!("History requester {} is gone", to);
                }
            }
            Err(err) => log::warn!("Failed to encode history: {}", err),
        }
    }

    // Joiners still queued behind the shutdown never became members.
    fn drain(&mut self) {
        self.inbound.close();
        while let Ok(routed) = self.inbound.try_recv() {
            if let Routed::Join(client) = routed {
                client.handle.close();
            }
        }
    }
}
