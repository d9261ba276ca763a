use std::sync::Arc;

use system::SessionId;

use crate::connection_tx::{Client, Frame};
use crate::registry::SessionRegistry;
use crate::session::Session;

/// First message asking for a brand new session.
pub const INIT: &str = "init";

pub enum Admission {
    /// The new id has already been written back to the connection.
    Created(Arc<Session>),
    /// The history snapshot follows through the session's router.
    Joined(Arc<Session>),
    /// Nothing matched; the connection may try again.
    Pending,
}

/// Interprets the first message of a connection. Never creates a session
/// unless asked to with [`INIT`], and never fails hard.
pub fn admit(
    registry: &SessionRegistry,
    first_message: &str,
    client: Client,
    create_attempts: usize,
) -> Admission {
    if first_message == INIT {
        let handle = client.handle.clone();
        return match registry.create_session(vec![client], create_attempts) {
            Ok(session) => {
                handle.send(Frame::Text(session.id().to_string()));
                Admission::Created(session)
            }
            Err(err) => {
                log::warn!("Connection {} could not create a session: {}", handle.id(), err);
                Admission::Pending
            }
        };
    }

    let session = first_message
        .parse::<SessionId>()
        .ok()
        .and_then(|session_id| registry.find_session(&session_id));
    match session {
        Some(session) => match session.join(client) {
            Ok(()) => Admission::Joined(session),
            Err(client) => {
                log::debug!(
                    "Connection {} raced the end of session {}",
                    client.handle.id(),
                    session.id()
                );
                Admission::Pending
            }
        },
        None => Admission::Pending,
    }
}
