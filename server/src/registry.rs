use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use system::SessionId;

use crate::connection_tx::Client;
use crate::router::MessageRouter;
use crate::session::Session;

type Table = RwLock<HashMap<SessionId, Arc<Session>>>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("session {0} already exists")]
    DuplicateId(SessionId),
    #[error("no free session id after {0} attempts")]
    Exhausted(usize),
}

/// Directory of live sessions. Clones share the same table.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    table: Arc<Table>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session under a freshly generated id, regenerating on
    /// collision up to `attempts` times.
    pub fn create_session(
        &self,
        initial_members: Vec<Client>,
        attempts: usize,
    ) -> Result<Arc<Session>, RegistryError> {
        self.create_from_ids((0..attempts).map(|_| SessionId::generate()), initial_members)
    }

    /// Never overwrites: an id already in use is an error.
    pub fn create_session_with_id(
        &self,
        session_id: SessionId,
        initial_members: Vec<Client>,
    ) -> Result<Arc<Session>, RegistryError> {
        let mut table = self.table.write();
        vacant(&table, &session_id)?;
        Ok(self.insert(&mut table, session_id, initial_members))
    }

    /// Takes the first candidate not already registered.
    pub(crate) fn create_from_ids<I>(
        &self,
        candidates: I,
        initial_members: Vec<Client>,
    ) -> Result<Arc<Session>, RegistryError>
    where
        I: IntoIterator<Item = SessionId>,
    {
        let mut table = self.table.write();
        let mut attempts = 0;
        for candidate in candidates {
            attempts += 1;
            match vacant(&table, &candidate) {
                Ok(()) => return Ok(self.insert(&mut table, candidate, initial_members)),
                Err(err) => log::warn!("Discarding generated id: {}", err),
            }
        }
        Err(RegistryError::Exhausted(attempts))
    }

    pub fn find_session(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.table.read().get(session_id).cloned()
    }

    pub fn remove_session(&self, session_id: &SessionId) -> Option<Arc<Session>> {
        self.table.write().remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Point-in-time list; no session lock is taken while the table is held.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.table.read().values().cloned().collect()
    }

    fn insert(
        &self,
        table: &mut HashMap<SessionId, Arc<Session>>,
        session_id: SessionId,
        initial_members: Vec<Client>,
    ) -> Arc<Session> {
        let (session, inbound) = Session::new(
            session_id.clone(),
            RegistryRef(Arc::downgrade(&self.table)),
        );
        table.insert(session_id.clone(), session.clone());
        for client in initial_members {
            session.add_client(client);
        }
        MessageRouter::new(session.clone(), inbound).spawn();
        log::info!("Session {} created", session_id);
        session
    }
}

fn vacant(
    table: &HashMap<SessionId, Arc<Session>>,
    session_id: &SessionId,
) -> Result<(), RegistryError> {
    if table.contains_key(session_id) {
        Err(RegistryError::DuplicateId(session_id.clone()))
    } else {
        Ok(())
    }
}

/// Back-reference a session uses to take itself out of the registry.
pub(crate) struct RegistryRef(Weak<Table>);

impl RegistryRef {
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        RegistryRef(Weak::new())
    }

    pub(crate) fn release(&self, session: &Session) {
        if let Some(table) = self.0.upgrade() {
            let mut table = table.write();
            let is_same = table
                .get(session.id())
                .map_or(false, |registered| std::ptr::eq(Arc::as_ptr(registered), session));
            if is_same {
                table.remove(session.id());
            }
        }
    }
}
