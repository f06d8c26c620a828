//! Per-engine session registry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::UserId;
use crate::Result;

/// A session slot: the session behind its mutual-exclusion guard.
///
/// Holding the guard is what gives an operation exclusive use of the
/// session's connection.
pub type SessionSlot<S> = Arc<Mutex<S>>;

/// A session the registry can tear down.
#[async_trait]
pub trait ManagedSession: Send + 'static {
    /// The user this session belongs to.
    fn owner(&self) -> UserId;

    /// Release the session's remote resources.
    ///
    /// Errors are reported but the registry never lets them stop the slot
    /// from being freed.
    async fn shutdown(&mut self) -> Result<()>;
}

/// Mapping from user to that user's single live session.
pub struct SessionRegistry<S> {
    sessions: RwLock<HashMap<UserId, SessionSlot<S>>>,
}

impl<S: ManagedSession> SessionRegistry<S> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    // The map is never left half-updated, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<UserId, SessionSlot<S>>> {
        self.sessions.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<UserId, SessionSlot<S>>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Get the slot for a user.
    pub fn get(&self, user: UserId) -> Option<SessionSlot<S>> {
        self.read().get(&user).cloned()
    }

    /// Check if a user has a session.
    pub fn contains(&self, user: UserId) -> bool {
        self.read().contains_key(&user)
    }

    /// Get the number of sessions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Store a session, returning its slot and whatever slot it replaced.
    ///
    /// The replaced slot is not torn down here; see [`teardown`].
    pub fn insert(&self, session: S) -> (SessionSlot<S>, Option<SessionSlot<S>>) {
        let user = session.owner();
        let slot = Arc::new(Mutex::new(session));
        let previous = self.write().insert(user, Arc::clone(&slot));
        (slot, previous)
    }

    /// Store a session unless the user already has one.
    ///
    /// On conflict the existing slot is kept and the new session is handed
    /// back so the caller can release it.
    pub fn insert_if_absent(
        &self,
        session: S,
    ) -> std::result::Result<SessionSlot<S>, (S, SessionSlot<S>)> {
        let user = session.owner();
        let mut sessions = self.write();
        if let Some(existing) = sessions.get(&user) {
            return Err((session, Arc::clone(existing)));
        }
        let slot = Arc::new(Mutex::new(session));
        sessions.insert(user, Arc::clone(&slot));
        Ok(slot)
    }

    /// Remove a user's slot without tearing it down.
    pub fn remove(&self, user: UserId) -> Option<SessionSlot<S>> {
        self.write().remove(&user)
    }

    /// Remove every slot.
    pub fn drain(&self) -> Vec<(UserId, SessionSlot<S>)> {
        self.write().drain().collect()
    }

    /// Close a user's session.
    ///
    /// Returns `false` if there was nothing to close.
    pub async fn close(&self, user: UserId) -> bool {
        match self.remove(user) {
            Some(slot) => {
                teardown(user, slot).await;
                true
            }
            None => false,
        }
    }

    /// Close every session. Returns how many were closed.
    pub async fn close_all(&self) -> usize {
        let drained = self.drain();
        let count = drained.len();
        for (user, slot) in drained {
            teardown(user, slot).await;
        }
        count
    }
}

impl<S: ManagedSession> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Tear down a slot that has already been removed from its registry.
///
/// Waits for the session's guard, so a command still in flight finishes
/// before the connection goes away. Shutdown errors are logged and dropped.
pub async fn teardown<S: ManagedSession>(user: UserId, slot: SessionSlot<S>) {
    let mut session = slot.lock().await;
    if let Err(e) = session.shutdown().await {
        warn!(user = %user, "error during session teardown (ignored): {}", e);
    }
    info!(user = %user, "session closed");
}
