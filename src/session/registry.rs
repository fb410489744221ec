use super::session::{CallSession, CallSessionSnapshot};
use super::CallMode;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Live sessions keyed by call id.
///
/// Sessions live here, outside any surface lifecycle, so minimizing and
/// restoring the widget re-attaches to the same session instead of minting a
/// new one (and a new clock).
pub struct SessionRegistry {
    inner: Mutex<HashMap<String, CallSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, session: CallSession) {
        let mut guard = self.inner.lock().unwrap();
        guard.insert(session.call_id(), session);
    }

    pub fn get(&self, call_id: &str) -> Option<CallSession> {
        let guard = self.inner.lock().unwrap();
        guard.get(call_id).cloned()
    }

    pub fn remove(&self, call_id: &str) -> Option<CallSession> {
        let mut guard = self.inner.lock().unwrap();
        guard.remove(call_id)
    }

    pub fn snapshots(&self) -> Vec<CallSessionSnapshot> {
        let guard = self.inner.lock().unwrap();
        guard.values().map(|session| session.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Drop sessions that reached `Ended` and are no longer drawn. Sessions
    /// still `Active` are never reaped, minimized or not.
    pub fn reap_ended(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.retain(|call_id, session| {
            let snapshot = session.snapshot();
            let done = snapshot.mode == CallMode::Ended && !snapshot.visible;
            if done {
                debug!(call_id, "reaping ended session");
            }
            !done
        });
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
