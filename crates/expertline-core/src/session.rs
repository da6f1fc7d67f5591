//! Session storage: an injected store abstraction plus per-session turn locks.
//!
//! Sessions are ephemeral and single-process. The gateway only ever talks to
//! the [`SessionStore`] trait so turns stay testable without a real backend.

use crate::types::{Expert, Message, Session};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed store for live call sessions.
pub trait SessionStore: Send + Sync {
    /// Create (or reset) the session with the given id.
    fn create(&self, id: &str) -> Session;
    /// Snapshot of the session, if it exists.
    fn get(&self, id: &str) -> Option<Session>;
    /// Bind the routed expert to the session. No-op when the session is gone.
    fn set_expert(&self, id: &str, expert: Expert);
    /// Append one message to the session history. No-op when the session is gone.
    fn append_message(&self, id: &str, message: Message);
    /// Drop the session entirely.
    fn delete(&self, id: &str);
}

/// In-memory store. Sessions do not survive a process restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, id: &str) -> Session {
        let session = Session::new(id);
        self.sessions.insert(id.to_string(), session.clone());
        session
    }

    fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).map(|s| s.clone())
    }

    fn set_expert(&self, id: &str, expert: Expert) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.expert = Some(expert);
        }
    }

    fn append_message(&self, id: &str, message: Message) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.history.push(message);
        }
    }

    fn delete(&self, id: &str) {
        self.sessions.remove(id);
    }
}

/// One async mutex per session id: overlapping turns on the same call are
/// serialized instead of interleaving their history appends.
#[derive(Default)]
pub struct SessionLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the session's turn slot. The guard must be held until the
    /// turn's event stream has fully closed.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry for an ended session.
    pub fn remove(&self, session_id: &str) {
        self.locks.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[test]
    fn create_get_delete_round_trip() {
        let store = InMemorySessionStore::new();
        store.create("call-1");
        assert!(store.get("call-1").is_some());
        assert!(store.get("call-2").is_none());
        store.delete("call-1");
        assert!(store.get("call-1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn append_preserves_order() {
        let store = InMemorySessionStore::new();
        store.create("call-1");
        store.append_message("call-1", Message::user("first"));
        store.append_message("call-1", Message::expert("second", "Grace Hopper"));
        let session = store.get("call-1").unwrap();
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].content, "first");
        assert_eq!(session.history[1].content, "second");
    }

    #[test]
    fn append_to_missing_session_is_noop() {
        let store = InMemorySessionStore::new();
        store.append_message("nope", Message::user("lost"));
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn set_expert_binds_persona() {
        let store = InMemorySessionStore::new();
        store.create("call-1");
        let mut session = store.get("call-1").unwrap();
        assert!(session.expert.is_none());

        let expert = Expert {
            id: "grace-hopper".to_string(),
            name: "Grace Hopper".to_string(),
            title: None,
            expertise_areas: vec!["compilers".to_string()],
            reasoning: "test".to_string(),
            gender: Default::default(),
            voice_id: None,
        };
        store.set_expert("call-1", expert);
        session = store.get("call-1").unwrap();
        assert_eq!(session.expert.unwrap().name, "Grace Hopper");
    }

    #[tokio::test]
    async fn locks_serialize_turns_on_one_session() {
        let locks = Arc::new(SessionLocks::new());
        let guard = locks.acquire("call-1").await;

        let entered = Arc::new(AtomicBool::new(false));
        let entered_clone = Arc::clone(&entered);
        let locks_clone = Arc::clone(&locks);
        let waiter = tokio::spawn(async move {
            let _guard = locks_clone.acquire("call-1").await;
            entered_clone.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!entered.load(Ordering::SeqCst));

        drop(guard);
        waiter.await.unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn locks_do_not_block_across_sessions() {
        let locks = SessionLocks::new();
        let _a = locks.acquire("call-a").await;
        // Second session acquires immediately even while the first is held.
        let _b = locks.acquire("call-b").await;
    }
}
