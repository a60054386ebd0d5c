//! Per-viewer sync sessions.
//!
//! A viewer is either uninitialized (no entry) or active with a session id
//! and the next sequence number to hand out. Starting a new session always
//! picks a fresh id and restarts the sequence at 1; within one session the
//! sequence never repeats.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use rift_types::OwnerId;

/// An active session for one viewer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncSession {
    pub viewer: OwnerId,
    pub session_id: Uuid,
    pub next_seq: u64,
}

impl SyncSession {
    fn start(viewer: OwnerId) -> Self {
        Self {
            viewer,
            session_id: Uuid::now_v7(),
            next_seq: 1,
        }
    }
}

/// How a change notification should be handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The viewer is looking at their store: send a payload now.
    Push,
    /// The viewer is not looking: remembered until the next full sync.
    Deferred,
}

/// Session, viewing, and pending-change state for every viewer.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: HashMap<OwnerId, SyncSession>,
    viewing: HashSet<OwnerId>,
    pending: HashSet<OwnerId>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------
    // Sessions
    // ---------------------------------------------------------------

    /// The viewer's session, starting one if none is active.
    pub fn get_or_start_session(&mut self, viewer: OwnerId) -> &SyncSession {
        self.sessions
            .entry(viewer)
            .or_insert_with(|| SyncSession::start(viewer))
    }

    /// Replace the viewer's session with a fresh one.
    pub fn start_new_session(&mut self, viewer: OwnerId) -> &SyncSession {
        let session = SyncSession::start(viewer);
        debug!(viewer = %viewer, session = %session.session_id, "sync session started");
        self.sessions.insert(viewer, session);
        &self.sessions[&viewer]
    }

    /// The viewer's active session, if any.
    pub fn session(&self, viewer: &OwnerId) -> Option<&SyncSession> {
        self.sessions.get(viewer)
    }

    /// Hand out the next sequence number, starting a session if needed.
    pub fn next_seq(&mut self, viewer: OwnerId) -> u64 {
        let session = self
            .sessions
            .entry(viewer)
            .or_insert_with(|| SyncSession::start(viewer));
        let seq = session.next_seq;
        session.next_seq += 1;
        seq
    }

    /// End the viewer's session and forget their viewing state.
    pub fn end_session(&mut self, viewer: &OwnerId) -> Option<SyncSession> {
        self.viewing.remove(viewer);
        self.pending.remove(viewer);
        let ended = self.sessions.remove(viewer);
        if ended.is_some() {
            debug!(viewer = %viewer, "sync session ended");
        }
        ended
    }

    /// Number of active sessions.
    pub fn active(&self) -> usize {
        self.sessions.len()
    }

    // ---------------------------------------------------------------
    // Viewing and pending changes
    // ---------------------------------------------------------------

    pub fn set_viewing(&mut self, viewer: OwnerId, viewing: bool) {
        if viewing {
            self.viewing.insert(viewer);
        } else {
            self.viewing.remove(&viewer);
        }
    }

    pub fn is_viewing(&self, viewer: &OwnerId) -> bool {
        self.viewing.contains(viewer)
    }

    /// Record that the viewer's visible contents changed.
    pub fn mark_changed(&mut self, viewer: OwnerId) -> Delivery {
        if self.is_viewing(&viewer) {
            Delivery::Push
        } else {
            self.pending.insert(viewer);
            Delivery::Deferred
        }
    }

    pub fn has_pending(&self, viewer: &OwnerId) -> bool {
        self.pending.contains(viewer)
    }

    /// Consume the viewer's pending flag, returning whether it was set.
    pub fn take_pending(&mut self, viewer: &OwnerId) -> bool {
        self.pending.remove(viewer)
    }

    /// Drop every session and flag.
    pub fn clear(&mut self) {
        self.sessions.clear();
        self.viewing.clear();
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer() -> OwnerId {
        OwnerId::from_name("alice")
    }

    #[test]
    fn sequence_strictly_increases() {
        let mut sessions = SessionManager::new();
        let first = sessions.next_seq(viewer());
        let second = sessions.next_seq(viewer());
        let third = sessions.next_seq(viewer());
        assert_eq!(first, 1);
        assert!(first < second && second < third);
    }

    #[test]
    fn get_or_start_reuses_session() {
        let mut sessions = SessionManager::new();
        let id = sessions.get_or_start_session(viewer()).session_id;
        sessions.next_seq(viewer());
        assert_eq!(sessions.get_or_start_session(viewer()).session_id, id);
        assert_eq!(sessions.session(&viewer()).unwrap().next_seq, 2);
    }

    #[test]
    fn new_session_restarts_sequence_with_new_id() {
        let mut sessions = SessionManager::new();
        let old = sessions.get_or_start_session(viewer()).session_id;
        sessions.next_seq(viewer());
        sessions.next_seq(viewer());

        let fresh = sessions.start_new_session(viewer()).clone();
        assert_ne!(fresh.session_id, old);
        assert_eq!(fresh.next_seq, 1);
        assert_eq!(sessions.next_seq(viewer()), 1);
    }

    #[test]
    fn end_session_clears_state() {
        let mut sessions = SessionManager::new();
        sessions.get_or_start_session(viewer());
        sessions.set_viewing(viewer(), true);
        assert_eq!(sessions.active(), 1);

        assert!(sessions.end_session(&viewer()).is_some());
        assert!(sessions.session(&viewer()).is_none());
        assert!(!sessions.is_viewing(&viewer()));
        assert!(sessions.end_session(&viewer()).is_none());
    }

    #[test]
    fn mark_changed_pushes_or_defers() {
        let mut sessions = SessionManager::new();
        assert_eq!(sessions.mark_changed(viewer()), Delivery::Deferred);
        assert!(sessions.has_pending(&viewer()));

        sessions.set_viewing(viewer(), true);
        assert_eq!(sessions.mark_changed(viewer()), Delivery::Push);

        assert!(sessions.take_pending(&viewer()));
        assert!(!sessions.take_pending(&viewer()));
    }

    #[test]
    fn clear_drops_everything() {
        let mut sessions = SessionManager::new();
        sessions.get_or_start_session(viewer());
        sessions.set_viewing(OwnerId::from_name("bob"), true);
        sessions.mark_changed(OwnerId::from_name("carol"));
        sessions.clear();
        assert_eq!(sessions.active(), 0);
        assert!(!sessions.is_viewing(&OwnerId::from_name("bob")));
        assert!(!sessions.has_pending(&OwnerId::from_name("carol")));
    }
}
