//! Registry of collaboration sessions and the per-tick pump.
//!
//! DESIGN
//! ======
//! The bridge is single-threaded on the scene side: nothing touches the
//! scene except the caller of [`Collaboration::pump`]. Each tick checks
//! every link, applies everything received, and only then routes the
//! tick's scene events to the sessions. Events produced by decoding carry
//! remote provenance, so routing them never pushes anything back.

#[cfg(test)]
#[path = "collaboration_test.rs"]
mod tests;

use scene::{Scene, SceneEvent};
use tracing::info;
use uuid::Uuid;

use crate::session::Session;

/// What one pump tick did.
#[derive(Debug, Default)]
pub struct PumpReport {
    /// Sessions whose link came up during this tick.
    pub connected_sessions: usize,
    pub frames_received: usize,
    pub frames_pushed: usize,
    /// Every scene event drained this tick, in order.
    pub events: Vec<SceneEvent>,
}

#[derive(Default)]
pub struct Collaboration {
    sessions: Vec<Session>,
}

impl Collaboration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(&mut self, name: impl Into<String>) -> Uuid {
        let session = Session::new(name);
        let id = session.id();
        info!(session = %session.name(), %id, "collab: session created");
        self.sessions.push(session);
        id
    }

    #[must_use]
    pub fn session(&self, id: Uuid) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id() == id)
    }

    pub fn session_mut(&mut self, id: Uuid) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| s.id() == id)
    }

    #[must_use]
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    /// Tear down and drop a session. Returns `false` for an unknown id.
    pub fn remove_session(&mut self, scene: &mut Scene, id: Uuid) -> bool {
        let Some(pos) = self.sessions.iter().position(|s| s.id() == id) else {
            return false;
        };
        let mut session = self.sessions.remove(pos);
        session.teardown(scene);
        true
    }

    /// Tear down every session.
    pub fn shutdown(&mut self, scene: &mut Scene) {
        for mut session in self.sessions.drain(..) {
            session.teardown(scene);
        }
    }

    /// Run one tick: connection checks, inbound frames, then event routing.
    pub fn pump(&mut self, scene: &mut Scene) -> PumpReport {
        let mut report = PumpReport::default();
        for session in &mut self.sessions {
            if let Some(pushed) = session.check_connection(scene) {
                report.connected_sessions += 1;
                report.frames_pushed += pushed;
            }
            report.frames_received += session.receive(scene);
        }

        // Handling an event can produce more (shadow re-encodes); those are
        // local edits of unsynchronized objects and settle in one extra pass.
        loop {
            let events = scene.drain_events();
            if events.is_empty() {
                break;
            }
            for event in &events {
                for session in &mut self.sessions {
                    report.frames_pushed += session.handle_event(scene, event);
                }
            }
            report.events.extend(events);
        }
        report
    }
}
