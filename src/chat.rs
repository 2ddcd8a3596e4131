//! Plain-text messaging over a session.
//!
//! A chat participant owns one free-text object named after itself. Sending
//! rewrites that object's text; the next pump pushes it as a literal text
//! frame. Incoming literal frames become visible free-text objects on the
//! receiving side, and every remote rewrite of one is a received line.

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;

use std::collections::HashSet;
use std::fmt;

use scene::{ChangeKind, ObjectId, ObjectKind, Provenance, Scene, SceneEvent};
use serde::Serialize;
use tracing::debug;

use crate::session::{Session, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatLine {
    pub direction: Direction,
    /// Name of the free-text object the line was carried by.
    pub from: String,
    pub text: String,
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Sent => write!(f, "[SENT] {}", self.text),
            Direction::Received => write!(f, "[RECEIVED] {}", self.text),
        }
    }
}

pub struct Chat {
    local_name: String,
    history: Vec<ChatLine>,
}

impl Chat {
    pub fn new(local_name: impl Into<String>) -> Self {
        Self { local_name: local_name.into(), history: Vec::new() }
    }

    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    #[must_use]
    pub fn history(&self) -> &[ChatLine] {
        &self.history
    }

    /// Write `text` into the local chat object, synchronizing it first if
    /// needed. The frame goes out on the next pump.
    ///
    /// # Errors
    ///
    /// Propagates [`SyncError`] when the chat object cannot be synchronized.
    pub fn send(&mut self, scene: &mut Scene, session: &mut Session, text: &str) -> Result<&ChatLine, SyncError> {
        let id = match scene.find_by_name_and_kind(&self.local_name, ObjectKind::FreeText) {
            Some(id) => id,
            None => scene.create_object(ObjectKind::FreeText, self.local_name.as_str(), Provenance::Local),
        };
        session.add_to_sync(scene, id)?;
        scene.set_text(id, text, Provenance::Local);
        self.history.push(ChatLine { direction: Direction::Sent, from: self.local_name.clone(), text: text.to_owned() });
        Ok(&self.history[self.history.len() - 1])
    }

    /// Collect received lines from one pump's events. Remote text writes on
    /// a visible free-text object make one line per object and batch,
    /// carrying the object's current text. Returns the new lines.
    pub fn observe(&mut self, scene: &Scene, events: &[SceneEvent]) -> &[ChatLine] {
        let start = self.history.len();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        for event in events {
            if event.provenance != Provenance::Remote
                || event.change != ChangeKind::TextModified
                || event.kind != ObjectKind::FreeText
            {
                continue;
            }
            let Some(obj) = scene.get(event.id) else {
                continue;
            };
            if obj.hidden || obj.name == self.local_name || !seen.insert(event.id) {
                continue;
            }
            let Some(text) = obj.text().filter(|t| !t.is_empty()) else {
                continue;
            };
            debug!(from = %obj.name, "chat: line received");
            self.history.push(ChatLine { direction: Direction::Received, from: obj.name.clone(), text: text.to_owned() });
        }
        &self.history[start..]
    }
}
