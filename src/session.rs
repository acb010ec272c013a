// src/session.rs
// Per-browser conversation storage, keyed by the session cookie id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::chat::{ChatMessage, GREETING};

/// In-memory transcripts. Entries live until the process exits.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<HashMap<Uuid, Vec<ChatMessage>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a session's transcript, seeding the greeting on first
    /// contact. The lock is only held for the copy.
    pub fn messages(&self, id: Uuid) -> Vec<ChatMessage> {
        let mut sessions = self.inner.lock().unwrap();
        sessions.entry(id).or_insert_with(seed).clone()
    }

    pub fn push(&self, id: Uuid, message: ChatMessage) {
        let mut sessions = self.inner.lock().unwrap();
        sessions.entry(id).or_insert_with(seed).push(message);
    }
}

fn seed() -> Vec<ChatMessage> {
    vec![ChatMessage::assistant(GREETING)]
}
