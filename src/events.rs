//! Save notifications.
//!
//! Store operations return their outcome to the caller; nothing is broadcast
//! implicitly. A host that wants to notify other parts of the game turns the
//! outcome into a [`SaveEvent`] and hands it to [`SaveEvents::emit`]. A
//! listener that fails is logged and skipped; the remaining listeners still
//! receive the event.

use std::collections::VecDeque;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::app_response::AppResponse;

pub const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SaveEventKind {
    ManualSave,
    AutoSave,
    Load,
    Delete,
    Import,
    Export,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveEvent {
    pub kind: SaveEventKind,
    pub success: bool,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveEvent {
    pub fn from_result<T>(kind: SaveEventKind, result: &Result<T, AppResponse>, timestamp: i64) -> Self {
        Self {
            kind,
            success: result.is_ok(),
            timestamp,
            error: result.as_ref().err().map(ToString::to_string),
        }
    }
}

pub type ListenerId = u64;

type Listener = Box<dyn FnMut(&SaveEvent) -> Result<(), String>>;

struct Subscription {
    id: ListenerId,
    kind: Option<SaveEventKind>,
    once: bool,
    listener: Listener,
}

/// Listener registry with a bounded event history.
#[derive(Default)]
pub struct SaveEvents {
    subscriptions: Vec<Subscription>,
    history: VecDeque<SaveEvent>,
    next_id: ListenerId,
}

impl SaveEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for one kind of event.
    pub fn on<F>(&mut self, kind: SaveEventKind, listener: F) -> ListenerId
    where
        F: FnMut(&SaveEvent) -> Result<(), String> + 'static,
    {
        self.subscribe(Some(kind), false, Box::new(listener))
    }

    /// Listen for every event.
    pub fn on_any<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&SaveEvent) -> Result<(), String> + 'static,
    {
        self.subscribe(None, false, Box::new(listener))
    }

    /// Listen for the next event of `kind`, then unsubscribe.
    pub fn once<F>(&mut self, kind: SaveEventKind, listener: F) -> ListenerId
    where
        F: FnMut(&SaveEvent) -> Result<(), String> + 'static,
    {
        self.subscribe(Some(kind), true, Box::new(listener))
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Deliver `event` to every matching listener. Returns the number of
    /// listeners that reported an error.
    pub fn emit(&mut self, event: SaveEvent) -> usize {
        let mut failures = 0;
        let mut finished = Vec::new();

        for subscription in self
            .subscriptions
            .iter_mut()
            .filter(|s| s.kind.is_none() || s.kind == Some(event.kind))
        {
            if let Err(e) = (subscription.listener)(&event) {
                warn!("Save event listener {} failed on {:?}: {e}", subscription.id, event.kind);
                failures += 1;
            }
            if subscription.once {
                finished.push(subscription.id);
            }
        }

        if !finished.is_empty() {
            self.subscriptions.retain(|s| !finished.contains(&s.id));
        }

        self.history.push_back(event);
        if self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
        failures
    }

    /// Up to `limit` most recent events, oldest first, optionally of one kind.
    pub fn history(&self, kind: Option<SaveEventKind>, limit: usize) -> Vec<&SaveEvent> {
        let matching: Vec<&SaveEvent> = self
            .history
            .iter()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .collect();
        let skip = matching.len().saturating_sub(limit);
        matching.into_iter().skip(skip).collect()
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
        self.history.clear();
    }

    fn subscribe(&mut self, kind: Option<SaveEventKind>, once: bool, listener: Listener) -> ListenerId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            kind,
            once,
            listener,
        });
        id
    }
}
