//! Progress events emitted by a clone session.
//!
//! A caller that wants to follow a long clone run subscribes with
//! [`CloneSession::subscribe`](crate::session::CloneSession::subscribe) and
//! drains the receiver. Events are best effort: a dropped receiver never
//! affects the clone itself.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::value::EntityKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneEvent {
    /// An entity was fetched into the registry.
    Fetched { key: EntityKey },
    /// A clone of `template` was requested from `parent`'s `field`.
    CloneRequested {
        template: EntityKey,
        parent: Option<EntityKey>,
        field: Option<String>,
    },
    /// A request for `template` reused the clone already in flight.
    CloneDeduplicated { template: EntityKey },
    /// The remote store created `clone` for `template`.
    Created { template: EntityKey, clone: EntityKey },
    /// References to `template` were retargeted to `clone`.
    ReferencesResolved {
        template: EntityKey,
        clone: EntityKey,
        retargeted: usize,
    },
    DocumentCopied { key: EntityKey, field: String },
    /// Pending writes of `key` were flushed.
    Committed {
        key: EntityKey,
        fields: usize,
        members: usize,
        files: usize,
    },
}

/// Fan-out point for [`CloneEvent`]s.
#[derive(Debug, Default)]
pub struct EventSink {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<CloneEvent>>>,
}

impl EventSink {
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CloneEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.push(sender);
        }
        receiver
    }

    pub fn emit(&self, event: CloneEvent) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.retain(|sender| sender.send(event.clone()).is_ok());
        }
    }
}
