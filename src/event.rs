use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// What happened in the host store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Removed,
    Changed,
    Moved,
    /// A history visit, which can change `last_visited`/`access_count` keys.
    Visited,
}

/// A change notification delivered by the host store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Id of the affected item (or the watched file name for file-level changes).
    pub id: String,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// Requests sent to a running auto-sorter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Sort immediately unless a pass is already scheduled or running.
    SortNow,
    /// Turn auto-sort on or off without restarting.
    SetAutoSort(bool),
    /// Stop the auto-sorter after any running pass finishes.
    Shutdown,
}

/// The registration through which a host store delivers change events.
///
/// Detaching drops events at the source, so moves issued while sorting never
/// reach the scheduler. Clones share the same attachment state.
#[derive(Debug, Clone)]
pub struct ChangeListener {
    attached: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<ChangeEvent>,
}

impl ChangeListener {
    /// Create an attached listener and the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChangeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Self {
            attached: Arc::new(AtomicBool::new(true)),
            tx,
        };
        (listener, rx)
    }

    /// Deliver an event. Returns `false` if it was dropped.
    pub fn notify(&self, event: ChangeEvent) -> bool {
        if !self.is_attached() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Stop forwarding events.
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    /// Resume forwarding events.
    pub fn attach(&self) {
        self.attached.store(true, Ordering::SeqCst);
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attached_listener_forwards() {
        let (listener, mut rx) = ChangeListener::channel();
        assert!(listener.notify(ChangeEvent::new(ChangeKind::Created, "b1")));
        let got = rx.try_recv().expect("event");
        assert_eq!(got.kind, ChangeKind::Created);
        assert_eq!(got.id, "b1");
    }

    #[test]
    fn detached_listener_drops_events() {
        let (listener, mut rx) = ChangeListener::channel();
        listener.detach();
        assert!(!listener.notify(ChangeEvent::new(ChangeKind::Moved, "b1")));
        assert!(rx.try_recv().is_err());

        listener.attach();
        assert!(listener.notify(ChangeEvent::new(ChangeKind::Moved, "b2")));
        assert_eq!(rx.try_recv().expect("event").id, "b2");
    }

    #[test]
    fn clones_share_attachment() {
        let (listener, _rx) = ChangeListener::channel();
        let clone = listener.clone();
        listener.detach();
        assert!(!clone.is_attached());
        clone.attach();
        assert!(listener.is_attached());
    }
}
