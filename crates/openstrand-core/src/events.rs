//! Canvas notifications.
//!
//! Mutators queue events while they run; listeners are called afterwards in
//! registration order when the canvas flushes the queue.

use crate::strand::StrandId;
use std::fmt;

/// Events emitted by the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// A strand was added
    StrandCreated { id: StrandId, layer_name: String },
    /// A strand was removed from the given layer index
    StrandDeleted { index: usize },
    /// A masked strand was created over two layers
    MaskCreated { first: String, second: String },
    /// Mask-edit mode was left
    MaskEditExited,
    /// The selection was cleared
    DeselectAll,
    /// Angle-adjust mode confirmed its change
    AngleAdjustCompleted,
    /// The UI language changed
    LanguageChanged(String),
    /// The UI theme changed
    ThemeChanged(String),
}

type Listener = Box<dyn FnMut(&CanvasEvent)>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// A queue of pending events plus the registered listeners.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<(ListenerId, Listener)>,
    pending: Vec<CanvasEvent>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .field("pending", &self.pending)
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe(&mut self, listener: impl FnMut(&CanvasEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Queue an event for the next flush.
    pub fn emit(&mut self, event: CanvasEvent) {
        self.pending.push(event);
    }

    /// Events queued but not yet delivered.
    pub fn pending(&self) -> &[CanvasEvent] {
        &self.pending
    }

    /// Deliver all queued events. Returns the delivered events.
    pub fn flush(&mut self) -> Vec<CanvasEvent> {
        let events = std::mem::take(&mut self.pending);
        for event in &events {
            for (_, listener) in &mut self.listeners {
                listener(event);
            }
        }
        events
    }

    /// Drop queued events without delivering them.
    pub fn discard(&mut self) {
        self.pending.clear();
    }
}
