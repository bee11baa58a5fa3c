use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::media::Player;

/// Keys the player surface reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    ArrowLeft,
    ArrowRight,
    Char(char),
}

/// Which widget held keyboard focus when the key was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusTarget {
    Player,
    /// A text field; its keystrokes belong to ordinary typing.
    TextInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub focus: FocusTarget,
}

impl KeyEvent {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            focus: FocusTarget::Player,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportAction {
    TogglePlay,
    StepBackward,
    StepForward,
}

impl TransportAction {
    /// Map a key event to a transport action. Events typed into a text input
    /// are never hijacked.
    pub fn from_event(event: KeyEvent) -> Option<Self> {
        if event.focus == FocusTarget::TextInput {
            return None;
        }
        match event.key {
            Key::Space => Some(TransportAction::TogglePlay),
            Key::ArrowLeft => Some(TransportAction::StepBackward),
            Key::ArrowRight => Some(TransportAction::StepForward),
            Key::Char(_) => None,
        }
    }

    pub fn apply(self, player: &mut Player) {
        match self {
            TransportAction::TogglePlay => player.toggle_play(),
            TransportAction::StepBackward => player.step_backward(),
            TransportAction::StepForward => player.step_forward(),
        }
    }
}

/// Player keyboard shortcut definitions.
pub struct Shortcuts;

impl Shortcuts {
    pub fn legend() -> &'static [&'static str] {
        &["Space: Play/Pause", "←→: Frame by frame", "Click timeline to seek"]
    }
}

/// Host-wide key event source. Components subscribe for the lifetime of a
/// [`KeySubscription`]; dropping the subscription removes it, so remounting a
/// player never leaves a duplicate handler behind.
#[derive(Clone, Default)]
pub struct KeyboardHub {
    subscribers: Arc<Mutex<Vec<(u64, Sender<KeyEvent>)>>>,
    next_id: Arc<AtomicU64>,
}

impl KeyboardHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> KeySubscription {
        let (tx, events) = bounded::<KeyEvent>(64);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push((id, tx));
        }
        KeySubscription {
            id,
            events,
            hub: Arc::downgrade(&self.subscribers),
        }
    }

    /// Deliver an event to every live subscriber. Returns the number reached.
    pub fn dispatch(&self, event: KeyEvent) -> usize {
        let Ok(mut subs) = self.subscribers.lock() else {
            return 0;
        };
        let mut delivered = 0;
        subs.retain(|(_, tx)| match tx.try_send(event) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => true, // backpressure, keep
            Err(TrySendError::Disconnected(_)) => false,
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map_or(0, |subs| subs.len())
    }
}

/// Scoped key subscription. Unsubscribes on drop.
pub struct KeySubscription {
    id: u64,
    events: Receiver<KeyEvent>,
    hub: Weak<Mutex<Vec<(u64, Sender<KeyEvent>)>>>,
}

impl KeySubscription {
    #[cfg(test)]
    pub fn events(&self) -> &Receiver<KeyEvent> {
        &self.events
    }

    /// Apply every pending key event to `player`. Returns how many actions ran.
    pub fn drain_into(&self, player: &mut Player) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            if let Some(action) = TransportAction::from_event(event) {
                action.apply(player);
                applied += 1;
            }
        }
        applied
    }
}

impl Drop for KeySubscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            if let Ok(mut subs) = hub.lock() {
                subs.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
