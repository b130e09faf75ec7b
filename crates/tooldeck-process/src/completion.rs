//! Single-assignment value that any number of tasks can await

use tokio::sync::watch;

/// A value that is set at most once and observed by every waiter
///
/// The first call to [`Completion::resolve`] wins; later calls are ignored and
/// report `false`. Waiters arriving before or after resolution all receive a
/// clone of the same value.
#[derive(Debug)]
pub struct Completion<T> {
    slot: watch::Sender<Option<T>>,
}

impl<T: Clone> Completion<T> {
    /// Create an unresolved completion
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self { slot }
    }

    /// Store the value if none is stored yet
    pub fn resolve(&self, value: T) -> bool {
        self.slot.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            true
        })
    }

    /// Current value, if resolved
    pub fn get(&self) -> Option<T> {
        self.slot.borrow().clone()
    }

    /// Whether a value has been stored
    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Wait until a value is stored
    pub async fn wait(&self) -> T {
        let mut rx = self.slot.subscribe();
        loop {
            let current: Option<T> = rx.borrow_and_update().clone();
            if let Some(value) = current {
                return value;
            }
            // The sender lives in `self`, so the channel stays open while borrowed.
            let _ = rx.changed().await;
        }
    }
}

impl<T: Clone> Default for Completion<T> {
    fn default() -> Self {
        Self::new()
    }
}
