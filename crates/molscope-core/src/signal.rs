//! Observer lists with disposer handles.
//!
//! Single-threaded: listeners live behind `Rc<RefCell<_>>` and run on the
//! thread that emits.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

type Listener<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// A list of callbacks fired with a shared value.
pub struct Signal<T> {
    inner: Rc<RefCell<Listeners<T>>>,
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl<T: 'static> Signal<T> {
    /// Creates a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener. It stays connected until the returned handle is dropped
    /// or disposed.
    pub fn connect(&self, listener: impl FnMut(&T) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            let listener: Listener<T> = Rc::new(RefCell::new(listener));
            inner.entries.push((id, listener));
            id
        };
        let weak: Weak<RefCell<Listeners<T>>> = Rc::downgrade(&self.inner);
        Subscription {
            remove: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().entries.retain(|(i, _)| *i != id);
                }
            })),
        }
    }

    /// Calls every listener in connection order.
    ///
    /// Listeners connected or disconnected during the emit take effect on the
    /// next one. A listener that re-emits the same signal is skipped for the
    /// nested call.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in snapshot {
            match listener.try_borrow_mut() {
                Ok(mut f) => (&mut *f)(value),
                Err(_) => log::warn!("signal listener re-entered, skipping"),
            }
        }
    }
}

impl<T> Signal<T> {
    /// Number of connected listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

/// Disconnects its listener when dropped.
#[must_use = "dropping a Subscription disconnects the listener immediately"]
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Disconnects now.
    pub fn dispose(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }

    /// Keeps the listener connected for the lifetime of the signal.
    pub fn detach(mut self) {
        self.remove = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("connected", &self.remove.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_emit_reaches_listeners() {
        let signal = Signal::<u32>::new();
        let total = Rc::new(Cell::new(0));
        let t = Rc::clone(&total);
        let _sub = signal.connect(move |v| t.set(t.get() + *v));
        signal.emit(&3);
        signal.emit(&4);
        assert_eq!(total.get(), 7);
    }

    #[test]
    fn test_dispose_disconnects() {
        let signal = Signal::<()>::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = signal.connect(move |()| h.set(h.get() + 1));
        signal.emit(&());
        sub.dispose();
        signal.emit(&());
        assert_eq!(hits.get(), 1);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn test_drop_disconnects_and_detach_keeps() {
        let signal = Signal::<()>::new();
        {
            let _sub = signal.connect(|()| {});
            assert_eq!(signal.listener_count(), 1);
        }
        assert_eq!(signal.listener_count(), 0);
        signal.connect(|()| {}).detach();
        assert_eq!(signal.listener_count(), 1);
    }

    #[test]
    fn test_subscription_outlives_signal() {
        let signal = Signal::<()>::new();
        let sub = signal.connect(|()| {});
        drop(signal);
        sub.dispose();
    }
}
