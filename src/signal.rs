//! Synchronous notification lists.
//!
//! A `Signal` holds listeners for one event. Emitting calls every current
//! listener in subscription order, synchronously, with the same arguments.
//! Listeners return nothing. A signal is borrowed mutably while it emits,
//! so listeners cannot subscribe or unsubscribe on that same signal during
//! the call.

use crate::meter::Meter;
use crate::node::NodeId;
use crate::pack::Pack;
use std::fmt;

/// Listener for pack events: the emitting node and the pack.
pub type PackListener = dyn FnMut(NodeId, &Pack);

/// Listener for meter events: the emitting node and the meter state.
pub type MeterListener = dyn FnMut(NodeId, &Meter);

/// Handle returned by [`Signal::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

/// An ordered list of listeners of type `F`.
///
/// # Examples
///
/// ```rust
/// use damage_pipeline::signal::{PackListener, Signal};
/// use damage_pipeline::Pack;
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let seen = Rc::new(Cell::new(0.0));
/// let mut signal: Signal<PackListener> = Signal::new();
/// let sink = seen.clone();
/// signal.connect(move |_, pack| sink.set(pack.value()));
/// # let node = damage_pipeline::Pipeline::new().add_node(Default::default());
/// signal.emit(node, &Pack::new(7.0));
/// assert_eq!(seen.get(), 7.0);
/// ```
pub struct Signal<F: ?Sized> {
    listeners: Vec<(Subscription, Box<F>)>,
    next_id: u64,
}

impl<F: ?Sized> Signal<F> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    /// Append a listener. It runs after every listener added before it.
    pub fn subscribe(&mut self, listener: Box<F>) -> Subscription {
        let id = Subscription(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns `true` if it was subscribed.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != subscription);
        self.listeners.len() != before
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl Signal<PackListener> {
    /// Subscribe a closure without boxing it first.
    pub fn connect(&mut self, listener: impl FnMut(NodeId, &Pack) + 'static) -> Subscription {
        self.subscribe(Box::new(listener))
    }

    /// Notify every listener of a pack event.
    pub fn emit(&mut self, node: NodeId, pack: &Pack) {
        for (_, listener) in &mut self.listeners {
            listener(node, pack);
        }
    }
}

impl Signal<MeterListener> {
    /// Subscribe a closure without boxing it first.
    pub fn connect(&mut self, listener: impl FnMut(NodeId, &Meter) + 'static) -> Subscription {
        self.subscribe(Box::new(listener))
    }

    /// Notify every listener of a meter event.
    pub fn emit(&mut self, node: NodeId, meter: &Meter) {
        for (_, listener) in &mut self.listeners {
            listener(node, meter);
        }
    }
}

impl<F: ?Sized> Default for Signal<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for Signal<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_emit_in_subscription_order() {
        let node = Pipeline::new().add_node(Default::default());
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut signal: Signal<PackListener> = Signal::new();
        for label in ["first", "second", "third"] {
            let log = log.clone();
            signal.connect(move |_, _| log.borrow_mut().push(label));
        }
        signal.emit(node, &Pack::new(1.0));
        assert_eq!(*log.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe() {
        let node = Pipeline::new().add_node(Default::default());
        let count = Rc::new(RefCell::new(0));
        let mut signal: Signal<PackListener> = Signal::new();
        let c = count.clone();
        let sub = signal.connect(move |_, _| *c.borrow_mut() += 1);

        signal.emit(node, &Pack::new(1.0));
        assert!(signal.unsubscribe(sub));
        assert!(!signal.unsubscribe(sub));
        signal.emit(node, &Pack::new(1.0));

        assert_eq!(*count.borrow(), 1);
        assert!(signal.is_empty());
    }
}
