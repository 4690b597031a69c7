//! Observer callback lists
//!
//! Each engine notification is a list of boxed callbacks fired synchronously
//! in registration order. A panicking subscriber is caught and logged so the
//! remaining subscribers still run.

use std::panic::{self, AssertUnwindSafe};

/// Handle returned on subscription, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Box<dyn FnMut(&T)>;

/// Multi-subscriber callback list
pub struct Observers<T: ?Sized> {
    name: &'static str,
    callbacks: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T: ?Sized> Observers<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            callbacks: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, id: SubscriptionId, callback: Callback<T>) {
        self.callbacks.push((id, callback));
    }

    /// Remove a subscription; returns whether it was present
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(existing, _)| *existing != id);
        self.callbacks.len() != before
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Invoke every subscriber with `value`, returning how many panicked
    pub fn fire(&mut self, value: &T) -> usize {
        let mut failures = 0;
        for (id, callback) in self.callbacks.iter_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(value)));
            if outcome.is_err() {
                failures += 1;
                tracing::error!("{} subscriber {:?} panicked", self.name, id);
            }
        }
        failures
    }
}

/// Hands out subscription ids unique across every list of one engine
#[derive(Debug, Default)]
pub struct SubscriptionIds {
    next: u64,
}

impl SubscriptionIds {
    pub fn next_id(&mut self) -> SubscriptionId {
        self.next += 1;
        SubscriptionId(self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_fire_in_registration_order() {
        let mut ids = SubscriptionIds::default();
        let mut observers: Observers<f32> = Observers::new("progress");
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = seen.clone();
            observers.subscribe(
                ids.next_id(),
                Box::new(move |value: &f32| seen.borrow_mut().push((tag, *value))),
            );
        }

        assert_eq!(observers.fire(&0.25), 0);
        assert_eq!(*seen.borrow(), vec![("first", 0.25), ("second", 0.25)]);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let mut ids = SubscriptionIds::default();
        let mut observers: Observers<f32> = Observers::new("progress");
        let calls = Rc::new(RefCell::new(0));

        observers.subscribe(ids.next_id(), Box::new(|_: &f32| panic!("ui exploded")));
        let counter = calls.clone();
        observers.subscribe(
            ids.next_id(),
            Box::new(move |_: &f32| *counter.borrow_mut() += 1),
        );

        assert_eq!(observers.fire(&1.0), 1);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let mut ids = SubscriptionIds::default();
        let mut observers: Observers<str> = Observers::new("changed");
        let id = ids.next_id();
        observers.subscribe(id, Box::new(|_: &str| {}));

        assert_eq!(observers.len(), 1);
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        assert!(observers.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut ids = SubscriptionIds::default();
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
