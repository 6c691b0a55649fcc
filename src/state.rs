//! Observable state cell
//!
//! A [`StateCell`] has exactly one owner that may write to it. Any number of
//! [`StateReader`] handles can read the current value and subscribe to
//! changes. Subscribers run synchronously inside `set`, in subscription
//! order, and only when the value actually changes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::types::FeatureProps;

/// The hovered feature's attributes, or `None`.
pub type HoverState = StateCell<FeatureProps>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback<T> = Rc<dyn Fn(Option<&T>)>;

struct Inner<T> {
    value: RefCell<Option<T>>,
    subscribers: RefCell<Vec<(SubscriptionId, Callback<T>)>>,
    next_id: Cell<u64>,
}

pub struct StateCell<T> {
    inner: Rc<Inner<T>>,
}

#[derive(Clone)]
pub struct StateReader<T> {
    inner: Rc<Inner<T>>,
}

impl<T: Clone + PartialEq + 'static> StateCell<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(None),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    pub fn reader(&self) -> StateReader<T> {
        StateReader { inner: self.inner.clone() }
    }

    /// Stores `value` and notifies subscribers. Returns whether it changed.
    pub fn set(&self, value: Option<T>) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }

        // Snapshot so callbacks may subscribe or unsubscribe.
        let callbacks: Vec<Callback<T>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in callbacks {
            cb(value.as_ref());
        }
        true
    }

    pub fn clear(&self) -> bool {
        self.set(None)
    }
}

impl<T: Clone + PartialEq + 'static> Default for StateCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> StateReader<T> {
    pub fn get(&self) -> Option<T> {
        self.inner.value.borrow().clone()
    }

    pub fn subscribe(&self, callback: impl Fn(Option<&T>) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);
        let callback: Callback<T> = Rc::new(callback);
        self.inner.subscribers.borrow_mut().push((id, callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.inner.subscribers.borrow_mut();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(name: &str, density: f64) -> FeatureProps {
        FeatureProps { name: name.to_string(), density }
    }

    #[test]
    fn test_set_notifies_subscribers() {
        let cell = HoverState::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        cell.reader().subscribe(move |v| sink.borrow_mut().push(v.map(|p| p.name.clone())));

        assert!(cell.set(Some(props("Ohio", 281.9))));
        assert!(cell.clear());
        assert_eq!(*seen.borrow(), vec![Some("Ohio".to_string()), None]);
    }

    #[test]
    fn test_unchanged_value_is_silent() {
        let cell = HoverState::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        cell.reader().subscribe(move |_| c.set(c.get() + 1));

        assert!(!cell.clear());
        cell.set(Some(props("Iowa", 54.81)));
        assert!(!cell.set(Some(props("Iowa", 54.81))));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_reader_sees_new_value_inside_callback() {
        let cell = HoverState::new();
        let reader = cell.reader();
        let observed = Rc::new(RefCell::new(None));
        let (r, o) = (reader.clone(), observed.clone());
        reader.subscribe(move |_| *o.borrow_mut() = r.get());

        cell.set(Some(props("Utah", 34.3)));
        assert_eq!(*observed.borrow(), Some(props("Utah", 34.3)));
    }

    #[test]
    fn test_unsubscribe() {
        let cell = HoverState::new();
        let reader = cell.reader();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let id = reader.subscribe(move |_| c.set(c.get() + 1));
        assert_eq!(reader.subscriber_count(), 1);

        assert!(reader.unsubscribe(id));
        assert!(!reader.unsubscribe(id));
        cell.set(Some(props("Maine", 43.04)));
        assert_eq!(count.get(), 0);
        assert_eq!(reader.get(), Some(props("Maine", 43.04)));
    }
}
