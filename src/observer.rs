//! Explicit subscriber lists for session notifications.
//!
//! Handlers fire in registration order from a snapshot taken when `emit`
//! starts, so a handler may subscribe or unsubscribe (itself included)
//! while the list is firing. Changes take effect on the next `emit`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Handler<E> = Rc<RefCell<Box<dyn FnMut(&E)>>>;

struct Inner<E> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<E>)>,
}

pub struct ObserverList<E> {
    inner: Rc<RefCell<Inner<E>>>,
}

impl<E> Clone for ObserverList<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E> Default for ObserverList<E> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                next_id: 0,
                handlers: Vec::new(),
            })),
        }
    }
}

impl<E> fmt::Debug for ObserverList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverList")
            .field("subscribers", &self.len())
            .finish()
    }
}

impl<E> ObserverList<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: impl FnMut(&E) + 'static) -> SubscriptionId {
        let mut inner = self.inner.borrow_mut();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner
            .handlers
            .push((id, Rc::new(RefCell::new(Box::new(handler)))));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.handlers.len();
        inner.handlers.retain(|(sub, _)| *sub != id);
        inner.handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn emit(&self, event: &E) {
        let snapshot: Vec<Handler<E>> = self
            .inner
            .borrow()
            .handlers
            .iter()
            .map(|(_, handler)| Rc::clone(handler))
            .collect();
        for handler in snapshot {
            // A handler that re-enters `emit` does not receive the nested
            // event.
            if let Ok(mut handler) = handler.try_borrow_mut() {
                (handler)(event);
            }
        }
    }
}
