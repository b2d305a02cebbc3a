//! Explicit event subscriptions.
//!
//! A [`Subscription`] is the cancellation token handed back by
//! [`Channel::subscribe`]. Cancelling is idempotent and takes effect before
//! the next emit, so a stopped collaborator can never receive another event.

use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    active: Rc<Cell<bool>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(&self) {
        self.active.set(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

struct Handler<T> {
    active: Rc<Cell<bool>>,
    callback: Box<dyn FnMut(&T)>,
}

/// Fan-out of values of type `T` to every live subscriber.
pub struct Channel<T> {
    next_id: u64,
    handlers: Vec<Handler<T>>,
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            handlers: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&T) + 'static) -> Subscription {
        let active = Rc::new(Cell::new(true));
        let id = self.next_id;
        self.next_id += 1;
        self.handlers.push(Handler {
            active: active.clone(),
            callback: Box::new(callback),
        });
        Subscription { id, active }
    }

    pub fn emit(&mut self, value: &T) {
        self.handlers.retain(|h| h.active.get());
        for handler in &mut self.handlers {
            // A handler may cancel a later one mid-emit.
            if handler.active.get() {
                (handler.callback)(value);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.iter().filter(|h| h.active.get()).count()
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn emit_reaches_every_live_subscriber() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut channel = Channel::new();
        let a = seen.clone();
        let b = seen.clone();
        channel.subscribe(move |v: &u32| a.borrow_mut().push(*v));
        channel.subscribe(move |v: &u32| b.borrow_mut().push(*v * 10));

        channel.emit(&3);
        assert_eq!(*seen.borrow(), vec![3, 30]);
    }

    #[test]
    fn cancel_is_idempotent_and_stops_delivery() {
        let count = Rc::new(Cell::new(0));
        let mut channel = Channel::new();
        let c = count.clone();
        let sub = channel.subscribe(move |_: &()| c.set(c.get() + 1));

        channel.emit(&());
        sub.cancel();
        sub.cancel();
        channel.emit(&());

        assert_eq!(count.get(), 1);
        assert!(!sub.is_active());
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[test]
    fn subscription_ids_are_unique() {
        let mut channel: Channel<()> = Channel::new();
        let a = channel.subscribe(|_| {});
        let b = channel.subscribe(|_| {});
        assert_ne!(a.id(), b.id());
    }
}
