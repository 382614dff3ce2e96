// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-threaded change notification.
//!
//! A [`Signal`] holds a list of slots. [`Signal::subscribe`] returns a [`Subscription`] that
//! removes its slot when dropped. Emission walks a snapshot of the slot list, so slots may
//! subscribe or unsubscribe while a signal is being emitted; a slot removed mid-emission is not
//! called.

use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use smallvec::SmallVec;

type Slot<A> = Rc<dyn Fn(&A)>;

struct Slots<A> {
    slots: RefCell<Vec<(u64, Slot<A>)>>,
    next_id: Cell<u64>,
}

/// A broadcast point for values of type `A`.
///
/// Clones share the same slot list.
pub struct Signal<A> {
    inner: Rc<Slots<A>>,
}

impl<A: 'static> Signal<A> {
    /// A signal with no slots.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Slots {
                slots: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Call `slot` on every emission until the returned [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, slot: impl Fn(&A) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.slots.borrow_mut().push((id, Rc::new(slot)));
        let slots: Weak<Slots<A>> = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(slots) = slots.upgrade() {
                    // Take the slot out before dropping it; its captures may emit.
                    let removed = {
                        let mut list = slots.slots.borrow_mut();
                        list.iter()
                            .position(|(slot_id, _)| *slot_id == id)
                            .map(|at| list.remove(at))
                    };
                    drop(removed);
                }
            })),
        }
    }

    /// Call every subscribed slot with `value`.
    pub fn emit(&self, value: &A) {
        let snapshot: SmallVec<[(u64, Slot<A>); 4]> = self
            .inner
            .slots
            .borrow()
            .iter()
            .map(|(id, slot)| (*id, slot.clone()))
            .collect();
        for (id, slot) in snapshot {
            let live = self.inner.slots.borrow().iter().any(|(s, _)| *s == id);
            if live {
                slot(value);
            }
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.inner.slots.borrow().len())
            .finish()
    }
}

/// Keeps a slot connected to a [`Signal`]. Dropping it disconnects the slot.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Disconnect now. Same as dropping.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_every_subscriber() {
        let seen = Rc::new(Cell::new(0));
        let signal = Signal::<u32>::new();
        let a = {
            let seen = seen.clone();
            signal.subscribe(move |v| seen.set(seen.get() + *v))
        };
        let b = {
            let seen = seen.clone();
            signal.subscribe(move |v| seen.set(seen.get() + *v * 10))
        };
        signal.emit(&2);
        assert_eq!(seen.get(), 22);
        assert_eq!(signal.subscriber_count(), 2);
        drop(a);
        signal.emit(&1);
        assert_eq!(seen.get(), 32);
        b.unsubscribe();
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn clones_share_slots() {
        let seen = Rc::new(Cell::new(false));
        let signal = Signal::<()>::new();
        let _sub = {
            let seen = seen.clone();
            signal.clone().subscribe(move |()| seen.set(true))
        };
        signal.emit(&());
        assert!(seen.get());
    }

    #[test]
    fn slot_removed_during_emit_is_skipped() {
        let calls = Rc::new(Cell::new(0));
        let signal = Signal::<()>::new();
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let _killer = {
            let victim = victim.clone();
            signal.subscribe(move |()| drop(victim.borrow_mut().take()))
        };
        *victim.borrow_mut() = Some({
            let calls = calls.clone();
            signal.subscribe(move |()| calls.set(calls.get() + 1))
        });
        signal.emit(&());
        assert_eq!(calls.get(), 0);
        assert_eq!(signal.subscriber_count(), 1);
    }

    #[test]
    fn subscription_outliving_signal_is_harmless() {
        let signal = Signal::<u8>::new();
        let sub = signal.subscribe(|_| {});
        drop(signal);
        drop(sub);
    }
}
