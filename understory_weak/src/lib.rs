// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Weak: non-owning references that clear themselves when their referent dies.
//!
//! ## Overview
//!
//! Interaction bookkeeping (which interactor is attached to which node, which one currently
//! holds a grab) must never keep the objects it talks about alive. This crate provides a pair
//! of handles for single-threaded object graphs:
//!
//! - [`Strong<T>`]: a reference-counted owning handle. Every value created through
//!   [`Strong::new`] is *tracked*: when the last strong handle goes away, every observer
//!   registered on it is notified exactly once.
//! - [`WeakRef<T>`]: a non-owning handle. [`WeakRef::lock`] hands out a [`Strong<T>`] while the
//!   referent is alive and `None` afterwards. An optional delete callback
//!   ([`WeakRef::set_delete_callback`]) lets an owner prune its own state synchronously at the
//!   moment the referent is destroyed instead of discovering staleness later.
//!
//! Weak references compare, order, and hash by the address of their referent, not by value,
//! so they can be used as map or set keys. Two empty references compare equal.
//!
//! ## Example
//!
//! ```
//! use core::cell::Cell;
//! use std::rc::Rc;
//! use understory_weak::{Strong, WeakRef};
//!
//! let node = Strong::new("volume");
//! let mut weak = Strong::downgrade(&node);
//!
//! let deleted = Rc::new(Cell::new(0));
//! let seen = deleted.clone();
//! weak.set_delete_callback(move || seen.set(seen.get() + 1));
//!
//! assert_eq!(weak.lock().as_deref(), Some(&"volume"));
//! drop(node);
//! assert!(weak.is_expired());
//! assert!(weak.lock().is_none());
//! assert_eq!(deleted.get(), 1);
//! ```
//!
//! ## Callback semantics
//!
//! - A callback fires at most once per weak reference, at the moment the referent is destroyed.
//!   By then [`WeakRef::lock`] already returns `None`.
//! - Every weak reference with a callback is notified; the order between them is unspecified.
//! - Cloning a weak reference re-registers its callback for the clone. Dropping or re-targeting a
//!   weak reference deregisters it from the old referent.
//! - Referencing nothing (an empty reference) is allowed; the reference simply starts expired.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

use alloc::rc::{Rc, Weak};
use core::cell::{Cell, RefCell};
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;

use smallvec::SmallVec;

type DeleteCallback = Rc<dyn Fn()>;

/// Shared allocation behind [`Strong`] and [`WeakRef`].
struct Tracked<T> {
    observers: RefCell<SmallVec<[(u64, DeleteCallback); 2]>>,
    next_tag: Cell<u64>,
    value: T,
}

impl<T> Tracked<T> {
    fn observe(&self, callback: DeleteCallback) -> u64 {
        let tag = self.next_tag.get();
        self.next_tag.set(tag.wrapping_add(1));
        self.observers.borrow_mut().push((tag, callback));
        tag
    }

    fn unobserve(&self, tag: u64) {
        self.observers.borrow_mut().retain(|(t, _)| *t != tag);
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        // Taken out first: callbacks may drop weak references that try to deregister.
        let observers = core::mem::take(self.observers.get_mut());
        for (_, callback) in observers {
            callback();
        }
    }
}

/// Owning, reference-counted handle to a tracked value.
///
/// Equality, ordering and hashing are by identity (allocation address), matching [`WeakRef`].
pub struct Strong<T> {
    inner: Rc<Tracked<T>>,
}

impl<T> Strong<T> {
    /// Allocate `value` and return the first strong handle to it.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(Tracked {
                observers: RefCell::new(SmallVec::new()),
                next_tag: Cell::new(0),
                value,
            }),
        }
    }

    /// Create a non-owning reference to `this`, without a delete callback.
    pub fn downgrade(this: &Self) -> WeakRef<T> {
        WeakRef::new(this)
    }

    /// Whether two handles point at the same allocation.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.inner, &other.inner)
    }

    /// Number of strong handles currently alive.
    pub fn strong_count(this: &Self) -> usize {
        Rc::strong_count(&this.inner)
    }

    /// Number of delete callbacks currently registered on the referent.
    pub fn observer_count(this: &Self) -> usize {
        this.inner.observers.borrow().len()
    }

    fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner).cast::<()>() as usize
    }
}

impl<T> Clone for Strong<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Deref for Strong<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner.value
    }
}

impl<T: fmt::Debug> fmt::Debug for Strong<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Strong").field(&self.inner.value).finish()
    }
}

impl<T> PartialEq for Strong<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T> Eq for Strong<T> {}

impl<T> PartialOrd for Strong<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Strong<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl<T> Hash for Strong<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

/// Non-owning reference to a [`Strong`] value that clears itself when the value is destroyed.
///
/// See the [crate docs](crate) for callback semantics.
pub struct WeakRef<T> {
    target: Weak<Tracked<T>>,
    callback: Option<DeleteCallback>,
    // Observer tag on the current target, if the callback is registered there.
    tag: Option<u64>,
}

impl<T> WeakRef<T> {
    /// Reference `target` without extending its lifetime.
    pub fn new(target: &Strong<T>) -> Self {
        Self {
            target: Rc::downgrade(&target.inner),
            callback: None,
            tag: None,
        }
    }

    /// A reference to nothing. It is expired from the start.
    pub fn empty() -> Self {
        Self {
            target: Weak::new(),
            callback: None,
            tag: None,
        }
    }

    /// Return a strong handle if the referent is still alive.
    ///
    /// The returned handle keeps the referent alive only for as long as the caller holds it.
    pub fn lock(&self) -> Option<Strong<T>> {
        self.target.upgrade().map(|inner| Strong { inner })
    }

    /// Whether the referent has been destroyed (or was never set).
    pub fn is_expired(&self) -> bool {
        self.target.strong_count() == 0
    }

    /// Re-target this reference.
    ///
    /// The delete callback, if any, is moved from the old referent to the new one.
    pub fn set(&mut self, target: Option<&Strong<T>>) {
        self.detach();
        self.target = match target {
            Some(strong) => Rc::downgrade(&strong.inner),
            None => Weak::new(),
        };
        self.attach();
    }

    /// Make this reference empty, keeping its delete callback for a later [`set`](Self::set).
    pub fn reset(&mut self) {
        self.set(None);
    }

    /// Install the callback invoked once when the current referent is destroyed.
    ///
    /// Replaces any previous callback. Installing a callback on an expired reference is a no-op
    /// until the reference is re-targeted.
    pub fn set_delete_callback(&mut self, callback: impl Fn() + 'static) {
        self.detach();
        self.callback = Some(Rc::new(callback));
        self.attach();
    }

    /// Remove the delete callback.
    pub fn clear_delete_callback(&mut self) {
        self.detach();
        self.callback = None;
    }

    /// Whether a delete callback is installed.
    pub fn has_delete_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// Whether both references point at the same allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.target, &other.target)
    }

    /// Whether this reference points at the allocation behind `strong`.
    pub fn refers_to(&self, strong: &Strong<T>) -> bool {
        self.addr() == strong.addr()
    }

    fn addr(&self) -> usize {
        self.target.as_ptr().cast::<()>() as usize
    }

    fn attach(&mut self) {
        if let Some(callback) = &self.callback
            && let Some(target) = self.target.upgrade()
        {
            self.tag = Some(target.observe(callback.clone()));
        }
    }

    fn detach(&mut self) {
        if let Some(tag) = self.tag.take()
            && let Some(target) = self.target.upgrade()
        {
            target.unobserve(tag);
        }
    }
}

impl<T> Default for WeakRef<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        let mut out = Self {
            target: self.target.clone(),
            callback: self.callback.clone(),
            tag: None,
        };
        out.attach();
        out
    }
}

impl<T> Drop for WeakRef<T> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<T> From<&Strong<T>> for WeakRef<T> {
    fn from(target: &Strong<T>) -> Self {
        Self::new(target)
    }
}

impl<T> fmt::Debug for WeakRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRef")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("expired", &self.is_expired())
            .field("has_delete_callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> PartialEq for WeakRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Eq for WeakRef<T> {}

impl<T> PartialOrd for WeakRef<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for WeakRef<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl<T> Hash for WeakRef<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}
