// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Data nodes.
//!
//! A [`DataNode`] is the unit the dispatcher orders and the storage organizes: a name, an optional
//! layer, an opaque payload, and at most one attached [`DataInteractor`](crate::interactor::DataInteractor).
//! Nodes are shared through [`NodeHandle`]; interactors and the dispatcher refer to them only
//! through [`WeakRef`](understory_weak::WeakRef)s.

use alloc::boxed::Box;
use alloc::string::String;
use core::any::Any;
use core::cell::{Cell, RefCell};
use core::fmt;

use understory_weak::Strong;

use crate::interactor::InteractorHandle;
use crate::signal::Signal;

/// Layer assumed for nodes that never had one set.
pub const DEFAULT_LAYER: i32 = 0;

/// Shared ownership of a [`DataNode`].
pub type NodeHandle = Strong<DataNode>;

/// A piece of data that may carry an interactor.
pub struct DataNode {
    name: String,
    layer: Cell<Option<i32>>,
    data: RefCell<Option<Box<dyn Any>>>,
    interactor: RefCell<Option<InteractorHandle>>,
    interactor_changed: Signal<()>,
}

impl DataNode {
    /// A new node with no layer, payload, or interactor.
    pub fn new(name: impl Into<String>) -> NodeHandle {
        Strong::new(Self {
            name: name.into(),
            layer: Cell::new(None),
            data: RefCell::new(None),
            interactor: RefCell::new(None),
            interactor_changed: Signal::new(),
        })
    }

    /// A new node on `layer`.
    pub fn with_layer(name: impl Into<String>, layer: i32) -> NodeHandle {
        let node = Self::new(name);
        node.set_layer(layer);
        node
    }

    /// The node's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The explicitly set layer.
    pub fn layer(&self) -> Option<i32> {
        self.layer.get()
    }

    /// Set the layer. Higher layers are offered events first.
    ///
    /// The dispatcher reorders on its next walk.
    pub fn set_layer(&self, layer: i32) {
        self.layer.set(Some(layer));
    }

    /// Forget the layer, falling back to [`DEFAULT_LAYER`].
    pub fn clear_layer(&self) {
        self.layer.set(None);
    }

    pub(crate) fn dispatch_layer(&self) -> i32 {
        self.layer().unwrap_or(DEFAULT_LAYER)
    }

    /// Replace the payload.
    pub fn set_data<T: Any>(&self, data: T) {
        let previous = self.data.replace(Some(Box::new(data)));
        drop(previous);
    }

    /// Remove and return the payload if it is a `T`.
    pub fn take_data<T: Any>(&self) -> Option<T> {
        let mut slot = self.data.borrow_mut();
        if !slot.as_ref().is_some_and(|d| d.is::<T>()) {
            return None;
        }
        slot.take()?.downcast::<T>().ok().map(|b| *b)
    }

    /// Whether a payload is present.
    pub fn has_data(&self) -> bool {
        self.data.borrow().is_some()
    }

    /// Run `f` on the payload if it is a `T`.
    pub fn with_data<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let data = self.data.borrow();
        data.as_ref()?.downcast_ref::<T>().map(f)
    }

    /// Run `f` on the payload mutably if it is a `T`.
    pub fn with_data_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut data = self.data.borrow_mut();
        data.as_mut()?.downcast_mut::<T>().map(f)
    }

    /// The attached interactor, if any.
    pub fn data_interactor(&self) -> Option<InteractorHandle> {
        self.interactor.borrow().clone()
    }

    /// Whether `interactor` is the one attached here.
    pub fn is_attached_to(&self, interactor: &InteractorHandle) -> bool {
        self.interactor
            .borrow()
            .as_ref()
            .is_some_and(|current| Strong::ptr_eq(current, interactor))
    }

    /// Emitted after the attached interactor changes.
    pub fn interactor_changed(&self) -> &Signal<()> {
        &self.interactor_changed
    }

    /// Replace the interactor slot, emitting [`Self::interactor_changed`] if it changed.
    ///
    /// Only the attach and detach paths in [`crate::interactor`] call this, so the node's slot and
    /// the interactor's back reference change together.
    pub(crate) fn set_data_interactor(&self, interactor: Option<InteractorHandle>) {
        let unchanged = match (&*self.interactor.borrow(), &interactor) {
            (None, None) => true,
            (Some(a), Some(b)) => Strong::ptr_eq(a, b),
            _ => false,
        };
        if unchanged {
            return;
        }
        let previous = self.interactor.replace(interactor);
        self.interactor_changed.emit(&());
        drop(previous);
    }
}

impl fmt::Debug for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataNode")
            .field("name", &self.name)
            .field("layer", &self.layer.get())
            .field("has_data", &self.has_data())
            .field("has_interactor", &self.interactor.borrow().is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn layer_defaults_until_set() {
        let node = DataNode::new("n");
        assert_eq!(node.layer(), None);
        assert_eq!(node.dispatch_layer(), DEFAULT_LAYER);
        node.set_layer(4);
        assert_eq!(node.dispatch_layer(), 4);
        node.clear_layer();
        assert_eq!(node.layer(), None);
    }

    #[test]
    fn payload_is_typed() {
        let node = DataNode::new("points");
        assert!(!node.has_data());
        node.set_data(vec![1_u32, 2]);
        assert_eq!(node.with_data(|v: &Vec<u32>| v.len()), Some(2));
        assert_eq!(node.with_data(|s: &String| s.len()), None);
        node.with_data_mut(|v: &mut Vec<u32>| v.push(3));
        assert_eq!(node.take_data::<String>(), None);
        assert!(node.has_data());
        assert_eq!(node.take_data::<Vec<u32>>(), Some(vec![1, 2, 3]));
        assert!(!node.has_data());
    }

    #[test]
    fn debug_is_compact() {
        let node = DataNode::with_layer("surface", 2);
        let text = alloc::format!("{:?}", &*node);
        assert!(text.contains("surface"), "{text}");
    }
}
