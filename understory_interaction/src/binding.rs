// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keeps a [`Dispatcher`] in step with a [`DataStorage`].
//!
//! A [`DispatcherBinding`] registers every stored node's interactor, then follows the storage's
//! signals: added nodes and interactor changes are (re)registered, removed nodes are
//! unregistered. When a notification arrives while the dispatcher is busy resolving an event, the
//! change goes through the dispatcher's [`Registrar`] and is applied before the next resolution.

use alloc::rc::{Rc, Weak};
use core::cell::RefCell;
use core::fmt;

use tracing::trace;

use crate::dispatcher::{Dispatcher, Registrar};
use crate::node::NodeHandle;
use crate::signal::Subscription;
use crate::storage::DataStorage;

/// Live connection between a storage and a dispatcher. Dropping it disconnects them.
pub struct DispatcherBinding {
    dispatcher: Rc<RefCell<Dispatcher>>,
    _added: Subscription,
    _removed: Subscription,
    _interactor_changed: Subscription,
}

impl DispatcherBinding {
    /// Register `storage`'s current nodes with `dispatcher` and follow later changes.
    pub fn new(storage: &DataStorage, dispatcher: &Rc<RefCell<Dispatcher>>) -> Self {
        {
            let mut d = dispatcher.borrow_mut();
            for node in storage.nodes() {
                d.add_data_interactor(node);
            }
        }
        let registrar = dispatcher.borrow().registrar();
        let weak = Rc::downgrade(dispatcher);
        Self {
            dispatcher: dispatcher.clone(),
            _added: storage
                .node_added()
                .subscribe(forward(&weak, &registrar, Change::Add)),
            _removed: storage
                .node_removed()
                .subscribe(forward(&weak, &registrar, Change::Remove)),
            _interactor_changed: storage
                .interactor_changed()
                .subscribe(forward(&weak, &registrar, Change::Add)),
        }
    }

    /// The bound dispatcher.
    pub fn dispatcher(&self) -> &Rc<RefCell<Dispatcher>> {
        &self.dispatcher
    }
}

impl fmt::Debug for DispatcherBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBinding")
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

#[derive(Copy, Clone)]
enum Change {
    Add,
    Remove,
}

fn forward(
    dispatcher: &Weak<RefCell<Dispatcher>>,
    registrar: &Registrar,
    change: Change,
) -> impl Fn(&NodeHandle) + 'static {
    let dispatcher = dispatcher.clone();
    let registrar = registrar.clone();
    move |node: &NodeHandle| {
        let Some(dispatcher) = dispatcher.upgrade() else {
            return;
        };
        match (dispatcher.try_borrow_mut(), change) {
            (Ok(mut d), Change::Add) => d.add_data_interactor(node),
            (Ok(mut d), Change::Remove) => d.remove_data_interactor(node),
            (Err(_), Change::Add) => {
                trace!(node = %node.name(), "dispatcher busy; registration deferred");
                registrar.add_data_interactor(node);
            }
            (Err(_), Change::Remove) => {
                trace!(node = %node.name(), "dispatcher busy; unregistration deferred");
                registrar.remove_data_interactor(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    use kurbo::Point;
    use understory_state_machine::EventClass;

    use crate::event::InteractionEvent;
    use crate::interactor::{DataInteractor, InteractorContext};
    use crate::node::DataNode;
    use crate::testing::{attached, labels, log, on, recorder, recording_bindings, single_state};

    fn mv() -> InteractionEvent {
        InteractionEvent::mouse_move(Point::ZERO)
    }

    #[test]
    fn registers_existing_and_added_nodes() {
        let log = log();
        let desc = single_state([on(EventClass::MouseMove, "idle")]);
        let mut storage = DataStorage::new();
        let (early, _) = recorder("early", 1, &desc, &log);
        storage.add(early, &[]).unwrap();

        let dispatcher = Rc::new(RefCell::new(Dispatcher::new()));
        let _binding = DispatcherBinding::new(&storage, &dispatcher);
        assert_eq!(dispatcher.borrow().number_of_interactors(), 1);

        let (late, _) = recorder("late", 2, &desc, &log);
        storage.add(late.clone(), &[]).unwrap();
        assert_eq!(dispatcher.borrow().number_of_interactors(), 2);

        assert!(dispatcher.borrow_mut().process_event(&mv()));
        storage.remove(&late).unwrap();
        assert_eq!(dispatcher.borrow().number_of_interactors(), 1);
        assert!(dispatcher.borrow_mut().process_event(&mv()));
        assert_eq!(labels(&log), vec!["late", "early"]);
    }

    #[test]
    fn follows_interactor_changes() {
        let log = log();
        let mut storage = DataStorage::new();
        let node = DataNode::with_layer("n", 1);
        storage.add(node.clone(), &[]).unwrap();
        let dispatcher = Rc::new(RefCell::new(Dispatcher::new()));
        let _binding = DispatcherBinding::new(&storage, &dispatcher);
        assert_eq!(dispatcher.borrow().number_of_interactors(), 0);

        let interactor = DataInteractor::new(
            &single_state([on(EventClass::MouseMove, "idle")]),
            recording_bindings("n", &log),
        )
        .unwrap()
        .into_handle();
        DataInteractor::attach(&interactor, &node);
        assert_eq!(dispatcher.borrow().number_of_interactors(), 1);
        assert!(dispatcher.borrow_mut().process_event(&mv()));

        DataInteractor::detach(&interactor);
        assert_eq!(dispatcher.borrow().number_of_interactors(), 0);
        assert!(!dispatcher.borrow_mut().process_event(&mv()));
    }

    #[test]
    fn removal_from_an_action_is_deferred() {
        let log = log();
        let storage = Rc::new(RefCell::new(DataStorage::new()));
        let desc = single_state([on(EventClass::MouseMove, "idle").with_action("remove_self")]);
        let bindings = {
            let storage = storage.clone();
            recording_bindings("doomed", &log).action(
                "remove_self",
                move |ctx: &mut InteractorContext, _: &InteractionEvent| {
                    if let Some(node) = ctx.data_node() {
                        let _ = storage.borrow_mut().remove(&node);
                    }
                },
            )
        };
        let (doomed, _) = attached("doomed", 2, &desc, bindings);
        let (survivor, _) = recorder(
            "survivor",
            1,
            &single_state([on(EventClass::MouseMove, "idle")]),
            &log,
        );
        storage.borrow_mut().add(doomed.clone(), &[]).unwrap();
        storage.borrow_mut().add(survivor, &[]).unwrap();

        let dispatcher = Rc::new(RefCell::new(Dispatcher::new()));
        let _binding = DispatcherBinding::new(&storage.borrow(), &dispatcher);

        assert!(dispatcher.borrow_mut().process_event(&mv()));
        assert_eq!(dispatcher.borrow().registrar().pending(), 1);
        // `doomed` is still alive here, but no longer stored.
        assert!(dispatcher.borrow_mut().process_event(&mv()));
        assert_eq!(labels(&log), vec!["doomed", "survivor"]);
        assert_eq!(dispatcher.borrow().number_of_interactors(), 1);
        drop(doomed);
    }
}
