// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event dispatcher.
//!
//! ## Overview
//!
//! A [`Dispatcher`] holds weak references to the interactors of registered data nodes and decides,
//! for every incoming [`InteractionEvent`], which of them is offered the event. It does not own
//! nodes or interactors; entries whose node or interactor has been dropped are skipped and pruned.
//!
//! ## Resolution
//!
//! For each event, in order:
//!
//! 1. A targeted deactivation request ([`signals::DEACTIVATE_ME`](crate::event::signals::DEACTIVATE_ME))
//!    is consumed: if its target is selected, the selection is cleared. Nothing else sees it.
//! 2. Any other targeted internal event is offered only to its target.
//! 3. If an interactor is selected, its [`ProcessEventMode`] applies:
//!    - `GrabInput`: only the selected interactor is offered the event. If it declines, the event
//!      is unhandled.
//!    - `PreferInput`: the selected interactor is asked first; if it declines, the layer walk
//!      continues without it.
//!    - `ConnectedMouseAction`: like a grab until the next mouse release. A release it declines
//!      falls through to the layer walk.
//! 4. Otherwise interactors are offered the event from the highest layer down (ties in
//!    registration order) until one accepts.
//!
//! After an interactor is offered an event, its machine's current state decides the selection: a
//! `GrabInput` or `PreferInput` state selects it, a regular state releases a grab or preference
//! it held. An interactor in a regular state that accepts a mouse press is selected in
//! `ConnectedMouseAction` mode until the matching release.
//!
//! ## Queued events
//!
//! Actions can queue events through their [`InteractorContext`](crate::interactor::InteractorContext).
//! Once the current event is resolved, queued events are resolved in FIFO order, including any
//! they queue in turn. [`DispatcherConfig::queue_drain_limit`] bounds that chain.
//!
//! ## Observers
//!
//! Every resolution, queued or not, is reported to enabled [`InteractionEventObserver`]s with its
//! handled flag.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::cmp::Reverse;
use core::fmt;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};
use understory_weak::{Strong, WeakRef};

use crate::event::InteractionEvent;
use crate::interactor::{DataInteractor, InteractorHandle, InteractorId, ProcessEventMode};
use crate::node::{DataNode, NodeHandle};

/// Dispatcher tuning.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum number of queued events resolved after one top-level event.
    ///
    /// `None` drains until the queue is empty. When the limit is reached, the remaining queued
    /// events are discarded with a warning.
    pub queue_drain_limit: Option<usize>,
}

/// Receives every resolved event, whether or not an interactor handled it.
pub trait InteractionEventObserver {
    /// Called after `event` was resolved.
    fn notify(&mut self, event: &InteractionEvent, handled: bool);
}

impl<F: FnMut(&InteractionEvent, bool)> InteractionEventObserver for F {
    fn notify(&mut self, event: &InteractionEvent, handled: bool) {
        self(event, handled);
    }
}

/// Handle for a registered observer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct ObserverSlot {
    id: ObserverId,
    enabled: bool,
    observer: Box<dyn InteractionEventObserver>,
}

#[derive(Debug)]
struct Entry {
    id: InteractorId,
    interactor: WeakRef<RefCell<DataInteractor>>,
    node: WeakRef<DataNode>,
}

impl Entry {
    fn layer(&self) -> i32 {
        self.node.lock().map_or(i32::MIN, |n| n.dispatch_layer())
    }

    fn is_expired(&self) -> bool {
        self.interactor.is_expired() || self.node.is_expired()
    }

    /// Both ends alive and still attached to each other.
    fn is_live(&self) -> bool {
        match (self.interactor.lock(), self.node.lock()) {
            (Some(interactor), Some(node)) => node.is_attached_to(&interactor),
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Selection {
    id: InteractorId,
    interactor: WeakRef<RefCell<DataInteractor>>,
    mode: ProcessEventMode,
}

#[derive(Clone, Debug)]
enum Registration {
    Add(WeakRef<DataNode>),
    Remove(WeakRef<DataNode>),
}

type PendingRegistrations = Rc<RefCell<VecDeque<Registration>>>;

/// Deferred registration handle for a [`Dispatcher`].
///
/// Changes pushed here are applied before the dispatcher resolves its next event, or on its next
/// registration call. Use it from code that may run while the dispatcher is busy, such as
/// storage notifications fired by an interactor action.
#[derive(Clone)]
pub struct Registrar {
    pending: PendingRegistrations,
}

impl Registrar {
    /// Register `node`'s interactor later.
    pub fn add_data_interactor(&self, node: &NodeHandle) {
        self.pending
            .borrow_mut()
            .push_back(Registration::Add(Strong::downgrade(node)));
    }

    /// Unregister `node`'s interactor later.
    pub fn remove_data_interactor(&self, node: &NodeHandle) {
        self.pending
            .borrow_mut()
            .push_back(Registration::Remove(Strong::downgrade(node)));
    }

    /// Number of changes not yet applied.
    pub fn pending(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl fmt::Debug for Registrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registrar")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Routes interaction events to data interactors.
///
/// ## Usage
///
/// - Register nodes with [`Dispatcher::add_data_interactor`], or bind a storage with
///   [`DispatcherBinding`](crate::binding::DispatcherBinding).
/// - Feed events with [`Dispatcher::process_event`].
/// - Inspect the input claim with [`Dispatcher::selected_interactor`] and
///   [`Dispatcher::processing_mode`].
pub struct Dispatcher {
    config: DispatcherConfig,
    interactors: Vec<Entry>,
    queue: VecDeque<InteractionEvent>,
    selection: Rc<RefCell<Option<Selection>>>,
    observers: Vec<ObserverSlot>,
    next_observer: u64,
    pending: PendingRegistrations,
}

impl Dispatcher {
    /// An empty dispatcher with default configuration.
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    /// An empty dispatcher.
    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            config,
            interactors: Vec::new(),
            queue: VecDeque::new(),
            selection: Rc::new(RefCell::new(None)),
            observers: Vec::new(),
            next_observer: 0,
            pending: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Replace the configuration.
    pub fn set_config(&mut self, config: DispatcherConfig) {
        self.config = config;
    }

    /// A handle for deferred registration changes.
    pub fn registrar(&self) -> Registrar {
        Registrar {
            pending: self.pending.clone(),
        }
    }

    /// Register the interactor currently attached to `node`.
    ///
    /// Any entry already held for `node` is replaced, so calling this again after the node's
    /// interactor changed keeps exactly one entry. A node without an interactor only drops its old
    /// entry. Orphaned entries are pruned afterwards.
    pub fn add_data_interactor(&mut self, node: &NodeHandle) {
        self.apply_pending_registrations();
        self.register(node);
    }

    /// Unregister `node`'s interactor. Clears the selection if it pointed there.
    pub fn remove_data_interactor(&mut self, node: &NodeHandle) {
        self.apply_pending_registrations();
        if self.unregister(&Strong::downgrade(node)) > 0 {
            debug!(node = %node.name(), "interactor unregistered");
        }
        self.remove_orphaned_interactors();
    }

    /// Drop entries whose interactor or node is gone, or whose node now carries a different
    /// interactor. Returns how many were removed.
    pub fn remove_orphaned_interactors(&mut self) -> usize {
        let before = self.interactors.len();
        self.interactors.retain(Entry::is_live);
        let removed = before - self.interactors.len();
        if let Some((selected, _)) = self.selection_state()
            && !self.interactors.iter().any(|e| e.id == selected)
        {
            self.clear_selection("selected interactor is no longer registered");
        }
        if removed > 0 {
            debug!(removed, "orphaned interactors pruned");
        }
        removed
    }

    /// Number of registered interactors that are still alive and attached.
    pub fn number_of_interactors(&self) -> usize {
        self.interactors.iter().filter(|e| e.is_live()).count()
    }

    /// The interactor holding a grab, preference, or connected mouse action.
    pub fn selected_interactor(&self) -> Option<InteractorId> {
        self.live_selection().map(|(id, _)| id)
    }

    /// The routing mode that will apply to the next event.
    pub fn processing_mode(&self) -> ProcessEventMode {
        self.live_selection()
            .map_or(ProcessEventMode::Regular, |(_, mode)| mode)
    }

    /// Append `event` to the queue. It is resolved after the next top-level event.
    pub fn queue_event(&mut self, event: InteractionEvent) {
        self.queue.push_back(event);
    }

    /// Number of queued events waiting to be resolved.
    pub fn queued_events(&self) -> usize {
        self.queue.len()
    }

    /// Report every subsequent resolution to `observer`.
    pub fn add_observer(&mut self, observer: impl InteractionEventObserver + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push(ObserverSlot {
            id,
            enabled: true,
            observer: Box::new(observer),
        });
        id
    }

    /// Unregister an observer. Returns whether it was registered.
    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|slot| slot.id != id);
        before != self.observers.len()
    }

    /// Pause or resume an observer. Returns whether it was registered.
    pub fn set_observer_enabled(&mut self, id: ObserverId, enabled: bool) -> bool {
        match self.observers.iter_mut().find(|slot| slot.id == id) {
            Some(slot) => {
                slot.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Resolve `event`, then every event queued while doing so.
    ///
    /// Returns whether `event` itself was handled; the outcome of queued events is only reported
    /// to observers.
    pub fn process_event(&mut self, event: &InteractionEvent) -> bool {
        let handled = self.resolve(event);
        self.drain_queue();
        handled
    }

    fn drain_queue(&mut self) {
        let mut drained = 0_usize;
        while let Some(event) = self.queue.pop_front() {
            if let Some(limit) = self.config.queue_drain_limit
                && drained >= limit
            {
                let discarded = self.queue.len() + 1;
                self.queue.clear();
                warn!(limit, discarded, "queued event limit reached; discarding the rest");
                break;
            }
            drained += 1;
            self.resolve(&event);
        }
    }

    fn resolve(&mut self, event: &InteractionEvent) -> bool {
        self.apply_pending_registrations();
        let handled = self.route(event);
        for slot in self.observers.iter_mut().filter(|slot| slot.enabled) {
            slot.observer.notify(event, handled);
        }
        handled
    }

    fn route(&mut self, event: &InteractionEvent) -> bool {
        if let Some(internal) = event.as_internal()
            && let Some(target) = internal.target()
        {
            if internal.is_deactivate_request() {
                self.deactivate(target);
                return true;
            }
            return self.offer_to(target, event);
        }

        let mut skip = None;
        if let Some((interactor, id, mode)) = self.selected() {
            match mode {
                ProcessEventMode::GrabInput => {
                    let handled = self.offer(&interactor, event);
                    self.sync_selection(&interactor, id);
                    trace!(interactor = id.get(), handled, "grabbed event");
                    return handled;
                }
                ProcessEventMode::PreferInput => {
                    let handled = self.offer(&interactor, event);
                    self.sync_selection(&interactor, id);
                    if handled {
                        trace!(interactor = id.get(), "preferred interactor handled event");
                        return true;
                    }
                    skip = Some(id);
                }
                ProcessEventMode::ConnectedMouseAction => {
                    let handled = self.offer(&interactor, event);
                    self.sync_selection(&interactor, id);
                    if !event.is_mouse_release() {
                        return handled;
                    }
                    if self.selection_state() == Some((id, ProcessEventMode::ConnectedMouseAction)) {
                        self.clear_selection("mouse released");
                    }
                    if handled {
                        return true;
                    }
                    skip = Some(id);
                }
                ProcessEventMode::Regular => {}
            }
        }
        self.walk(event, skip)
    }

    fn walk(&mut self, event: &InteractionEvent, skip: Option<InteractorId>) -> bool {
        self.interactors.sort_by_key(|e| Reverse(e.layer()));

        let mut winner = None;
        for at in 0..self.interactors.len() {
            let entry = &self.interactors[at];
            if skip == Some(entry.id) || entry.node.is_expired() {
                continue;
            }
            let id = entry.id;
            let Some(interactor) = entry.interactor.lock() else {
                continue;
            };
            if self.offer(&interactor, event) {
                winner = Some((interactor, id));
                break;
            }
        }
        self.interactors.retain(|e| !e.is_expired());

        let Some((interactor, id)) = winner else {
            trace!("event not handled");
            return false;
        };
        trace!(interactor = id.get(), "event handled");
        match Self::mode_of(&interactor) {
            ProcessEventMode::Regular if event.is_mouse_press() => {
                self.select(&interactor, id, ProcessEventMode::ConnectedMouseAction);
            }
            ProcessEventMode::Regular => {}
            mode => self.select(&interactor, id, mode),
        }
        true
    }

    fn offer_to(&mut self, target: InteractorId, event: &InteractionEvent) -> bool {
        let found = self
            .interactors
            .iter()
            .find(|e| e.id == target && !e.node.is_expired())
            .and_then(|e| e.interactor.lock());
        let Some(interactor) = found else {
            debug!(interactor = target.get(), "target of internal event is not registered");
            return false;
        };
        let handled = self.offer(&interactor, event);
        if handled {
            self.sync_selection(&interactor, target);
        }
        handled
    }

    fn offer(&mut self, interactor: &InteractorHandle, event: &InteractionEvent) -> bool {
        let Ok(mut target) = interactor.try_borrow_mut() else {
            warn!("interactor is already handling an event; declining");
            return false;
        };
        let handled = target.handle_event(event);
        let queued = target.take_queued_events();
        drop(target);
        if !queued.is_empty() {
            trace!(count = queued.len(), "events queued by interactor");
            self.queue.extend(queued);
        }
        handled
    }

    fn deactivate(&mut self, target: InteractorId) {
        if self.selection_state().is_some_and(|(id, _)| id == target) {
            self.clear_selection("deactivation requested");
        } else {
            trace!(interactor = target.get(), "deactivation request for unselected interactor");
        }
    }

    fn mode_of(interactor: &InteractorHandle) -> ProcessEventMode {
        interactor
            .try_borrow()
            .map_or(ProcessEventMode::Regular, |i| i.mode())
    }

    /// Align the selection with `interactor`'s current state.
    fn sync_selection(&mut self, interactor: &InteractorHandle, id: InteractorId) {
        match Self::mode_of(interactor) {
            ProcessEventMode::Regular => {
                if self.selection_state().is_some_and(|(selected, mode)| {
                    selected == id && mode != ProcessEventMode::ConnectedMouseAction
                }) {
                    self.clear_selection("interactor returned to a regular state");
                }
            }
            mode => self.select(interactor, id, mode),
        }
    }

    fn selection_state(&self) -> Option<(InteractorId, ProcessEventMode)> {
        self.selection.borrow().as_ref().map(|s| (s.id, s.mode))
    }

    fn selected(&mut self) -> Option<(InteractorHandle, InteractorId, ProcessEventMode)> {
        let lookup = self
            .selection
            .borrow()
            .as_ref()
            .map(|s| (s.interactor.lock(), s.id, s.mode));
        match lookup? {
            (Some(interactor), id, mode) if self.holds_live_entry(&interactor, id) => {
                Some((interactor, id, mode))
            }
            (Some(_), _, _) => {
                self.clear_selection("selected interactor lost its node");
                None
            }
            (None, _, _) => {
                self.clear_selection("selected interactor was dropped");
                None
            }
        }
    }

    /// Whether `interactor` is still attached to a node and registered under `id`.
    fn holds_live_entry(&self, interactor: &InteractorHandle, id: InteractorId) -> bool {
        let attached = interactor
            .try_borrow()
            .map_or(true, |i| i.data_node().is_some());
        attached && self.interactors.iter().any(|e| e.id == id && !e.is_expired())
    }

    fn live_selection(&self) -> Option<(InteractorId, ProcessEventMode)> {
        let selection = self.selection.borrow();
        let s = selection.as_ref()?;
        let interactor = s.interactor.lock()?;
        self.holds_live_entry(&interactor, s.id)
            .then_some((s.id, s.mode))
    }

    fn select(&mut self, interactor: &InteractorHandle, id: InteractorId, mode: ProcessEventMode) {
        {
            let mut slot = self.selection.borrow_mut();
            if let Some(current) = slot.as_mut()
                && current.id == id
            {
                if current.mode != mode {
                    debug!(interactor = id.get(), from = ?current.mode, to = ?mode, "selection mode changed");
                    current.mode = mode;
                }
                return;
            }
        }

        let mut weak = Strong::downgrade(interactor);
        let slot = Rc::downgrade(&self.selection);
        weak.set_delete_callback(move || {
            let Some(slot) = slot.upgrade() else {
                return;
            };
            let Ok(mut selection) = slot.try_borrow_mut() else {
                return;
            };
            if selection.as_ref().is_some_and(|s| s.id == id) {
                *selection = None;
                debug!(interactor = id.get(), "selected interactor dropped; selection cleared");
            }
        });
        let previous = self.selection.replace(Some(Selection {
            id,
            interactor: weak,
            mode,
        }));
        drop(previous);
        debug!(interactor = id.get(), mode = ?mode, "interactor selected");
    }

    fn clear_selection(&mut self, reason: &'static str) {
        let previous = self.selection.borrow_mut().take();
        if let Some(previous) = previous {
            debug!(interactor = previous.id.get(), reason, "selection cleared");
        }
    }

    fn register(&mut self, node: &NodeHandle) {
        let weak = Strong::downgrade(node);
        self.unregister(&weak);
        if let Some(interactor) = node.data_interactor() {
            match interactor.try_borrow().map(|i| i.id()) {
                Ok(id) => {
                    let layer = node.dispatch_layer();
                    let at = self
                        .interactors
                        .iter()
                        .position(|e| e.layer() < layer)
                        .unwrap_or(self.interactors.len());
                    self.interactors.insert(
                        at,
                        Entry {
                            id,
                            interactor: Strong::downgrade(&interactor),
                            node: weak,
                        },
                    );
                    debug!(node = %node.name(), layer, interactor = id.get(), "interactor registered");
                }
                Err(_) => {
                    warn!(node = %node.name(), "interactor is busy; registration skipped");
                }
            }
        }
        self.remove_orphaned_interactors();
    }

    /// Remove every entry for `node`. Returns how many were removed.
    fn unregister(&mut self, node: &WeakRef<DataNode>) -> usize {
        let mut removed: SmallVec<[InteractorId; 2]> = SmallVec::new();
        self.interactors.retain(|e| {
            let keep = !e.node.ptr_eq(node);
            if !keep {
                removed.push(e.id);
            }
            keep
        });
        if let Some((selected, _)) = self.selection_state()
            && removed.contains(&selected)
        {
            self.clear_selection("selected interactor unregistered");
        }
        removed.len()
    }

    fn apply_pending_registrations(&mut self) {
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(change) = next else {
                break;
            };
            match change {
                Registration::Add(node) => match node.lock() {
                    Some(node) => self.register(&node),
                    None => {
                        self.unregister(&node);
                    }
                },
                Registration::Remove(node) => {
                    if self.unregister(&node) > 0 {
                        debug!("interactor unregistered (deferred)");
                    }
                }
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("interactors", &self.interactors.len())
            .field("queued", &self.queue.len())
            .field("selection", &self.selection_state())
            .field("observers", &self.observers.len())
            .field("pending_registrations", &self.pending.borrow().len())
            .finish_non_exhaustive()
    }
}
