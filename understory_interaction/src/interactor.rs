// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Data interactors.
//!
//! ## Overview
//!
//! A [`DataInteractor`] couples an [`EventStateMachine`] to at most one [`DataNode`]. The machine's
//! actions and conditions see an [`InteractorContext`]: the interactor's id, its node, and an
//! outbox for events to be processed after the current one.
//!
//! ## Attachment
//!
//! The node owns its interactor ([`NodeHandle`] holds an [`InteractorHandle`]); the interactor
//! refers back weakly. [`DataInteractor::attach`] and [`DataInteractor::detach`] keep both sides
//! consistent:
//!
//! - attaching to a node that already carries another interactor detaches that one first,
//! - attaching an interactor that already sits on another node detaches it from there,
//! - the node's `interactor_changed` signal fires after both sides are updated.
//!
//! An interactor whose node has been dropped declines every event.

use alloc::borrow::Cow;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use core::sync::atomic::Ordering;

use portable_atomic::AtomicU64;
use tracing::{debug, warn};
use understory_state_machine::{
    ActionBindings, ConfigError, EventStateMachine, StateMachineDescription, StateMode,
};
use understory_weak::{Strong, WeakRef};

use crate::event::InteractionEvent;
use crate::node::{DataNode, NodeHandle};

/// Process-unique identity of a [`DataInteractor`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InteractorId(u64);

impl InteractorId {
    /// A fresh id, never handed out before in this process.
    ///
    /// Targets without 64-bit atomics use `portable-atomic`'s fallback; single-core targets
    /// without compare-and-swap need the `critical-section` feature.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw value, for logging.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Shared ownership of a [`DataInteractor`].
pub type InteractorHandle = Strong<RefCell<DataInteractor>>;

/// Bindings for an interactor's actions and conditions.
pub type InteractorBindings = ActionBindings<InteractorContext, InteractionEvent>;

/// How the dispatcher routes events while an interactor holds (or lacks) a claim on input.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProcessEventMode {
    /// Layer-ordered walk.
    #[default]
    Regular,
    /// The selected interactor receives every event exclusively.
    GrabInput,
    /// The selected interactor is asked first.
    PreferInput,
    /// The selected interactor handled a press and receives events exclusively until release.
    ConnectedMouseAction,
}

impl From<StateMode> for ProcessEventMode {
    fn from(mode: StateMode) -> Self {
        match mode {
            StateMode::Regular => Self::Regular,
            StateMode::GrabInput => Self::GrabInput,
            StateMode::PreferInput => Self::PreferInput,
        }
    }
}

/// What an interactor's actions and conditions can see and do.
pub struct InteractorContext {
    id: InteractorId,
    node: WeakRef<DataNode>,
    outbox: Vec<InteractionEvent>,
}

impl InteractorContext {
    fn new(id: InteractorId) -> Self {
        Self {
            id,
            node: WeakRef::empty(),
            outbox: Vec::new(),
        }
    }

    /// The owning interactor's id.
    pub fn id(&self) -> InteractorId {
        self.id
    }

    /// The attached node, if it is still alive.
    pub fn data_node(&self) -> Option<NodeHandle> {
        self.node.lock()
    }

    /// Process `event` after the event currently being handled.
    pub fn queue_event(&mut self, event: InteractionEvent) {
        self.outbox.push(event);
    }

    /// Queue an internal `signal` addressed to this interactor.
    pub fn queue_signal(&mut self, signal: impl Into<Cow<'static, str>>) {
        self.outbox.push(InteractionEvent::internal_for(signal, self.id));
    }

    /// Ask the dispatcher to release this interactor's grab or preference.
    pub fn deactivate_me(&mut self) {
        self.outbox.push(InteractionEvent::deactivate(self.id));
    }

    /// Events queued so far and not yet collected by the dispatcher.
    pub fn queued_events(&self) -> &[InteractionEvent] {
        &self.outbox
    }
}

impl fmt::Debug for InteractorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractorContext")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("queued", &self.outbox.len())
            .finish()
    }
}

type NodeChangedHook = Box<dyn FnMut(&mut InteractorContext, Option<&NodeHandle>)>;

/// A state machine bound to a data node.
pub struct DataInteractor {
    machine: EventStateMachine<InteractorContext, InteractionEvent>,
    context: InteractorContext,
    on_node_changed: Option<NodeChangedHook>,
}

impl DataInteractor {
    /// Build an interactor from a machine description and its bindings.
    pub fn new(
        description: &StateMachineDescription,
        bindings: InteractorBindings,
    ) -> Result<Self, ConfigError> {
        let machine = EventStateMachine::new(description, bindings)?;
        Ok(Self {
            machine,
            context: InteractorContext::new(InteractorId::next()),
            on_node_changed: None,
        })
    }

    /// Run `hook` whenever the interactor is attached to, or detached from, a node.
    ///
    /// The hook receives the new node (`None` on detach) after the back reference is updated.
    pub fn with_node_changed(
        mut self,
        hook: impl FnMut(&mut InteractorContext, Option<&NodeHandle>) + 'static,
    ) -> Self {
        self.on_node_changed = Some(Box::new(hook));
        self
    }

    /// Move into shared ownership.
    pub fn into_handle(self) -> InteractorHandle {
        Strong::new(RefCell::new(self))
    }

    /// This interactor's id.
    pub fn id(&self) -> InteractorId {
        self.context.id
    }

    /// The attached node, if it is still alive.
    pub fn data_node(&self) -> Option<NodeHandle> {
        self.context.data_node()
    }

    /// Routing mode requested by the machine's current state.
    pub fn mode(&self) -> ProcessEventMode {
        self.machine.mode().into()
    }

    /// Name of the current state.
    pub fn current_state(&self) -> &str {
        self.machine.current_state()
    }

    /// The underlying machine.
    pub fn machine(&self) -> &EventStateMachine<InteractorContext, InteractionEvent> {
        &self.machine
    }

    /// Return the machine to its initial state.
    pub fn reset(&mut self) {
        self.machine.reset();
    }

    /// Offer `event`; returns whether a transition was taken.
    ///
    /// Declines without consulting the machine when the interactor has no live node, or when
    /// `event` is an internal event addressed to another interactor.
    pub fn handle_event(&mut self, event: &InteractionEvent) -> bool {
        if self.context.node.is_expired() {
            return false;
        }
        if let Some(internal) = event.as_internal()
            && internal.target().is_some_and(|target| target != self.id())
        {
            return false;
        }
        self.machine.handle_event(&mut self.context, event)
    }

    /// Drain the events queued by actions.
    pub(crate) fn take_queued_events(&mut self) -> Vec<InteractionEvent> {
        core::mem::take(&mut self.context.outbox)
    }

    /// Attach `this` to `node`.
    ///
    /// Any interactor already on `node` is detached, as is `this` from its previous node.
    pub fn attach(this: &InteractorHandle, node: &NodeHandle) {
        if node.is_attached_to(this) {
            return;
        }
        Self::detach(this);

        if let Some(displaced) = node.data_interactor() {
            match displaced.try_borrow_mut() {
                Ok(mut displaced) => displaced.set_node(None),
                Err(_) => warn!(
                    node = %node.name(),
                    "displaced interactor is busy; its back reference was left in place"
                ),
            }
        }

        let id = match this.try_borrow_mut() {
            Ok(mut interactor) => {
                interactor.set_node(Some(node));
                interactor.id()
            }
            Err(_) => {
                warn!(node = %node.name(), "interactor is busy; attach ignored");
                return;
            }
        };
        node.set_data_interactor(Some(this.clone()));
        debug!(interactor = id.get(), node = %node.name(), "interactor attached");
    }

    /// Detach `this` from its node, if it has one.
    pub fn detach(this: &InteractorHandle) {
        let (id, previous) = match this.try_borrow_mut() {
            Ok(mut interactor) => {
                let previous = interactor.context.node.lock();
                if previous.is_some() {
                    interactor.set_node(None);
                }
                (interactor.id(), previous)
            }
            Err(_) => {
                warn!("interactor is busy; detach ignored");
                return;
            }
        };
        if let Some(node) = previous
            && node.is_attached_to(this)
        {
            node.set_data_interactor(None);
            debug!(interactor = id.get(), node = %node.name(), "interactor detached");
        }
    }

    fn set_node(&mut self, node: Option<&NodeHandle>) {
        self.context.node.set(node);
        if let Some(hook) = self.on_node_changed.as_mut() {
            hook(&mut self.context, node);
        }
    }
}

impl fmt::Debug for DataInteractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataInteractor")
            .field("machine", &self.machine)
            .field("context", &self.context)
            .field("has_node_changed_hook", &self.on_node_changed.is_some())
            .finish()
    }
}
