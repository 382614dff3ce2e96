// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Interaction: layer-ordered dispatch of interaction events to data interactors.
//!
//! ## Overview
//!
//! Visualization data lives in [`DataNode`]s. A node may carry one [`DataInteractor`]: an
//! [`EventStateMachine`](understory_state_machine::EventStateMachine) whose actions edit the node
//! in response to input. A [`Dispatcher`] decides which interactor is offered each
//! [`InteractionEvent`]:
//!
//! - By default, interactors are asked from the highest node layer down, and the first one whose
//!   machine takes a transition consumes the event.
//! - A machine state can claim input. `GrabInput` states receive every event exclusively,
//!   `PreferInput` states are asked first. An interactor that accepts a mouse press keeps the
//!   pointer until the release.
//! - Actions can queue follow-up events (internal signals included). They are resolved FIFO
//!   after the current one. An interactor releases its claim by queuing a deactivation request.
//!
//! The dispatcher holds only weak references (see [`understory_weak`]). Dropping a node or an
//! interactor is always safe: a dropped selected interactor clears the selection, and dropped
//! entries are pruned.
//!
//! [`DataStorage`] holds nodes with derivation edges and signals changes; a [`DispatcherBinding`]
//! keeps a dispatcher registered with a storage's interactors.
//!
//! ## Example
//!
//! ```
//! use kurbo::Point;
//! use understory_interaction::{
//!     DataInteractor, DataNode, Dispatcher, InteractionEvent, InteractorBindings,
//! };
//! use understory_state_machine::{
//!     Buttons, EventClass, EventPattern, StateDescription, StateMachineDescription,
//!     TransitionDescription,
//! };
//!
//! // Adds a point to the node's payload on every press.
//! let description = StateMachineDescription::new("points").with_state(
//!     StateDescription::new("idle").initial().with_transition(
//!         TransitionDescription::new(EventPattern::new(EventClass::MousePress), "idle")
//!             .with_action("add_point"),
//!     ),
//! );
//! let bindings = InteractorBindings::new().action("add_point", |ctx, event| {
//!     let (Some(node), Some(at)) = (ctx.data_node(), event.position()) else {
//!         return;
//!     };
//!     node.with_data_mut(|points: &mut Vec<Point>| points.push(at));
//! });
//!
//! let node = DataNode::with_layer("points", 1);
//! node.set_data(Vec::<Point>::new());
//! let interactor = DataInteractor::new(&description, bindings).unwrap().into_handle();
//! DataInteractor::attach(&interactor, &node);
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.add_data_interactor(&node);
//! let press = InteractionEvent::mouse_press(Point::new(4.0, 2.0), Buttons::PRIMARY);
//! assert!(dispatcher.process_event(&press));
//! assert_eq!(node.with_data(|points: &Vec<Point>| points.len()), Some(1));
//! ```
//!
//! ## Features
//!
//! - `std` (default): enables `std` support in `kurbo`, `tracing`, and `thiserror`.
//! - `libm`: `no_std` float support for `kurbo`. One of `std` or `libm` is required.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod binding;
pub mod dispatcher;
pub mod event;
pub mod interactor;
pub mod node;
pub mod signal;
pub mod storage;

#[cfg(test)]
mod testing;

pub use binding::DispatcherBinding;
pub use dispatcher::{
    Dispatcher, DispatcherConfig, InteractionEventObserver, ObserverId, Registrar,
};
pub use event::{EventKind, InteractionEvent, InternalEvent, signals};
pub use interactor::{
    DataInteractor, InteractorBindings, InteractorContext, InteractorHandle, InteractorId,
    ProcessEventMode,
};
pub use node::{DEFAULT_LAYER, DataNode, NodeHandle};
pub use signal::{Signal, Subscription};
pub use storage::{DataStorage, StorageError};
