// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory State Machine: validated, table-driven event state machines.
//!
//! ## Overview
//!
//! An interactor's behavior is described as data and bound to code by name:
//!
//! - A [`StateMachineDescription`] lists states, exactly one of them initial, each with a
//!   [`StateMode`] and an ordered list of transitions. A transition is an [`EventPattern`], an
//!   optional list of named conditions (guards), a list of named actions, and a target state.
//! - [`ActionBindings`] map action names to `FnMut(&mut C, &E)` callbacks and condition names to
//!   `Fn(&C, &E) -> bool` predicates. `C` is whatever context the owner passes in when it drives
//!   the machine.
//! - [`EventStateMachine::new`] resolves names and validates the result. Every problem that would
//!   make the machine ill-defined is a [`ConfigError`]: missing or duplicate initial state,
//!   undefined targets, unbound names, shadowed (ambiguous) transitions, and unreachable states.
//!
//! Events are anything implementing [`EventDescriptor`]: a class plus an optional name (key or
//! internal signal), triggering button, and modifier set.
//!
//! ## Example
//!
//! ```
//! use understory_state_machine::{
//!     ActionBindings, EventClass, EventDescriptor, EventPattern, EventStateMachine,
//!     StateDescription, StateMachineDescription, StateMode, TransitionDescription,
//! };
//!
//! struct Click;
//! impl EventDescriptor for Click {
//!     fn class(&self) -> EventClass { EventClass::MousePress }
//! }
//!
//! let description = StateMachineDescription::new("toggle")
//!     .with_state(
//!         StateDescription::new("off").initial().with_transition(
//!             TransitionDescription::new(EventPattern::new(EventClass::MousePress), "on")
//!                 .with_action("count"),
//!         ),
//!     )
//!     .with_state(
//!         StateDescription::new("on")
//!             .with_mode(StateMode::GrabInput)
//!             .with_transition(
//!                 TransitionDescription::new(EventPattern::new(EventClass::MousePress), "off")
//!                     .with_action("count"),
//!             ),
//!     );
//!
//! let bindings = ActionBindings::new().action("count", |n: &mut u32, _: &Click| *n += 1);
//! let mut machine = EventStateMachine::new(&description, bindings).unwrap();
//!
//! let mut clicks = 0_u32;
//! assert!(machine.handle_event(&mut clicks, &Click));
//! assert_eq!(machine.current_state(), "on");
//! assert_eq!(machine.mode(), StateMode::GrabInput);
//! assert!(machine.handle_event(&mut clicks, &Click));
//! assert_eq!(clicks, 2);
//! ```
//!
//! ## Features
//!
//! - `std` (default): enables `std` support in `tracing` and `thiserror`.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod bindings;
mod description;
mod error;
mod machine;
mod pattern;

pub use bindings::{Action, ActionBindings, Condition};
pub use description::{
    ConditionRef, StateDescription, StateMachineDescription, StateMode, TransitionDescription,
};
pub use error::ConfigError;
pub use machine::EventStateMachine;
pub use pattern::{Buttons, EventClass, EventDescriptor, EventPattern, Modifiers};
