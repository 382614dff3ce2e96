// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixtures shared by the unit tests: recording interactors and terse machine builders.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cell::RefCell;

use understory_state_machine::{
    EventClass, EventPattern, StateDescription, StateMachineDescription, StateMode,
    TransitionDescription,
};

use crate::event::{EventKind, InteractionEvent};
use crate::interactor::{DataInteractor, InteractorBindings, InteractorContext, InteractorHandle};
use crate::node::{DataNode, NodeHandle};

pub(crate) type Log = Rc<RefCell<Vec<(&'static str, String)>>>;

pub(crate) fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub(crate) fn entries(log: &Log) -> Vec<(&'static str, String)> {
    log.borrow().clone()
}

pub(crate) fn labels(log: &Log) -> Vec<&'static str> {
    log.borrow().iter().map(|(label, _)| *label).collect()
}

pub(crate) fn describe(event: &InteractionEvent) -> String {
    match event.kind() {
        EventKind::MousePress => "press".to_string(),
        EventKind::MouseRelease => "release".to_string(),
        EventKind::MouseMove => "move".to_string(),
        EventKind::MouseDoubleClick => "double-click".to_string(),
        EventKind::MouseWheel { .. } => "wheel".to_string(),
        EventKind::KeyPress { key } => format!("key:{key}"),
        EventKind::Internal(internal) => format!("internal:{}", internal.signal()),
    }
}

/// Transition on any event of `class` that records it.
pub(crate) fn on(class: EventClass, target: &str) -> TransitionDescription {
    TransitionDescription::new(EventPattern::new(class), target).with_action("record")
}

/// Transition on key `name` that records it.
pub(crate) fn on_key(name: &str, target: &str) -> TransitionDescription {
    TransitionDescription::new(EventPattern::new(EventClass::KeyPress).with_name(name), target)
        .with_action("record")
}

/// Transition on internal `signal` that records it.
pub(crate) fn on_signal(signal: &str, target: &str) -> TransitionDescription {
    TransitionDescription::new(EventPattern::internal(signal), target).with_action("record")
}

/// One regular state named `idle` with the given transitions.
pub(crate) fn single_state(
    transitions: impl IntoIterator<Item = TransitionDescription>,
) -> StateMachineDescription {
    let mut idle = StateDescription::new("idle").initial();
    for t in transitions {
        idle = idle.with_transition(t);
    }
    StateMachineDescription::new("fixture").with_state(idle)
}

/// `idle` enters `claimed` (with `mode`) on key `claim`; `claimed` handles `while_claimed` and
/// returns to `idle` on key `release`.
pub(crate) fn claim_on_key(
    claim: &str,
    mode: StateMode,
    while_claimed: impl IntoIterator<Item = TransitionDescription>,
) -> StateMachineDescription {
    let mut claimed = StateDescription::new("claimed").with_mode(mode);
    for t in while_claimed {
        claimed = claimed.with_transition(t);
    }
    StateMachineDescription::new("claimer")
        .with_state(
            StateDescription::new("idle")
                .initial()
                .with_transition(on_key(claim, "claimed")),
        )
        .with_state(claimed.with_transition(on_key("release", "idle")))
}

/// Bindings with a `record` action appending to `log`, plus a `deactivate` helper.
pub(crate) fn recording_bindings(label: &'static str, log: &Log) -> InteractorBindings {
    let log = log.clone();
    InteractorBindings::new()
        .action("record", move |_: &mut InteractorContext, ev: &InteractionEvent| {
            log.borrow_mut().push((label, describe(ev)));
        })
        .action("deactivate", |ctx: &mut InteractorContext, _: &InteractionEvent| {
            ctx.deactivate_me();
        })
}

/// A node on `layer` carrying an interactor built from `desc` and `bindings`.
pub(crate) fn attached(
    name: &str,
    layer: i32,
    desc: &StateMachineDescription,
    bindings: InteractorBindings,
) -> (NodeHandle, InteractorHandle) {
    let node = DataNode::with_layer(name, layer);
    let interactor = DataInteractor::new(desc, bindings)
        .unwrap()
        .into_handle();
    DataInteractor::attach(&interactor, &node);
    (node, interactor)
}

/// Shorthand for [`attached`] with recording bindings labeled `name`.
pub(crate) fn recorder(
    name: &'static str,
    layer: i32,
    desc: &StateMachineDescription,
    log: &Log,
) -> (NodeHandle, InteractorHandle) {
    attached(name, layer, desc, recording_bindings(name, log))
}
