// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declarative state machine descriptions.
//!
//! A description is plain data: state names, the initial state, per-state input modes, and
//! `(pattern, conditions, actions, target)` transitions. Names are resolved and checked when an
//! [`EventStateMachine`](crate::EventStateMachine) is built from a description and a set of
//! [`ActionBindings`](crate::ActionBindings).

use alloc::string::String;
use alloc::vec::Vec;

use crate::pattern::EventPattern;

/// How a dispatcher should treat an interactor while its machine sits in a state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StateMode {
    /// Normal layer-ordered routing.
    #[default]
    Regular,
    /// Exclusive claim on every subsequent event.
    GrabInput,
    /// First refusal on every subsequent event.
    PreferInput,
}

/// Reference to a named condition, optionally inverted.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConditionRef {
    /// Name looked up in the condition bindings.
    pub name: String,
    /// Take the transition when the condition is false instead.
    pub inverted: bool,
}

/// One outgoing transition of a state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionDescription {
    /// Events this transition reacts to.
    pub pattern: EventPattern,
    /// Name of the next state.
    pub target: String,
    /// Actions executed in order when the transition is taken.
    pub actions: Vec<String>,
    /// Guards that must all hold for the transition to be taken.
    pub conditions: Vec<ConditionRef>,
}

impl TransitionDescription {
    /// Transition on `pattern` to the state named `target`, with no actions or conditions.
    pub fn new(pattern: EventPattern, target: impl Into<String>) -> Self {
        Self {
            pattern,
            target: target.into(),
            actions: Vec::new(),
            conditions: Vec::new(),
        }
    }

    /// Append an action.
    pub fn with_action(mut self, name: impl Into<String>) -> Self {
        self.actions.push(name.into());
        self
    }

    /// Append a condition that must be true.
    pub fn with_condition(mut self, name: impl Into<String>) -> Self {
        self.conditions.push(ConditionRef {
            name: name.into(),
            inverted: false,
        });
        self
    }

    /// Append a condition that must be false.
    pub fn with_inverted_condition(mut self, name: impl Into<String>) -> Self {
        self.conditions.push(ConditionRef {
            name: name.into(),
            inverted: true,
        });
        self
    }

    /// Whether every condition guarding `self` also guards `other`.
    pub(crate) fn conditions_subset_of(&self, other: &Self) -> bool {
        self.conditions.iter().all(|c| other.conditions.contains(c))
    }
}

/// A named state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateDescription {
    /// Unique name within the machine.
    pub name: String,
    /// Whether the machine starts here. Exactly one state must set this.
    pub initial: bool,
    /// Input mode while in this state.
    pub mode: StateMode,
    /// Outgoing transitions, tried in order.
    pub transitions: Vec<TransitionDescription>,
}

impl StateDescription {
    /// A regular, non-initial state with no transitions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            initial: false,
            mode: StateMode::Regular,
            transitions: Vec::new(),
        }
    }

    /// Mark as the initial state.
    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    /// Set the input mode.
    pub fn with_mode(mut self, mode: StateMode) -> Self {
        self.mode = mode;
        self
    }

    /// Append a transition.
    pub fn with_transition(mut self, transition: TransitionDescription) -> Self {
        self.transitions.push(transition);
        self
    }
}

/// A complete machine description.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateMachineDescription {
    /// Name used in diagnostics.
    pub name: String,
    /// All states.
    pub states: Vec<StateDescription>,
}

impl StateMachineDescription {
    /// An empty description.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
        }
    }

    /// Append a state.
    pub fn with_state(mut self, state: StateDescription) -> Self {
        self.states.push(state);
        self
    }

    /// Look up a state by name.
    pub fn state(&self, name: &str) -> Option<&StateDescription> {
        self.states.iter().find(|s| s.name == name)
    }
}
