// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use alloc::string::String;

/// A description and binding table that cannot form a well-defined machine.
///
/// These are build-time mistakes. They are reported when the machine is constructed, never while
/// events are being handled.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// The description has no states at all.
    #[error("state machine `{machine}` has no states")]
    Empty {
        /// Machine name.
        machine: String,
    },
    /// Two states share a name.
    #[error("state machine `{machine}` defines state `{state}` twice")]
    DuplicateState {
        /// Machine name.
        machine: String,
        /// Duplicated state name.
        state: String,
    },
    /// No state is marked initial.
    #[error("state machine `{machine}` has no initial state")]
    NoInitialState {
        /// Machine name.
        machine: String,
    },
    /// More than one state is marked initial.
    #[error("state machine `{machine}` has two initial states: `{first}` and `{second}`")]
    MultipleInitialStates {
        /// Machine name.
        machine: String,
        /// First initial state found.
        first: String,
        /// Second initial state found.
        second: String,
    },
    /// A transition targets a state that does not exist.
    #[error("state `{state}` of `{machine}` transitions to undefined state `{target}`")]
    UnknownTarget {
        /// Machine name.
        machine: String,
        /// Source state.
        state: String,
        /// Missing target name.
        target: String,
    },
    /// A transition names an action with no bound callback.
    #[error("state `{state}` of `{machine}` uses unbound action `{action}`")]
    UnboundAction {
        /// Machine name.
        machine: String,
        /// Source state.
        state: String,
        /// Missing action name.
        action: String,
    },
    /// A transition names a condition with no bound predicate.
    #[error("state `{state}` of `{machine}` uses unbound condition `{condition}`")]
    UnboundCondition {
        /// Machine name.
        machine: String,
        /// Source state.
        state: String,
        /// Missing condition name.
        condition: String,
    },
    /// A transition can never be taken because an earlier one in the same state always wins.
    #[error(
        "transition {shadowed} of state `{state}` in `{machine}` is shadowed by transition {winner}"
    )]
    AmbiguousTransition {
        /// Machine name.
        machine: String,
        /// State holding both transitions.
        state: String,
        /// Index of the earlier, winning transition.
        winner: usize,
        /// Index of the transition that can never fire.
        shadowed: usize,
    },
    /// A state cannot be reached from the initial state.
    #[error("state `{state}` of `{machine}` is unreachable from the initial state")]
    UnreachableState {
        /// Machine name.
        machine: String,
        /// Unreachable state.
        state: String,
    },
}
