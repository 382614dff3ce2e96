// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Name → callback tables for actions and conditions.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

use hashbrown::HashMap;

/// Side effect run when a transition is taken.
pub type Action<C, E> = Box<dyn FnMut(&mut C, &E)>;

/// Guard evaluated before a transition is taken. Guards only get shared access.
pub type Condition<C, E> = Box<dyn Fn(&C, &E) -> bool>;

/// Callbacks a description's action and condition names resolve to.
///
/// `C` is the context handed to callbacks (owned by whoever drives the machine), `E` is the event
/// type.
pub struct ActionBindings<C, E> {
    pub(crate) actions: HashMap<String, Action<C, E>>,
    pub(crate) conditions: HashMap<String, Condition<C, E>>,
}

impl<C, E> ActionBindings<C, E> {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
            conditions: HashMap::new(),
        }
    }

    /// Bind `name` to an action, replacing any previous binding.
    pub fn action(mut self, name: impl Into<String>, f: impl FnMut(&mut C, &E) + 'static) -> Self {
        self.insert_action(name, f);
        self
    }

    /// Bind `name` to a condition, replacing any previous binding.
    pub fn condition(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&C, &E) -> bool + 'static,
    ) -> Self {
        self.insert_condition(name, f);
        self
    }

    /// Bind `name` to an action in place.
    pub fn insert_action(&mut self, name: impl Into<String>, f: impl FnMut(&mut C, &E) + 'static) {
        self.actions.insert(name.into(), Box::new(f));
    }

    /// Bind `name` to a condition in place.
    pub fn insert_condition(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&C, &E) -> bool + 'static,
    ) {
        self.conditions.insert(name.into(), Box::new(f));
    }

    /// Whether an action is bound under `name`.
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Whether a condition is bound under `name`.
    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }
}

impl<C, E> Default for ActionBindings<C, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, E> fmt::Debug for ActionBindings<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBindings")
            .field("actions", &self.actions.keys())
            .field("conditions", &self.conditions.keys())
            .finish()
    }
}
