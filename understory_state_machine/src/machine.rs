// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime transition engine.
//!
//! ## Semantics
//!
//! - One event at a time, synchronously.
//! - In the current state, transitions are tried in declaration order. The first one whose
//!   pattern matches and whose conditions all hold is taken.
//! - Taking a transition runs its actions in order, then moves to the target state, and
//!   [`handle_event`](EventStateMachine::handle_event) returns `true`.
//! - If nothing matches, `false` is returned and neither the machine nor the context is touched
//!   (conditions only receive shared access).
//! - Construction rejects descriptions where a later transition is shadowed by an earlier one, so
//!   at most one transition can ever be the candidate for a concrete event.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::bindings::{Action, ActionBindings, Condition};
use crate::description::{StateDescription, StateMachineDescription, StateMode};
use crate::error::ConfigError;
use crate::pattern::{EventDescriptor, EventPattern};

struct State {
    name: String,
    mode: StateMode,
    transitions: Vec<Transition>,
}

struct Transition {
    pattern: EventPattern,
    target: usize,
    actions: SmallVec<[usize; 2]>,
    // (condition index, inverted)
    conditions: SmallVec<[(usize, bool); 2]>,
}

/// A validated state machine bound to concrete callbacks.
///
/// `C` is the context passed to actions and conditions; `E` is the event type.
pub struct EventStateMachine<C, E> {
    name: String,
    states: Vec<State>,
    initial: usize,
    current: usize,
    actions: Vec<Action<C, E>>,
    conditions: Vec<Condition<C, E>>,
}

impl<C, E: EventDescriptor> EventStateMachine<C, E> {
    /// Resolve `description` against `bindings`.
    ///
    /// Fails on any [`ConfigError`]. Bindings that the description never uses are reported with
    /// a warning and dropped.
    pub fn new(
        description: &StateMachineDescription,
        mut bindings: ActionBindings<C, E>,
    ) -> Result<Self, ConfigError> {
        let machine = &description.name;
        if description.states.is_empty() {
            return Err(ConfigError::Empty {
                machine: machine.clone(),
            });
        }

        let mut index: HashMap<&str, usize> = HashMap::with_capacity(description.states.len());
        let mut initial: Option<usize> = None;
        for (i, state) in description.states.iter().enumerate() {
            if index.insert(state.name.as_str(), i).is_some() {
                return Err(ConfigError::DuplicateState {
                    machine: machine.clone(),
                    state: state.name.clone(),
                });
            }
            if state.initial {
                if let Some(first) = initial {
                    return Err(ConfigError::MultipleInitialStates {
                        machine: machine.clone(),
                        first: description.states[first].name.clone(),
                        second: state.name.clone(),
                    });
                }
                initial = Some(i);
            }
        }
        let Some(initial) = initial else {
            return Err(ConfigError::NoInitialState {
                machine: machine.clone(),
            });
        };

        let mut action_ids: HashMap<&str, usize> = HashMap::new();
        let mut condition_ids: HashMap<&str, usize> = HashMap::new();
        let mut actions = Vec::new();
        let mut conditions = Vec::new();
        let mut states = Vec::with_capacity(description.states.len());

        for state in &description.states {
            check_shadowing(machine, state)?;
            let mut transitions = Vec::with_capacity(state.transitions.len());
            for t in &state.transitions {
                let Some(&target) = index.get(t.target.as_str()) else {
                    return Err(ConfigError::UnknownTarget {
                        machine: machine.clone(),
                        state: state.name.clone(),
                        target: t.target.clone(),
                    });
                };

                let mut t_actions = SmallVec::new();
                for name in &t.actions {
                    let id = match action_ids.get(name.as_str()) {
                        Some(&id) => id,
                        None => {
                            let Some(f) = bindings.actions.remove(name.as_str()) else {
                                return Err(ConfigError::UnboundAction {
                                    machine: machine.clone(),
                                    state: state.name.clone(),
                                    action: name.clone(),
                                });
                            };
                            actions.push(f);
                            action_ids.insert(name.as_str(), actions.len() - 1);
                            actions.len() - 1
                        }
                    };
                    t_actions.push(id);
                }

                let mut t_conditions = SmallVec::new();
                for cond in &t.conditions {
                    let id = match condition_ids.get(cond.name.as_str()) {
                        Some(&id) => id,
                        None => {
                            let Some(f) = bindings.conditions.remove(cond.name.as_str()) else {
                                return Err(ConfigError::UnboundCondition {
                                    machine: machine.clone(),
                                    state: state.name.clone(),
                                    condition: cond.name.clone(),
                                });
                            };
                            conditions.push(f);
                            condition_ids.insert(cond.name.as_str(), conditions.len() - 1);
                            conditions.len() - 1
                        }
                    };
                    t_conditions.push((id, cond.inverted));
                }

                transitions.push(Transition {
                    pattern: t.pattern.clone(),
                    target,
                    actions: t_actions,
                    conditions: t_conditions,
                });
            }
            states.push(State {
                name: state.name.clone(),
                mode: state.mode,
                transitions,
            });
        }

        if let Some(unreachable) = first_unreachable(&states, initial) {
            return Err(ConfigError::UnreachableState {
                machine: machine.clone(),
                state: states[unreachable].name.clone(),
            });
        }

        if !bindings.actions.is_empty() || !bindings.conditions.is_empty() {
            let unused_actions: Vec<&String> = bindings.actions.keys().collect();
            let unused_conditions: Vec<&String> = bindings.conditions.keys().collect();
            warn!(
                machine = %machine,
                ?unused_actions,
                ?unused_conditions,
                "bindings not referenced by state machine"
            );
        }

        Ok(Self {
            name: machine.clone(),
            states,
            initial,
            current: initial,
            actions,
            conditions,
        })
    }

    /// Offer `event` to the machine.
    ///
    /// Returns `true` if a transition was taken.
    pub fn handle_event(&mut self, ctx: &mut C, event: &E) -> bool {
        let from = self.current;
        let conditions = &self.conditions;
        let Some(transition) = self.states[from].transitions.iter().find(|t| {
            t.pattern.matches(event)
                && t.conditions
                    .iter()
                    .all(|&(id, inverted)| conditions[id](&*ctx, event) != inverted)
        }) else {
            return false;
        };

        let target = transition.target;
        for &id in &transition.actions {
            (self.actions[id])(ctx, event);
        }
        trace!(
            machine = %self.name,
            from = %self.states[from].name,
            to = %self.states[target].name,
            event = ?event.class(),
            "transition"
        );
        self.current = target;
        true
    }
}

impl<C, E> EventStateMachine<C, E> {
    /// The machine's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the current state.
    pub fn current_state(&self) -> &str {
        &self.states[self.current].name
    }

    /// Name of the initial state.
    pub fn initial_state(&self) -> &str {
        &self.states[self.initial].name
    }

    /// Input mode of the current state.
    pub fn mode(&self) -> StateMode {
        self.states[self.current].mode
    }

    /// Whether the machine is in its initial state.
    pub fn is_in_initial_state(&self) -> bool {
        self.current == self.initial
    }

    /// Return to the initial state without running any action.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Number of states.
    pub fn state_count(&self) -> usize {
        self.states.len()
    }
}

impl<C, E> fmt::Debug for EventStateMachine<C, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStateMachine")
            .field("name", &self.name)
            .field("current", &self.states[self.current].name)
            .field("mode", &self.states[self.current].mode)
            .field("states", &self.states.len())
            .finish_non_exhaustive()
    }
}

/// Reject a transition that an earlier one in the same state always pre-empts.
fn check_shadowing(machine: &str, state: &StateDescription) -> Result<(), ConfigError> {
    for (shadowed, later) in state.transitions.iter().enumerate() {
        for (winner, earlier) in state.transitions[..shadowed].iter().enumerate() {
            if earlier.pattern.subsumes(&later.pattern) && earlier.conditions_subset_of(later) {
                return Err(ConfigError::AmbiguousTransition {
                    machine: machine.into(),
                    state: state.name.clone(),
                    winner,
                    shadowed,
                });
            }
        }
    }
    Ok(())
}

fn first_unreachable(states: &[State], initial: usize) -> Option<usize> {
    let mut seen = alloc::vec![false; states.len()];
    let mut stack = alloc::vec![initial];
    seen[initial] = true;
    while let Some(i) = stack.pop() {
        for t in &states[i].transitions {
            if !seen[t.target] {
                seen[t.target] = true;
                stack.push(t.target);
            }
        }
    }
    seen.iter().position(|s| !s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::TransitionDescription;
    use crate::pattern::{Buttons, EventClass};
    use alloc::vec;

    #[derive(Clone, Copy, Debug)]
    struct Ev(EventClass, Buttons);

    impl EventDescriptor for Ev {
        fn class(&self) -> EventClass {
            self.0
        }
        fn button(&self) -> Buttons {
            self.1
        }
    }

    const PRESS: Ev = Ev(EventClass::MousePress, Buttons::PRIMARY);
    const MOVE: Ev = Ev(EventClass::MouseMove, Buttons::empty());
    const RELEASE: Ev = Ev(EventClass::MouseRelease, Buttons::PRIMARY);

    #[derive(Default)]
    struct Ctx {
        log: Vec<&'static str>,
        armed: bool,
    }

    fn drag_description() -> StateMachineDescription {
        StateMachineDescription::new("drag")
            .with_state(
                StateDescription::new("idle").initial().with_transition(
                    TransitionDescription::new(
                        EventPattern::new(EventClass::MousePress).with_button(Buttons::PRIMARY),
                        "dragging",
                    )
                    .with_action("start"),
                ),
            )
            .with_state(
                StateDescription::new("dragging")
                    .with_mode(StateMode::GrabInput)
                    .with_transition(
                        TransitionDescription::new(EventPattern::new(EventClass::MouseMove), "dragging")
                            .with_action("drag"),
                    )
                    .with_transition(
                        TransitionDescription::new(EventPattern::new(EventClass::MouseRelease), "idle")
                            .with_action("drag")
                            .with_action("finish"),
                    ),
            )
    }

    fn drag_bindings() -> ActionBindings<Ctx, Ev> {
        ActionBindings::new()
            .action("start", |c: &mut Ctx, _: &Ev| c.log.push("start"))
            .action("drag", |c: &mut Ctx, _: &Ev| c.log.push("drag"))
            .action("finish", |c: &mut Ctx, _: &Ev| c.log.push("finish"))
    }

    #[test]
    fn transitions_run_actions_and_change_state() {
        let mut m = EventStateMachine::new(&drag_description(), drag_bindings()).unwrap();
        let mut ctx = Ctx::default();
        assert_eq!(m.current_state(), "idle");
        assert_eq!(m.mode(), StateMode::Regular);

        assert!(m.handle_event(&mut ctx, &PRESS));
        assert_eq!(m.current_state(), "dragging");
        assert_eq!(m.mode(), StateMode::GrabInput);

        assert!(m.handle_event(&mut ctx, &MOVE));
        assert!(m.handle_event(&mut ctx, &RELEASE));
        assert!(m.is_in_initial_state());
        assert_eq!(ctx.log, vec!["start", "drag", "drag", "finish"]);
    }

    #[test]
    fn unmatched_event_changes_nothing() {
        let mut m = EventStateMachine::new(&drag_description(), drag_bindings()).unwrap();
        let mut ctx = Ctx::default();
        assert!(!m.handle_event(&mut ctx, &MOVE));
        assert!(!m.handle_event(
            &mut ctx,
            &Ev(EventClass::MousePress, Buttons::SECONDARY)
        ));
        assert_eq!(m.current_state(), "idle");
        assert!(ctx.log.is_empty());
    }

    #[test]
    fn conditions_gate_transitions() {
        let desc = StateMachineDescription::new("guarded").with_state(
            StateDescription::new("s")
                .initial()
                .with_transition(
                    TransitionDescription::new(EventPattern::new(EventClass::MousePress), "s")
                        .with_condition("armed")
                        .with_action("fire"),
                )
                .with_transition(
                    TransitionDescription::new(EventPattern::new(EventClass::MousePress), "s")
                        .with_inverted_condition("armed")
                        .with_action("arm"),
                ),
        );
        let bindings = ActionBindings::new()
            .condition("armed", |c: &Ctx, _: &Ev| c.armed)
            .action("fire", |c: &mut Ctx, _: &Ev| c.log.push("fire"))
            .action("arm", |c: &mut Ctx, _: &Ev| {
                c.armed = true;
                c.log.push("arm");
            });
        let mut m = EventStateMachine::new(&desc, bindings).unwrap();
        let mut ctx = Ctx::default();
        assert!(m.handle_event(&mut ctx, &PRESS));
        assert!(m.handle_event(&mut ctx, &PRESS));
        assert_eq!(ctx.log, vec!["arm", "fire"]);
    }

    #[test]
    fn failing_condition_declines() {
        let desc = StateMachineDescription::new("guarded").with_state(
            StateDescription::new("s").initial().with_transition(
                TransitionDescription::new(EventPattern::new(EventClass::MousePress), "s")
                    .with_condition("armed"),
            ),
        );
        let bindings = ActionBindings::new().condition("armed", |c: &Ctx, _: &Ev| c.armed);
        let mut m = EventStateMachine::new(&desc, bindings).unwrap();
        assert!(!m.handle_event(&mut Ctx::default(), &PRESS));
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut m = EventStateMachine::new(&drag_description(), drag_bindings()).unwrap();
        let mut ctx = Ctx::default();
        m.handle_event(&mut ctx, &PRESS);
        assert!(!m.is_in_initial_state());
        m.reset();
        assert_eq!(m.current_state(), m.initial_state());
        assert_eq!(ctx.log, vec!["start"]);
    }

    #[test]
    fn unused_bindings_are_not_an_error() {
        let bindings = drag_bindings().action("spare", |_: &mut Ctx, _: &Ev| {});
        assert!(EventStateMachine::new(&drag_description(), bindings).is_ok());
    }

    #[test]
    fn empty_description_is_rejected() {
        let err = EventStateMachine::<Ctx, Ev>::new(
            &StateMachineDescription::new("none"),
            ActionBindings::new(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Empty {
                machine: "none".into()
            }
        );
    }

    #[test]
    fn initial_state_must_be_unique() {
        let none = StateMachineDescription::new("m").with_state(StateDescription::new("a"));
        assert!(matches!(
            EventStateMachine::<Ctx, Ev>::new(&none, ActionBindings::new()),
            Err(ConfigError::NoInitialState { .. })
        ));

        let two = StateMachineDescription::new("m")
            .with_state(StateDescription::new("a").initial())
            .with_state(StateDescription::new("b").initial());
        assert!(matches!(
            EventStateMachine::<Ctx, Ev>::new(&two, ActionBindings::new()),
            Err(ConfigError::MultipleInitialStates { .. })
        ));
    }

    #[test]
    fn duplicate_state_is_rejected() {
        let desc = StateMachineDescription::new("m")
            .with_state(StateDescription::new("a").initial())
            .with_state(StateDescription::new("a"));
        assert!(matches!(
            EventStateMachine::<Ctx, Ev>::new(&desc, ActionBindings::new()),
            Err(ConfigError::DuplicateState { .. })
        ));
    }

    #[test]
    fn undefined_target_is_rejected() {
        let desc = StateMachineDescription::new("m").with_state(
            StateDescription::new("a").initial().with_transition(TransitionDescription::new(
                EventPattern::new(EventClass::MouseMove),
                "nowhere",
            )),
        );
        let err = EventStateMachine::<Ctx, Ev>::new(&desc, ActionBindings::new()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownTarget {
                machine: "m".into(),
                state: "a".into(),
                target: "nowhere".into(),
            }
        );
    }

    #[test]
    fn unbound_names_are_rejected() {
        let err = EventStateMachine::new(&drag_description(), ActionBindings::<Ctx, Ev>::new())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnboundAction { ref action, .. } if action == "start"));

        let desc = StateMachineDescription::new("m").with_state(
            StateDescription::new("a").initial().with_transition(
                TransitionDescription::new(EventPattern::new(EventClass::MouseMove), "a")
                    .with_condition("missing"),
            ),
        );
        assert!(matches!(
            EventStateMachine::<Ctx, Ev>::new(&desc, ActionBindings::new()),
            Err(ConfigError::UnboundCondition { .. })
        ));
    }

    #[test]
    fn shadowed_transition_is_rejected() {
        let desc = StateMachineDescription::new("m").with_state(
            StateDescription::new("a")
                .initial()
                .with_transition(TransitionDescription::new(
                    EventPattern::new(EventClass::MousePress),
                    "a",
                ))
                .with_transition(TransitionDescription::new(
                    EventPattern::new(EventClass::MousePress).with_button(Buttons::PRIMARY),
                    "a",
                )),
        );
        assert_eq!(
            EventStateMachine::<Ctx, Ev>::new(&desc, ActionBindings::new()).unwrap_err(),
            ConfigError::AmbiguousTransition {
                machine: "m".into(),
                state: "a".into(),
                winner: 0,
                shadowed: 1,
            }
        );
    }

    #[test]
    fn specific_before_general_is_allowed() {
        let desc = StateMachineDescription::new("m").with_state(
            StateDescription::new("a")
                .initial()
                .with_transition(
                    TransitionDescription::new(
                        EventPattern::new(EventClass::MousePress).with_button(Buttons::PRIMARY),
                        "a",
                    )
                    .with_action("primary"),
                )
                .with_transition(
                    TransitionDescription::new(EventPattern::new(EventClass::MousePress), "a")
                        .with_action("other"),
                ),
        );
        let bindings = ActionBindings::new()
            .action("primary", |c: &mut Ctx, _: &Ev| c.log.push("primary"))
            .action("other", |c: &mut Ctx, _: &Ev| c.log.push("other"));
        let mut m = EventStateMachine::new(&desc, bindings).unwrap();
        let mut ctx = Ctx::default();
        m.handle_event(&mut ctx, &PRESS);
        m.handle_event(&mut ctx, &Ev(EventClass::MousePress, Buttons::MIDDLE));
        assert_eq!(ctx.log, vec!["primary", "other"]);
    }

    #[test]
    fn unreachable_state_is_rejected() {
        let desc = StateMachineDescription::new("m")
            .with_state(StateDescription::new("a").initial())
            .with_state(StateDescription::new("island"));
        assert_eq!(
            EventStateMachine::<Ctx, Ev>::new(&desc, ActionBindings::new()).unwrap_err(),
            ConfigError::UnreachableState {
                machine: "m".into(),
                state: "island".into(),
            }
        );
    }

    #[test]
    fn shared_action_is_bound_once() {
        // "drag" is used by two transitions and bound once.
        let m = EventStateMachine::new(&drag_description(), drag_bindings()).unwrap();
        assert_eq!(m.actions.len(), 3);
        assert_eq!(m.state_count(), 2);
    }
}
