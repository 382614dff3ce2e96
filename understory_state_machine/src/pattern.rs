// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event classes, modifier/button flags, and the patterns transitions match against.

use alloc::string::String;

bitflags::bitflags! {
    /// Keyboard modifiers held while an event occurred.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// Shift key.
        const SHIFT = 1 << 0;
        /// Control key.
        const CONTROL = 1 << 1;
        /// Alt / Option key.
        const ALT = 1 << 2;
        /// Meta / Command / Super key.
        const META = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Mouse buttons.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Buttons: u8 {
        /// Primary (usually left) button.
        const PRIMARY = 1 << 0;
        /// Secondary (usually right) button.
        const SECONDARY = 1 << 1;
        /// Middle button or wheel press.
        const MIDDLE = 1 << 2;
    }
}

/// Coarse kind of an interaction event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventClass {
    /// A mouse button went down.
    MousePress,
    /// A mouse button went up.
    MouseRelease,
    /// The pointer moved.
    MouseMove,
    /// A mouse button was double-clicked.
    MouseDoubleClick,
    /// The wheel turned.
    MouseWheel,
    /// A key was pressed.
    KeyPress,
    /// Synthetic event used for interactor-to-dispatcher signaling.
    Internal,
}

/// What a state machine needs to know about an event to match it.
pub trait EventDescriptor {
    /// The event's class.
    fn class(&self) -> EventClass;

    /// Key name for key events, signal name for internal events.
    fn name(&self) -> Option<&str> {
        None
    }

    /// The button that triggered this event, if any.
    fn button(&self) -> Buttons {
        Buttons::empty()
    }

    /// Modifiers held while the event occurred.
    fn modifiers(&self) -> Modifiers {
        Modifiers::empty()
    }
}

/// Matcher on the left-hand side of a transition.
///
/// `class` must match. Every constraint that is `Some` must match exactly; `None` accepts anything.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EventPattern {
    /// Required event class.
    pub class: EventClass,
    /// Required key or signal name.
    pub name: Option<String>,
    /// Required triggering button.
    pub button: Option<Buttons>,
    /// Required modifier set (exact).
    pub modifiers: Option<Modifiers>,
}

impl EventPattern {
    /// Pattern accepting every event of `class`.
    pub fn new(class: EventClass) -> Self {
        Self {
            class,
            name: None,
            button: None,
            modifiers: None,
        }
    }

    /// Pattern accepting the internal event carrying `signal`.
    pub fn internal(signal: impl Into<String>) -> Self {
        Self::new(EventClass::Internal).with_name(signal)
    }

    /// Require a key or signal name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Require a triggering button.
    pub fn with_button(mut self, button: Buttons) -> Self {
        self.button = Some(button);
        self
    }

    /// Require an exact modifier set.
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = Some(modifiers);
        self
    }

    /// Whether `event` satisfies this pattern.
    pub fn matches<E: EventDescriptor + ?Sized>(&self, event: &E) -> bool {
        self.class == event.class()
            && self.name.as_deref().is_none_or(|n| event.name() == Some(n))
            && self.button.is_none_or(|b| event.button() == b)
            && self.modifiers.is_none_or(|m| event.modifiers() == m)
    }

    /// Whether every event accepted by `other` is also accepted by `self`.
    pub fn subsumes(&self, other: &Self) -> bool {
        fn covers<T: PartialEq>(general: &Option<T>, specific: &Option<T>) -> bool {
            match (general, specific) {
                (None, _) => true,
                (Some(g), Some(s)) => g == s,
                (Some(_), None) => false,
            }
        }
        self.class == other.class
            && covers(&self.name, &other.name)
            && covers(&self.button, &other.button)
            && covers(&self.modifiers, &other.modifiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ev {
        class: EventClass,
        name: Option<&'static str>,
        button: Buttons,
        modifiers: Modifiers,
    }

    impl EventDescriptor for Ev {
        fn class(&self) -> EventClass {
            self.class
        }
        fn name(&self) -> Option<&str> {
            self.name
        }
        fn button(&self) -> Buttons {
            self.button
        }
        fn modifiers(&self) -> Modifiers {
            self.modifiers
        }
    }

    fn press(button: Buttons, modifiers: Modifiers) -> Ev {
        Ev {
            class: EventClass::MousePress,
            name: None,
            button,
            modifiers,
        }
    }

    #[test]
    fn class_only_pattern_accepts_any_payload() {
        let p = EventPattern::new(EventClass::MousePress);
        assert!(p.matches(&press(Buttons::PRIMARY, Modifiers::SHIFT)));
        assert!(p.matches(&press(Buttons::SECONDARY, Modifiers::empty())));
        assert!(!p.matches(&Ev {
            class: EventClass::MouseMove,
            name: None,
            button: Buttons::empty(),
            modifiers: Modifiers::empty(),
        }));
    }

    #[test]
    fn modifiers_match_exactly() {
        let p = EventPattern::new(EventClass::MousePress)
            .with_button(Buttons::PRIMARY)
            .with_modifiers(Modifiers::SHIFT);
        assert!(p.matches(&press(Buttons::PRIMARY, Modifiers::SHIFT)));
        assert!(!p.matches(&press(
            Buttons::PRIMARY,
            Modifiers::SHIFT | Modifiers::CONTROL
        )));
        assert!(!p.matches(&press(Buttons::SECONDARY, Modifiers::SHIFT)));
    }

    #[test]
    fn internal_pattern_matches_signal_name() {
        let p = EventPattern::internal("ClosedContour");
        let hit = Ev {
            class: EventClass::Internal,
            name: Some("ClosedContour"),
            button: Buttons::empty(),
            modifiers: Modifiers::empty(),
        };
        let miss = Ev {
            name: Some("LeaveRenderWindow"),
            ..hit
        };
        assert!(p.matches(&hit));
        assert!(!p.matches(&miss));
    }

    #[test]
    fn subsumption() {
        let any_press = EventPattern::new(EventClass::MousePress);
        let primary = EventPattern::new(EventClass::MousePress).with_button(Buttons::PRIMARY);
        let release = EventPattern::new(EventClass::MouseRelease);
        assert!(any_press.subsumes(&primary));
        assert!(!primary.subsumes(&any_press));
        assert!(primary.subsumes(&primary.clone()));
        assert!(!any_press.subsumes(&release));
    }
}
