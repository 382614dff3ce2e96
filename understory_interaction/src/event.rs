// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interaction events.
//!
//! ## Overview
//!
//! An [`InteractionEvent`] is an immutable value: a kind, an optional position in display
//! coordinates, the modifiers held, the triggering button, and the set of buttons held. Pointer and
//! key events come from the host toolkit. Internal events are synthesized by interactors to signal
//! each other or the [`Dispatcher`](crate::dispatcher::Dispatcher).
//!
//! Events implement [`EventDescriptor`] so state machine transitions can match them. Internal
//! events expose their signal through [`EventDescriptor::name`], and key events expose the key.
//!
//! ## Targeted internal events
//!
//! An internal event may carry a target [`InteractorId`]. The dispatcher offers such an event only
//! to its target. The [`DEACTIVATE_ME`](signals::DEACTIVATE_ME) signal is never offered at all: the
//! dispatcher consumes it and releases the target's input claim.

use alloc::borrow::Cow;
use alloc::string::String;

use kurbo::Point;
use understory_state_machine::{Buttons, EventClass, EventDescriptor, Modifiers};

use crate::interactor::InteractorId;

/// Well-known internal signal names.
pub mod signals {
    /// Ask the dispatcher to release the target's grab or preference.
    pub const DEACTIVATE_ME: &str = "IntDeactivateMe";
    /// The pointer left the render window.
    pub const LEAVE_RENDER_WINDOW: &str = "LeaveRenderWindow";
    /// The pointer entered the render window.
    pub const ENTER_RENDER_WINDOW: &str = "EnterRenderWindow";
}

/// What happened.
#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    /// A mouse button went down.
    MousePress,
    /// A mouse button went up.
    MouseRelease,
    /// The pointer moved.
    MouseMove,
    /// A mouse button was double-clicked.
    MouseDoubleClick,
    /// The wheel turned by `delta` notches; positive is away from the user.
    MouseWheel {
        /// Signed wheel delta.
        delta: f64,
    },
    /// A key was pressed.
    KeyPress {
        /// Key name, for example `"a"` or `"Escape"`.
        key: String,
    },
    /// Synthetic interactor-to-dispatcher signal.
    Internal(InternalEvent),
}

/// Payload of an internal event.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InternalEvent {
    signal: Cow<'static, str>,
    target: Option<InteractorId>,
}

impl InternalEvent {
    /// An untargeted signal, offered through the normal layer walk.
    pub fn new(signal: impl Into<Cow<'static, str>>) -> Self {
        Self {
            signal: signal.into(),
            target: None,
        }
    }

    /// A signal offered only to `target`.
    pub fn targeted(signal: impl Into<Cow<'static, str>>, target: InteractorId) -> Self {
        Self {
            signal: signal.into(),
            target: Some(target),
        }
    }

    /// The signal name.
    pub fn signal(&self) -> &str {
        &self.signal
    }

    /// The interactor this event is addressed to, if any.
    pub fn target(&self) -> Option<InteractorId> {
        self.target
    }

    /// Whether this is a deactivation request.
    pub fn is_deactivate_request(&self) -> bool {
        self.signal == signals::DEACTIVATE_ME
    }
}

/// An input or internal event.
#[derive(Clone, Debug, PartialEq)]
pub struct InteractionEvent {
    kind: EventKind,
    position: Option<Point>,
    modifiers: Modifiers,
    button: Buttons,
    buttons: Buttons,
}

impl InteractionEvent {
    /// An event of `kind` with no position, modifiers, or buttons.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            position: None,
            modifiers: Modifiers::empty(),
            button: Buttons::empty(),
            buttons: Buttons::empty(),
        }
    }

    /// `button` went down at `position`. The held set includes `button`.
    pub fn mouse_press(position: Point, button: Buttons) -> Self {
        Self::new(EventKind::MousePress)
            .with_position(position)
            .with_button(button)
            .with_buttons(button)
    }

    /// `button` went up at `position`.
    pub fn mouse_release(position: Point, button: Buttons) -> Self {
        Self::new(EventKind::MouseRelease)
            .with_position(position)
            .with_button(button)
    }

    /// The pointer moved to `position`.
    pub fn mouse_move(position: Point) -> Self {
        Self::new(EventKind::MouseMove).with_position(position)
    }

    /// `button` was double-clicked at `position`.
    pub fn double_click(position: Point, button: Buttons) -> Self {
        Self::new(EventKind::MouseDoubleClick)
            .with_position(position)
            .with_button(button)
            .with_buttons(button)
    }

    /// The wheel turned by `delta` with the pointer at `position`.
    pub fn wheel(position: Point, delta: f64) -> Self {
        Self::new(EventKind::MouseWheel { delta }).with_position(position)
    }

    /// `key` was pressed.
    pub fn key_press(key: impl Into<String>) -> Self {
        Self::new(EventKind::KeyPress { key: key.into() })
    }

    /// An untargeted internal signal.
    pub fn internal(signal: impl Into<Cow<'static, str>>) -> Self {
        Self::new(EventKind::Internal(InternalEvent::new(signal)))
    }

    /// An internal signal addressed to `target`.
    pub fn internal_for(signal: impl Into<Cow<'static, str>>, target: InteractorId) -> Self {
        Self::new(EventKind::Internal(InternalEvent::targeted(signal, target)))
    }

    /// A request to release `target`'s grab or preference.
    pub fn deactivate(target: InteractorId) -> Self {
        Self::internal_for(signals::DEACTIVATE_ME, target)
    }

    /// Set the position.
    pub fn with_position(mut self, position: Point) -> Self {
        self.position = Some(position);
        self
    }

    /// Set the held modifiers.
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Set the triggering button.
    pub fn with_button(mut self, button: Buttons) -> Self {
        self.button = button;
        self
    }

    /// Set the held buttons.
    pub fn with_buttons(mut self, buttons: Buttons) -> Self {
        self.buttons = buttons;
        self
    }

    /// What happened.
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Position in display coordinates, if the event has one.
    pub fn position(&self) -> Option<Point> {
        self.position
    }

    /// Buttons held while the event occurred.
    pub fn buttons(&self) -> Buttons {
        self.buttons
    }

    /// The internal payload, for internal events.
    pub fn as_internal(&self) -> Option<&InternalEvent> {
        match &self.kind {
            EventKind::Internal(internal) => Some(internal),
            _ => None,
        }
    }

    /// Whether this is a mouse press.
    pub fn is_mouse_press(&self) -> bool {
        matches!(self.kind, EventKind::MousePress)
    }

    /// Whether this is a mouse release.
    pub fn is_mouse_release(&self) -> bool {
        matches!(self.kind, EventKind::MouseRelease)
    }
}

impl EventDescriptor for InteractionEvent {
    fn class(&self) -> EventClass {
        match self.kind {
            EventKind::MousePress => EventClass::MousePress,
            EventKind::MouseRelease => EventClass::MouseRelease,
            EventKind::MouseMove => EventClass::MouseMove,
            EventKind::MouseDoubleClick => EventClass::MouseDoubleClick,
            EventKind::MouseWheel { .. } => EventClass::MouseWheel,
            EventKind::KeyPress { .. } => EventClass::KeyPress,
            EventKind::Internal(_) => EventClass::Internal,
        }
    }

    fn name(&self) -> Option<&str> {
        match &self.kind {
            EventKind::KeyPress { key } => Some(key),
            EventKind::Internal(internal) => Some(internal.signal()),
            _ => None,
        }
    }

    fn button(&self) -> Buttons {
        self.button
    }

    fn modifiers(&self) -> Modifiers {
        self.modifiers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use understory_state_machine::EventPattern;

    #[test]
    fn internal_events_expose_signal_as_name() {
        let ev = InteractionEvent::internal("ClosedContour");
        assert_eq!(ev.class(), EventClass::Internal);
        assert_eq!(ev.name(), Some("ClosedContour"));
        assert!(EventPattern::internal("ClosedContour").matches(&ev));
        assert!(!EventPattern::internal("Other").matches(&ev));
    }

    #[test]
    fn key_events_expose_key_as_name() {
        let ev = InteractionEvent::key_press("Escape").with_modifiers(Modifiers::SHIFT);
        assert_eq!(ev.name(), Some("Escape"));
        let pattern = EventPattern::new(EventClass::KeyPress)
            .with_name("Escape")
            .with_modifiers(Modifiers::SHIFT);
        assert!(pattern.matches(&ev));
    }

    #[test]
    fn deactivate_is_targeted() {
        let id = InteractorId::next();
        let ev = InteractionEvent::deactivate(id);
        let internal = ev.as_internal().unwrap();
        assert!(internal.is_deactivate_request());
        assert_eq!(internal.target(), Some(id));
    }

    #[test]
    fn press_holds_its_button() {
        let ev = InteractionEvent::mouse_press(Point::new(1.0, 2.0), Buttons::SECONDARY);
        assert!(ev.is_mouse_press());
        assert_eq!(ev.button(), Buttons::SECONDARY);
        assert_eq!(ev.buttons(), Buttons::SECONDARY);
        assert_eq!(ev.position(), Some(Point::new(1.0, 2.0)));
        let release = InteractionEvent::mouse_release(Point::ZERO, Buttons::SECONDARY);
        assert!(release.is_mouse_release());
        assert!(release.buttons().is_empty());
    }
}
