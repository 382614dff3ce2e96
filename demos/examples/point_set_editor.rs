// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A bounded point set editor on top of a passive hover tracker.
//!
//! This example shows how to combine:
//! - a [`DataStorage`] bound to a [`Dispatcher`] so registration follows the storage,
//! - conditions and multi-action transitions in a state machine description,
//! - an internal signal queued by an action, and a `GrabInput` state entered in response,
//! - an observer that reports every resolution.
//!
//! Run:
//! - `RUST_LOG=understory_interaction=trace cargo run -p understory_demos --example point_set_editor`

use std::cell::RefCell;
use std::rc::Rc;

use kurbo::Point;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use understory_interaction::{
    DataInteractor, DataNode, DataStorage, Dispatcher, DispatcherBinding, InteractionEvent,
    InteractorBindings, InteractorContext,
};
use understory_state_machine::{
    Buttons, EventClass, EventPattern, StateDescription, StateMachineDescription, StateMode,
    TransitionDescription,
};

const MAX_POINTS: usize = 3;
const FULL: &str = "MaximalNumberOfPoints";

fn point_set_machine() -> StateMachineDescription {
    let press = EventPattern::new(EventClass::MousePress).with_button(Buttons::PRIMARY);
    StateMachineDescription::new("point_set")
        .with_state(
            StateDescription::new("ready")
                .initial()
                .with_transition(
                    TransitionDescription::new(press, "ready")
                        .with_inverted_condition("is_full")
                        .with_action("add_point")
                        .with_action("signal_if_full"),
                )
                .with_transition(TransitionDescription::new(EventPattern::internal(FULL), "full")),
        )
        .with_state(
            StateDescription::new("full")
                .with_mode(StateMode::GrabInput)
                .with_transition(
                    TransitionDescription::new(
                        EventPattern::new(EventClass::KeyPress).with_name("Delete"),
                        "ready",
                    )
                    .with_action("remove_last"),
                )
                .with_transition(TransitionDescription::new(
                    EventPattern::new(EventClass::MouseMove),
                    "full",
                )),
        )
}

fn point_count(ctx: &InteractorContext) -> usize {
    ctx.data_node()
        .and_then(|node| node.with_data(|points: &Vec<Point>| points.len()))
        .unwrap_or(0)
}

fn point_set_bindings() -> InteractorBindings {
    InteractorBindings::new()
        .condition("is_full", |ctx, _| point_count(ctx) >= MAX_POINTS)
        .action("add_point", |ctx, event| {
            if let (Some(node), Some(at)) = (ctx.data_node(), event.position()) {
                node.with_data_mut(|points: &mut Vec<Point>| points.push(at));
            }
        })
        .action("signal_if_full", |ctx, _| {
            if point_count(ctx) >= MAX_POINTS {
                ctx.queue_signal(FULL);
            }
        })
        .action("remove_last", |ctx, _| {
            if let Some(node) = ctx.data_node() {
                node.with_data_mut(|points: &mut Vec<Point>| points.pop());
            }
        })
}

fn hover_machine() -> StateMachineDescription {
    StateMachineDescription::new("hover").with_state(
        StateDescription::new("watching").initial().with_transition(
            TransitionDescription::new(EventPattern::new(EventClass::MouseMove), "watching")
                .with_action("track"),
        ),
    )
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "understory_interaction=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut storage = DataStorage::new();
    let dispatcher = Rc::new(RefCell::new(Dispatcher::new()));
    let _binding = DispatcherBinding::new(&storage, &dispatcher);

    let hovered = Rc::new(RefCell::new(None));
    let hover = {
        let hovered = hovered.clone();
        DataInteractor::new(
            &hover_machine(),
            InteractorBindings::new().action("track", move |_, event: &InteractionEvent| {
                *hovered.borrow_mut() = event.position();
            }),
        )
        .expect("hover machine is valid")
        .into_handle()
    };
    let background = DataNode::with_layer("background", 0);
    DataInteractor::attach(&hover, &background);
    storage.add(background.clone(), &[]).expect("fresh storage");

    let points = DataNode::with_layer("points", 2);
    points.set_data(Vec::<Point>::new());
    storage
        .add(points.clone(), &[background.clone()])
        .expect("background is stored");
    let editor = DataInteractor::new(&point_set_machine(), point_set_bindings())
        .expect("point set machine is valid")
        .into_handle();
    // Attaching after the node is stored: the binding picks it up from the change signal.
    DataInteractor::attach(&editor, &points);

    dispatcher
        .borrow_mut()
        .add_observer(|event: &InteractionEvent, handled: bool| {
            println!("  resolved {:?} -> handled: {handled}", event.kind());
        });

    let script = [
        InteractionEvent::mouse_move(Point::new(5.0, 5.0)),
        InteractionEvent::mouse_press(Point::new(10.0, 10.0), Buttons::PRIMARY),
        InteractionEvent::mouse_release(Point::new(10.0, 10.0), Buttons::PRIMARY),
        InteractionEvent::mouse_press(Point::new(20.0, 10.0), Buttons::PRIMARY),
        InteractionEvent::mouse_release(Point::new(20.0, 10.0), Buttons::PRIMARY),
        InteractionEvent::mouse_press(Point::new(30.0, 10.0), Buttons::PRIMARY),
        // The set is full and grabs input: the hover tracker no longer sees moves.
        InteractionEvent::mouse_move(Point::new(40.0, 40.0)),
        InteractionEvent::key_press("Delete"),
        InteractionEvent::mouse_move(Point::new(50.0, 50.0)),
    ];

    for event in &script {
        println!("event {:?}", event.kind());
        let handled = dispatcher.borrow_mut().process_event(event);
        let d = dispatcher.borrow();
        println!(
            "  handled: {handled}, mode: {:?}, editor state: {}, points: {:?}, hover: {:?}",
            d.processing_mode(),
            editor.borrow().current_state(),
            points.with_data(|p: &Vec<Point>| p.len()),
            hovered.borrow(),
        );
    }
}
