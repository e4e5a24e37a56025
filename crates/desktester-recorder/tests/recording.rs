use desktester_core::keys::Modifiers;
use desktester_core::virtual_desktop::{VirtualApp, VirtualNode};
use desktester_core::{ActionType, AutomationEngine, Bounds, LocatorStrategy, LocatorType, VirtualDesktop};
use desktester_recorder::{ChannelListener, RawEvent, RecordingSession};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn form() -> VirtualNode {
    VirtualNode::new("window")
        .title("Form")
        .bounds(Bounds::new(0.0, 0.0, 400.0, 300.0))
        .child(
            VirtualNode::new("text_field")
                .identifier("name")
                .label("Name")
                .bounds(Bounds::new(20.0, 20.0, 200.0, 24.0)),
        )
        .child(
            VirtualNode::new("button")
                .identifier("btnOK")
                .title("OK")
                .bounds(Bounds::new(20.0, 60.0, 80.0, 30.0)),
        )
        .child(
            VirtualNode::new("static_text")
                .value("Ready")
                .bounds(Bounds::new(20.0, 100.0, 80.0, 20.0)),
        )
}

fn recorder(desktop: VirtualDesktop) -> (RecordingSession<ChannelListener>, crossbeam_channel::Sender<RawEvent>) {
    desktop.spawn(VirtualApp::new("Form").with_bundle_id("com.example.form").with_root(form()));
    let engine = Arc::new(AutomationEngine::new(desktop));
    let (listener, tx) = ChannelListener::new();
    (RecordingSession::new(engine, listener), tx)
}

fn record(events: Vec<RawEvent>) -> Vec<desktester_core::Step> {
    let (mut session, tx) = recorder(VirtualDesktop::new().without_focus_queries());
    session.start().unwrap();
    for event in events {
        tx.send(event).unwrap();
    }
    session.pump(Duration::from_millis(50)).unwrap();
    session.stop()
}

#[test]
fn click_then_typing_becomes_two_steps() {
    let steps = record(vec![
        RawEvent::click(60.0, 75.0),
        RawEvent::key("H"),
        RawEvent::key("i"),
    ]);

    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].id, "step_1");
    assert_eq!(steps[0].action, ActionType::Click);
    let target = steps[0].target.as_ref().unwrap();
    assert_eq!(target.locator_type, LocatorType::AccessibilityId);
    assert_eq!(target.value, "btnOK");

    assert_eq!(steps[1].id, "step_2");
    assert_eq!(steps[1].action, ActionType::TypeText);
    assert_eq!(steps[1].text.as_deref(), Some("Hi"));
}

#[test]
fn recorded_click_chain_replays_after_relayout() {
    let steps = record(vec![RawEvent::click(60.0, 75.0)]);
    let target = steps[0].target.clone().unwrap();
    let links: Vec<LocatorType> = target.chain().map(|l| l.locator_type).collect();
    assert_eq!(
        links,
        vec![LocatorType::AccessibilityId, LocatorType::RoleTitle, LocatorType::Coordinate]
    );
    assert_eq!(target.chain().last().unwrap().value, "60,75");
}

#[test]
fn double_click_keeps_only_the_double() {
    let steps = record(vec![RawEvent::click(30.0, 30.0), RawEvent::double_click(30.0, 30.0)]);
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].action, ActionType::DoubleClick);
    assert_eq!(steps[0].description, "Double-click \"Name\" (text_field)");
}

#[test]
fn combos_and_named_keys() {
    let steps = record(vec![
        RawEvent::click(30.0, 30.0),
        RawEvent::key("a").with_modifiers(Modifiers(Modifiers::CMD)),
        RawEvent::key("x"),
        RawEvent::key("y"),
        RawEvent::key("return"),
    ]);
    let actions: Vec<ActionType> = steps.iter().map(|s| s.action).collect();
    assert_eq!(
        actions,
        vec![ActionType::Click, ActionType::KeyCombo, ActionType::TypeText, ActionType::KeyCombo]
    );
    assert_eq!(steps[1].keys, vec!["cmd", "a"]);
    assert_eq!(steps[2].text.as_deref(), Some("xy"));
    assert_eq!(steps[3].keys, vec!["return"]);
    let ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["step_1", "step_2", "step_3", "step_4"]);
}

#[test]
fn value_only_element_and_empty_space() {
    let steps = record(vec![RawEvent::click(40.0, 110.0), RawEvent::click(1000.0, 1000.0)]);
    assert_eq!(steps.len(), 2);

    let status = steps[0].target.as_ref().unwrap();
    assert_eq!(status.locator_type, LocatorType::RoleTitle);
    assert_eq!(status.value, "Ready");
    assert_eq!(status.role.as_deref(), Some("static_text"));

    assert_eq!(steps[1].target, None);
    assert_eq!(steps[1].description, "Click");
}

#[test]
fn key_steps_target_the_focused_element() {
    let desktop = VirtualDesktop::new();
    let (mut session, tx) = recorder(desktop.clone());
    session.engine().attach("com.example.form").unwrap();

    // Focus moves through the backend, the way a real click would.
    let field = session.engine().find_element(&LocatorStrategy::id("name")).unwrap();
    session.engine().click(&field).unwrap();

    session.start().unwrap();
    tx.send(RawEvent::key("o")).unwrap();
    tx.send(RawEvent::key("k")).unwrap();
    session.pump(Duration::from_millis(50)).unwrap();
    let live = session.steps();
    assert_eq!(live.len(), 2);
    assert_eq!(live[0].description, "Type \"o\" in \"Name\" (text_field)");

    let steps = session.stop();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].text.as_deref(), Some("ok"));
    assert_eq!(steps[0].target.as_ref().map(|t| t.value.as_str()), Some("name"));
}
