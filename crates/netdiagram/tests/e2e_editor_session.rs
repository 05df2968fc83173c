#![forbid(unsafe_code)]

//! End-to-end editing sessions through [`DiagramEditor`].
//!
//! The default configuration releases the engine guard on the host's next
//! tick, so every gesture here is followed by `tick()` the way a UI frame
//! loop would.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use netdiagram::prelude::*;
use netdiagram::runtime::ManualClock;
use netdiagram::runtime::CommandKind;
use netdiagram::{
    DeviceAttributes, DeviceRole, ExecuteOutcome, HistoryError, ImportStrategy, LinkAttributes,
    PASTE_OFFSET, PortCapacity, RateUnit, Rejection, UndoEngine,
};
use tracing_subscriber::layer::SubscriberExt;

fn ok<T>(editor: &mut DiagramEditor, result: Result<T>) -> T {
    let value = result.expect("gesture succeeds");
    editor.tick();
    value
}

#[test]
fn pc_port_limit_scenario() {
    let mut ed = DiagramEditor::new();
    let n1 = ed.add_device(DeviceType::Pc, Position::new(0.0, 0.0));
    let n1 = ok(&mut ed, n1);
    let n2 = ed.add_device(DeviceType::Pc, Position::new(100.0, 0.0));
    let n2 = ok(&mut ed, n2);
    let link = ed.connect(&n1, &n2);
    ok(&mut ed, link);

    let status = ed.port_status(&n1).unwrap();
    assert_eq!(status.used, 1);
    assert_eq!(status.capacity, PortCapacity::Limited(1));

    let n3 = ed.add_device(DeviceType::Pc, Position::new(50.0, 80.0));
    let n3 = ok(&mut ed, n3);
    let err = ed.connect(&n3, &n1).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("PC"), "{message}");
    assert!(message.contains("1/1"), "{message}");
    assert!(matches!(err, EditorError::Rejected(Rejection::PortsExhausted { .. })));
    assert_eq!(ed.history_info().undo_count, 4);

    for _ in 0..4 {
        ed.undo().unwrap().unwrap();
        ed.tick();
    }
    assert!(ed.graph().is_empty());
    for _ in 0..4 {
        ed.redo().unwrap().unwrap();
        ed.tick();
    }
    assert_eq!(ed.graph().devices().len(), 3);
    assert_eq!(ed.graph().links().len(), 1);
}

#[test]
fn gestures_before_tick_are_rejected() {
    let mut ed = DiagramEditor::new();
    ed.add_device(DeviceType::Router, Position::default()).unwrap();
    let busy = ed.add_device(DeviceType::Router, Position::default());
    assert!(matches!(busy, Err(EditorError::History(HistoryError::Busy))));
    assert_eq!(ed.graph().devices().len(), 1);
    assert!(ed.tick());
}

#[test]
fn drag_then_rename_is_one_step() {
    let clock = ManualClock::new();
    let engine = UndoEngine::new().with_clock(clock.clone());
    let mut ed = DiagramEditor::from_engine(engine);
    let r = ed.add_device(DeviceType::Router, Position::default());
    let r = ok(&mut ed, r);
    clock.advance_ms(3000);

    for x in 1..=5 {
        let outcome = ed.move_device(&r, Position::new(f64::from(x) * 10.0, 0.0));
        let outcome = ok(&mut ed, outcome);
        assert_eq!(outcome == ExecuteOutcome::Merged, x > 1);
        clock.advance_ms(100);
    }
    let mut attrs = ed.graph().device(&r).unwrap().attributes.clone();
    attrs.label = "Core".to_string();
    attrs.device_role = Some(DeviceRole::Core);
    let outcome = ed.update_device(&r, attrs);
    assert_eq!(ok(&mut ed, outcome), ExecuteOutcome::Merged);

    let info = ed.history_info();
    assert_eq!(info.undo_count, 2);
    assert!(info.last_command.unwrap().starts_with("Combined:"));

    ed.undo().unwrap().unwrap();
    let device = ed.graph().device(&r).unwrap();
    assert_eq!(device.position, Position::default());
    assert_eq!(device.attributes.label, "Router 1");
}

#[test]
fn selection_delete_and_restore() {
    let mut ed = DiagramEditor::new();
    let mut ids = Vec::new();
    for t in [DeviceType::Firewall, DeviceType::Switch, DeviceType::Server, DeviceType::Pc] {
        let id = ed.add_device(t, Position::default());
        ids.push(ok(&mut ed, id));
    }
    for pair in [(0, 1), (1, 2), (1, 3)] {
        let link = ed.connect(&ids[pair.0], &ids[pair.1]);
        ok(&mut ed, link);
    }
    let before = ed.graph().clone();

    let deleted = ed.delete_selection(&ids[..2], &[]);
    ok(&mut ed, deleted);
    assert_eq!(ed.graph().devices().len(), 2);
    assert!(ed.graph().links().is_empty());

    ed.undo().unwrap().unwrap();
    assert_eq!(ed.graph(), &before);
}

#[test]
fn copy_paste_then_undo_to_point() {
    let mut ed = DiagramEditor::new();
    let sw = ed.add_device(DeviceType::Switch, Position::default());
    let sw = ok(&mut ed, sw);
    let pc = ed.add_device(DeviceType::Pc, Position::new(0.0, 40.0));
    let pc = ok(&mut ed, pc);
    let link = ed.connect(&sw, &pc);
    ok(&mut ed, link);

    let clip = ed.copy(&[sw, pc]);
    let pasted = ed.paste(&clip, PASTE_OFFSET);
    let pasted = ok(&mut ed, pasted);
    let labels: Vec<String> = pasted
        .iter()
        .map(|id| ed.graph().device(id).unwrap().attributes.label.clone())
        .collect();
    assert_eq!(labels, vec!["Switch 2", "PC 2"]);
    assert_eq!(ed.graph().links().len(), 2);

    let undone = ed.undo_to_point(1);
    assert_eq!(ok(&mut ed, undone), 2);
    assert_eq!(ed.graph().devices().len(), 2);
    assert!(ed.graph().links().is_empty());
    assert_eq!(ed.history_info().all_redo.len(), 2);
}

#[test]
fn import_and_load_are_undoable() {
    let mut ed = DiagramEditor::new();
    let r = ed.add_device(DeviceType::Router, Position::default());
    ok(&mut ed, r);
    let drawn = ed.graph().clone();

    let other = {
        let mut scratch = DiagramEditor::new();
        let isp = scratch.add_device(DeviceType::Isp, Position::default()).unwrap();
        scratch.tick();
        let fw = scratch.add_device(DeviceType::Firewall, Position::default()).unwrap();
        scratch.tick();
        scratch.connect(&isp, &fw).unwrap();
        scratch.graph().snapshot()
    };

    let imported = ed.import(other.clone(), ImportStrategy::Append, "site.json");
    ok(&mut ed, imported);
    assert_eq!(ed.graph().devices().len(), 3);
    assert_eq!(ed.graph().links().len(), 1);
    ed.undo().unwrap().unwrap();
    ed.tick();
    assert_eq!(ed.graph(), &drawn);

    let loaded = ed.load_project(other, Some("Branch".to_string()));
    ok(&mut ed, loaded);
    assert_eq!(ed.graph().project_name(), Some("Branch"));
    let cleared = ed.clear_all();
    ok(&mut ed, cleared);
    assert!(ed.graph().is_empty());
    assert_eq!(ed.graph().project_name(), Some("Branch"));

    ed.undo().unwrap().unwrap();
    ed.tick();
    ed.undo().unwrap().unwrap();
    assert_eq!(ed.graph(), &drawn);
}

#[test]
fn update_link_and_clear_history() {
    let mut ed = DiagramEditor::new();
    let a = ed.add_device(DeviceType::Router, Position::default());
    let a = ok(&mut ed, a);
    let b = ed.add_device(DeviceType::Router, Position::default());
    let b = ok(&mut ed, b);
    let id = ed.connect(&a, &b);
    let id = ok(&mut ed, id);

    let mut attrs = ed.graph().link(&id).unwrap().attributes.clone();
    attrs.label = "uplink".to_string();
    let updated = ed.update_link(&id, attrs);
    ok(&mut ed, updated);
    assert_eq!(ed.graph().link(&id).unwrap().attributes.label, "uplink");

    ed.clear_history();
    let info = ed.history_info();
    assert!(!info.can_undo && !info.can_redo);
    assert!(ed.undo().is_none());
    assert_eq!(ed.graph().links().len(), 1);

    let unchanged = DeviceAttributes::labeled("Edge");
    let res = ed.update_device(&DeviceId::from("missing"), unchanged);
    assert!(matches!(res, Err(EditorError::UnknownDevice(_))));
}

#[test]
fn selection_update_spans_devices_and_links() {
    let mut ed = DiagramEditor::new();
    let sw = ed.add_device(DeviceType::Switch, Position::default());
    let sw = ok(&mut ed, sw);
    let mut pcs = Vec::new();
    for x in [0.0, 40.0] {
        let pc = ed.add_device(DeviceType::Pc, Position::new(x, 80.0));
        let pc = ok(&mut ed, pc);
        let link = ed.connect(&sw, &pc);
        pcs.push((pc, ok(&mut ed, link)));
    }
    let before = ed.graph().clone();
    let depth = ed.history_info().undo_count;

    let devices = pcs
        .iter()
        .map(|(pc, _)| {
            let mut attrs = ed.graph().device(pc).unwrap().attributes.clone();
            attrs.device_role = Some(DeviceRole::Access);
            (pc.clone(), attrs)
        })
        .collect();
    let links: Vec<(LinkId, LinkAttributes)> = pcs
        .iter()
        .map(|(_, link)| {
            let attrs = LinkAttributes {
                bandwidth: Some("100".to_string()),
                bandwidth_unit: Some(RateUnit::Mbps),
                ..ed.graph().link(link).unwrap().attributes.clone()
            };
            (link.clone(), attrs)
        })
        .collect();
    let outcome = ed.update_selection(devices, links);
    assert_eq!(ok(&mut ed, outcome), ExecuteOutcome::Applied);
    assert_eq!(ed.history_info().undo_count, depth + 1);
    assert_eq!(
        ed.history_info().last_command.as_deref(),
        Some("Update 2 device(s) and 2 link(s)")
    );
    let entry = ed.history_entries().pop().unwrap();
    assert_eq!(entry.kind, CommandKind::BulkUpdate);
    for (pc, link) in &pcs {
        assert_eq!(ed.graph().device(pc).unwrap().attributes.device_role, Some(DeviceRole::Access));
        assert_eq!(ed.graph().link(link).unwrap().attributes.bandwidth_unit, Some(RateUnit::Mbps));
    }
    let after = ed.graph().clone();

    ed.undo().unwrap().unwrap();
    ed.tick();
    assert_eq!(ed.graph(), &before);
    ed.redo().unwrap().unwrap();
    ed.tick();
    assert_eq!(ed.graph(), &after);
}

#[test]
fn rapid_pastes_share_one_step() {
    let clock = ManualClock::new();
    let mut ed = DiagramEditor::from_engine(UndoEngine::new().with_clock(clock.clone()));
    let r = ed.add_device(DeviceType::Router, Position::default());
    let r = ok(&mut ed, r);
    let clip = ed.copy(&[r]);
    clock.advance_ms(2000);

    let first = ed.paste(&clip, PASTE_OFFSET);
    ok(&mut ed, first);
    clock.advance_ms(100);
    let second = ed.paste(&clip, PASTE_OFFSET);
    ok(&mut ed, second);
    assert_eq!(ed.history_info().undo_count, 2);
    assert_eq!(ed.graph().devices().len(), 3);

    clock.advance_ms(1000);
    let third = ed.paste(&clip, PASTE_OFFSET);
    ok(&mut ed, third);
    assert_eq!(ed.history_info().undo_count, 3);

    ed.undo().unwrap().unwrap();
    ed.tick();
    ed.undo().unwrap().unwrap();
    assert_eq!(ed.graph().devices().len(), 1);
}

// ============================================================================
// Tracing
// ============================================================================

#[derive(Debug, Clone)]
struct CapturedEvent {
    target: String,
    fields: HashMap<String, String>,
}

struct EventCapture(Arc<Mutex<Vec<CapturedEvent>>>);

struct FieldVisitor(Vec<(String, String)>);

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        self.0.push((field.name().to_string(), format!("{value:?}")));
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for EventCapture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = FieldVisitor(Vec::new());
        event.record(&mut visitor);
        self.0.lock().unwrap().push(CapturedEvent {
            target: event.metadata().target().to_string(),
            fields: visitor.0.into_iter().collect(),
        });
    }
}

#[test]
fn rejected_connection_is_logged_with_reason() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(EventCapture(events.clone()));
    tracing::subscriber::with_default(subscriber, || {
        let mut ed = DiagramEditor::new();
        let a = ed.add_device(DeviceType::Server, Position::default()).unwrap();
        ed.tick();
        let _ = ed.connect(&a, &a);
    });

    let events = events.lock().unwrap();
    let rejected = events
        .iter()
        .find(|e| {
            e.target == "netdiagram.editor"
                && e.fields.get("message").is_some_and(|m| m.contains("connection rejected"))
        })
        .expect("rejection event");
    assert!(rejected.fields.get("reason").is_some_and(|r| r.contains("itself")));
    assert!(events.iter().any(|e| e.target == "netdiagram.undo"));
}
