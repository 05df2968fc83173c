#![forbid(unsafe_code)]

//! Property tests for [`UndoEngine`] history.
//!
//! Validates:
//! - Undo restores exactly the graph that preceded the undone entry, and
//!   redo restores exactly the graph that preceded the undo, whether or not
//!   entries were merged.
//! - A failed command leaves both the graph and the history unchanged.
//! - Port usage never exceeds capacity at any point.
//! - The undo stack never exceeds its depth limit.

use proptest::prelude::*;

use netdiagram_core::{
    Device, DeviceAttributes, DeviceType, Link, LinkAttributes, PortCapacity, Position,
    TopologyGraph, validate,
};
use netdiagram_runtime::undo::{
    AddEdgeCmd, AddNodeCmd, DeleteNodeCmd, ExecuteOutcome, MoveNodeCmd, UndoableCmd,
    UpdateNodeCmd,
};
use netdiagram_runtime::{EngineConfig, GuardRelease, ManualClock, UndoEngine};

// ============================================================================
// Strategy helpers
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Add(DeviceType),
    Connect(usize, usize),
    Move(usize, i16, i16),
    Rename(usize, u8),
    Delete(usize),
    Undo,
    Redo,
    Wait(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => prop::sample::select(DeviceType::ALL.to_vec()).prop_map(Op::Add),
        3 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::Connect(a, b)),
        3 => (any::<usize>(), -50i16..50, -50i16..50).prop_map(|(i, x, y)| Op::Move(i, x, y)),
        2 => (any::<usize>(), any::<u8>()).prop_map(|(i, n)| Op::Rename(i, n)),
        1 => any::<usize>().prop_map(Op::Delete),
        2 => Just(Op::Undo),
        1 => Just(Op::Redo),
        2 => (0u64..1500).prop_map(Op::Wait),
    ]
}

fn engine(max_depth: usize) -> (UndoEngine, ManualClock) {
    let mut config = EngineConfig {
        guard_release: GuardRelease::Immediate,
        ..EngineConfig::default()
    };
    config.history.max_depth = max_depth;
    config.history.max_bytes = 0;
    let clock = ManualClock::new();
    (UndoEngine::with_config(config).with_clock(clock.clone()), clock)
}

fn pick(graph: &TopologyGraph, i: usize) -> Option<Device> {
    let devices = graph.devices();
    (!devices.is_empty()).then(|| devices[i % devices.len()].clone())
}

/// Build the command for `op`, or `None` for ops that are not commands or
/// have no valid target.
fn command_for(op: &Op, graph: &TopologyGraph, serial: usize) -> Option<Box<dyn UndoableCmd>> {
    match *op {
        Op::Add(t) => {
            let id = format!("d{serial}");
            let device = Device::with_defaults(id.as_str(), t, Position::default(), id.as_str());
            Some(Box::new(AddNodeCmd::new(device)))
        }
        Op::Connect(a, b) => {
            let source = pick(graph, a)?;
            let target = pick(graph, b)?;
            if !validate(&source, &target, graph.links()).is_valid {
                return None;
            }
            let attrs = LinkAttributes::derived_from(&source, &target);
            let link = Link::new(format!("l{serial}"), source.id.clone(), target.id.clone(), attrs);
            Some(Box::new(AddEdgeCmd::new(
                link,
                source.display_label(),
                target.display_label(),
            )))
        }
        Op::Move(i, dx, dy) => {
            let device = pick(graph, i)?;
            let to = device.position.offset(f64::from(dx), f64::from(dy));
            Some(Box::new(MoveNodeCmd::new(
                device.id.clone(),
                device.display_label(),
                device.position,
                to,
            )))
        }
        Op::Rename(i, n) => {
            let device = pick(graph, i)?;
            let mut after: DeviceAttributes = device.attributes.clone();
            after.label = format!("renamed {n}");
            Some(Box::new(UpdateNodeCmd::new(device.id.clone(), device.attributes, after)))
        }
        Op::Delete(i) => {
            let device = pick(graph, i)?;
            Some(Box::new(DeleteNodeCmd::new(device.id.clone(), device.display_label())))
        }
        Op::Undo | Op::Redo | Op::Wait(_) => None,
    }
}

fn assert_ports_within_capacity(graph: &TopologyGraph) -> Result<(), TestCaseError> {
    for device in graph.devices() {
        let used = graph.used_ports(&device.id);
        if let PortCapacity::Limited(max) = device.device_type.port_capacity() {
            prop_assert!(used <= max as usize, "{} uses {used}/{max}", device.id);
        }
    }
    Ok(())
}

// ============================================================================
// Invariant 1: history behaves like a stack of prior graph states
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn undo_and_redo_follow_the_state_model(
        ops in prop::collection::vec(op_strategy(), 1..60),
    ) {
        let (mut engine, clock) = engine(10_000);
        // States preceding each undo entry, and each redo entry.
        let mut undo_model: Vec<TopologyGraph> = Vec::new();
        let mut redo_model: Vec<TopologyGraph> = Vec::new();

        for (serial, op) in ops.iter().enumerate() {
            let before = engine.graph().clone();
            match op {
                Op::Wait(ms) => clock.advance_ms(*ms),
                Op::Undo => match engine.undo() {
                    Some(result) => {
                        prop_assert!(result.is_ok(), "undo failed: {result:?}");
                        let expected = undo_model.pop().expect("model has an entry");
                        prop_assert_eq!(engine.graph(), &expected);
                        redo_model.push(before);
                    }
                    None => prop_assert!(undo_model.is_empty()),
                },
                Op::Redo => match engine.redo() {
                    Some(result) => {
                        prop_assert!(result.is_ok(), "redo failed: {result:?}");
                        let expected = redo_model.pop().expect("model has an entry");
                        prop_assert_eq!(engine.graph(), &expected);
                        undo_model.push(before);
                    }
                    None => prop_assert!(redo_model.is_empty()),
                },
                _ => {
                    let Some(cmd) = command_for(op, engine.graph(), serial) else {
                        continue;
                    };
                    let depth = engine.history().undo_depth();
                    match engine.execute_command(cmd) {
                        Ok(ExecuteOutcome::Applied) => {
                            undo_model.push(before);
                            redo_model.clear();
                        }
                        Ok(ExecuteOutcome::Merged) => redo_model.clear(),
                        Err(_) => {
                            prop_assert_eq!(engine.graph(), &before);
                            prop_assert_eq!(engine.history().undo_depth(), depth);
                        }
                    }
                }
            }

            prop_assert_eq!(engine.history().undo_depth(), undo_model.len());
            prop_assert_eq!(engine.history().redo_depth(), redo_model.len());
            assert_ports_within_capacity(engine.graph())?;
        }
    }

    #[test]
    fn undo_all_then_redo_all_roundtrips(
        ops in prop::collection::vec(op_strategy(), 1..40),
    ) {
        let (mut engine, clock) = engine(10_000);
        for (serial, op) in ops.iter().enumerate() {
            if let Op::Wait(ms) = op {
                clock.advance_ms(*ms);
            } else if let Some(cmd) = command_for(op, engine.graph(), serial) {
                let _ = engine.execute_command(cmd);
            }
        }
        let end = engine.graph().clone();

        while let Some(result) = engine.undo() {
            prop_assert!(result.is_ok());
            assert_ports_within_capacity(engine.graph())?;
        }
        prop_assert!(engine.graph().is_empty());

        while let Some(result) = engine.redo() {
            prop_assert!(result.is_ok());
        }
        prop_assert_eq!(engine.graph(), &end);
    }
}

// ============================================================================
// Invariant 2: depth limit
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn undo_depth_never_exceeds_limit(
        max_depth in 1usize..8,
        ops in prop::collection::vec(op_strategy(), 1..60),
    ) {
        let (mut engine, clock) = engine(max_depth);
        for (serial, op) in ops.iter().enumerate() {
            match op {
                Op::Wait(ms) => clock.advance_ms(*ms),
                Op::Undo => { engine.undo(); }
                Op::Redo => { engine.redo(); }
                _ => {
                    if let Some(cmd) = command_for(op, engine.graph(), serial) {
                        let _ = engine.execute_command(cmd);
                    }
                }
            }
            let info = engine.history_info();
            prop_assert!(info.undo_count <= max_depth);
            prop_assert_eq!(info.truncated, info.evicted > 0);
        }
    }
}
