/// Tests for FrameStateMachine

use super::*;
use crate::error::Error;

fn run_shadow_passes(machine: &mut FrameStateMachine) -> Vec<(bool, ShadowPassEnd)> {
    (0..machine.cascade_count())
        .map(|pass| {
            let enable = machine.begin_shadow_pass(pass).unwrap();
            let end = machine.end_shadow_pass().unwrap();
            (enable, end)
        })
        .collect()
}

#[test]
fn test_full_frame_sequence() {
    let mut machine = FrameStateMachine::default();
    assert_eq!(machine.stage(), FrameStage::Initialized);

    for _ in 0..3 {
        machine.begin_frame().unwrap();
        assert!(machine.in_frame());
        run_shadow_passes(&mut machine);
        machine.begin_render_pass().unwrap();
        machine.end_frame().unwrap();
        assert_eq!(machine.stage(), FrameStage::Presented);
        assert!(!machine.in_frame());
    }
}

#[test]
fn test_depth_bias_toggled_once_per_frame() {
    let mut machine = FrameStateMachine::new(SHADOW_CASCADE_COUNT);
    machine.begin_frame().unwrap();

    let passes = run_shadow_passes(&mut machine);

    let enables: Vec<bool> = passes.iter().map(|(enable, _)| *enable).collect();
    let disables: Vec<bool> = passes.iter().map(|(_, end)| end.disable_depth_bias).collect();
    assert_eq!(enables, vec![true, false, false]);
    assert_eq!(disables, vec![false, false, true]);
}

#[test]
fn test_render_pass_requires_every_cascade() {
    let mut machine = FrameStateMachine::default();
    machine.begin_frame().unwrap();
    machine.begin_shadow_pass(0).unwrap();
    machine.end_shadow_pass().unwrap();

    assert!(matches!(machine.begin_render_pass(), Err(Error::InvalidState(_))));
}

#[test]
fn test_shadow_passes_must_be_in_order() {
    let mut machine = FrameStateMachine::default();
    machine.begin_frame().unwrap();

    assert!(machine.begin_shadow_pass(1).is_err());
    machine.begin_shadow_pass(0).unwrap();
    // still recording pass 0
    assert!(machine.begin_shadow_pass(1).is_err());
    machine.end_shadow_pass().unwrap();
    assert!(machine.begin_shadow_pass(2).is_err());
    machine.begin_shadow_pass(1).unwrap();
}

#[test]
fn test_shadow_pass_out_of_range() {
    let mut machine = FrameStateMachine::default();
    machine.begin_frame().unwrap();
    assert!(machine.begin_shadow_pass(SHADOW_CASCADE_COUNT).is_err());
}

#[test]
fn test_begin_frame_twice_is_rejected() {
    let mut machine = FrameStateMachine::default();
    machine.begin_frame().unwrap();
    assert!(matches!(machine.begin_frame(), Err(Error::InvalidState(_))));
}

#[test]
fn test_end_frame_outside_render_pass() {
    let mut machine = FrameStateMachine::default();
    assert!(machine.end_frame().is_err());
    assert!(machine.end_shadow_pass().is_err());
}

#[test]
fn test_abort_allows_restart() {
    let mut machine = FrameStateMachine::default();
    machine.begin_frame().unwrap();
    machine.begin_shadow_pass(0).unwrap();

    machine.abort_frame();

    assert_eq!(machine.stage(), FrameStage::Initialized);
    machine.begin_frame().unwrap();
}

#[test]
fn test_deinit_is_terminal() {
    let mut machine = FrameStateMachine::default();
    machine.deinit();
    machine.abort_frame();
    assert_eq!(machine.stage(), FrameStage::Deinitialized);
    assert!(machine.begin_frame().is_err());
}
