use vibe_emu_output::speed::{EdgeDetector, SpeedController, SpeedInput, SpeedState, TickPlan};

fn ff(held: bool) -> SpeedInput {
    SpeedInput {
        fast_forward_chord: held,
        ..SpeedInput::default()
    }
}

fn sm(held: bool) -> SpeedInput {
    SpeedInput {
        slow_motion_chord: held,
        ..SpeedInput::default()
    }
}

/// Press and release the chord; returns the state after the press.
fn press(ctl: &mut SpeedController, input: fn(bool) -> SpeedInput) -> Option<SpeedState> {
    let changed = ctl.update(input(true));
    ctl.update(input(false));
    changed
}

#[test]
fn edge_detector_fires_once_per_press() {
    let mut edge = EdgeDetector::default();
    assert!(edge.rising(true));
    assert!(!edge.rising(true));
    assert!(!edge.rising(false));
    assert!(edge.rising(true));
}

#[test]
fn three_presses_cycle_through_fast_forward() {
    let mut ctl = SpeedController::default();
    assert_eq!(press(&mut ctl, ff), Some(SpeedState::FastForward(1)));
    assert_eq!(press(&mut ctl, ff), Some(SpeedState::FastForward(2)));
    assert_eq!(press(&mut ctl, ff), Some(SpeedState::Normal));
}

#[test]
fn held_chord_does_not_retrigger() {
    let mut ctl = SpeedController::default();
    assert_eq!(ctl.update(ff(true)), Some(SpeedState::FastForward(1)));
    for _ in 0..10 {
        assert_eq!(ctl.update(ff(true)), None);
    }
    assert_eq!(ctl.state(), SpeedState::FastForward(1));
}

#[test]
fn slow_motion_cycles_and_cancels_fast_forward() {
    let mut ctl = SpeedController::default();
    press(&mut ctl, ff);
    assert_eq!(press(&mut ctl, sm), Some(SpeedState::SlowMotion(1)));
    assert_eq!(press(&mut ctl, sm), Some(SpeedState::SlowMotion(2)));
    assert_eq!(press(&mut ctl, ff), Some(SpeedState::FastForward(1)));
    press(&mut ctl, sm);
    press(&mut ctl, sm);
    assert_eq!(press(&mut ctl, sm), Some(SpeedState::Normal));
}

#[test]
fn more_levels_extend_the_cycle() {
    let mut ctl = SpeedController::new(4);
    let states: Vec<_> = (0..5).filter_map(|_| press(&mut ctl, ff)).collect();
    assert_eq!(
        states,
        vec![
            SpeedState::FastForward(1),
            SpeedState::FastForward(2),
            SpeedState::FastForward(3),
            SpeedState::FastForward(4),
            SpeedState::Normal,
        ]
    );
    assert_eq!(SpeedState::FastForward(4).iterations(), 5);
}

#[test]
fn disabled_feature_ignores_its_chord() {
    let mut ctl = SpeedController::default();
    ctl.set_slow_motion_enabled(false);
    assert_eq!(press(&mut ctl, sm), None);

    press(&mut ctl, ff);
    assert_eq!(
        ctl.set_fast_forward_enabled(false),
        Some(SpeedState::Normal)
    );
    assert_eq!(press(&mut ctl, ff), None);
}

#[test]
fn lowering_levels_clamps_current_state() {
    let mut ctl = SpeedController::new(3);
    press(&mut ctl, ff);
    press(&mut ctl, ff);
    press(&mut ctl, ff);
    assert_eq!(ctl.state(), SpeedState::FastForward(3));
    assert_eq!(
        ctl.set_fast_forward_levels(1),
        Some(SpeedState::FastForward(1))
    );
}

#[test]
fn only_top_level_skips_intermediate_frames() {
    let mut ctl = SpeedController::default();
    press(&mut ctl, ff);
    assert_eq!(
        ctl.plan_tick(),
        TickPlan::Run {
            iterations: 2,
            skip_intermediate: false
        }
    );
    press(&mut ctl, ff);
    assert_eq!(
        ctl.plan_tick(),
        TickPlan::Run {
            iterations: 3,
            skip_intermediate: true
        }
    );
}

#[test]
fn slow_motion_phase_restarts_on_transition() {
    let mut ctl = SpeedController::default();
    press(&mut ctl, sm);
    let run = |plan: TickPlan| matches!(plan, TickPlan::Run { .. });

    let first: Vec<_> = (0..4).map(|_| run(ctl.plan_tick())).collect();
    assert_eq!(first, vec![true, false, true, false]);

    ctl.plan_tick();
    press(&mut ctl, sm);
    let second: Vec<_> = (0..10).map(|_| run(ctl.plan_tick())).collect();
    assert_eq!(
        second,
        vec![true, false, false, false, false, true, false, false, false, false]
    );
}

#[test]
fn muting_follows_state_and_override() {
    let mut ctl = SpeedController::default();
    assert!(!ctl.audio_muted(false));

    ctl.update(SpeedInput {
        fast_forward_override: true,
        ..SpeedInput::default()
    });
    assert!(ctl.audio_muted(false));
    assert!(!ctl.audio_muted(true));
    assert_eq!(ctl.state(), SpeedState::Normal);

    ctl.update(SpeedInput::default());
    press(&mut ctl, sm);
    assert!(ctl.audio_muted(false));
}

#[test]
fn fps_multiplier_tracks_iterations() {
    assert_eq!(SpeedState::Normal.fps_multiplier(), 1.0);
    assert_eq!(SpeedState::FastForward(2).fps_multiplier(), 3.0);
    assert_eq!(SpeedState::SlowMotion(2).fps_multiplier(), 1.0);
    assert_eq!(SpeedState::SlowMotion(2).to_string(), "0.2x");
}

#[test]
fn out_of_range_levels_fold_into_the_nearest_level() {
    assert_eq!(SpeedState::FastForward(0).normalized(), SpeedState::FastForward(1));
    assert_eq!(SpeedState::FastForward(0).iterations(), 2);
    assert_eq!(SpeedState::FastForward(9).iterations(), 5);
    assert_eq!(SpeedState::FastForward(9).to_string(), "5x");

    assert_eq!(SpeedState::SlowMotion(0).slow_motion_divisor(), Some(2));
    assert_eq!(SpeedState::SlowMotion(0).to_string(), "0.5x");
    assert_eq!(SpeedState::SlowMotion(3).normalized(), SpeedState::SlowMotion(2));
    assert_eq!(SpeedState::SlowMotion(3).slow_motion_divisor(), Some(5));
    assert_eq!(SpeedState::Normal.normalized(), SpeedState::Normal);
}
