use std::rc::Rc;

use vizij_animancer_core::{
    ClipRef, Config, Machine, MotionDescriptor, PoseGraphArena, RejectReason,
};

const DT: f32 = 0.125;

fn init_tracing() {
    let default_filter = "vizij_animancer_core=debug";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn motion(name: &str, length: f32, priority: i32) -> Rc<MotionDescriptor> {
    Rc::new(MotionDescriptor::new(
        name,
        vec![Some(ClipRef::new(format!("{name}_clip"), length))],
        priority,
    ))
}

fn machine() -> Machine<PoseGraphArena> {
    Machine::new(PoseGraphArena::new(), Config::default())
}

fn ticks(m: &mut Machine<PoseGraphArena>, n: usize, dt: f32) {
    for _ in 0..n {
        m.tick(dt);
    }
}

/// it should keep a higher-priority incumbent until it enters its end window
#[test]
fn higher_priority_incumbent_blocks_until_end_window() {
    init_tracing();
    let mut m = machine();
    let strong = motion("strong", 1.0, 2);
    let weak = motion("weak", 1.0, 1);

    m.play_once(&strong).expect("strong adopted");
    ticks(&mut m, 4, DT); // t = 0.5, cross-fade settled

    let err = m.play_once(&weak).expect_err("outranked");
    assert_eq!(err.reject_reason(), Some(RejectReason::Outranked));
    assert_eq!(m.current_motion_hash(), strong.hash);

    ticks(&mut m, 3, DT); // t = 0.875 >= 1.0 - 0.15
    m.play_once(&weak).expect("incumbent is inside its end window");
    assert_eq!(m.current_motion_hash(), weak.hash);
}

/// it should never let a lower priority displace a looping incumbent
#[test]
fn looping_incumbent_blocks_lower_priority() {
    init_tracing();
    let mut m = machine();
    let strong = motion("strong_loop", 1.0, 2);
    let weak = motion("weak", 1.0, 1);

    m.play_while(&strong, || true).expect("queued");
    ticks(&mut m, 17, DT); // well past the clip length
    assert!(m.is_playing_full_body(&strong));

    let err = m.play_once(&weak).expect_err("outranked");
    assert_eq!(err.reject_reason(), Some(RejectReason::Outranked));
}

/// it should let an equal priority take over a looping incumbent
#[test]
fn equal_priority_replaces_looping_incumbent() {
    init_tracing();
    let mut m = machine();
    let a = motion("a_loop", 1.0, 1);
    let b = motion("b", 1.0, 1);

    m.play_while(&a, || true).expect("queued");
    ticks(&mut m, 4, DT);
    m.play_once(&b).expect("looping incumbent yields to equal priority");
    assert!(m.is_playing_full_body(&b));
}

/// it should refuse to replay the motion that is already current
#[test]
fn no_self_replay() {
    init_tracing();
    let mut m = machine();
    let a = motion("a", 1.0, 0);
    m.play_once(&a).expect("a");
    ticks(&mut m, 7, DT); // t = 0.875, inside the end window
    let err = m.play_once(&a).expect_err("same motion");
    assert_eq!(err.reject_reason(), Some(RejectReason::SameMotion));

    let looped = motion("looped", 1.0, 0);
    let mut m = machine();
    m.play_while(&looped, || true).expect("queued");
    ticks(&mut m, 4, DT);
    let err = m.play_once(&looped).expect_err("same motion");
    assert_eq!(err.reject_reason(), Some(RejectReason::SameMotion));
}

/// it should pre-empt a near-finished lower-priority motion
#[test]
fn priority_preemption_near_end() {
    init_tracing();
    let mut m = machine();
    let base = motion("base", 1.0, 0);
    let urgent = motion("urgent", 0.5, 2);

    m.play_once(&base).expect("base");
    ticks(&mut m, 19, 0.05); // t ~= 0.95
    assert!(m.is_playing_full_body(&base));

    m.play_once(&urgent).expect("higher priority wins");
    assert_eq!(m.current_motion_hash(), urgent.hash);
    assert!(!m.current_motion_can_transition());
}

/// it should reject requests while a cross-fade runs unless asked to bypass
#[test]
fn in_transition_gate_and_bypass() {
    init_tracing();
    let mut m = machine();
    let a = motion("a", 1.0, 0);
    let b = motion("b", 1.0, 5);

    m.play_once(&a).expect("a");
    m.tick(DT);
    let err = m.play_once(&b).expect_err("mid transition");
    assert_eq!(err.reject_reason(), Some(RejectReason::InTransition));
    m.play_once_with(&b, true).expect("bypass");
    assert!(m.is_playing_full_body(&b));
}

/// it should release the pose nodes of a rejected request
#[test]
fn rejection_leaves_no_nodes_behind() {
    init_tracing();
    let mut m = machine();
    let a = motion("a", 1.0, 3);
    let b = motion("b", 1.0, 0);
    m.play_once(&a).expect("a");
    ticks(&mut m, 3, DT);
    let before = m.graph().live_node_count();
    for _ in 0..5 {
        assert!(m.play_once(&b).is_err());
    }
    assert_eq!(m.graph().live_node_count(), before);
}
