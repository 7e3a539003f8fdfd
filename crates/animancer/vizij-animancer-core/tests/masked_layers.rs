use std::rc::Rc;

use vizij_animancer_core::{
    BodyMask, BodyPart, ClipRef, Config, Machine, MotionDescriptor, PoseGraph, PoseGraphArena,
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

fn upper() -> BodyMask {
    BodyMask::empty("upper")
        .with_part(BodyPart::Head, true)
        .with_part(BodyPart::LeftArm, true)
        .with_part(BodyPart::RightArm, true)
}

fn left_arm() -> BodyMask {
    BodyMask::empty("left_arm").with_part(BodyPart::LeftArm, true)
}

/// it should keep masked playback off the full-body layer and apart per mask
#[test]
fn masked_isolation() {
    init_tracing();
    let mut m = Machine::new(PoseGraphArena::new(), Config::default());
    let wave = motion("wave", 1.0, 0);
    let point = motion("point", 1.0, 0);

    m.mask_play_once(&wave, &upper()).expect("wave");
    m.mask_play_once(&point, &left_arm()).expect("point");

    assert!(m.current_motion_hash().is_zero());
    let a = m.get_mask(&upper()).expect("upper layer").current_hash();
    let b = m.get_mask(&left_arm()).expect("arm layer").current_hash();
    assert_eq!(a, wave.hash);
    assert_eq!(b, point.hash);
    assert_ne!(a, b);
    assert!(m.is_playing_part_body(&wave, &upper()));
    assert!(!m.is_playing_part_body(&wave, &left_arm()));
    assert!(!m.is_playing_full_body(&wave));

    let master = m.master().expect("master");
    assert_eq!(m.graph().input_count(master), 3);
    assert!(m.graph().input_mask(master, 1).is_some());
    assert!(m.graph().input_mask(master, 0).is_none());
}

/// it should route masks with identical content to the same layer
#[test]
fn equal_masks_share_layer() {
    init_tracing();
    let mut m = Machine::new(PoseGraphArena::new(), Config::default());
    let wave = motion("wave", 1.0, 0);
    let fist = motion("fist", 1.0, 1);

    m.mask_play_once(&wave, &upper()).expect("wave");
    for _ in 0..3 {
        m.tick(DT);
    }
    let same_regions = upper();
    m.mask_play_once(&fist, &same_regions).expect("fist");
    assert_eq!(m.masked_layer_count(), 1);
    assert!(m.is_playing_part_body(&fist, &upper()));
}

/// it should forget a disposed mask layer on the next tick and rebuild on demand
#[test]
fn disposed_mask_layer_is_evicted_lazily() {
    init_tracing();
    let mut m = Machine::new(PoseGraphArena::new(), Config::default());
    let wave = motion("wave", 1.0, 0);
    m.mask_play_once(&wave, &upper()).expect("wave");
    m.tick(DT);

    assert!(m.dispose_mask_layer(&upper()));
    assert!(m.get_mask(&upper()).is_none());
    assert_eq!(m.masked_layer_count(), 1);

    m.tick(DT);
    assert_eq!(m.masked_layer_count(), 0);
    assert!(!m.dispose_mask_layer(&upper()));

    m.mask_play_once(&wave, &upper()).expect("rebuilt");
    let layer = m.get_mask(&upper()).expect("layer");
    assert_eq!(layer.parent_port(), Some(1));
}

/// it should reuse the master slot a disposed mask layer left behind
#[test]
fn master_slots_are_reused_after_dispose() {
    init_tracing();
    let mut m = Machine::new(PoseGraphArena::new(), Config::default());
    let wave = motion("wave", 1.0, 0);
    let master = m.master().expect("master");

    for _ in 0..20 {
        m.mask_play_once(&wave, &upper()).expect("wave");
        m.tick(DT);
        assert!(m.dispose_mask_layer(&upper()));
        m.tick(DT);
    }
    assert_eq!(m.masked_layer_count(), 0);
    assert_eq!(m.graph().input_count(master), 2);

    m.mask_play_once(&wave, &upper()).expect("upper");
    m.mask_play_once(&wave, &left_arm()).expect("arm");
    assert_eq!(m.get_mask(&upper()).expect("upper").parent_port(), Some(1));
    assert_eq!(m.get_mask(&left_arm()).expect("arm").parent_port(), Some(2));
    assert_eq!(m.graph().input_count(master), 3);
    assert!(m.graph().input_mask(master, 1).is_some());
    assert_eq!(m.graph().input_weight(master, 1), 1.0);
}

/// it should tear everything down once and tolerate repeats
#[test]
fn machine_dispose_is_idempotent() {
    init_tracing();
    let mut m = Machine::new(PoseGraphArena::new(), Config::default());
    let idle = motion("idle", 2.0, 0);
    let wave = motion("wave", 1.0, 0);
    let later = motion("later", 1.0, 0);
    m.play_once(&idle).expect("idle");
    m.mask_play_once(&wave, &upper()).expect("wave");
    m.play_once_when(&later, || false, 0.0).expect("queued");
    m.mask_play_while(&later, &left_arm(), || false).expect("queued");
    m.tick(DT);

    m.dispose();
    assert_eq!(m.graph().live_node_count(), 1);
    assert!(!m.is_ready());
    m.dispose();
    assert_eq!(m.graph().live_node_count(), 1);

    let err = m.play_once(&idle).expect_err("disposed");
    assert_eq!(err.category(), "state");
    m.tick(DT);
    assert!(m.events().is_empty());
}
