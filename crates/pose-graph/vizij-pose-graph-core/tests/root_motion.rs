use approx::assert_relative_eq;
use vizij_pose_graph_core::{BodyMask, BodyPart, ClipRef, PoseGraph, PoseGraphArena};

fn clip(id: &str, vx: f32) -> ClipRef {
    ClipRef::new(id, 1.0).with_root_velocity([vx, 0.0, 0.0])
}

/// it should sum weighted inputs of a blend mixer
#[test]
fn blend_mixer_sums_weighted_inputs() {
    let mut g = PoseGraphArena::new();
    let mixer = g.create_mixer_node(2);
    g.set_output(mixer);
    let walk = g.create_clip_node(&clip("walk", 2.0));
    let run = g.create_clip_node(&clip("run", 6.0));
    assert!(g.connect(mixer, 0, walk));
    assert!(g.connect(mixer, 1, run));
    g.set_input_weight(mixer, 0, 0.5);
    g.set_input_weight(mixer, 1, 0.5);

    g.evaluate(0.5);
    assert_relative_eq!(g.root_motion_delta()[0], (2.0 * 0.5 + 6.0 * 0.5) * 0.5);
}

/// it should let later layer slots override earlier ones by weight
#[test]
fn layer_mixer_overrides_in_slot_order() {
    let mut g = PoseGraphArena::new();
    let layers = g.create_layer_mixer_node(0);
    g.set_output(layers);
    let base = g.create_clip_node(&clip("base", 4.0));
    let over = g.create_clip_node(&clip("over", 0.0));
    g.add_input(layers, base, 1.0);
    let top = g.add_input(layers, over, 0.25).expect("slot");

    g.evaluate(1.0);
    assert_relative_eq!(g.root_motion_delta()[0], 3.0);

    g.set_input_weight(layers, top, 1.0);
    g.evaluate(1.0);
    assert_relative_eq!(g.root_motion_delta()[0], 0.0);
}

/// it should ignore masked slots that exclude the root when accumulating root motion
#[test]
fn masked_slot_without_root_leaves_root_motion_alone() {
    let mut g = PoseGraphArena::new();
    let layers = g.create_layer_mixer_node(0);
    g.set_output(layers);
    let base = g.create_clip_node(&clip("base", 4.0));
    let wave = g.create_clip_node(&clip("wave", 0.0));
    g.add_input(layers, base, 1.0);
    let slot = g.add_input(layers, wave, 1.0).expect("slot");
    let upper = BodyMask::empty("upper").with_part(BodyPart::Head, true);
    g.set_input_mask(layers, slot, &upper);

    g.evaluate(0.5);
    assert_relative_eq!(g.root_motion_delta()[0], 2.0);
    assert_eq!(g.input_mask(layers, slot), Some(&upper));
}

/// it should report no root motion once the output is destroyed
#[test]
fn destroyed_output_stops_evaluation() {
    let mut g = PoseGraphArena::new();
    let layers = g.create_layer_mixer_node(0);
    g.set_output(layers);
    let base = g.create_clip_node(&clip("base", 4.0));
    g.add_input(layers, base, 1.0);
    g.destroy(layers);
    assert!(!g.is_ready());
    g.evaluate(1.0);
    assert_eq!(g.root_motion_delta(), [0.0; 3]);
    assert_eq!(g.time(base), 0.0);
}
