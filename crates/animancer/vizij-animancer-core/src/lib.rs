//! Vizij Animancer Core (engine-agnostic)
//!
//! Decides, once per tick, which motion plays on which body region. Play
//! requests are resolved by priority and content hash, cross-faded on a
//! per-layer mixer, optionally routed to masked sub-layers, and fire
//! time-windowed events against the motion currently playing.
//!
//! The pose graph itself is external and consumed through
//! [`vizij_pose_graph_core::PoseGraph`].

pub mod blend;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod layer;
pub mod machine;
pub mod mask;
pub mod registry;
pub mod request;
pub mod stored_motion;

// Re-exports for consumers (adapters, gameplay code)
pub use blend::{clip_weights, peak_curve, BlendSample};
pub use config::Config;
pub use descriptor::MotionDescriptor;
pub use error::{LoadError, PlayError, RejectReason};
pub use event::{normalized_time, EventSpec, EventWindow, FiredEvent, WindowHit};
pub use layer::{ConflictHook, NoopHook, PlaybackLayer};
pub use machine::Machine;
pub use mask::MaskIdentity;
pub use registry::MaskedLayerRegistry;
pub use request::{BlendSampler, Condition, MotionRequest, PoseHandle};
pub use stored_motion::{parse_stored_mask_json, parse_stored_motion_json};
pub use vizij_pose_graph_core::{BodyMask, BodyPart, ClipRef, Hash128, PoseGraph, PoseGraphArena};
