//! Vizij Pose Graph Core (engine-agnostic)
//!
//! The small node/port/weight surface the animancer layer drives, plus an
//! in-memory arena implementation of it. Real hosts back [`PoseGraph`] with
//! their engine's blend graph; [`PoseGraphArena`] tracks connectivity,
//! weights, clocks and root motion without sampling any pose data.

pub mod arena;
pub mod clip;
pub mod graph;
pub mod hash;
pub mod ids;
pub mod mask;

// Re-exports for consumers (animancer core, adapters)
pub use arena::PoseGraphArena;
pub use clip::ClipRef;
pub use graph::{NodeKind, PoseGraph};
pub use hash::{Hash128, Hash128Builder};
pub use ids::NodeId;
pub use mask::{BodyMask, BodyPart, MaskTransform};
