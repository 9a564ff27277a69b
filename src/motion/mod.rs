// src/motion/mod.rs - Profile synthesis, synchronization and paths

pub mod brake;
pub mod path;
pub mod profile;
mod roots;
pub mod s_curve;
pub mod segment;
pub mod stretch;
pub mod synchronizer;
pub mod trajectory;
pub mod velocity;

pub use path::{Path, PathWaypoint, Reference};
pub use profile::{ControlSigns, Direction, Limits, PositionExtrema, Profile, ProfileShape, ReachedLimits};
pub use s_curve::synthesize;
pub use segment::{KinematicState, Segment};
pub use stretch::with_duration;
pub use synchronizer::{
    Block, DofSolver, PositionSolver, ProfileSolver, SyncOptions, Synchronization, Synchronized,
    VelocitySolver, synchronize,
};
pub use trajectory::{PathTrajectory, Trajectory, TrajectoryKind};
