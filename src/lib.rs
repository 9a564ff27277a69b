// src/lib.rs - Online jerk-limited trajectory generation
//!
//! Plans time-optimal, jerk-limited motions for several DoFs every control
//! cycle, either point to point or along a blended waypoint path.
//!
//! ```no_run
//! use otg_rs::{InputParameter, Otg, OutputParameter, UpdateResult};
//!
//! let mut otg = Otg::new(1, 0.001)?;
//! let mut input = InputParameter::new(1);
//! input.max_velocity = vec![2.0];
//! input.max_acceleration = vec![2.0];
//! input.max_jerk = vec![1.0];
//! input.target_position = vec![1.0];
//!
//! let mut output = OutputParameter::new(1);
//! while otg.update(&input, &mut output) == UpdateResult::Working {
//!     input.current_position.clone_from(&output.new_position);
//!     input.current_velocity.clone_from(&output.new_velocity);
//!     input.current_acceleration.clone_from(&output.new_acceleration);
//! }
//! # Ok::<(), otg_rs::OtgError>(())
//! ```

pub mod config;
pub mod error;
pub mod generator;
pub mod input;
pub mod motion;
pub mod output;

pub use error::OtgError;
pub use generator::{MAX_TRAJECTORY_DURATION, Otg, UpdateResult};
pub use input::{DurationDiscretization, InputParameter, Interface};
pub use motion::{KinematicState, Limits, Path, PathWaypoint, Profile, Synchronization, Trajectory};
pub use output::{OutputParameter, Sample};
