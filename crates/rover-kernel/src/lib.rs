//! `rover-kernel` – Motion Safety Core
//!
//! The two safety components of the supervisor.  Neither knows about the other
//! or about the bus; the runtime feeds them and forwards their outputs.
//!
//! # Modules
//!
//! - [`pose_history`] – [`PoseHistory`][pose_history::PoseHistory]:
//!   the bounded FIFO window of recent pose samples, with per-axis extremes.
//! - [`stall_detector`] – [`StallDetector`][stall_detector::StallDetector]:
//!   evaluates the stuck / slip condition each time the window is full and
//!   computes the backup [`RecoveryManeuver`][rover_types::RecoveryManeuver].
//! - [`state_controller`] – [`StateController`][state_controller::StateController]:
//!   the `STARTUP` / `READY` / `PAUSE` / `KILL` lifecycle and the manual /
//!   autonomous drive mode, with kill and pause interlocks.

pub mod pose_history;
pub mod stall_detector;
pub mod state_controller;

pub use pose_history::{Axis, Extreme, PoseBounds, PoseHistory};
pub use stall_detector::StallDetector;
pub use state_controller::{BootProgress, StateController};
