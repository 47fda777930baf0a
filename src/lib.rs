//! KshetraNav - motion and coverage core for an arena retrieval robot.
//!
//! Drives a differential-drive robot that must sweep a gridded rectangular
//! arena, find small colored targets among decoys, and carry them to a goal
//! zone before the round budget runs out, all while steering clear of a
//! forbidden zone and physical obstacles.
//!
//! ## Architecture
//!
//! - [`pose::PoseTracker`] integrates wheel odometry on its own thread
//! - [`steering::SteeringController`] turns and travels with cooperative
//!   cancellation
//! - [`detour::DetourController`] wall-follows around mid-leg obstacles
//! - [`planner::CoveragePlanner`] orders the regions by BFS over the zone
//!   graph and runs the scan/detect/retrieve cycle
//!
//! Hardware is reached only through the traits in [`hardware`]; [`sim`]
//! provides a deterministic in-process implementation for tests and demos.

pub mod config;
pub mod control;
pub mod detour;
pub mod error;
pub mod hardware;
pub mod planner;
pub mod pose;
pub mod sim;
pub mod steering;
pub mod threads;
pub mod utils;

pub use config::NavConfig;
pub use control::{CancelToken, IntervalTicker, Ticker};
pub use detour::{DetourController, DetourOutcome};
pub use error::{NavError, Result};
pub use planner::{AdjacencyGraph, ArenaGrid, CoveragePlanner, RegionId, Zone};
pub use pose::{Point, Pose, PoseMask, PoseTracker};
pub use steering::{AvoidanceMode, SteeringController};
