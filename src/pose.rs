//! Dead-reckoning pose tracker.
//!
//! Integrates wheel tacho deltas into a 2-D pose. The three pose fields are
//! guarded together by a single lock: readers always see a consistent
//! snapshot and `set_pose` is mutually exclusive with `update`.
//!
//! Heading convention: radians from the +y axis, increasing toward +x,
//! normalized to [0, 2π). Position integrates as `x += d·sin θ`,
//! `y += d·cos θ`.

use std::f32::consts::PI;
use std::sync::{Arc, Mutex};

use crate::hardware::DriveMotors;
use crate::utils::normalize_heading;

/// A point in the arena frame, centimeters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Robot pose estimate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    /// Radians in [0, 2π), measured from the +y axis toward +x.
    pub heading: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Self {
            x,
            y,
            heading: normalize_heading(heading),
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Euclidean distance from this pose to a point.
    pub fn distance_to(&self, target: Point) -> f32 {
        self.position().distance(&target)
    }

    /// Heading of the vector from this pose to the target, in the crate's
    /// from-+y convention.
    pub fn bearing_to(&self, target: Point) -> f32 {
        normalize_heading((target.x - self.x).atan2(target.y - self.y))
    }
}

/// Selects which pose fields `set_pose` overwrites.
#[derive(Clone, Copy, Debug)]
pub struct PoseMask {
    pub x: bool,
    pub y: bool,
    pub heading: bool,
}

impl PoseMask {
    pub const ALL: PoseMask = PoseMask {
        x: true,
        y: true,
        heading: true,
    };

    pub const HEADING_ONLY: PoseMask = PoseMask {
        x: false,
        y: false,
        heading: true,
    };
}

struct TrackerState {
    pose: Pose,
    last_left: f32,
    last_right: f32,
}

/// Wheel-odometry pose tracker.
///
/// `update` runs on a dedicated thread at a fixed period (see
/// [`crate::threads::spawn_pose_thread`]); every other component reads
/// through `pose()`.
pub struct PoseTracker {
    drive: Arc<dyn DriveMotors>,
    wheel_radius: f32,
    track_width: f32,
    state: Mutex<TrackerState>,
}

impl PoseTracker {
    pub fn new(drive: Arc<dyn DriveMotors>, wheel_radius: f32, track_width: f32) -> Self {
        let (left, right) = drive.tacho_degrees();
        Self {
            drive,
            wheel_radius,
            track_width,
            state: Mutex::new(TrackerState {
                pose: Pose::new(0.0, 0.0, 0.0),
                last_left: left,
                last_right: right,
            }),
        }
    }

    /// Integrate the wheel rotation since the last call into the pose.
    pub fn update(&self) {
        let (now_left, now_right) = self.drive.tacho_degrees();

        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let dist_left = PI * self.wheel_radius * (now_left - state.last_left) / 180.0;
        let dist_right = PI * self.wheel_radius * (now_right - state.last_right) / 180.0;
        state.last_left = now_left;
        state.last_right = now_right;

        if dist_left == 0.0 && dist_right == 0.0 {
            return;
        }

        let delta_d = 0.5 * (dist_left + dist_right);
        let delta_t = (dist_left - dist_right) / self.track_width;

        let heading = normalize_heading(state.pose.heading + delta_t);
        state.pose.heading = heading;
        state.pose.x += delta_d * heading.sin();
        state.pose.y += delta_d * heading.cos();
    }

    /// Atomic snapshot of the current pose.
    pub fn pose(&self) -> Pose {
        match self.state.lock() {
            Ok(guard) => guard.pose,
            Err(poisoned) => poisoned.into_inner().pose,
        }
    }

    /// Overwrite selected pose fields. Used by localization; holds the same
    /// lock as `update`, so the two can never interleave.
    pub fn set_pose(&self, pose: Pose, mask: PoseMask) {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if mask.x {
            state.pose.x = pose.x;
        }
        if mask.y {
            state.pose.y = pose.y;
        }
        if mask.heading {
            state.pose.heading = normalize_heading(pose.heading);
        }
    }
}
