//! Point-turn and point-to-point travel primitives.
//!
//! Both primitives run synchronously on the caller's thread, advance one
//! step per control tick, and poll the shared cancellation token at the top
//! of every iteration. Every return path stops the motors first, so an
//! interrupt arriving between sampling and acting can never leave the
//! wheels running.

use std::sync::Arc;

use crate::config::NavConfig;
use crate::control::{CancelToken, Ticker};
use crate::detour::{DetourController, DetourOutcome};
use crate::hardware::{DriveMotors, RangeSensor, SensorLook};
use crate::pose::{Point, Pose, PoseTracker};
use crate::utils::min_turn_angle;

/// One point-to-point travel intent. The detour controller uses it to
/// measure deviation from the original straight-line leg.
#[derive(Clone, Copy, Debug)]
pub struct Leg {
    pub start: Pose,
    pub target: Point,
}

impl Leg {
    /// Perpendicular distance from `position` to the infinite line through
    /// the leg. Zero-length legs report the distance to the start point.
    pub fn deviation(&self, position: Point) -> f32 {
        let dx = self.target.x - self.start.x;
        let dy = self.target.y - self.start.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len < f32::EPSILON {
            return self.start.position().distance(&position);
        }
        let ux = dx / len;
        let uy = dy / len;
        (ux * (position.y - self.start.y) - uy * (position.x - self.start.x)).abs()
    }
}

/// Outcome of an opportunistic mid-leg identification attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickupOutcome {
    /// The blocking object was the target and has been collected; the leg
    /// can continue.
    Collected,
    /// The blocking object is not the target; fall back to a detour.
    NotTarget,
}

/// Mid-leg identification hook, implemented by the coverage planner.
pub trait QuickPickup {
    fn try_pickup(&self, steering: &SteeringController, distance: f32) -> PickupOutcome;
}

/// What `travel_to` does when an obstacle blocks the current leg.
#[derive(Clone, Copy)]
pub enum AvoidanceMode<'a> {
    /// Keep driving; the caller accepts the collision risk.
    Ignore,
    /// Route around the obstacle with a wall-following detour.
    Detour(&'a DetourController),
    /// Try to identify and grab the obstacle first; detour when it is not
    /// the target.
    PickupThenDetour(&'a DetourController, &'a dyn QuickPickup),
}

/// Steering parameters, extracted from the main configuration.
#[derive(Clone, Debug)]
pub struct SteeringConfig {
    pub travel_speed: f32,
    pub turn_speed: f32,
    pub angle_tolerance_rad: f32,
    pub distance_tolerance: f32,
    pub avoid_threshold: f32,
    pub range_cap: f32,
}

impl SteeringConfig {
    pub fn from_nav(config: &NavConfig) -> Self {
        Self {
            travel_speed: config.robot.travel_speed,
            turn_speed: config.robot.turn_speed,
            angle_tolerance_rad: config.control.angle_tolerance_rad,
            distance_tolerance: config.control.distance_tolerance,
            avoid_threshold: config.control.avoid_threshold,
            range_cap: config.control.range_cap,
        }
    }
}

/// Rotate-to-heading and translate-to-point controller.
pub struct SteeringController {
    pose: Arc<PoseTracker>,
    drive: Arc<dyn DriveMotors>,
    range: Arc<dyn RangeSensor>,
    ticker: Arc<dyn Ticker>,
    cancel: CancelToken,
    cfg: SteeringConfig,
}

impl SteeringController {
    pub fn new(
        pose: Arc<PoseTracker>,
        drive: Arc<dyn DriveMotors>,
        range: Arc<dyn RangeSensor>,
        ticker: Arc<dyn Ticker>,
        cancel: CancelToken,
        cfg: SteeringConfig,
    ) -> Self {
        Self {
            pose,
            drive,
            range,
            ticker,
            cancel,
            cfg,
        }
    }

    /// Request cancellation of any running primitive. Takes effect within
    /// one control tick.
    pub fn interrupt(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn current_pose(&self) -> Pose {
        self.pose.pose()
    }

    /// Rotate in place until the heading error drops within tolerance.
    ///
    /// Returns `false` (motors stopped) when interrupted.
    pub fn turn_to(&self, target_heading: f32) -> bool {
        loop {
            if self.cancel.is_cancelled() {
                self.drive.stop();
                return false;
            }

            let pose = self.pose.pose();
            let error = min_turn_angle(target_heading, pose.heading);
            if error.abs() <= self.cfg.angle_tolerance_rad {
                self.drive.stop();
                return true;
            }

            // Heading grows when the left wheel leads, so a positive error
            // drives left forward / right backward.
            let speed = self.cfg.turn_speed.copysign(error);
            self.drive.set_speeds(speed, -speed);
            self.ticker.wait();
        }
    }

    /// Travel to a point, re-aiming each tick and watching the forward
    /// range sensor for blocking obstacles.
    ///
    /// Returns `true` when the target was reached, `false` when interrupted
    /// or when avoidance decided the destination should be abandoned.
    pub fn travel_to(&self, target: Point, avoidance: AvoidanceMode<'_>) -> bool {
        let leg = Leg {
            start: self.pose.pose(),
            target,
        };
        tracing::debug!(
            "travel_to ({:.1}, {:.1}) from ({:.1}, {:.1})",
            target.x,
            target.y,
            leg.start.x,
            leg.start.y
        );

        loop {
            if self.cancel.is_cancelled() {
                self.drive.stop();
                return false;
            }

            let pose = self.pose.pose();
            let remaining = pose.distance_to(target);
            if remaining <= self.cfg.distance_tolerance {
                self.drive.stop();
                return true;
            }

            let bearing = pose.bearing_to(target);
            if min_turn_angle(bearing, pose.heading).abs() > self.cfg.angle_tolerance_rad {
                if !self.turn_to(bearing) {
                    return false;
                }
                // Re-sample the pose before committing to forward motion.
                continue;
            }

            self.drive
                .set_speeds(self.cfg.travel_speed, self.cfg.travel_speed);

            let ahead = self
                .range
                .sample(SensorLook::Forward)
                .min(self.cfg.range_cap);
            let blocking = ahead < self.cfg.avoid_threshold && ahead < remaining;

            if blocking {
                match self.avoid(avoidance, ahead, &leg) {
                    Some(DetourOutcome::Resume) => continue,
                    Some(DetourOutcome::Abandon) => {
                        self.drive.stop();
                        tracing::info!(
                            "abandoning leg to ({:.1}, {:.1})",
                            target.x,
                            target.y
                        );
                        return false;
                    }
                    // No avoidance requested; keep driving.
                    None => {}
                }
            }

            self.ticker.wait();
        }
    }

    /// Handle a blocking obstacle per the avoidance mode. `None` means the
    /// leg should keep driving; otherwise the detour verdict decides it.
    fn avoid(
        &self,
        avoidance: AvoidanceMode<'_>,
        ahead: f32,
        leg: &Leg,
    ) -> Option<DetourOutcome> {
        match avoidance {
            AvoidanceMode::Ignore => None,
            AvoidanceMode::Detour(detour) => {
                self.drive.stop();
                tracing::debug!("obstacle at {:.1}cm on leg, starting detour", ahead);
                Some(detour.execute(self, leg))
            }
            AvoidanceMode::PickupThenDetour(detour, pickup) => {
                self.drive.stop();
                tracing::debug!("obstacle at {:.1}cm on leg, trying pickup", ahead);
                match pickup.try_pickup(self, ahead) {
                    PickupOutcome::Collected => Some(DetourOutcome::Resume),
                    PickupOutcome::NotTarget => Some(detour.execute(self, leg)),
                }
            }
        }
    }

    /// Drive straight for a signed distance. Negative distances back up.
    ///
    /// Returns `false` (motors stopped) when interrupted.
    pub fn go_forward(&self, distance: f32) -> bool {
        let start = self.pose.pose().position();
        let speed = self.cfg.travel_speed.copysign(distance);

        loop {
            if self.cancel.is_cancelled() {
                self.drive.stop();
                return false;
            }

            let moved = self.pose.pose().distance_to(start);
            if moved >= distance.abs() {
                self.drive.stop();
                return true;
            }

            self.drive.set_speeds(speed, speed);
            self.ticker.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn leg_deviation_is_perpendicular_distance() {
        let leg = Leg {
            start: Pose::new(0.0, 0.0, 0.0),
            target: Point::new(0.0, 100.0),
        };
        assert_relative_eq!(leg.deviation(Point::new(5.0, 50.0)), 5.0, epsilon = 1e-4);
        assert_relative_eq!(leg.deviation(Point::new(-3.0, 10.0)), 3.0, epsilon = 1e-4);
        assert_relative_eq!(leg.deviation(Point::new(0.0, 80.0)), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn zero_length_leg_deviation_falls_back_to_start_distance() {
        let leg = Leg {
            start: Pose::new(1.0, 1.0, 0.0),
            target: Point::new(1.0, 1.0),
        };
        assert_relative_eq!(leg.deviation(Point::new(4.0, 5.0)), 5.0, epsilon = 1e-4);
    }
}
