//! Wall-following obstacle detour.
//!
//! When a travel leg is blocked, the robot turns a quarter turn toward the
//! side with more clearance, then skirts the obstacle with a proportional
//! controller until it is back on the original leg line or has wrapped all
//! the way around. Whether the leg resumes or is abandoned depends on
//! whether the detour actually got the robot closer to the target.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use crate::config::NavConfig;
use crate::control::{CancelToken, Ticker};
use crate::hardware::{DriveMotors, RangeSensor, SensorLook};
use crate::steering::{Leg, SteeringController};
use crate::utils::{heading_delta, normalize_heading};

/// Which way the robot turns to start the detour. The obstacle ends up on
/// the opposite side and is followed as a wall.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Pick the detour direction from the side clearances. Left wins only on
/// strictly more clearance, so ties go right.
pub fn choose_side(left_clearance: f32, right_clearance: f32) -> Side {
    if left_clearance > right_clearance {
        Side::Left
    } else {
        Side::Right
    }
}

/// Proportional wall correction, clamped to the configured maximum.
fn wall_correction(error: f32, kp: f32, max_adjustment: f32) -> f32 {
    (kp * error).clamp(-max_adjustment, max_adjustment)
}

/// How a finished detour relates to the interrupted leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetourOutcome {
    /// The robot ended up closer to the leg target; re-run the leg.
    Resume,
    /// The detour made no progress (or was interrupted); drop the leg.
    Abandon,
}

/// Detour parameters, extracted from the main configuration.
#[derive(Clone, Debug)]
pub struct DetourParams {
    pub band_center: f32,
    pub bandwidth: f32,
    pub kp: f32,
    pub max_adjustment: f32,
    pub forward_speed: f32,
    pub deviation_started: f32,
    pub deviation_resumed: f32,
    pub turnaround_rad: f32,
    pub max_duration_secs: f32,
    pub range_cap: f32,
}

impl DetourParams {
    pub fn from_nav(config: &NavConfig) -> Self {
        Self {
            band_center: config.detour.band_center,
            bandwidth: config.detour.bandwidth,
            kp: config.detour.kp,
            max_adjustment: config.detour.max_adjustment,
            forward_speed: config.detour.forward_speed,
            deviation_started: config.detour.deviation_started,
            deviation_resumed: config.detour.deviation_resumed,
            turnaround_rad: config.detour.turnaround_rad,
            max_duration_secs: config.detour.max_duration_secs,
            range_cap: config.control.range_cap,
        }
    }
}

/// Executes one detour episode at a time; holds no state between episodes.
pub struct DetourController {
    drive: Arc<dyn DriveMotors>,
    range: Arc<dyn RangeSensor>,
    ticker: Arc<dyn Ticker>,
    cancel: CancelToken,
    params: DetourParams,
}

impl DetourController {
    pub fn new(
        drive: Arc<dyn DriveMotors>,
        range: Arc<dyn RangeSensor>,
        ticker: Arc<dyn Ticker>,
        cancel: CancelToken,
        params: DetourParams,
    ) -> Self {
        Self {
            drive,
            range,
            ticker,
            cancel,
            params,
        }
    }

    /// Skirt the obstacle blocking `leg`. The robot is assumed stopped,
    /// facing the obstacle.
    pub fn execute(&self, steering: &SteeringController, leg: &Leg) -> DetourOutcome {
        let start_pose = steering.current_pose();
        let pre_distance = start_pose.distance_to(leg.target);

        let cap = self.params.range_cap;
        let left = self.range.sample(SensorLook::Left).min(cap);
        let right = self.range.sample(SensorLook::Right).min(cap);
        let turn = choose_side(left, right);
        let wall = turn.opposite();
        tracing::info!(
            "detour: turning {:?} (clearance left {:.1} / right {:.1})",
            turn,
            left,
            right
        );

        let away = match turn {
            Side::Left => start_pose.heading - FRAC_PI_2,
            Side::Right => start_pose.heading + FRAC_PI_2,
        };
        if !steering.turn_to(normalize_heading(away)) {
            return DetourOutcome::Abandon;
        }

        let wall_look = match wall {
            Side::Left => SensorLook::Left,
            Side::Right => SensorLook::Right,
        };

        let period_secs = self.ticker.period().as_secs_f32();
        let max_ticks = (self.params.max_duration_secs / period_secs).ceil() as u32;

        let mut prev_heading = steering.current_pose().heading;
        let mut total_turn: f32 = 0.0;
        let mut clear_of_leg = false;
        let mut interrupted = false;
        let mut timed_out = false;
        let mut ticks = 0u32;

        loop {
            if ticks >= max_ticks {
                timed_out = true;
                break;
            }
            ticks += 1;

            if self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }

            let pose = steering.current_pose();
            let deviation = leg.deviation(pose.position());
            if clear_of_leg {
                if deviation <= self.params.deviation_resumed {
                    // Back on the original leg line.
                    break;
                }
            } else if deviation >= self.params.deviation_started {
                clear_of_leg = true;
            }

            total_turn += heading_delta(prev_heading, pose.heading);
            prev_heading = pose.heading;
            if total_turn.abs() >= self.params.turnaround_rad {
                // Wrapped half way around the obstacle.
                break;
            }

            let forward = self.range.sample(SensorLook::Forward).min(cap);
            let lateral = self.range.sample(wall_look).min(cap);
            let controlling = forward.min(lateral);

            let error = controlling - self.params.band_center;
            let adjustment = if error.abs() <= self.params.bandwidth {
                0.0
            } else {
                wall_correction(error, self.params.kp, self.params.max_adjustment)
            };

            // Positive error means drifting away from the wall; speed up the
            // outer wheel to close back in.
            let speed = self.params.forward_speed;
            match wall {
                Side::Right => self.drive.set_speeds(speed + adjustment, speed - adjustment),
                Side::Left => self.drive.set_speeds(speed - adjustment, speed + adjustment),
            }

            self.ticker.wait();
        }

        self.drive.stop();
        if interrupted {
            return DetourOutcome::Abandon;
        }
        if timed_out {
            tracing::warn!(
                "detour ceiling of {:.0}s reached without rejoining the leg",
                self.params.max_duration_secs
            );
        }

        let post_distance = steering.current_pose().distance_to(leg.target);
        tracing::debug!(
            "detour finished: {:.1}cm -> {:.1}cm from target",
            pre_distance,
            post_distance
        );
        if post_distance < pre_distance {
            DetourOutcome::Resume
        } else {
            DetourOutcome::Abandon
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_choice_prefers_more_clearance() {
        assert_eq!(choose_side(80.0, 30.0), Side::Left);
        assert_eq!(choose_side(12.0, 64.0), Side::Right);
    }

    #[test]
    fn side_choice_ties_go_right() {
        assert_eq!(choose_side(40.0, 40.0), Side::Right);
    }

    #[test]
    fn correction_is_proportional_and_clamped() {
        assert_eq!(wall_correction(5.0, 8.0, 100.0), 40.0);
        assert_eq!(wall_correction(-5.0, 8.0, 100.0), -40.0);
        assert_eq!(wall_correction(50.0, 8.0, 100.0), 100.0);
        assert_eq!(wall_correction(-50.0, 8.0, 100.0), -100.0);
    }
}
