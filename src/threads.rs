//! Background threads: pose integration and the round-budget watchdog.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::control::CancelToken;
use crate::pose::PoseTracker;

/// Spawn the dead-reckoning thread. Runs until `shutdown` is cancelled;
/// this is a separate token from the round interrupt so pose tracking keeps
/// going through finalization.
pub fn spawn_pose_thread(
    tracker: Arc<PoseTracker>,
    period: Duration,
    shutdown: CancelToken,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("pose".into())
        .spawn(move || {
            tracing::debug!("pose thread started, period {:?}", period);
            while !shutdown.is_cancelled() {
                tracker.update();
                thread::sleep(period);
            }
            tracing::debug!("pose thread stopped");
        })
        .expect("Failed to spawn pose thread")
}

/// Spawn the round-budget watchdog: after `budget` elapses it cancels the
/// shared round token once, ending all motion within one control tick.
pub fn spawn_round_timer(budget: Duration, round: CancelToken) -> JoinHandle<()> {
    thread::Builder::new()
        .name("round-timer".into())
        .spawn(move || {
            thread::sleep(budget);
            tracing::info!("round budget of {:?} elapsed, interrupting", budget);
            round.cancel();
        })
        .expect("Failed to spawn round timer thread")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::DriveMotors;

    struct StillDrive;

    impl DriveMotors for StillDrive {
        fn set_speeds(&self, _left: f32, _right: f32) {}
        fn stop(&self) {}
        fn tacho_degrees(&self) -> (f32, f32) {
            (0.0, 0.0)
        }
    }

    #[test]
    fn pose_thread_stops_on_shutdown() {
        let tracker = Arc::new(PoseTracker::new(Arc::new(StillDrive), 2.1, 15.8));
        let shutdown = CancelToken::new();
        let handle = spawn_pose_thread(tracker, Duration::from_millis(1), shutdown.clone());
        shutdown.cancel();
        handle.join().unwrap();
    }

    #[test]
    fn round_timer_cancels_after_budget() {
        let round = CancelToken::new();
        let handle = spawn_round_timer(Duration::from_millis(5), round.clone());
        handle.join().unwrap();
        assert!(round.is_cancelled());
    }
}
