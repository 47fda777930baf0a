//! Deterministic differential-drive simulator.
//!
//! Implements the hardware traits against a small 2-D world of circular
//! obstacles inside a walled rectangle. `SimTicker` advances the physics by
//! exactly one control period per wait, so the motion loops run identically
//! from test to test with no wall-clock dependence.
//!
//! The world shares the tracker's axis convention: heading from +y toward
//! +x, forward direction `(sin θ, cos θ)`.

use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::control::Ticker;
use crate::hardware::{Carrier, ColorSensor, DriveMotors, RangeSensor, SensorLook};
use crate::pose::PoseTracker;

const RANGE_MAX: f32 = 255.0;

/// What a circular obstacle is made of, as far as the color sensor cares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObstacleKind {
    Target,
    Decoy,
    Block,
}

#[derive(Clone, Copy, Debug)]
struct Obstacle {
    x: f32,
    y: f32,
    radius: f32,
    kind: ObstacleKind,
}

struct SimState {
    x: f32,
    y: f32,
    heading: f32,
    speed_left: f32,
    speed_right: f32,
    tacho_left: f32,
    tacho_right: f32,
    obstacles: Vec<Obstacle>,
}

/// A walled rectangular arena with the robot and its obstacles.
pub struct SimWorld {
    width: f32,
    height: f32,
    wheel_radius: f32,
    track_width: f32,
    state: Mutex<SimState>,
}

impl SimWorld {
    pub fn new(width: f32, height: f32, wheel_radius: f32, track_width: f32) -> Arc<Self> {
        Arc::new(Self {
            width,
            height,
            wheel_radius,
            track_width,
            state: Mutex::new(SimState {
                x: 0.0,
                y: 0.0,
                heading: 0.0,
                speed_left: 0.0,
                speed_right: 0.0,
                tacho_left: 0.0,
                tacho_right: 0.0,
                obstacles: Vec::new(),
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_obstacle(&self, x: f32, y: f32, radius: f32, kind: ObstacleKind) {
        self.lock().obstacles.push(Obstacle { x, y, radius, kind });
    }

    /// Place the robot at a ground-truth pose.
    pub fn place_robot(&self, x: f32, y: f32, heading: f32) {
        let mut state = self.lock();
        state.x = x;
        state.y = y;
        state.heading = heading;
    }

    /// Ground-truth pose, for test assertions.
    pub fn true_pose(&self) -> (f32, f32, f32) {
        let state = self.lock();
        (state.x, state.y, state.heading)
    }

    /// Advance the physics by `dt` at the current wheel speeds.
    pub fn step(&self, dt: Duration) {
        let dt = dt.as_secs_f32();
        let mut state = self.lock();

        let deg_left = state.speed_left * dt;
        let deg_right = state.speed_right * dt;
        state.tacho_left += deg_left;
        state.tacho_right += deg_right;

        let dist_left = PI * self.wheel_radius * deg_left / 180.0;
        let dist_right = PI * self.wheel_radius * deg_right / 180.0;
        let delta_d = 0.5 * (dist_left + dist_right);
        let delta_t = (dist_left - dist_right) / self.track_width;

        state.heading = (state.heading + delta_t).rem_euclid(std::f32::consts::TAU);
        let heading = state.heading;
        state.x += delta_d * heading.sin();
        state.y += delta_d * heading.cos();
    }

    /// The kind of the nearest obstacle within `reach` of the robot, if any.
    pub fn kind_within(&self, reach: f32) -> Option<ObstacleKind> {
        let state = self.lock();
        state
            .obstacles
            .iter()
            .map(|o| {
                let d = ((o.x - state.x).powi(2) + (o.y - state.y).powi(2)).sqrt() - o.radius;
                (d, o.kind)
            })
            .filter(|&(d, _)| d <= reach)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, kind)| kind)
    }

    /// Remove the nearest obstacle within `reach` of the robot. Returns its
    /// kind when something was removed.
    pub fn take_within(&self, reach: f32) -> Option<ObstacleKind> {
        let mut state = self.lock();
        let (rx, ry) = (state.x, state.y);
        let best = state
            .obstacles
            .iter()
            .enumerate()
            .map(|(i, o)| {
                let d = ((o.x - rx).powi(2) + (o.y - ry).powi(2)).sqrt() - o.radius;
                (i, d)
            })
            .filter(|&(_, d)| d <= reach)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        best.map(|(i, _)| state.obstacles.remove(i).kind)
    }

    /// Cast a ray from the robot and return the distance to the first
    /// obstacle or wall.
    fn ray_distance(&self, state: &SimState, angle: f32) -> f32 {
        let dir_x = angle.sin();
        let dir_y = angle.cos();
        let mut best = RANGE_MAX;

        // Arena walls.
        if dir_x > 1e-6 {
            best = best.min((self.width - state.x) / dir_x);
        } else if dir_x < -1e-6 {
            best = best.min(-state.x / dir_x);
        }
        if dir_y > 1e-6 {
            best = best.min((self.height - state.y) / dir_y);
        } else if dir_y < -1e-6 {
            best = best.min(-state.y / dir_y);
        }

        // Circular obstacles.
        for o in &state.obstacles {
            let cx = o.x - state.x;
            let cy = o.y - state.y;
            let along = cx * dir_x + cy * dir_y;
            let disc = along * along - (cx * cx + cy * cy - o.radius * o.radius);
            if disc >= 0.0 {
                let t = along - disc.sqrt();
                if t > 0.0 {
                    best = best.min(t);
                }
            }
        }

        best.max(0.0)
    }
}

impl DriveMotors for SimWorld {
    fn set_speeds(&self, left: f32, right: f32) {
        let mut state = self.lock();
        state.speed_left = left;
        state.speed_right = right;
    }

    fn stop(&self) {
        self.set_speeds(0.0, 0.0);
    }

    fn tacho_degrees(&self) -> (f32, f32) {
        let state = self.lock();
        (state.tacho_left, state.tacho_right)
    }
}

impl RangeSensor for SimWorld {
    fn sample(&self, look: SensorLook) -> f32 {
        let state = self.lock();
        let angle = match look {
            SensorLook::Forward => state.heading,
            SensorLook::Left => state.heading - FRAC_PI_2,
            SensorLook::Right => state.heading + FRAC_PI_2,
        };
        self.ray_distance(&state, angle)
    }
}

/// Color sensing against the simulated world: reads the kind of whatever
/// sits within sensing reach of the robot.
pub struct SimColorSensor {
    world: Arc<SimWorld>,
    reach: f32,
}

impl SimColorSensor {
    pub fn new(world: Arc<SimWorld>, reach: f32) -> Self {
        Self { world, reach }
    }
}

impl ColorSensor for SimColorSensor {
    fn sample(&self) -> [f32; 3] {
        match self.world.kind_within(self.reach) {
            Some(ObstacleKind::Target) => [0.10, 0.35, 0.08],
            Some(ObstacleKind::Decoy) | Some(ObstacleKind::Block) => [0.35, 0.10, 0.08],
            None => [0.01, 0.01, 0.01],
        }
    }
}

/// Simulated carrier: grabbing removes the nearest target-sized obstacle
/// from the world and holds it until dropped.
pub struct SimCarrier {
    world: Arc<SimWorld>,
    reach: f32,
    capacity: u32,
    held: Mutex<u32>,
}

impl SimCarrier {
    pub fn new(world: Arc<SimWorld>, reach: f32, capacity: u32) -> Self {
        Self {
            world,
            reach,
            capacity,
            held: Mutex::new(0),
        }
    }

    fn held(&self) -> u32 {
        match self.held.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Carrier for SimCarrier {
    fn grab(&self) {
        if self.world.take_within(self.reach).is_some() {
            let mut held = match self.held.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *held += 1;
        }
    }

    fn drop_all(&self) {
        let mut held = match self.held.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *held = 0;
    }

    fn is_empty(&self) -> bool {
        self.held() == 0
    }

    fn is_full(&self) -> bool {
        self.held() >= self.capacity
    }
}

/// Ticker that advances the simulation one control period per wait and
/// refreshes the pose tracker, instead of sleeping.
pub struct SimTicker {
    world: Arc<SimWorld>,
    tracker: Arc<PoseTracker>,
    period: Duration,
}

impl SimTicker {
    pub fn new(world: Arc<SimWorld>, tracker: Arc<PoseTracker>, period: Duration) -> Self {
        Self {
            world,
            tracker,
            period,
        }
    }
}

impl Ticker for SimTicker {
    fn wait(&self) {
        self.world.step(self.period);
        self.tracker.update();
    }

    fn period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const WHEEL: f32 = 2.1;
    const TRACK: f32 = 15.8;

    #[test]
    fn equal_speeds_drive_straight() {
        let world = SimWorld::new(120.0, 120.0, WHEEL, TRACK);
        world.place_robot(60.0, 10.0, 0.0);
        world.set_speeds(180.0, 180.0);
        for _ in 0..40 {
            world.step(Duration::from_millis(25));
        }
        let (x, y, heading) = world.true_pose();
        assert_relative_eq!(x, 60.0, epsilon = 1e-3);
        assert_relative_eq!(heading, 0.0, epsilon = 1e-4);
        // One second at 180 deg/s rolls π·r cm.
        assert_relative_eq!(y, 10.0 + PI * WHEEL, epsilon = 1e-2);
    }

    #[test]
    fn range_sees_obstacle_before_wall() {
        let world = SimWorld::new(200.0, 200.0, WHEEL, TRACK);
        world.place_robot(100.0, 20.0, 0.0);
        world.add_obstacle(100.0, 70.0, 5.0, ObstacleKind::Block);
        let forward = world.sample(SensorLook::Forward);
        assert_relative_eq!(forward, 45.0, epsilon = 1e-2);
        // Sideways the ray misses it and runs to the wall.
        assert_relative_eq!(world.sample(SensorLook::Right), 100.0, epsilon = 1e-2);
        assert_relative_eq!(world.sample(SensorLook::Left), 100.0, epsilon = 1e-2);
    }

    #[test]
    fn carrier_removes_target_from_world() {
        let world = SimWorld::new(100.0, 100.0, WHEEL, TRACK);
        world.place_robot(50.0, 50.0, 0.0);
        world.add_obstacle(50.0, 58.0, 2.0, ObstacleKind::Target);
        let carrier = SimCarrier::new(world.clone(), 15.0, 1);

        assert!(carrier.is_empty());
        carrier.grab();
        assert!(carrier.is_full());
        assert!(world.kind_within(15.0).is_none());

        carrier.drop_all();
        assert!(carrier.is_empty());
    }
}
