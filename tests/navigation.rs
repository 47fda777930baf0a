//! Simulated end-to-end motion tests: turning, travelling, interruption,
//! detours, and a whole scan-and-retrieve round.

use std::f32::consts::{FRAC_PI_2, PI};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;

use kshetra_nav::config::NavConfig;
use kshetra_nav::control::{CancelToken, Ticker};
use kshetra_nav::detour::{DetourController, DetourOutcome, DetourParams};
use kshetra_nav::hardware::{Carrier, DriveMotors};
use kshetra_nav::planner::CoveragePlanner;
use kshetra_nav::pose::{Point, Pose, PoseMask, PoseTracker};
use kshetra_nav::sim::{ObstacleKind, SimCarrier, SimColorSensor, SimTicker, SimWorld};
use kshetra_nav::steering::{
    AvoidanceMode, Leg, PickupOutcome, QuickPickup, SteeringConfig, SteeringController,
};
use kshetra_nav::utils::min_turn_angle;

const TICK: Duration = Duration::from_millis(25);

struct Rig {
    world: Arc<SimWorld>,
    tracker: Arc<PoseTracker>,
    ticker: Arc<SimTicker>,
    cancel: CancelToken,
    config: NavConfig,
}

impl Rig {
    fn new(width: f32, height: f32) -> Self {
        let config = NavConfig::default();
        let world = SimWorld::new(
            width,
            height,
            config.robot.wheel_radius,
            config.robot.track_width,
        );
        let tracker = Arc::new(PoseTracker::new(
            world.clone(),
            config.robot.wheel_radius,
            config.robot.track_width,
        ));
        let ticker = Arc::new(SimTicker::new(world.clone(), tracker.clone(), TICK));
        Self {
            world,
            tracker,
            ticker,
            cancel: CancelToken::new(),
            config,
        }
    }

    fn place(&self, x: f32, y: f32, heading: f32) {
        self.world.place_robot(x, y, heading);
        self.tracker.set_pose(Pose::new(x, y, heading), PoseMask::ALL);
    }

    fn steering(&self) -> SteeringController {
        SteeringController::new(
            self.tracker.clone(),
            self.world.clone(),
            self.world.clone(),
            self.ticker.clone(),
            self.cancel.clone(),
            SteeringConfig::from_nav(&self.config),
        )
    }

    fn detour(&self) -> DetourController {
        DetourController::new(
            self.world.clone(),
            self.world.clone(),
            self.ticker.clone(),
            self.cancel.clone(),
            DetourParams::from_nav(&self.config),
        )
    }

    /// The motors are stopped iff stepping the world leaves the tachos alone.
    fn assert_motors_stopped(&self) {
        let before = self.world.tacho_degrees();
        self.world.step(TICK);
        assert_eq!(self.world.tacho_degrees(), before, "motors still running");
    }
}

#[test]
fn turn_to_converges_within_tolerance() {
    let rig = Rig::new(200.0, 200.0);
    rig.place(100.0, 100.0, 0.0);
    let steering = rig.steering();

    assert!(steering.turn_to(FRAC_PI_2));
    let heading = rig.tracker.pose().heading;
    assert!(
        min_turn_angle(FRAC_PI_2, heading).abs() <= rig.config.control.angle_tolerance_rad,
        "ended at {heading} rad"
    );
    rig.assert_motors_stopped();
}

#[test]
fn turn_crossing_zero_takes_the_short_way() {
    let rig = Rig::new(200.0, 200.0);
    rig.place(100.0, 100.0, 350.0_f32.to_radians());
    let steering = rig.steering();

    assert!(steering.turn_to(10.0_f32.to_radians()));

    let heading = rig.tracker.pose().heading;
    assert!(
        min_turn_angle(10.0_f32.to_radians(), heading).abs()
            <= rig.config.control.angle_tolerance_rad
    );
    // A +20° rotation drives the left wheel forward; the long way around
    // would have driven it backward.
    let (left, right) = rig.world.tacho_degrees();
    assert!(left > 0.0 && right < 0.0, "turned the long way around");
}

#[test]
fn travel_within_tolerance_commands_no_motion() {
    let rig = Rig::new(200.0, 200.0);
    rig.place(100.0, 100.0, 0.0);
    let steering = rig.steering();

    assert!(steering.travel_to(Point::new(100.5, 100.0), AvoidanceMode::Ignore));
    assert_eq!(rig.world.tacho_degrees(), (0.0, 0.0));
}

#[test]
fn travel_reaches_an_unobstructed_target() {
    let rig = Rig::new(200.0, 300.0);
    rig.place(100.0, 30.0, 0.0);
    let steering = rig.steering();

    let target = Point::new(100.0, 200.0);
    assert!(steering.travel_to(target, AvoidanceMode::Ignore));

    let pose = rig.tracker.pose();
    assert!(pose.distance_to(target) <= rig.config.control.distance_tolerance + 0.2);
    let (x, y, _) = rig.world.true_pose();
    assert_relative_eq!(x, 100.0, epsilon = 1.0);
    assert_relative_eq!(y, 200.0, epsilon = 3.0);
    rig.assert_motors_stopped();
}

/// Ticker that fires the cancel token after a fixed number of waits.
struct CancelAfter {
    inner: Arc<SimTicker>,
    cancel: CancelToken,
    remaining: AtomicU32,
}

impl Ticker for CancelAfter {
    fn wait(&self) {
        self.inner.wait();
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.cancel.cancel();
        }
    }

    fn period(&self) -> Duration {
        self.inner.period()
    }
}

#[test]
fn interrupt_stops_the_motors_mid_leg() {
    let rig = Rig::new(200.0, 400.0);
    rig.place(100.0, 30.0, 0.0);

    let ticker = Arc::new(CancelAfter {
        inner: rig.ticker.clone(),
        cancel: rig.cancel.clone(),
        remaining: AtomicU32::new(40),
    });
    let steering = SteeringController::new(
        rig.tracker.clone(),
        rig.world.clone(),
        rig.world.clone(),
        ticker,
        rig.cancel.clone(),
        SteeringConfig::from_nav(&rig.config),
    );

    assert!(!steering.travel_to(Point::new(100.0, 350.0), AvoidanceMode::Ignore));
    let (_, y, _) = rig.world.true_pose();
    assert!(y < 100.0, "should have stopped far short of the target");
    rig.assert_motors_stopped();
}

#[test]
fn detour_skirts_a_blocking_obstacle() {
    let rig = Rig::new(365.76, 365.76);
    rig.place(45.0, 57.0, 0.0);
    rig.world.add_obstacle(45.0, 80.0, 6.0, ObstacleKind::Block);

    let steering = rig.steering();
    let detour = rig.detour();
    let leg = Leg {
        start: Pose::new(45.0, 57.0, 0.0),
        target: Point::new(45.0, 200.0),
    };

    let outcome = detour.execute(&steering, &leg);
    assert_eq!(outcome, DetourOutcome::Resume);

    // More clearance to the right, so the detour went right of the leg
    // line and made headway past the obstacle.
    let (x, y, _) = rig.world.true_pose();
    assert!(x > 45.0, "expected a rightward detour, at x {x}");
    assert!(y > 65.0, "no forward progress, at y {y}");
    rig.assert_motors_stopped();
}

#[test]
fn ignore_mode_drives_through_a_blocked_leg() {
    let rig = Rig::new(200.0, 300.0);
    rig.place(45.0, 20.0, 0.0);
    rig.world.add_obstacle(45.0, 60.0, 2.0, ObstacleKind::Block);
    let steering = rig.steering();

    let target = Point::new(45.0, 120.0);
    assert!(steering.travel_to(target, AvoidanceMode::Ignore));
    assert!(rig.tracker.pose().distance_to(target) <= rig.config.control.distance_tolerance + 0.2);
}

/// Ticker that counts how many control periods were consumed.
struct TickCounter {
    inner: Arc<SimTicker>,
    count: AtomicU32,
}

impl Ticker for TickCounter {
    fn wait(&self) {
        self.inner.wait();
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn period(&self) -> Duration {
        self.inner.period()
    }
}

#[test]
fn detour_gives_up_at_the_duration_ceiling() {
    let rig = Rig::new(365.76, 365.76);
    rig.place(45.0, 57.0, 0.0);
    rig.world.add_obstacle(45.0, 80.0, 6.0, ObstacleKind::Block);

    let ticker = Arc::new(TickCounter {
        inner: rig.ticker.clone(),
        count: AtomicU32::new(0),
    });
    let steering = SteeringController::new(
        rig.tracker.clone(),
        rig.world.clone(),
        rig.world.clone(),
        ticker.clone(),
        rig.cancel.clone(),
        SteeringConfig::from_nav(&rig.config),
    );

    // Push the deviation and turnaround exits out of reach so only the
    // duration ceiling can end the follow.
    let mut params = DetourParams::from_nav(&rig.config);
    params.deviation_started = f32::MAX;
    params.turnaround_rad = f32::MAX;
    params.max_duration_secs = 1.0;
    let detour = DetourController::new(
        rig.world.clone(),
        rig.world.clone(),
        ticker.clone(),
        rig.cancel.clone(),
        params,
    );

    let leg = Leg {
        start: Pose::new(45.0, 57.0, 0.0),
        target: Point::new(45.0, 200.0),
    };
    let outcome = detour.execute(&steering, &leg);

    // A one-second ceiling is 40 follow ticks; the rest is the 90° pivot.
    let ticks = ticker.count.load(Ordering::Relaxed);
    assert!(ticks <= 40 + 220, "follow ran {ticks} ticks past the ceiling");
    // One second of wall-following sideways never gets closer to the target.
    assert_eq!(outcome, DetourOutcome::Abandon);
    rig.assert_motors_stopped();
}

/// Mid-leg pickup that always grabs whatever is blocking.
struct GrabAnything {
    carrier: Arc<SimCarrier>,
    standoff: f32,
    backup: f32,
}

impl QuickPickup for GrabAnything {
    fn try_pickup(&self, steering: &SteeringController, distance: f32) -> PickupOutcome {
        if !steering.go_forward((distance - self.standoff).max(0.0)) {
            return PickupOutcome::NotTarget;
        }
        self.carrier.grab();
        if !steering.go_forward(-self.backup) {
            return PickupOutcome::NotTarget;
        }
        PickupOutcome::Collected
    }
}

#[test]
fn pickup_avoidance_clears_the_leg_and_continues() {
    let rig = Rig::new(200.0, 300.0);
    rig.place(45.0, 20.0, 0.0);
    rig.world.add_obstacle(45.0, 60.0, 2.0, ObstacleKind::Target);
    let carrier = Arc::new(SimCarrier::new(rig.world.clone(), 15.0, 1));

    let steering = rig.steering();
    let detour = rig.detour();
    let pickup = GrabAnything {
        carrier: carrier.clone(),
        standoff: 5.0,
        backup: 10.0,
    };

    let target = Point::new(45.0, 120.0);
    assert!(steering.travel_to(target, AvoidanceMode::PickupThenDetour(&detour, &pickup)));

    assert!(carrier.is_full());
    assert!(rig.world.kind_within(1000.0).is_none(), "object still in world");
    assert!(rig.tracker.pose().distance_to(target) <= rig.config.control.distance_tolerance + 0.2);
}

#[test]
fn full_round_collects_and_deposits_a_target() {
    // Two-region arena: start in region 0, goal zone inside region 1.
    let mut config = NavConfig::default();
    config.planner.cols = 2;
    config.planner.rows = 1;
    config.round.green_zone = [4, 1, 5, 2];
    config.round.red_zone = [0, 0, 0, 0];
    config.round.starting_region = 0;

    let world = SimWorld::new(
        182.88,
        91.44,
        config.robot.wheel_radius,
        config.robot.track_width,
    );
    let tracker = Arc::new(PoseTracker::new(
        world.clone(),
        config.robot.wheel_radius,
        config.robot.track_width,
    ));
    let ticker = Arc::new(SimTicker::new(world.clone(), tracker.clone(), TICK));
    let color = Arc::new(SimColorSensor::new(world.clone(), 12.0));
    let carrier = Arc::new(SimCarrier::new(world.clone(), 20.0, 1));
    let cancel = CancelToken::new();

    world.place_robot(45.72, 45.72, 0.0);
    tracker.set_pose(Pose::new(45.72, 45.72, 0.0), PoseMask::ALL);

    // One target just off region 0's upper vantage point, inside the arc
    // the sweep covers when arriving from the lower vantage.
    let vantage = Point::new(68.58, 68.58);
    let bearing = 2.0_f32;
    world.add_obstacle(
        vantage.x + 12.0 * bearing.sin(),
        vantage.y + 12.0 * bearing.cos(),
        2.0,
        ObstacleKind::Target,
    );

    let planner = CoveragePlanner::new(
        tracker.clone(),
        world.clone(),
        world.clone(),
        color,
        carrier.clone(),
        ticker,
        cancel,
        &config,
    )
    .expect("valid round configuration");
    assert_eq!(planner.visit_order(), &[0, 1]);

    planner.search();

    assert!(world.kind_within(1000.0).is_none(), "target never collected");
    assert!(carrier.is_empty(), "carrier never deposited");
}

#[test]
fn detour_abandons_when_it_ends_up_farther_away() {
    let rig = Rig::new(365.76, 365.76);
    rig.place(45.0, 57.0, 0.0);
    rig.world.add_obstacle(45.0, 80.0, 6.0, ObstacleKind::Block);

    let steering = rig.steering();
    let detour = rig.detour();
    // Target just behind the robot: any detour motion moves away from it.
    let leg = Leg {
        start: Pose::new(45.0, 57.0, 0.0),
        target: Point::new(45.0, 55.0),
    };

    assert_eq!(detour.execute(&steering, &leg), DetourOutcome::Abandon);
    rig.assert_motors_stopped();
}

#[test]
fn sweep_heading_math_survives_the_pi_crossing() {
    // Guards the convention used by the sweep and detour accumulators.
    let delta = kshetra_nav::utils::heading_delta(0.1, std::f32::consts::TAU - 0.1);
    assert_relative_eq!(delta, -0.2, epsilon = 1e-5);
    let delta = kshetra_nav::utils::heading_delta(PI - 0.05, PI + 0.05);
    assert_relative_eq!(delta, 0.1, epsilon = 1e-5);
}
