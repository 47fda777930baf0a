//! KshetraNav - coverage and retrieval core for an arena robot.
//!
//! The binary runs a full simulated round: it builds the arena world,
//! computes the coverage plan, sweeps the regions hunting for targets, and
//! finishes with the end-of-round deposit when the budget watchdog fires.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use kshetra_nav::config::NavConfig;
use kshetra_nav::control::CancelToken;
use kshetra_nav::error::Result;
use kshetra_nav::hardware::Carrier;
use kshetra_nav::planner::CoveragePlanner;
use kshetra_nav::pose::PoseTracker;
use kshetra_nav::sim::{ObstacleKind, SimCarrier, SimColorSensor, SimTicker, SimWorld};
use kshetra_nav::steering::{AvoidanceMode, SteeringConfig, SteeringController};
use kshetra_nav::threads::{spawn_pose_thread, spawn_round_timer};
use kshetra_nav::ArenaGrid;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("kshetra_nav=info".parse().unwrap()),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let config = if args.len() > 1 {
        let config_path = Path::new(&args[1]);
        info!("Loading configuration from {:?}", config_path);
        NavConfig::load(config_path)?
    } else if Path::new("kshetra.toml").exists() {
        info!("Loading configuration from kshetra.toml");
        NavConfig::load(Path::new("kshetra.toml"))?
    } else {
        info!("Using default configuration");
        NavConfig::default()
    };

    info!("KshetraNav v{}", env!("CARGO_PKG_VERSION"));

    // Simulated arena sized to the configured grid.
    let grid = ArenaGrid::from_nav(&config);
    let arena_side = grid.region_size() * grid.cols as f32;
    let world = SimWorld::new(
        arena_side,
        grid.region_size() * grid.rows as f32,
        config.robot.wheel_radius,
        config.robot.track_width,
    );

    // Start at the center of the configured starting region.
    let start = grid.center(config.round.starting_region);
    world.place_robot(start.x, start.y, 0.0);

    // A round's worth of props: one target, one decoy, one dumb obstacle.
    let target_at = grid.center(1);
    let decoy_at = grid.center(5);
    let block_at = grid.center(6);
    world.add_obstacle(target_at.x, target_at.y, 2.0, ObstacleKind::Target);
    world.add_obstacle(decoy_at.x, decoy_at.y, 2.0, ObstacleKind::Decoy);
    world.add_obstacle(block_at.x, block_at.y, 6.0, ObstacleKind::Block);

    let tracker = Arc::new(PoseTracker::new(
        world.clone(),
        config.robot.wheel_radius,
        config.robot.track_width,
    ));
    tracker.set_pose(
        kshetra_nav::Pose::new(start.x, start.y, 0.0),
        kshetra_nav::PoseMask::ALL,
    );

    let ticker = Arc::new(SimTicker::new(
        world.clone(),
        tracker.clone(),
        Duration::from_millis(config.control.tick_ms),
    ));
    let color = Arc::new(SimColorSensor::new(world.clone(), 12.0));
    let carrier = Arc::new(SimCarrier::new(world.clone(), 15.0, 1));

    let shutdown = CancelToken::new();
    let round = CancelToken::new();

    let pose_handle = spawn_pose_thread(
        tracker.clone(),
        Duration::from_millis(config.control.pose_period_ms),
        shutdown.clone(),
    );
    spawn_round_timer(Duration::from_secs(config.round.budget_secs), round.clone());

    let planner = CoveragePlanner::new(
        tracker.clone(),
        world.clone(),
        world.clone(),
        color,
        carrier.clone(),
        ticker.clone(),
        round.clone(),
        &config,
    )?;
    info!("visit order: {:?}", planner.visit_order());

    planner.search();

    // End-of-round deposit runs on a fresh token so it still works after
    // the watchdog has cancelled the round.
    if !carrier.is_empty() {
        info!("finalizing: depositing carried targets");
        let steering = SteeringController::new(
            tracker.clone(),
            world.clone(),
            world.clone(),
            ticker,
            CancelToken::new(),
            SteeringConfig::from_nav(&config),
        );
        if steering.travel_to(planner.goal_center(), AvoidanceMode::Ignore) {
            carrier.drop_all();
            info!("finalization deposit complete");
        }
    }

    shutdown.cancel();
    pose_handle
        .join()
        .map_err(|_| kshetra_nav::NavError::Hardware("pose thread panicked".into()))?;

    let pose = tracker.pose();
    info!(
        "round over at ({:.1}, {:.1}), carrier empty: {}",
        pose.x,
        pose.y,
        carrier.is_empty()
    );
    Ok(())
}
