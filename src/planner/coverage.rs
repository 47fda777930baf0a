//! Region coverage: visit ordering and the scan/detect/retrieve cycle.

use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::{NavConfig, Role};
use crate::control::{CancelToken, Ticker};
use crate::detour::{DetourController, DetourParams};
use crate::error::{NavError, Result};
use crate::hardware::{Carrier, ColorSensor, DriveMotors, RangeSensor, SensorLook};
use crate::pose::{Point, PoseTracker};
use crate::steering::{
    AvoidanceMode, PickupOutcome, QuickPickup, SteeringConfig, SteeringController,
};
use crate::utils::{heading_delta, min_turn_angle, normalize_heading};

use super::graph::AdjacencyGraph;
use super::regions::{ArenaGrid, RegionId, Zone};

/// Debounce filter over range samples. Fires exactly once when the
/// qualifying streak reaches the required length, then re-arms.
#[derive(Debug)]
pub struct DetectionFilter {
    required: u32,
    streak: u32,
}

impl DetectionFilter {
    pub fn new(required: u32) -> Self {
        Self {
            required: required.max(1),
            streak: 0,
        }
    }

    /// Feed one sample; `true` exactly on the sample that completes the
    /// streak.
    pub fn offer(&mut self, qualifying: bool) -> bool {
        if !qualifying {
            self.streak = 0;
            return false;
        }
        self.streak += 1;
        if self.streak == self.required {
            self.streak = 0;
            true
        } else {
            false
        }
    }
}

/// An angular sector around a heading where detection is suppressed,
/// recorded after a decoy or false positive.
#[derive(Clone, Copy, Debug)]
struct Exclusion {
    heading: f32,
    margin: f32,
}

impl Exclusion {
    fn contains(&self, heading: f32) -> bool {
        min_turn_angle(self.heading, heading).abs() <= self.margin
    }
}

/// What a color probe says about the object in front of the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Target,
    Decoy,
    Floor,
}

/// Threshold classification on the raw tri-channel reading. Dim readings
/// are floor; among bright ones the first-to-second channel ratio separates
/// target rings from decoys.
pub fn classify(sample: [f32; 3], floor_brightness: f32, target_hue_ratio: f32) -> Classification {
    let brightness = (sample[0] + sample[1] + sample[2]) / 3.0;
    if brightness < floor_brightness {
        Classification::Floor
    } else if sample[1] > sample[0] * target_hue_ratio {
        Classification::Target
    } else {
        Classification::Decoy
    }
}

/// Center-out probe headings: 0, then alternating ± steps out to the cone
/// edges.
fn probe_offsets(count: u32, cone: f32) -> Vec<f32> {
    if count <= 1 {
        return vec![0.0];
    }
    let step = cone / (count - 1) as f32;
    let mut offsets = vec![0.0];
    let mut k = 1;
    while offsets.len() < count as usize {
        offsets.push(step * k as f32);
        if offsets.len() < count as usize {
            offsets.push(-step * k as f32);
        }
        k += 1;
    }
    offsets
}

/// Scan parameters, extracted from the main configuration.
#[derive(Clone, Debug)]
struct ScanParams {
    detection_distance: f32,
    detection_count: u32,
    sweep_rad: f32,
    sweep_speed: f32,
    probe_count: u32,
    probe_cone_rad: f32,
    decoy_margin_rad: f32,
    false_positive_margin_rad: f32,
    approach_standoff: f32,
    backup_distance: f32,
    floor_brightness: f32,
    target_hue_ratio: f32,
    vantage_inset: f32,
    range_cap: f32,
}

impl ScanParams {
    fn from_nav(config: &NavConfig) -> Self {
        Self {
            detection_distance: config.scan.detection_distance,
            detection_count: config.scan.detection_count,
            sweep_rad: config.scan.sweep_rad,
            sweep_speed: config.scan.sweep_speed,
            probe_count: config.scan.probe_count,
            probe_cone_rad: config.scan.probe_cone_rad,
            decoy_margin_rad: config.scan.decoy_margin_rad,
            false_positive_margin_rad: config.scan.false_positive_margin_rad,
            approach_standoff: config.scan.approach_standoff,
            backup_distance: config.scan.backup_distance,
            floor_brightness: config.scan.floor_brightness,
            target_hue_ratio: config.scan.target_hue_ratio,
            vantage_inset: config.scan.vantage_inset,
            range_cap: config.control.range_cap,
        }
    }
}

/// Drives the whole round: computes the region visit order once, then scans
/// region by region, identifying and retrieving targets along the way.
pub struct CoveragePlanner {
    pose: Arc<PoseTracker>,
    drive: Arc<dyn DriveMotors>,
    range: Arc<dyn RangeSensor>,
    color: Arc<dyn ColorSensor>,
    carrier: Arc<dyn Carrier>,
    ticker: Arc<dyn Ticker>,
    cancel: CancelToken,
    steering: SteeringController,
    detour: DetourController,
    params: ScanParams,
    grid: ArenaGrid,
    graph: AdjacencyGraph,
    goal_regions: Vec<RegionId>,
    forbidden_regions: Vec<RegionId>,
    goal_center: Point,
    visit_order: Vec<RegionId>,
    exclusions: Mutex<Vec<Exclusion>>,
    goal_locked: AtomicBool,
}

impl CoveragePlanner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pose: Arc<PoseTracker>,
        drive: Arc<dyn DriveMotors>,
        range: Arc<dyn RangeSensor>,
        color: Arc<dyn ColorSensor>,
        carrier: Arc<dyn Carrier>,
        ticker: Arc<dyn Ticker>,
        cancel: CancelToken,
        config: &NavConfig,
    ) -> Result<Self> {
        let grid = ArenaGrid::from_nav(config);

        let green = Zone::from_corners(config.round.green_zone);
        let red = Zone::from_corners(config.round.red_zone);
        let (goal_zone, forbidden_zone) = match config.round.role {
            Role::Builder => (green, red),
            Role::Collector => (red, green),
        };
        let goal_regions = goal_zone.regions(&grid);
        let forbidden_regions = forbidden_zone.regions(&grid);
        let goal_center = goal_zone.center(&grid);

        if goal_regions.is_empty() {
            return Err(NavError::Planning("goal zone covers no region".into()));
        }
        let start = config.round.starting_region;
        if start >= grid.region_count() {
            return Err(NavError::Planning(format!(
                "starting region {} outside {}-region grid",
                start,
                grid.region_count()
            )));
        }
        if forbidden_regions.contains(&start) {
            return Err(NavError::Planning(format!(
                "starting region {start} lies in the forbidden zone"
            )));
        }

        let graph = AdjacencyGraph::build(&grid, &forbidden_regions, config.planner.allow_diagonals);
        let visit_order =
            compute_visit_order(&graph, &grid, start, &goal_regions, &forbidden_regions);
        tracing::info!(?visit_order, "coverage plan ready");

        let steering = SteeringController::new(
            pose.clone(),
            drive.clone(),
            range.clone(),
            ticker.clone(),
            cancel.clone(),
            SteeringConfig::from_nav(config),
        );
        let detour = DetourController::new(
            drive.clone(),
            range.clone(),
            ticker.clone(),
            cancel.clone(),
            DetourParams::from_nav(config),
        );

        Ok(Self {
            pose,
            drive,
            range,
            color,
            carrier,
            ticker,
            cancel,
            steering,
            detour,
            params: ScanParams::from_nav(config),
            grid,
            graph,
            goal_regions,
            forbidden_regions,
            goal_center,
            visit_order,
            exclusions: Mutex::new(Vec::new()),
            goal_locked: AtomicBool::new(false),
        })
    }

    pub fn visit_order(&self) -> &[RegionId] {
        &self.visit_order
    }

    pub fn graph(&self) -> &AdjacencyGraph {
        &self.graph
    }

    pub fn goal_center(&self) -> Point {
        self.goal_center
    }

    pub fn interrupt(&self) {
        self.cancel.cancel();
    }

    /// Scan every permitted region in visit order. Returns when the plan is
    /// exhausted or the round is interrupted.
    pub fn search(&self) {
        for &region in &self.visit_order {
            if self.cancel.is_cancelled() {
                tracing::info!("search interrupted before region {region}");
                break;
            }
            if self.forbidden_regions.contains(&region) {
                continue;
            }
            if self.goal_regions.contains(&region) && self.goal_locked.load(Ordering::Acquire) {
                tracing::debug!("skipping goal region {region}, re-entry locked");
                continue;
            }
            self.scan_region(region);
        }
        self.drive.stop();
        tracing::info!("coverage pass finished");
    }

    /// Visit both diagonal vantage points of a region and sweep from each.
    fn scan_region(&self, region: RegionId) {
        tracing::info!("scanning region {region}");
        let (low, high) = self.grid.vantage_points(region, self.params.vantage_inset);
        for vantage in [low, high] {
            if self.cancel.is_cancelled() {
                return;
            }
            let avoidance = AvoidanceMode::PickupThenDetour(&self.detour, self);
            if !self.steering.travel_to(vantage, avoidance) {
                // Obstructed or interrupted; the other vantage may still work.
                continue;
            }
            self.sweep();
        }
    }

    /// Rotate in place through the sweep arc, polling the forward range
    /// sensor through the debounce filter. Detections outside excluded
    /// sectors pause the sweep for `check_object`.
    fn sweep(&self) {
        let mut filter = DetectionFilter::new(self.params.detection_count);
        let mut prev_heading = self.pose.pose().heading;
        let mut swept: f32 = 0.0;

        loop {
            if self.cancel.is_cancelled() {
                self.drive.stop();
                return;
            }

            let pose = self.pose.pose();
            swept += heading_delta(prev_heading, pose.heading);
            prev_heading = pose.heading;
            if swept.abs() >= self.params.sweep_rad {
                break;
            }

            let distance = self
                .range
                .sample(SensorLook::Forward)
                .min(self.params.range_cap);
            let qualifying =
                distance < self.params.detection_distance && !self.is_excluded(pose.heading);

            if filter.offer(qualifying) {
                self.drive.stop();
                let latched = pose.heading;
                tracing::debug!(
                    "detection at heading {:.2} rad, {:.1}cm",
                    latched,
                    distance
                );
                self.check_object(latched, distance);
                if self.cancel.is_cancelled() {
                    return;
                }
                // Return to the latched heading and carry the sweep on.
                if !self.steering.turn_to(latched) {
                    return;
                }
                prev_heading = self.pose.pose().heading;
                continue;
            }

            let speed = self.params.sweep_speed;
            self.drive.set_speeds(speed, -speed);
            self.ticker.wait();
        }

        self.drive.stop();
    }

    /// Approach a detected object, probe across a cone, and act on the
    /// classification.
    fn check_object(&self, latched_heading: f32, distance: f32) {
        let advance = (distance - self.params.approach_standoff).max(0.0);
        if !self.steering.go_forward(advance) {
            return;
        }

        let mut found = None;
        for offset in probe_offsets(self.params.probe_count, self.params.probe_cone_rad) {
            if self.cancel.is_cancelled() {
                return;
            }
            if !self
                .steering
                .turn_to(normalize_heading(latched_heading + offset))
            {
                return;
            }
            match self.classify_here() {
                Classification::Floor => continue,
                hit => {
                    found = Some(hit);
                    break;
                }
            }
        }

        if !self.steering.go_forward(-self.params.backup_distance) {
            return;
        }

        match found {
            Some(Classification::Target) => self.collect(),
            Some(Classification::Decoy) => {
                tracing::debug!("decoy at heading {:.2} rad", latched_heading);
                self.exclude(latched_heading, self.params.decoy_margin_rad);
            }
            Some(Classification::Floor) | None => {
                tracing::debug!("false positive at heading {:.2} rad", latched_heading);
                self.exclude(latched_heading, self.params.false_positive_margin_rad);
            }
        }
    }

    /// Back into the target with the carrier and grab it; when the carrier
    /// fills up, lock the goal zone and deposit.
    fn collect(&self) {
        let reversed = normalize_heading(self.pose.pose().heading + PI);
        if !self.steering.turn_to(reversed) {
            return;
        }
        self.carrier.grab();
        tracing::info!("target collected");

        if self.carrier.is_full() {
            self.goal_locked.store(true, Ordering::Release);
            self.deposit();
        }
    }

    /// Travel to the goal-zone center and drop everything carried.
    fn deposit(&self) {
        tracing::info!("carrier full, heading to goal zone");
        if self
            .steering
            .travel_to(self.goal_center, AvoidanceMode::Detour(&self.detour))
        {
            self.carrier.drop_all();
            tracing::info!("deposit complete");
        } else {
            tracing::warn!("could not reach goal zone for deposit");
        }
    }

    fn classify_here(&self) -> Classification {
        classify(
            self.color.sample(),
            self.params.floor_brightness,
            self.params.target_hue_ratio,
        )
    }

    fn is_excluded(&self, heading: f32) -> bool {
        let exclusions = match self.exclusions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        exclusions.iter().any(|e| e.contains(heading))
    }

    fn exclude(&self, heading: f32, margin: f32) {
        let mut exclusions = match self.exclusions.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        exclusions.push(Exclusion { heading, margin });
    }
}

impl QuickPickup for CoveragePlanner {
    /// Single-approach identification when travel is blocked mid-leg: drive
    /// up to the object, classify once, grab it if it is a target.
    fn try_pickup(&self, steering: &SteeringController, distance: f32) -> PickupOutcome {
        let advance = (distance - self.params.approach_standoff).max(0.0);
        if !steering.go_forward(advance) {
            return PickupOutcome::NotTarget;
        }

        let hit = self.classify_here();
        if !steering.go_forward(-self.params.backup_distance) {
            return PickupOutcome::NotTarget;
        }

        match hit {
            Classification::Target => {
                self.collect();
                PickupOutcome::Collected
            }
            Classification::Decoy | Classification::Floor => PickupOutcome::NotTarget,
        }
    }
}

/// Visit order: the starting region, the BFS path to the nearest goal
/// region, then every remaining permitted region ranked by ascending BFS
/// distance from that goal region. Unreachable leftovers rank last; ties
/// keep discovery order.
pub fn compute_visit_order(
    graph: &AdjacencyGraph,
    grid: &ArenaGrid,
    start: RegionId,
    goal_regions: &[RegionId],
    forbidden_regions: &[RegionId],
) -> Vec<RegionId> {
    let mut order = vec![start];

    let mut best_path: Vec<RegionId> = Vec::new();
    for &goal in goal_regions {
        let path = graph.shortest_path(start, goal);
        if !path.is_empty() && (best_path.is_empty() || path.len() < best_path.len()) {
            best_path = path;
        }
    }
    let anchor = best_path.last().copied().unwrap_or(start);
    order.extend(best_path.iter().skip(1));

    let mut leftovers: Vec<RegionId> = (0..grid.region_count())
        .filter(|id| !forbidden_regions.contains(id) && !order.contains(id))
        .collect();
    // Stable sort keeps discovery order among equal distances; unreachable
    // regions sort after every reachable one.
    leftovers.sort_by_key(|&id| match graph.distance(anchor, id) {
        Some(d) => (0, d),
        None => (1, 0),
    });
    order.extend(leftovers);

    order
}
