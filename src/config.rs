//! Configuration loading for KshetraNav

use crate::error::{NavError, Result};
use serde::Deserialize;
use std::path::Path;

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
pub struct NavConfig {
    #[serde(default)]
    pub robot: RobotConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub detour: DetourConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub round: RoundConfig,
}

/// Robot physical parameters and drive speeds
#[derive(Clone, Debug, Deserialize)]
pub struct RobotConfig {
    /// Wheel radius in centimeters
    #[serde(default = "default_wheel_radius")]
    pub wheel_radius: f32,

    /// Distance between wheel contact points in centimeters
    #[serde(default = "default_track_width")]
    pub track_width: f32,

    /// Wheel speed while travelling, degrees per second
    #[serde(default = "default_travel_speed")]
    pub travel_speed: f32,

    /// Wheel speed while point-turning, degrees per second
    #[serde(default = "default_turn_speed")]
    pub turn_speed: f32,
}

/// Control loop timing and termination tolerances
#[derive(Clone, Debug, Deserialize)]
pub struct ControlConfig {
    /// Control tick period in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Pose tracker update period in milliseconds
    #[serde(default = "default_pose_period_ms")]
    pub pose_period_ms: u64,

    /// Heading error below which a turn is considered complete (radians)
    #[serde(default = "default_angle_tolerance")]
    pub angle_tolerance_rad: f32,

    /// Distance below which a travel target is considered reached (cm)
    #[serde(default = "default_distance_tolerance")]
    pub distance_tolerance: f32,

    /// Forward range below which a blocking obstacle triggers avoidance (cm)
    #[serde(default = "default_avoid_threshold")]
    pub avoid_threshold: f32,

    /// Range samples are clamped to this value to reject spurious readings (cm)
    #[serde(default = "default_range_cap")]
    pub range_cap: f32,
}

/// Wall-following detour parameters
#[derive(Clone, Debug, Deserialize)]
pub struct DetourConfig {
    /// Desired stand-off distance from the obstacle (cm)
    #[serde(default = "default_band_center")]
    pub band_center: f32,

    /// Dead band around the stand-off before a correction is applied (cm)
    #[serde(default = "default_bandwidth")]
    pub bandwidth: f32,

    /// Proportional gain applied to the stand-off error
    #[serde(default = "default_detour_kp")]
    pub kp: f32,

    /// Clamp on the wheel speed correction, degrees per second
    #[serde(default = "default_max_adjustment")]
    pub max_adjustment: f32,

    /// Nominal forward wheel speed while following, degrees per second
    #[serde(default = "default_detour_speed")]
    pub forward_speed: f32,

    /// Lateral deviation from the original leg that marks the detour as
    /// underway (cm)
    #[serde(default = "default_deviation_started")]
    pub deviation_started: f32,

    /// Lateral deviation below which the original leg is considered
    /// rejoined (cm)
    #[serde(default = "default_deviation_resumed")]
    pub deviation_resumed: f32,

    /// Accumulated heading change that indicates the obstacle has been
    /// rounded (radians)
    #[serde(default = "default_turnaround")]
    pub turnaround_rad: f32,

    /// Hard ceiling on a single detour (seconds)
    #[serde(default = "default_detour_max_duration")]
    pub max_duration_secs: f32,
}

/// Region scan and object identification parameters
#[derive(Clone, Debug, Deserialize)]
pub struct ScanConfig {
    /// Forward range below which a sweep sample counts toward detection (cm)
    #[serde(default = "default_detection_distance")]
    pub detection_distance: f32,

    /// Consecutive qualifying samples required before detection fires
    #[serde(default = "default_detection_count")]
    pub detection_count: u32,

    /// Total in-place rotation of one sweep (radians)
    #[serde(default = "default_sweep")]
    pub sweep_rad: f32,

    /// Wheel speed while sweeping, degrees per second
    #[serde(default = "default_sweep_speed")]
    pub sweep_speed: f32,

    /// Number of angular identification probes per detected object
    #[serde(default = "default_probe_count")]
    pub probe_count: u32,

    /// Angular cone the probes span, centered on the detection heading
    /// (radians)
    #[serde(default = "default_probe_cone")]
    pub probe_cone_rad: f32,

    /// Exclusion margin around a confirmed decoy heading (radians)
    #[serde(default = "default_decoy_margin")]
    pub decoy_margin_rad: f32,

    /// Exclusion margin around a false-positive heading (radians)
    #[serde(default = "default_false_positive_margin")]
    pub false_positive_margin_rad: f32,

    /// Stand-off kept from a detected object when approaching (cm)
    #[serde(default = "default_approach_standoff")]
    pub approach_standoff: f32,

    /// Distance backed up after identifying an object (cm)
    #[serde(default = "default_backup_distance")]
    pub backup_distance: f32,

    /// Combined channel brightness below which a sample reads as floor
    #[serde(default = "default_floor_brightness")]
    pub floor_brightness: f32,

    /// A sample is a target when channel 1 exceeds channel 0 times this ratio
    #[serde(default = "default_target_hue_ratio")]
    pub target_hue_ratio: f32,

    /// Vantage point inset from the region corner, as a fraction of the
    /// region size
    #[serde(default = "default_vantage_inset")]
    pub vantage_inset: f32,
}

/// Arena partition and adjacency parameters
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    /// Region columns
    #[serde(default = "default_cols")]
    pub cols: usize,

    /// Region rows
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Floor tile size in centimeters
    #[serde(default = "default_tile_size")]
    pub tile_size: f32,

    /// Tiles per region side
    #[serde(default = "default_tiles_per_region")]
    pub tiles_per_region: usize,

    /// Whether diagonally adjacent regions are connected in the visit graph
    #[serde(default = "default_allow_diagonals")]
    pub allow_diagonals: bool,
}

/// Robot role for the round. The role decides which configured zone is the
/// deposit goal and which is forbidden.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Builder,
    Collector,
}

/// Per-round parameters, supplied externally before planning
#[derive(Clone, Debug, Deserialize)]
pub struct RoundConfig {
    /// Green zone corners in tile coordinates: [x1, y1, x2, y2]
    #[serde(default = "default_green_zone")]
    pub green_zone: [i32; 4],

    /// Red zone corners in tile coordinates: [x1, y1, x2, y2]
    #[serde(default = "default_red_zone")]
    pub red_zone: [i32; 4],

    /// Region the robot starts in
    #[serde(default)]
    pub starting_region: usize,

    /// Robot role
    #[serde(default = "default_role")]
    pub role: Role,

    /// Round time budget in seconds; the finalization timer fires once when
    /// it elapses
    #[serde(default = "default_budget_secs")]
    pub budget_secs: u64,
}

// Default value functions
fn default_wheel_radius() -> f32 {
    2.1
}
fn default_track_width() -> f32 {
    15.8
}
fn default_travel_speed() -> f32 {
    150.0
}
fn default_turn_speed() -> f32 {
    75.0
}

fn default_tick_ms() -> u64 {
    25
}
fn default_pose_period_ms() -> u64 {
    25
}
fn default_angle_tolerance() -> f32 {
    3.0_f32.to_radians()
}
fn default_distance_tolerance() -> f32 {
    2.0
}
fn default_avoid_threshold() -> f32 {
    25.0
}
fn default_range_cap() -> f32 {
    100.0
}

fn default_band_center() -> f32 {
    22.0
}
fn default_bandwidth() -> f32 {
    8.0
}
fn default_detour_kp() -> f32 {
    8.0
}
fn default_max_adjustment() -> f32 {
    100.0
}
fn default_detour_speed() -> f32 {
    150.0
}
fn default_deviation_started() -> f32 {
    4.0
}
fn default_deviation_resumed() -> f32 {
    4.0
}
fn default_turnaround() -> f32 {
    std::f32::consts::PI
}
fn default_detour_max_duration() -> f32 {
    20.0
}

fn default_detection_distance() -> f32 {
    15.0
}
fn default_detection_count() -> u32 {
    10
}
fn default_sweep() -> f32 {
    std::f32::consts::PI
}
fn default_sweep_speed() -> f32 {
    60.0
}
fn default_probe_count() -> u32 {
    7
}
fn default_probe_cone() -> f32 {
    std::f32::consts::FRAC_PI_2
}
fn default_decoy_margin() -> f32 {
    30.0_f32.to_radians()
}
fn default_false_positive_margin() -> f32 {
    10.0_f32.to_radians()
}
fn default_approach_standoff() -> f32 {
    5.0
}
fn default_backup_distance() -> f32 {
    10.0
}
fn default_floor_brightness() -> f32 {
    0.05
}
fn default_target_hue_ratio() -> f32 {
    1.0
}
fn default_vantage_inset() -> f32 {
    0.25
}

fn default_cols() -> usize {
    4
}
fn default_rows() -> usize {
    4
}
fn default_tile_size() -> f32 {
    30.48
}
fn default_tiles_per_region() -> usize {
    3
}
fn default_allow_diagonals() -> bool {
    true
}

fn default_green_zone() -> [i32; 4] {
    [1, 6, 3, 4]
}
fn default_red_zone() -> [i32; 4] {
    [6, 3, 7, 1]
}
fn default_role() -> Role {
    Role::Builder
}
fn default_budget_secs() -> u64 {
    300
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            wheel_radius: default_wheel_radius(),
            track_width: default_track_width(),
            travel_speed: default_travel_speed(),
            turn_speed: default_turn_speed(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            pose_period_ms: default_pose_period_ms(),
            angle_tolerance_rad: default_angle_tolerance(),
            distance_tolerance: default_distance_tolerance(),
            avoid_threshold: default_avoid_threshold(),
            range_cap: default_range_cap(),
        }
    }
}

impl Default for DetourConfig {
    fn default() -> Self {
        Self {
            band_center: default_band_center(),
            bandwidth: default_bandwidth(),
            kp: default_detour_kp(),
            max_adjustment: default_max_adjustment(),
            forward_speed: default_detour_speed(),
            deviation_started: default_deviation_started(),
            deviation_resumed: default_deviation_resumed(),
            turnaround_rad: default_turnaround(),
            max_duration_secs: default_detour_max_duration(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            detection_distance: default_detection_distance(),
            detection_count: default_detection_count(),
            sweep_rad: default_sweep(),
            sweep_speed: default_sweep_speed(),
            probe_count: default_probe_count(),
            probe_cone_rad: default_probe_cone(),
            decoy_margin_rad: default_decoy_margin(),
            false_positive_margin_rad: default_false_positive_margin(),
            approach_standoff: default_approach_standoff(),
            backup_distance: default_backup_distance(),
            floor_brightness: default_floor_brightness(),
            target_hue_ratio: default_target_hue_ratio(),
            vantage_inset: default_vantage_inset(),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            cols: default_cols(),
            rows: default_rows(),
            tile_size: default_tile_size(),
            tiles_per_region: default_tiles_per_region(),
            allow_diagonals: default_allow_diagonals(),
        }
    }
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            green_zone: default_green_zone(),
            red_zone: default_red_zone(),
            starting_region: 0,
            role: default_role(),
            budget_secs: default_budget_secs(),
        }
    }
}

impl Default for NavConfig {
    fn default() -> Self {
        Self {
            robot: RobotConfig::default(),
            control: ControlConfig::default(),
            detour: DetourConfig::default(),
            scan: ScanConfig::default(),
            planner: PlannerConfig::default(),
            round: RoundConfig::default(),
        }
    }
}

impl NavConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("Failed to read config file: {}", e)))?;
        let config: NavConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = NavConfig::default();
        assert_eq!(config.planner.cols * config.planner.rows, 16);
        assert!(config.control.angle_tolerance_rad > 0.0);
        assert_eq!(config.round.role, Role::Builder);
    }

    #[test]
    fn negative_tiles_per_region_is_rejected() {
        let result = toml::from_str::<NavConfig>(
            r#"
            [planner]
            tiles_per_region = -3
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: NavConfig = toml::from_str(
            r#"
            [round]
            starting_region = 3
            role = "collector"

            [planner]
            allow_diagonals = false
            "#,
        )
        .unwrap();
        assert_eq!(config.round.starting_region, 3);
        assert_eq!(config.round.role, Role::Collector);
        assert!(!config.planner.allow_diagonals);
        assert_eq!(config.control.tick_ms, 25);
    }
}
