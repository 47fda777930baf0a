//! Collaborator traits at the hardware boundary.
//!
//! The motion core never touches devices directly; it is constructed with
//! handles implementing these traits. Production wires them to the actuator
//! and sensor daemons, tests and the demo binary wire them to the simulator
//! in [`crate::sim`].

/// Pivot position of the range sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorLook {
    Forward,
    Left,
    Right,
}

/// Differential drive wheel pair.
///
/// Speeds are in wheel degrees per second; the sign encodes direction.
/// Tacho counts are cumulative wheel rotation in degrees since startup.
pub trait DriveMotors: Send + Sync {
    fn set_speeds(&self, left: f32, right: f32);
    fn stop(&self);
    fn tacho_degrees(&self) -> (f32, f32);
}

/// Distance sensing, optionally pivoted left or right of the chassis.
///
/// Returns centimeters. Callers clamp the reading to a configured cap
/// before acting on it.
pub trait RangeSensor: Send + Sync {
    fn sample(&self, look: SensorLook) -> f32;
}

/// Raw tri-channel color reading. Classification happens in the planner.
pub trait ColorSensor: Send + Sync {
    fn sample(&self) -> [f32; 3];
}

/// The grasping mechanism and its fill state.
pub trait Carrier: Send + Sync {
    fn grab(&self);
    fn drop_all(&self);
    fn is_empty(&self) -> bool;
    fn is_full(&self) -> bool;
}
