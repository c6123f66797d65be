//! # Vehicle library.
//!
//! This library allows other crates in the workspace to access items defined inside the vehicle
//! crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Car control - the single owner of the actuators, guarded by the obstacle monitor
pub mod car;

/// Mechanisms - PWM backed drive motor and steering servo
pub mod mech;

/// Parameters for the vehicle executable
pub mod params;
