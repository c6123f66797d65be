//! # Vehicle interface crate.
//!
//! Provides the equipment contracts and telecommand definitions shared by the vehicle software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Capability contracts for the vehicle's actuators and sensors
pub mod eqpt;

/// Telecommands which can be issued to the vehicle
pub mod tc;
