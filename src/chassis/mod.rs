// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! Closed-loop drive primitives for tank and H-drive chassis.
//!
//! Conventions used throughout:
//! - distances are in inches, angles in degrees, encoder positions in motor degrees;
//! - a positive turn is clockwise seen from above (left side forward, right side backward);
//! - a positive strafe moves the robot to its right.

use core::f64::consts::TAU;
use std::io;

use thiserror::Error;

use crate::mechanism::BrakeMode;
use crate::pid::PidConfig;
use crate::task::{MotionHandle, MotionOutcome, MotionState};

mod control;
pub mod hdrive;
pub mod tank;

pub use hdrive::HDrive;
pub use tank::Tank;

/// Errors reported by chassis operations. A rejected call leaves the chassis untouched.
#[derive(Debug, Error)]
pub enum ChassisError {
    /// A geometric constant was zero, negative or non-finite.
    #[error("invalid chassis geometry: {0} must be positive and finite")]
    InvalidGeometry(&'static str),
    /// The maximum acceleration was zero, negative or NaN.
    #[error("max acceleration must be positive")]
    InvalidAcceleration,
    /// A speed cap was not positive and finite, or an open-loop velocity was not finite.
    #[error("speed must be positive and finite")]
    InvalidSpeed,
    /// A distance, angle or offset was not finite.
    #[error("distance must be finite")]
    InvalidDistance,
    /// A target addressed a motor group this chassis does not have.
    #[error("this chassis has no center wheels")]
    UnsupportedAxis,
    /// A target addressed no motor group at all.
    #[error("drive target addresses no wheels")]
    EmptyTarget,
    /// The encoders cannot be reset while a motion is driving them.
    #[error("a motion is active on this chassis")]
    MotionActive,
    /// The worker thread for an asynchronous motion could not be started.
    #[error("failed to start motion worker")]
    Spawn(#[from] io::Error),
}

fn positive(value: f64, what: &'static str) -> Result<f64, ChassisError> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(ChassisError::InvalidGeometry(what))
    }
}

pub(crate) fn check_speed(max_speed: f64) -> Result<f64, ChassisError> {
    if max_speed > 0.0 && max_speed.is_finite() {
        Ok(max_speed)
    } else {
        Err(ChassisError::InvalidSpeed)
    }
}

pub(crate) fn check_distance(distance: f64) -> Result<f64, ChassisError> {
    if distance.is_finite() {
        Ok(distance)
    } else {
        Err(ChassisError::InvalidDistance)
    }
}

/// Fixed dimensions of a differential drivetrain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    track_width: f64,
    wheel_radius: f64,
    gear_ratio: f64,
}

impl Geometry {
    /// `gear_ratio` is motor revolutions per wheel revolution.
    pub fn new(track_width: f64, wheel_radius: f64, gear_ratio: f64) -> Result<Self, ChassisError> {
        Ok(Self {
            track_width: positive(track_width, "track width")?,
            wheel_radius: positive(wheel_radius, "wheel radius")?,
            gear_ratio: positive(gear_ratio, "gear ratio")?,
        })
    }

    /// Distance between the left and right wheels in inches.
    pub fn track_width(&self) -> f64 {
        self.track_width
    }

    /// Side wheel radius in inches.
    pub fn wheel_radius(&self) -> f64 {
        self.wheel_radius
    }

    /// Motor turns per wheel turn.
    pub fn gear_ratio(&self) -> f64 {
        self.gear_ratio
    }

    /// Side wheel circumference in inches.
    pub fn wheel_circumference(&self) -> f64 {
        TAU * self.wheel_radius
    }

    /// Motor degrees needed for a side wheel to roll `distance` inches.
    pub fn distance_to_degrees(&self, distance: f64) -> f64 {
        rolled_degrees(distance, self.wheel_circumference(), self.gear_ratio)
    }

    /// Inverse of [`Geometry::distance_to_degrees`].
    pub fn degrees_to_distance(&self, degrees: f64) -> f64 {
        degrees / 360.0 / self.gear_ratio * self.wheel_circumference()
    }

    /// Motor degrees each side travels, in opposite directions, to turn the chassis in place by
    /// `angle` degrees. The sign is that of the left side.
    pub fn turn_to_degrees(&self, angle: f64) -> f64 {
        let arc = angle.to_radians() * self.track_width / 2.0;
        self.distance_to_degrees(arc)
    }
}

pub(crate) fn rolled_degrees(distance: f64, circumference: f64, gear_ratio: f64) -> f64 {
    distance / circumference * 360.0 * gear_ratio
}

/// Additive corrections for systematic steady-state error, in inches (straight, strafe) and
/// degrees (turn).
///
/// An offset lengthens a request in its direction of travel, so one value compensates
/// undershoot both forwards and backwards. Zero requests are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offsets {
    /// Inches added to straight motions.
    pub straight: f64,
    /// Degrees added to turns.
    pub turn: f64,
    /// Inches added to strafes.
    pub strafe: f64,
}

impl Offsets {
    pub(crate) fn apply(offset: f64, request: f64) -> f64 {
        if request == 0.0 {
            request
        } else {
            request + offset.copysign(request)
        }
    }
}

/// The PID axis governing a wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Driving forwards and backwards.
    Straight,
    /// Turning in place.
    Turn,
    /// Sideways on the center wheels.
    Strafe,
}

/// A motor group of a chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wheel {
    /// The left side group.
    Left,
    /// The right side group.
    Right,
    /// The H-drive center group.
    Center,
}

/// Absolute encoder target for one motor group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelTarget {
    /// Target position in motor degrees.
    pub position: f64,
    /// Speed cap in the group's native velocity units.
    pub max_speed: f64,
    /// Which PID configuration drives the group there.
    pub axis: Axis,
}

/// Low-level motion request: per-group absolute targets, driven together in one loop.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveTarget {
    /// Target for the left group.
    pub left: Option<WheelTarget>,
    /// Target for the right group.
    pub right: Option<WheelTarget>,
    /// Target for the center group. Ignored by a tank.
    pub center: Option<WheelTarget>,
}

impl DriveTarget {
    pub(crate) fn wheels(&self) -> impl Iterator<Item = (Wheel, WheelTarget)> {
        [
            (Wheel::Left, self.left),
            (Wheel::Right, self.right),
            (Wheel::Center, self.center),
        ]
        .into_iter()
        .filter_map(|(wheel, target)| target.map(|target| (wheel, target)))
    }
}

/// Runtime tuning, snapshotted by every motion when it starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSettings {
    pub(crate) straight: PidConfig<f64>,
    pub(crate) turn: PidConfig<f64>,
    pub(crate) strafe: PidConfig<f64>,
    pub(crate) offsets: Offsets,
    pub(crate) brake: BrakeMode,
    pub(crate) max_acceleration: f64,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            straight: PidConfig::default(),
            turn: PidConfig::default(),
            strafe: PidConfig::default(),
            offsets: Offsets::default(),
            brake: BrakeMode::default(),
            max_acceleration: f64::INFINITY,
        }
    }
}

impl MotionSettings {
    /// Gains for the given axis.
    pub fn pid(&self, axis: Axis) -> PidConfig<f64> {
        match axis {
            Axis::Straight => self.straight,
            Axis::Turn => self.turn,
            Axis::Strafe => self.strafe,
        }
    }

    /// Per-axis offsets.
    pub fn offsets(&self) -> Offsets {
        self.offsets
    }

    /// Mode applied when a motion settles.
    pub fn brake(&self) -> BrakeMode {
        self.brake
    }

    /// Largest velocity change per tick. Infinite when ramping is disabled.
    pub fn max_acceleration(&self) -> f64 {
        self.max_acceleration
    }

    pub(crate) fn set_max_acceleration(&mut self, max_acceleration: f64) -> Result<(), ChassisError> {
        // Infinity is allowed and disables the ramp
        if max_acceleration > 0.0 {
            self.max_acceleration = max_acceleration;
            Ok(())
        } else {
            Err(ChassisError::InvalidAcceleration)
        }
    }

    pub(crate) fn set_offsets(&mut self, offsets: Offsets) -> Result<(), ChassisError> {
        check_distance(offsets.straight)?;
        check_distance(offsets.turn)?;
        check_distance(offsets.strafe)?;
        self.offsets = offsets;
        Ok(())
    }
}

/// Drive primitives common to every chassis variant.
///
/// Every motion runs on its own worker thread; the blocking forms start the asynchronous one
/// and wait on it, so both kinds share one state machine per axis group. Starting a motion
/// cancels the one driving the same groups and waits for it to exit first.
///
/// No motion has a timeout. A target that cannot be reached within the error range keeps the
/// loop running until [`Chassis::stop`] is called.
pub trait Chassis {
    /// Starts a motion towards absolute per-group encoder targets.
    fn set_target(&self, target: DriveTarget) -> Result<MotionHandle, ChassisError>;

    /// Starts driving `distance` inches forward (negative for backward).
    fn straight_async(&self, distance: f64, max_speed: f64) -> Result<MotionHandle, ChassisError>;

    /// Drives `distance` inches and blocks until the motion ends.
    fn straight(&self, distance: f64, max_speed: f64) -> Result<MotionOutcome, ChassisError> {
        Ok(self.straight_async(distance, max_speed)?.wait())
    }

    /// Starts turning in place by `angle` degrees, clockwise positive.
    fn turn_async(&self, angle: f64, max_speed: f64) -> Result<MotionHandle, ChassisError>;

    /// Turns in place by `angle` degrees and blocks until the motion ends.
    fn turn(&self, angle: f64, max_speed: f64) -> Result<MotionOutcome, ChassisError> {
        Ok(self.turn_async(angle, max_speed)?.wait())
    }

    /// Zeroes every motor group and cancels all motions. The brake mode is not applied.
    fn stop(&self);

    /// Blocks until every motion on the chassis has ended. `None` if none was ever started.
    fn wait_until_settled(&self) -> Option<MotionOutcome>;

    /// Zeroes all encoders. Rejected with [`ChassisError::MotionActive`] during a motion.
    fn reset_encoders(&self) -> Result<(), ChassisError>;

    /// State of the left/right axis group.
    fn state(&self) -> MotionState;
}

/// Primitives of chassis that can also move sideways.
pub trait HolonomicChassis: Chassis {
    /// Starts moving `distance` inches sideways, right positive.
    fn strafe_async(&self, distance: f64, max_speed: f64) -> Result<MotionHandle, ChassisError>;

    fn strafe(&self, distance: f64, max_speed: f64) -> Result<MotionOutcome, ChassisError> {
        Ok(self.strafe_async(distance, max_speed)?.wait())
    }

    /// Starts a straight and a strafe motion that run together in one loop and settle together.
    fn diagonal_async(
        &self,
        straight_distance: f64,
        strafe_distance: f64,
        max_speed: f64,
    ) -> Result<MotionHandle, ChassisError>;

    fn diagonal(
        &self,
        straight_distance: f64,
        strafe_distance: f64,
        max_speed: f64,
    ) -> Result<MotionOutcome, ChassisError> {
        Ok(self
            .diagonal_async(straight_distance, strafe_distance, max_speed)?
            .wait())
    }

    /// State of the center axis group.
    fn strafe_state(&self) -> MotionState;
}
