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

use core::f64::consts::TAU;
use core::fmt::Debug;

/// What a motor group does once it is commanded to zero velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BrakeMode {
    /// Let the group spin down freely.
    Coast,
    /// Short the windings to stop quickly.
    #[default]
    Brake,
    /// Actively hold the current position.
    Hold,
}

/// Units in which an accumulated rotation can be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RotationUnits {
    /// Motor shaft degrees.
    #[default]
    Degrees,
    /// Full shaft turns.
    Revolutions,
    /// Radians of shaft rotation.
    Radians,
}

impl RotationUnits {
    /// Converts a rotation given in degrees into these units.
    pub fn from_degrees(self, degrees: f64) -> f64 {
        match self {
            RotationUnits::Degrees => degrees,
            RotationUnits::Revolutions => degrees / 360.0,
            RotationUnits::Radians => degrees / 360.0 * TAU,
        }
    }
}

/// One logical group of motors acting as a single drive axis.
///
/// Implementations wrap the vendor hardware. Methods take `&self` because a group is shared
/// between the caller and the chassis' motion worker; hardware faults are never reported,
/// they show up as a stale position.
pub trait Mechanism: Debug + Send + Sync {
    /// Spins the group at a signed velocity in the hardware's native units.
    fn spin(&self, velocity: f64);

    /// Accumulated rotation since the last reset, signed by direction.
    fn position(&self, units: RotationUnits) -> f64;

    /// Zeroes the accumulated rotation.
    fn reset_position(&self);

    /// Selects the stopping behavior applied at zero velocity.
    fn set_brake_mode(&self, mode: BrakeMode);
}
