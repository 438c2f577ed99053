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
use std::sync::Arc;

use super::control::{Displacement, Drivetrain, MotionSlot, WheelPlan};
use super::tank::Tank;
use super::{
    check_distance, check_speed, positive, rolled_degrees, Axis, Chassis, ChassisError,
    DriveTarget, Geometry, HolonomicChassis, MotionSettings, Offsets, Wheel,
};
use crate::mechanism::{BrakeMode, Mechanism, RotationUnits};
use crate::pid::PidConfig;
use crate::task::{MotionHandle, MotionOutcome, MotionState};
use crate::time::{Delay, StdDelay};

/// A tank drivetrain with an extra center motor group mounted perpendicular to the sides, so
/// the robot can strafe without turning.
///
/// The left/right groups and the center group are separate axis groups: a straight motion
/// and a strafe motion may run at the same time, while a diagonal occupies both.
#[derive(Debug)]
pub struct HDrive {
    tank: Tank,
    center_wheel_radius: f64,
    center: MotionSlot,
}

impl HDrive {
    /// Creates an H-drive whose control loops sleep the OS thread between ticks.
    ///
    /// Fails if `center_wheel_radius` is not positive.
    pub fn new(
        geometry: Geometry,
        center_wheel_radius: f64,
        left: Arc<dyn Mechanism>,
        right: Arc<dyn Mechanism>,
        center: Arc<dyn Mechanism>,
    ) -> Result<Self, ChassisError> {
        Self::with_delay(
            geometry,
            center_wheel_radius,
            left,
            right,
            center,
            Arc::new(StdDelay),
        )
    }

    /// Like [`HDrive::new`], with loops that wait on `delay` between ticks.
    pub fn with_delay(
        geometry: Geometry,
        center_wheel_radius: f64,
        left: Arc<dyn Mechanism>,
        right: Arc<dyn Mechanism>,
        center: Arc<dyn Mechanism>,
        delay: Arc<dyn Delay>,
    ) -> Result<Self, ChassisError> {
        let center_wheel_radius = positive(center_wheel_radius, "center wheel radius")?;
        let drive = Drivetrain::new(left, right, Some(center), delay);
        Ok(Self {
            tank: Tank::from_drivetrain(geometry, drive),
            center_wheel_radius,
            center: MotionSlot::default(),
        })
    }

    /// Track width and side wheel dimensions.
    pub fn geometry(&self) -> &Geometry {
        self.tank.geometry()
    }

    /// Radius of the center wheels in inches.
    pub fn center_wheel_radius(&self) -> f64 {
        self.center_wheel_radius
    }

    /// Circumference of the center wheels in inches.
    pub fn center_wheel_circumference(&self) -> f64 {
        TAU * self.center_wheel_radius
    }

    /// Motor degrees the center group turns to move `distance` inches sideways.
    pub fn strafe_to_degrees(&self, distance: f64) -> f64 {
        rolled_degrees(
            distance,
            self.center_wheel_circumference(),
            self.geometry().gear_ratio(),
        )
    }

    /// A snapshot of the tuning new motions start with.
    pub fn settings(&self) -> MotionSettings {
        self.tank.settings()
    }

    /// Sets the gains used by straight motions and by the straight leg of a diagonal.
    pub fn set_straight_pid(&self, config: PidConfig<f64>) {
        self.tank.set_straight_pid(config);
    }

    /// Sets the gains used by turns.
    pub fn set_turn_pid(&self, config: PidConfig<f64>) {
        self.tank.set_turn_pid(config);
    }

    /// Sets the gains used by strafes and by the strafe leg of a diagonal.
    pub fn set_strafe_pid(&self, config: PidConfig<f64>) {
        self.tank
            .core()
            .update_settings(|settings| settings.strafe = config);
    }

    /// Stores the brake mode and applies it to every group now.
    pub fn set_brake_type(&self, mode: BrakeMode) {
        self.tank.set_brake_type(mode);
    }

    /// Sets the per-tick velocity change limit for new motions.
    pub fn set_max_acceleration(&self, max_acceleration: f64) -> Result<(), ChassisError> {
        self.tank.set_max_acceleration(max_acceleration)
    }

    /// Sets the straight and strafe offsets (inches) and the turn offset (degrees).
    pub fn set_offset(&self, straight: f64, turn: f64, strafe: f64) -> Result<(), ChassisError> {
        self.tank.core().update_settings(|settings| {
            settings.set_offsets(Offsets {
                straight,
                turn,
                strafe,
            })
        })
    }

    /// Left group position.
    pub fn left_encoder(&self, units: RotationUnits) -> f64 {
        self.tank.left_encoder(units)
    }

    /// Right group position.
    pub fn right_encoder(&self, units: RotationUnits) -> f64 {
        self.tank.right_encoder(units)
    }

    /// Center group position.
    pub fn center_encoder(&self, units: RotationUnits) -> f64 {
        self.tank.encoder(Wheel::Center, units)
    }

    /// Open-loop override of all three groups. Cancels every closed-loop motion first.
    pub fn spin(
        &self,
        left_velocity: f64,
        right_velocity: f64,
        center_velocity: f64,
    ) -> Result<(), ChassisError> {
        self.tank.core().spin(
            &self.slots(),
            &[
                (Wheel::Left, left_velocity),
                (Wheel::Right, right_velocity),
                (Wheel::Center, center_velocity),
            ],
        )
    }

    /// Open-loop override with one velocity for both sides.
    pub fn spin_uniform(&self, sides_velocity: f64, center_velocity: f64) -> Result<(), ChassisError> {
        self.spin(sides_velocity, sides_velocity, center_velocity)
    }

    /// How the latest left/right motion ended.
    pub fn last_outcome(&self) -> Option<MotionOutcome> {
        self.tank.last_outcome()
    }

    /// How the latest center motion ended.
    pub fn last_strafe_outcome(&self) -> Option<MotionOutcome> {
        self.center.last_outcome()
    }

    fn slots(&self) -> [&MotionSlot; 2] {
        // Always sides first; every multi-slot lock follows this order
        [self.tank.sides(), &self.center]
    }

    fn strafe_plan(&self, distance: f64, max_speed: f64) -> WheelPlan {
        let offset = self.settings().offsets.strafe;
        WheelPlan {
            wheel: Wheel::Center,
            axis: Axis::Strafe,
            displacement: Displacement::By(self.strafe_to_degrees(Offsets::apply(offset, distance))),
            max_speed,
        }
    }
}

/// Splits `max_speed` so that the longer leg runs at the cap and both legs arrive together.
fn split_speed(straight: f64, strafe: f64, max_speed: f64) -> (f64, f64) {
    let longer = straight.abs().max(strafe.abs());
    if longer == 0.0 {
        return (max_speed, max_speed);
    }
    (
        max_speed * straight.abs() / longer,
        max_speed * strafe.abs() / longer,
    )
}

impl Chassis for HDrive {
    fn set_target(&self, target: DriveTarget) -> Result<MotionHandle, ChassisError> {
        let plans = self.tank.target_plans(&target)?;
        let sides = target.left.is_some() || target.right.is_some();
        let all = self.slots();
        let slots = match (sides, target.center.is_some()) {
            (true, true) => &all[..],
            (true, false) => &all[..1],
            _ => &all[1..],
        };
        self.tank.core().launch(slots, "set_target", plans)
    }

    fn straight_async(&self, distance: f64, max_speed: f64) -> Result<MotionHandle, ChassisError> {
        self.tank.straight_async(distance, max_speed)
    }

    fn turn_async(&self, angle: f64, max_speed: f64) -> Result<MotionHandle, ChassisError> {
        self.tank.turn_async(angle, max_speed)
    }

    fn stop(&self) {
        self.tank.core().stop(&self.slots());
    }

    fn wait_until_settled(&self) -> Option<MotionOutcome> {
        self.tank.core().wait_until_settled(&self.slots())
    }

    fn reset_encoders(&self) -> Result<(), ChassisError> {
        self.tank.core().reset_encoders(&self.slots())
    }

    fn state(&self) -> MotionState {
        self.tank.state()
    }
}

impl HolonomicChassis for HDrive {
    fn strafe_async(&self, distance: f64, max_speed: f64) -> Result<MotionHandle, ChassisError> {
        let plan = self.strafe_plan(check_distance(distance)?, check_speed(max_speed)?);
        self.tank.core().launch(&[&self.center], "strafe", vec![plan])
    }

    fn diagonal_async(
        &self,
        straight_distance: f64,
        strafe_distance: f64,
        max_speed: f64,
    ) -> Result<MotionHandle, ChassisError> {
        let straight_distance = check_distance(straight_distance)?;
        let strafe_distance = check_distance(strafe_distance)?;
        let max_speed = check_speed(max_speed)?;
        // Split on the distances the wheels will actually travel
        let offsets = self.settings().offsets;
        let (straight_speed, strafe_speed) = split_speed(
            Offsets::apply(offsets.straight, straight_distance),
            Offsets::apply(offsets.strafe, strafe_distance),
            max_speed,
        );

        let mut plans = self
            .tank
            .straight_plans(straight_distance, straight_speed)
            .to_vec();
        plans.push(self.strafe_plan(strafe_distance, strafe_speed));
        self.tank.core().launch(&self.slots(), "diagonal", plans)
    }

    fn strafe_state(&self) -> MotionState {
        self.center.state()
    }
}
