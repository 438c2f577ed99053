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

use std::sync::Arc;

use super::control::{ChassisCore, Displacement, Drivetrain, MotionSlot, WheelPlan};
use super::{
    check_distance, check_speed, Axis, Chassis, ChassisError, DriveTarget, Geometry,
    MotionSettings, Offsets, Wheel,
};
use crate::mechanism::{BrakeMode, Mechanism, RotationUnits};
use crate::pid::PidConfig;
use crate::task::{MotionHandle, MotionOutcome, MotionState};
use crate::time::{Delay, StdDelay};

/// A differential ("tank") drivetrain: a left and a right motor group.
///
/// The chassis uses the motor groups it is given but never owns the hardware behind them.
/// All methods take `&self`, so a chassis can be shared between subsystems behind an `Arc`.
#[derive(Debug)]
pub struct Tank {
    geometry: Geometry,
    core: ChassisCore,
    sides: MotionSlot,
}

impl Tank {
    /// Creates a chassis whose control loops sleep the OS thread between ticks.
    pub fn new(geometry: Geometry, left: Arc<dyn Mechanism>, right: Arc<dyn Mechanism>) -> Self {
        Self::with_delay(geometry, left, right, Arc::new(StdDelay))
    }

    /// Creates a chassis whose control loops wait on `delay` between ticks.
    pub fn with_delay(
        geometry: Geometry,
        left: Arc<dyn Mechanism>,
        right: Arc<dyn Mechanism>,
        delay: Arc<dyn Delay>,
    ) -> Self {
        Self::from_drivetrain(geometry, Drivetrain::new(left, right, None, delay))
    }

    pub(crate) fn from_drivetrain(geometry: Geometry, drive: Drivetrain) -> Self {
        Self {
            geometry,
            core: ChassisCore::new(drive),
            sides: MotionSlot::default(),
        }
    }

    /// Track width and drive wheel dimensions.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Snapshot of the current tuning.
    pub fn settings(&self) -> MotionSettings {
        self.core.settings()
    }

    /// Sets the gains used by straight motions.
    pub fn set_straight_pid(&self, config: PidConfig<f64>) {
        self.core.update_settings(|settings| settings.straight = config);
    }

    /// Sets the gains used by turns.
    pub fn set_turn_pid(&self, config: PidConfig<f64>) {
        self.core.update_settings(|settings| settings.turn = config);
    }

    /// Sets the stopping behavior applied when a motion settles, and applies it to the motor
    /// groups right away.
    pub fn set_brake_type(&self, mode: BrakeMode) {
        self.core.update_settings(|settings| settings.brake = mode);
        self.core.drive().set_brake_mode(mode);
    }

    /// Limits how much the commanded velocity may change per tick.
    pub fn set_max_acceleration(&self, max_acceleration: f64) -> Result<(), ChassisError> {
        self.core
            .update_settings(|settings| settings.set_max_acceleration(max_acceleration))
    }

    /// Sets the straight (inches) and turn (degrees) offsets.
    pub fn set_offset(&self, straight: f64, turn: f64) -> Result<(), ChassisError> {
        self.core.update_settings(|settings| {
            settings.set_offsets(Offsets {
                straight,
                turn,
                ..settings.offsets
            })
        })
    }

    /// Left group position.
    pub fn left_encoder(&self, units: RotationUnits) -> f64 {
        self.encoder(Wheel::Left, units)
    }

    /// Right group position.
    pub fn right_encoder(&self, units: RotationUnits) -> f64 {
        self.encoder(Wheel::Right, units)
    }

    pub(crate) fn encoder(&self, wheel: Wheel, units: RotationUnits) -> f64 {
        self.core.drive().position(wheel, units).unwrap_or(0.0)
    }

    /// Open-loop override for teleoperation. Cancels any closed-loop motion first.
    pub fn spin(&self, left_velocity: f64, right_velocity: f64) -> Result<(), ChassisError> {
        self.core.spin(
            &[&self.sides],
            &[(Wheel::Left, left_velocity), (Wheel::Right, right_velocity)],
        )
    }

    /// How the latest motion ended, `None` while it runs or if none was started.
    pub fn last_outcome(&self) -> Option<MotionOutcome> {
        self.sides.last_outcome()
    }

    pub(crate) fn core(&self) -> &ChassisCore {
        &self.core
    }

    pub(crate) fn sides(&self) -> &MotionSlot {
        &self.sides
    }

    pub(crate) fn straight_plans(&self, distance: f64, max_speed: f64) -> [WheelPlan; 2] {
        let offset = self.core.settings().offsets.straight;
        let degrees = self
            .geometry
            .distance_to_degrees(Offsets::apply(offset, distance));
        [Wheel::Left, Wheel::Right].map(|wheel| WheelPlan {
            wheel,
            axis: Axis::Straight,
            displacement: Displacement::By(degrees),
            max_speed,
        })
    }

    fn turn_plans(&self, angle: f64, max_speed: f64) -> [WheelPlan; 2] {
        let offset = self.core.settings().offsets.turn;
        let degrees = self.geometry.turn_to_degrees(Offsets::apply(offset, angle));
        [(Wheel::Left, degrees), (Wheel::Right, -degrees)].map(|(wheel, degrees)| WheelPlan {
            wheel,
            axis: Axis::Turn,
            displacement: Displacement::By(degrees),
            max_speed,
        })
    }

    /// Validates `target` into wheel plans. The caller decides which slots it occupies.
    pub(crate) fn target_plans(&self, target: &DriveTarget) -> Result<Vec<WheelPlan>, ChassisError> {
        let plans = target
            .wheels()
            .map(|(wheel, target)| {
                if self.core.drive().mechanism(wheel).is_none() {
                    return Err(ChassisError::UnsupportedAxis);
                }
                Ok(WheelPlan {
                    wheel,
                    axis: target.axis,
                    displacement: Displacement::To(check_distance(target.position)?),
                    max_speed: check_speed(target.max_speed)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        if plans.is_empty() {
            return Err(ChassisError::EmptyTarget);
        }
        Ok(plans)
    }
}

impl Chassis for Tank {
    fn set_target(&self, target: DriveTarget) -> Result<MotionHandle, ChassisError> {
        let plans = self.target_plans(&target)?;
        self.core.launch(&[&self.sides], "set_target", plans)
    }

    fn straight_async(&self, distance: f64, max_speed: f64) -> Result<MotionHandle, ChassisError> {
        let plans = self.straight_plans(check_distance(distance)?, check_speed(max_speed)?);
        self.core.launch(&[&self.sides], "straight", plans.to_vec())
    }

    fn turn_async(&self, angle: f64, max_speed: f64) -> Result<MotionHandle, ChassisError> {
        let plans = self.turn_plans(check_distance(angle)?, check_speed(max_speed)?);
        self.core.launch(&[&self.sides], "turn", plans.to_vec())
    }

    fn stop(&self) {
        self.core.stop(&[&self.sides]);
    }

    fn wait_until_settled(&self) -> Option<MotionOutcome> {
        self.core.wait_until_settled(&[&self.sides])
    }

    fn reset_encoders(&self) -> Result<(), ChassisError> {
        self.core.reset_encoders(&[&self.sides])
    }

    fn state(&self) -> MotionState {
        self.sides.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::time::YieldDelay;

    #[derive(Debug, Default)]
    struct Wheelless {
        position: Mutex<f64>,
    }

    impl Mechanism for Wheelless {
        fn spin(&self, _velocity: f64) {}

        fn position(&self, units: RotationUnits) -> f64 {
            units.from_degrees(*self.position.lock().unwrap())
        }

        fn reset_position(&self) {
            *self.position.lock().unwrap() = 0.0;
        }

        fn set_brake_mode(&self, _mode: BrakeMode) {}
    }

    fn make_tank() -> Tank {
        Tank::with_delay(
            Geometry::new(12.0, 2.0, 1.0).unwrap(),
            Arc::new(Wheelless::default()),
            Arc::new(Wheelless::default()),
            Arc::new(YieldDelay),
        )
    }

    #[test]
    fn test_turn_plans_are_mirrored() {
        let tank = make_tank();
        let [left, right] = tank.turn_plans(90.0, 50.0);
        assert_eq!(left.displacement, Displacement::By(tank.geometry.turn_to_degrees(90.0)));
        assert_eq!(right.displacement, Displacement::By(-tank.geometry.turn_to_degrees(90.0)));
    }

    #[test]
    fn test_center_target_is_unsupported() {
        let tank = make_tank();
        let target = DriveTarget {
            center: Some(super::super::WheelTarget {
                position: 10.0,
                max_speed: 10.0,
                axis: Axis::Strafe,
            }),
            ..DriveTarget::default()
        };
        assert!(matches!(
            tank.set_target(target),
            Err(ChassisError::UnsupportedAxis)
        ));
        assert!(matches!(
            tank.set_target(DriveTarget::default()),
            Err(ChassisError::EmptyTarget)
        ));
    }

    #[test]
    fn test_offset_lengthens_new_plans() {
        let tank = make_tank();
        let before = tank.straight_plans(10.0, 50.0);
        tank.set_offset(1.0, 0.0).unwrap();
        let after = tank.straight_plans(10.0, 50.0);
        assert_eq!(before[0].displacement, Displacement::By(tank.geometry.distance_to_degrees(10.0)));
        assert_eq!(after[0].displacement, Displacement::By(tank.geometry.distance_to_degrees(11.0)));
    }

    #[test]
    fn test_non_positive_acceleration_is_rejected() {
        let tank = make_tank();
        assert!(matches!(
            tank.set_max_acceleration(0.0),
            Err(ChassisError::InvalidAcceleration)
        ));
        assert_eq!(tank.settings().max_acceleration(), f64::INFINITY);
    }
}
