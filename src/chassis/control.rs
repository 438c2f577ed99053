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

//! The control loop shared by every chassis, and the bookkeeping that keeps one loop per
//! axis group.

use core::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, trace, warn};

use super::{Axis, ChassisError, MotionSettings, Wheel};
use crate::mechanism::{BrakeMode, Mechanism, RotationUnits};
use crate::pid::PidController;
use crate::task::{MotionHandle, MotionOutcome, MotionState, TaskControl};
use crate::time::Delay;

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The motor groups of a chassis plus the lock every velocity write goes through.
#[derive(Debug)]
pub(crate) struct Drivetrain {
    left: Arc<dyn Mechanism>,
    right: Arc<dyn Mechanism>,
    center: Option<Arc<dyn Mechanism>>,
    delay: Arc<dyn Delay>,
    // Held while commanding velocities. A loop re-checks cancellation under it, so nothing
    // it writes can land after a stop's zero command.
    bus: Mutex<()>,
}

impl Drivetrain {
    pub(crate) fn new(
        left: Arc<dyn Mechanism>,
        right: Arc<dyn Mechanism>,
        center: Option<Arc<dyn Mechanism>>,
        delay: Arc<dyn Delay>,
    ) -> Self {
        Self {
            left,
            right,
            center,
            delay,
            bus: Mutex::new(()),
        }
    }

    pub(crate) fn mechanism(&self, wheel: Wheel) -> Option<&Arc<dyn Mechanism>> {
        match wheel {
            Wheel::Left => Some(&self.left),
            Wheel::Right => Some(&self.right),
            Wheel::Center => self.center.as_ref(),
        }
    }

    fn all(&self) -> impl Iterator<Item = &Arc<dyn Mechanism>> {
        [&self.left, &self.right].into_iter().chain(self.center.as_ref())
    }

    pub(crate) fn position(&self, wheel: Wheel, units: RotationUnits) -> Option<f64> {
        self.mechanism(wheel).map(|m| m.position(units))
    }

    /// Zero velocity on every group, without touching the brake mode.
    pub(crate) fn halt(&self) {
        let _bus = lock(&self.bus);
        for mechanism in self.all() {
            mechanism.spin(0.0);
        }
    }

    pub(crate) fn spin_open_loop(&self, velocities: &[(Wheel, f64)]) {
        let _bus = lock(&self.bus);
        for (wheel, velocity) in velocities {
            if let Some(mechanism) = self.mechanism(*wheel) {
                mechanism.spin(*velocity);
            }
        }
    }

    pub(crate) fn reset_positions(&self) {
        for mechanism in self.all() {
            mechanism.reset_position();
        }
    }

    pub(crate) fn set_brake_mode(&self, mode: BrakeMode) {
        for mechanism in self.all() {
            mechanism.set_brake_mode(mode);
        }
    }

    /// Writes one tick of velocities unless `control` was cancelled. Returns whether it wrote.
    fn command(&self, control: &TaskControl, wheels: &[WheelLoop]) -> bool {
        let _bus = lock(&self.bus);
        if control.is_cancelled() {
            return false;
        }
        for wheel in wheels {
            wheel.mechanism.spin(wheel.velocity);
        }
        true
    }

    fn brake(&self, control: &TaskControl, mode: BrakeMode, wheels: &[WheelLoop]) -> bool {
        let _bus = lock(&self.bus);
        if control.is_cancelled() {
            return false;
        }
        for wheel in wheels {
            wheel.mechanism.set_brake_mode(mode);
            wheel.mechanism.spin(0.0);
        }
        true
    }
}

/// How far a wheel should travel, in motor degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Displacement {
    /// Absolute encoder position.
    To(f64),
    /// Relative to the encoder position when the motion starts.
    By(f64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct WheelPlan {
    pub(crate) wheel: Wheel,
    pub(crate) axis: Axis,
    pub(crate) displacement: Displacement,
    pub(crate) max_speed: f64,
}

#[derive(Debug)]
struct WheelLoop {
    wheel: Wheel,
    mechanism: Arc<dyn Mechanism>,
    displacement: Displacement,
    // False until the first finite sample has fixed the target
    targeted: bool,
    pid: PidController<f64>,
    max_speed: f64,
    velocity: f64,
    since_sample: Duration,
}

impl WheelLoop {
    fn new(plan: &WheelPlan, mechanism: Arc<dyn Mechanism>, settings: &MotionSettings) -> Self {
        let config = settings.pid(plan.axis);
        Self {
            wheel: plan.wheel,
            mechanism,
            displacement: plan.displacement,
            targeted: false,
            pid: PidController::new(config),
            max_speed: plan.max_speed,
            velocity: 0.0,
            // Sample on the very first tick
            since_sample: config.tick_interval(),
        }
    }

    /// Advances the wheel by one loop tick. The PID is only sampled once its own tick
    /// interval has accumulated; in between the previous velocity is held.
    ///
    /// A non-finite sample is stale: the wheel holds its velocity, and a wheel that has not
    /// been targeted yet stays at rest until a finite sample arrives.
    fn step(&mut self, tick: Duration, max_acceleration: f64) {
        self.since_sample += tick;
        if self.since_sample < self.pid.config().tick_interval() {
            return;
        }
        self.since_sample = Duration::ZERO;

        let position = self.mechanism.position(RotationUnits::Degrees);
        if !position.is_finite() {
            trace!("{:?}: stale sample, holding {:.2}", self.wheel, self.velocity);
            return;
        }
        if !self.targeted {
            let target = match self.displacement {
                Displacement::To(target) => target,
                Displacement::By(delta) => position + delta,
            };
            self.pid.reset(target, Some(position));
            self.targeted = true;
        }

        let correction = self.pid.compute(position);
        let ramped =
            self.velocity + (correction - self.velocity).clamp(-max_acceleration, max_acceleration);
        self.velocity = ramped.clamp(-self.max_speed, self.max_speed);

        trace!(
            "{:?}: position {position:.2} error {:.2} velocity {:.2}",
            self.wheel,
            self.pid.context().error(),
            self.velocity
        );
    }

    fn is_settled(&self) -> bool {
        self.targeted && self.pid.is_settled()
    }
}

/// Runs one motion to completion on the calling thread.
///
/// Targeting happens here rather than at the call site so that relative targets are measured
/// after any superseded motion has let go of the drivetrain.
pub(crate) fn run_motion(
    drive: &Drivetrain,
    plans: &[WheelPlan],
    settings: &MotionSettings,
    control: &TaskControl,
) -> MotionOutcome {
    control.advance(MotionState::Targeting);
    let mut wheels: Vec<WheelLoop> = plans
        .iter()
        .filter_map(|plan| {
            let mechanism = drive.mechanism(plan.wheel)?;
            Some(WheelLoop::new(plan, Arc::clone(mechanism), settings))
        })
        .collect();
    let tick = wheels
        .iter()
        .map(|wheel| wheel.pid.config().tick_interval())
        .min()
        .unwrap_or_else(|| settings.pid(Axis::Straight).tick_interval());

    control.advance(MotionState::Converging);
    let mut ticks: u64 = 0;
    loop {
        if control.is_cancelled() {
            debug!("motion cancelled after {ticks} ticks");
            return MotionOutcome::Cancelled;
        }

        for wheel in wheels.iter_mut() {
            wheel.step(tick, settings.max_acceleration);
        }
        if wheels.iter().all(WheelLoop::is_settled) {
            break;
        }

        if !drive.command(control, &wheels) {
            debug!("motion cancelled after {ticks} ticks");
            return MotionOutcome::Cancelled;
        }
        drive.delay.delay(tick);
        ticks += 1;
    }

    control.advance(MotionState::Settled);
    if !drive.brake(control, settings.brake, &wheels) {
        return MotionOutcome::Cancelled;
    }
    info!("motion settled after {ticks} ticks");
    MotionOutcome::Settled
}

/// Holds the motion currently driving one axis group.
#[derive(Debug, Default)]
pub(crate) struct MotionSlot {
    current: Mutex<Option<MotionHandle>>,
}

impl MotionSlot {
    pub(crate) fn handle(&self) -> Option<MotionHandle> {
        Option::clone(&lock(&self.current))
    }

    pub(crate) fn state(&self) -> MotionState {
        self.handle()
            .map_or(MotionState::Idle, |handle| handle.state())
    }

    pub(crate) fn last_outcome(&self) -> Option<MotionOutcome> {
        self.handle().and_then(|handle| handle.outcome())
    }
}

impl Drop for MotionSlot {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.current).take() {
            handle.cancel_and_wait();
        }
    }
}

/// Locks `slots` in order, cancels and joins whatever runs in them, then runs `then` while
/// the slots are still held so nothing else can start on the same groups meanwhile.
pub(crate) fn quiesce<R>(
    slots: &[&MotionSlot],
    then: impl FnOnce(&mut [MutexGuard<'_, Option<MotionHandle>>]) -> R,
) -> R {
    let mut guards: Vec<_> = slots.iter().map(|slot| lock(&slot.current)).collect();
    for guard in guards.iter() {
        if let Some(previous) = &**guard {
            if !previous.is_finished() {
                debug!("superseding motion `{}`", previous.name());
            }
            previous.cancel_and_wait();
        }
    }
    then(guards.as_mut_slice())
}

/// Everything a chassis variant shares: the drivetrain and its runtime settings.
#[derive(Debug)]
pub(crate) struct ChassisCore {
    drive: Arc<Drivetrain>,
    settings: Mutex<MotionSettings>,
}

impl ChassisCore {
    pub(crate) fn new(drive: Drivetrain) -> Self {
        Self {
            drive: Arc::new(drive),
            settings: Mutex::new(MotionSettings::default()),
        }
    }

    pub(crate) fn drive(&self) -> &Drivetrain {
        &self.drive
    }

    pub(crate) fn settings(&self) -> MotionSettings {
        *lock(&self.settings)
    }

    pub(crate) fn update_settings<R>(&self, update: impl FnOnce(&mut MotionSettings) -> R) -> R {
        update(&mut lock(&self.settings))
    }

    /// Supersedes whatever runs in `slots` with a new motion following `plans`.
    ///
    /// Settings are snapshotted here, so later tuning does not reach into this motion.
    pub(crate) fn launch(
        &self,
        slots: &[&MotionSlot],
        name: &str,
        plans: Vec<WheelPlan>,
    ) -> Result<MotionHandle, ChassisError> {
        let settings = self.settings();
        let drive = Arc::clone(&self.drive);
        debug!("starting `{name}` with {} wheel targets", plans.len());

        quiesce(slots, |guards| {
            let handle = MotionHandle::spawn(name, move |control| {
                run_motion(&drive, &plans, &settings, control)
            })?;
            for guard in guards.iter_mut() {
                **guard = Some(handle.clone());
            }
            Ok(handle)
        })
    }

    /// Zeroes every group and cancels the motions in `slots`, returning once they have exited.
    pub(crate) fn stop(&self, slots: &[&MotionSlot]) {
        let handles: Vec<_> = slots.iter().filter_map(|slot| slot.handle()).collect();
        for handle in &handles {
            handle.cancel();
        }
        self.drive.halt();
        for handle in &handles {
            handle.wait();
        }
    }

    /// Waits on every motion in `slots`; cancelled wins over settled.
    pub(crate) fn wait_until_settled(&self, slots: &[&MotionSlot]) -> Option<MotionOutcome> {
        slots
            .iter()
            .filter_map(|slot| slot.handle())
            .map(|handle| handle.wait())
            .reduce(|a, b| {
                if a == MotionOutcome::Cancelled || b == MotionOutcome::Cancelled {
                    MotionOutcome::Cancelled
                } else {
                    MotionOutcome::Settled
                }
            })
    }

    pub(crate) fn reset_encoders(&self, slots: &[&MotionSlot]) -> Result<(), ChassisError> {
        let guards: Vec<_> = slots.iter().map(|slot| lock(&slot.current)).collect();
        let active = guards
            .iter()
            .filter_map(|guard| (**guard).as_ref())
            .any(|handle| !handle.is_finished());
        if active {
            warn!("refusing to reset encoders while a motion is active");
            return Err(ChassisError::MotionActive);
        }
        self.drive.reset_positions();
        Ok(())
    }

    /// Cancels the motions in `slots` and writes open-loop velocities.
    pub(crate) fn spin(
        &self,
        slots: &[&MotionSlot],
        velocities: &[(Wheel, f64)],
    ) -> Result<(), ChassisError> {
        if velocities.iter().any(|(_, velocity)| !velocity.is_finite()) {
            return Err(ChassisError::InvalidSpeed);
        }
        quiesce(slots, |_| self.drive.spin_open_loop(velocities));
        Ok(())
    }
}
