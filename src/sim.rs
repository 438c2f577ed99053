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

//! A simulated motor group for exercising chassis motions without hardware.

use core::time::Duration;
use std::sync::{Mutex, MutexGuard, PoisonError};

use nalgebra as na;

use crate::mechanism::{BrakeMode, Mechanism, RotationUnits};

/// Physical parameters of a [`SimMotorGroup`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimMotorParams {
    /// Shaft speed in degrees per second at a velocity command of 100.
    pub free_speed: f64,
    /// Time constant of the speed response to a command, and of active braking.
    pub time_constant: Duration,
    /// Time constant of the speed decay when coasting.
    pub coast_time_constant: Duration,
    /// Speed commanded per degree of deviation while holding position.
    pub hold_stiffness: f64,
    /// Simulated time that passes on every velocity command.
    pub step: Duration,
}

impl Default for SimMotorParams {
    fn default() -> Self {
        Self {
            free_speed: 1200.0,
            time_constant: Duration::from_millis(50),
            coast_time_constant: Duration::from_millis(500),
            hold_stiffness: 10.0,
            step: Duration::from_millis(10),
        }
    }
}

#[derive(Debug)]
struct SimState {
    // [position in degrees, speed in degrees per second]
    x: na::Vector2<f64>,
    command: f64,
    brake: BrakeMode,
    hold: Option<f64>,
}

/// A motor group with first-order speed dynamics.
///
/// Simulated time only advances when the group is commanded (one
/// [`SimMotorParams::step`] per [`Mechanism::spin`]) or through [`SimMotorGroup::advance`], so
/// a control loop paced by any delay sees the same plant.
#[derive(Debug)]
pub struct SimMotorGroup {
    params: SimMotorParams,
    state: Mutex<SimState>,
}

impl Default for SimMotorGroup {
    fn default() -> Self {
        Self::new(SimMotorParams::default())
    }
}

impl SimMotorGroup {
    /// Creates a stopped motor group at position zero.
    pub fn new(params: SimMotorParams) -> Self {
        Self {
            params,
            state: Mutex::new(SimState {
                x: na::Vector2::zeros(),
                command: 0.0,
                brake: BrakeMode::default(),
                hold: None,
            }),
        }
    }

    /// The model parameters.
    pub fn params(&self) -> &SimMotorParams {
        &self.params
    }

    /// Current shaft speed in degrees per second.
    pub fn speed(&self) -> f64 {
        self.lock().x[1]
    }

    /// Lets `duration` of simulated time pass under the latest command.
    pub fn advance(&self, duration: Duration) {
        let mut state = self.lock();
        let h = self.params.step.as_secs_f64();
        let steps = (duration.as_secs_f64() / h).round() as u64;
        for _ in 0..steps {
            self.integrate(&mut state, h);
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// State derivative of the group:
    /// ┌    ┐   ┌               ┐
    /// │ p' │ = │ ω             │
    /// │ ω' │   │ (ω* - ω) / τ  │
    /// └    ┘   └               ┘
    /// where the speed setpoint ω* is the scaled command while driven or braking, a spring
    /// towards the hold position while holding, and τ is the coast time constant while coasting
    /// (with ω* = 0).
    fn f(&self, state: &SimState, x: na::Vector2<f64>) -> na::Vector2<f64> {
        let tau = self.params.time_constant.as_secs_f64();
        let omega = x[1];
        let acceleration = match (state.command != 0.0, state.brake, state.hold) {
            (true, _, _) | (false, BrakeMode::Brake, _) => {
                (state.command * self.params.free_speed / 100.0 - omega) / tau
            }
            (false, BrakeMode::Hold, Some(hold)) => {
                (self.params.hold_stiffness * (hold - x[0]) - omega) / tau
            }
            (false, BrakeMode::Hold, None) => -omega / tau,
            (false, BrakeMode::Coast, _) => -omega / self.params.coast_time_constant.as_secs_f64(),
        };
        na::Vector2::new(omega, acceleration)
    }

    fn integrate(&self, state: &mut SimState, h: f64) {
        let next = rk4_step(|x| self.f(state, x), state.x, h);
        state.x = next;
    }
}

/// One classical Runge-Kutta step of `x' = f(x)`.
pub fn rk4_step<G>(f: G, x: na::Vector2<f64>, h: f64) -> na::Vector2<f64>
where
    G: Fn(na::Vector2<f64>) -> na::Vector2<f64>,
{
    let k1 = f(x);
    let k2 = f(x + k1 * (h / 2.0));
    let k3 = f(x + k2 * (h / 2.0));
    let k4 = f(x + k3 * h);
    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

impl Mechanism for SimMotorGroup {
    fn spin(&self, velocity: f64) {
        let mut state = self.lock();
        state.command = velocity.clamp(-100.0, 100.0);
        if state.command != 0.0 {
            state.hold = None;
        } else if state.hold.is_none() {
            state.hold = Some(state.x[0]);
        }
        self.integrate(&mut state, self.params.step.as_secs_f64());
    }

    fn position(&self, units: RotationUnits) -> f64 {
        units.from_degrees(self.lock().x[0])
    }

    fn reset_position(&self) {
        let mut state = self.lock();
        state.x[0] = 0.0;
        state.hold = None;
    }

    fn set_brake_mode(&self, mode: BrakeMode) {
        self.lock().brake = mode;
    }
}
