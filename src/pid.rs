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

use core::time::Duration;

use num_traits::Float;
use thiserror::Error;

/// Number of consecutive in-range samples required before a controller reports itself settled.
///
/// A single sample inside the error range says nothing about whether the plant has stopped
/// oscillating around the target.
pub const SETTLE_TICKS: u32 = 3;

/// Errors raised when a PID configuration value is rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PidConfigError {
    /// The proportional gain was zero, negative or non-finite.
    #[error("proportional gain must be positive and finite")]
    InvalidProportionalGain,
    /// The integral gain was negative or non-finite.
    #[error("integral gain must be non-negative and finite")]
    InvalidIntegralGain,
    /// The derivative gain was negative or non-finite.
    #[error("derivative gain must be non-negative and finite")]
    InvalidDerivativeGain,
    /// The bias was non-finite.
    #[error("bias must be finite")]
    InvalidBias,
    /// The integral limit was negative or non-finite.
    #[error("integral limit must be non-negative and finite")]
    InvalidIntegralLimit,
    /// The error range was zero, negative or non-finite.
    #[error("error range must be positive and finite")]
    InvalidErrorRange,
    /// The tick interval was zero or could not be represented in the float type.
    #[error("tick interval must be positive")]
    InvalidTickInterval,
}

fn constant<F: Float>(value: f64) -> F {
    F::from(value).unwrap_or_else(F::nan)
}

/// Gains, limits and sampling period of a PID controller.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidConfig<F: Float> {
    /// Proportional gain coefficient.
    /// Defaults to 1.0.
    kp: F,

    /// Integral gain coefficient, applied to the time integral of the error.
    /// Defaults to 0.0.
    ki: F,

    /// Derivative gain coefficient, applied to the backward difference of the error.
    /// Defaults to 0.0.
    kd: F,

    /// Constant feed-forward added to every output.
    /// Defaults to 0.0.
    bias: F,

    /// Bound on the magnitude of the accumulated integral. Zero turns the controller into PD.
    /// Defaults to 10.0.
    max_integral: F,

    /// Tolerance around the target within which samples count towards settling.
    /// Defaults to 1.0.
    error_range: F,

    /// Sampling period of the controller.
    /// Defaults to 20ms.
    tick_interval: Duration,

    // tick_interval in seconds, cached in F
    dt: F,
}

impl<F: Float> Default for PidConfig<F> {
    fn default() -> Self {
        PidConfig {
            kp: F::one(),
            ki: F::zero(),
            kd: F::zero(),
            bias: F::zero(),
            max_integral: constant(10.0),
            error_range: F::one(),
            tick_interval: Duration::from_millis(20),
            dt: constant(0.02),
        }
    }
}

impl<F: Float> PidConfig<F> {
    /// Convenience constructor for a configuration with the given gains and default limits.
    pub fn with_gains(kp: F, ki: F, kd: F) -> Result<Self, PidConfigError> {
        let mut config = Self::default();
        config.set_gains(kp, ki, kd)?;
        Ok(config)
    }

    /// Returns the proportional gain.
    pub fn kp(&self) -> F {
        self.kp
    }

    /// Returns the integral gain.
    pub fn ki(&self) -> F {
        self.ki
    }

    /// Returns the derivative gain.
    pub fn kd(&self) -> F {
        self.kd
    }

    /// Convenience method that returns the proportional, integral, and derivative gains together as a tuple.
    pub fn gains(&self) -> (F, F, F) {
        (self.kp, self.ki, self.kd)
    }

    /// Returns the feed-forward bias.
    pub fn bias(&self) -> F {
        self.bias
    }

    /// Returns the bound on the integral magnitude.
    pub fn max_integral(&self) -> F {
        self.max_integral
    }

    /// Returns the settling tolerance.
    pub fn error_range(&self) -> F {
        self.error_range
    }

    /// Returns the sampling period.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Sets the proportional gain.
    ///
    /// # Returns
    /// - `Ok(())` if the gain was set successfully.
    /// - `Err(PidConfigError::InvalidProportionalGain)` if the gain is not positive or not finite.
    pub fn set_kp(&mut self, kp: F) -> Result<(), PidConfigError> {
        if kp <= F::zero() || !kp.is_finite() {
            return Err(PidConfigError::InvalidProportionalGain);
        }
        self.kp = kp;
        Ok(())
    }

    /// Sets the integral gain. Zero is valid and disables the integral term.
    pub fn set_ki(&mut self, ki: F) -> Result<(), PidConfigError> {
        if ki < F::zero() || !ki.is_finite() {
            return Err(PidConfigError::InvalidIntegralGain);
        }
        self.ki = ki;
        Ok(())
    }

    /// Sets the derivative gain. Zero is valid and disables the derivative term.
    pub fn set_kd(&mut self, kd: F) -> Result<(), PidConfigError> {
        if kd < F::zero() || !kd.is_finite() {
            return Err(PidConfigError::InvalidDerivativeGain);
        }
        self.kd = kd;
        Ok(())
    }

    /// Convenience method to set the proportional, integral, and derivative gains together.
    ///
    /// The gains are validated before any of them is stored.
    pub fn set_gains(&mut self, kp: F, ki: F, kd: F) -> Result<(), PidConfigError> {
        let mut staged = *self;
        staged.set_kp(kp)?;
        staged.set_ki(ki)?;
        staged.set_kd(kd)?;
        *self = staged;
        Ok(())
    }

    /// Sets the feed-forward bias. May be of either sign.
    pub fn set_bias(&mut self, bias: F) -> Result<(), PidConfigError> {
        if !bias.is_finite() {
            return Err(PidConfigError::InvalidBias);
        }
        self.bias = bias;
        Ok(())
    }

    /// Sets the bound on the integral magnitude. Zero is valid and permanently disables the
    /// integral term.
    pub fn set_max_integral(&mut self, max_integral: F) -> Result<(), PidConfigError> {
        if max_integral < F::zero() || !max_integral.is_finite() {
            return Err(PidConfigError::InvalidIntegralLimit);
        }
        self.max_integral = max_integral;
        Ok(())
    }

    /// Sets the settling tolerance.
    ///
    /// Must be strictly positive: a continuous sensor would otherwise never report settled.
    pub fn set_error_range(&mut self, error_range: F) -> Result<(), PidConfigError> {
        if error_range <= F::zero() || !error_range.is_finite() {
            return Err(PidConfigError::InvalidErrorRange);
        }
        self.error_range = error_range;
        Ok(())
    }

    /// Sets the sampling period.
    ///
    /// # Returns
    /// - `Ok(())` if the interval was set successfully.
    /// - `Err(PidConfigError::InvalidTickInterval)` if the interval is zero or not representable.
    pub fn set_tick_interval(&mut self, tick_interval: Duration) -> Result<(), PidConfigError> {
        let dt = F::from(tick_interval.as_secs_f64()).ok_or(PidConfigError::InvalidTickInterval)?;
        if tick_interval.is_zero() || dt <= F::zero() || !dt.is_finite() {
            return Err(PidConfigError::InvalidTickInterval);
        }
        self.tick_interval = tick_interval;
        self.dt = dt;
        Ok(())
    }
}

/// Builds a validated [`PidConfig`].
///
/// ```rust
/// use std::time::Duration;
/// use wpid::pid::PidConfigBuilder;
///
/// let config = PidConfigBuilder::default()
///     .kp(0.15)
///     .ki(0.6)
///     .kd(0.015)
///     .max_integral(10.0)
///     .error_range(1.0)
///     .tick_interval(Duration::from_millis(50))
///     .build()
///     .expect("Invalid PID config");
/// assert_eq!(config.gains(), (0.15, 0.6, 0.015));
/// ```
#[derive(Copy, Clone, Debug)]
pub struct PidConfigBuilder<F: Float> {
    kp: F,
    ki: F,
    kd: F,
    bias: F,
    max_integral: F,
    error_range: F,
    tick_interval: Duration,
}

impl<F: Float> Default for PidConfigBuilder<F> {
    fn default() -> Self {
        let config = PidConfig::default();
        Self {
            kp: config.kp,
            ki: config.ki,
            kd: config.kd,
            bias: config.bias,
            max_integral: config.max_integral,
            error_range: config.error_range,
            tick_interval: config.tick_interval,
        }
    }
}

impl<F: Float> PidConfigBuilder<F> {
    /// Sets the proportional gain.
    pub fn kp(mut self, kp: F) -> Self {
        self.kp = kp;
        self
    }

    /// Sets the integral gain.
    pub fn ki(mut self, ki: F) -> Self {
        self.ki = ki;
        self
    }

    /// Sets the derivative gain.
    pub fn kd(mut self, kd: F) -> Self {
        self.kd = kd;
        self
    }

    /// Sets the constant added to every output.
    pub fn bias(mut self, bias: F) -> Self {
        self.bias = bias;
        self
    }

    /// Sets the bound on the accumulated integral. Zero disables the integral term.
    pub fn max_integral(mut self, max_integral: F) -> Self {
        self.max_integral = max_integral;
        self
    }

    /// Sets how close to the target a sample must be to count towards settling.
    pub fn error_range(mut self, error_range: F) -> Self {
        self.error_range = error_range;
        self
    }

    /// Sets the loop period, which is also the `dt` of the integral and derivative terms.
    pub fn tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    /// Validates every field and produces the configuration.
    pub fn build(self) -> Result<PidConfig<F>, PidConfigError> {
        let mut config = PidConfig::default();
        config.set_kp(self.kp)?;
        config.set_ki(self.ki)?;
        config.set_kd(self.kd)?;
        config.set_bias(self.bias)?;
        config.set_max_integral(self.max_integral)?;
        config.set_error_range(self.error_range)?;
        config.set_tick_interval(self.tick_interval)?;
        Ok(config)
    }
}

/// Running state of one PID control run: target, integral, previous error and settle counter.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PidContext<F: Float> {
    target: F,
    integral: F,
    last_error: F,
    last_output: F,
    settled_ticks: u32,
}

impl<F: Float> PidContext<F> {
    /// Starts a run towards `target` without a known measurement; the previous error is taken
    /// to be the target itself.
    pub fn new(target: F) -> Self {
        Self {
            target,
            integral: F::zero(),
            last_error: target,
            last_output: F::zero(),
            settled_ticks: 0,
        }
    }

    /// Starts a run towards `target` from the measurement `current`, so that the first
    /// derivative sample sees no step.
    pub fn with_measurement(target: F, current: F) -> Self {
        Self {
            last_error: target - current,
            ..Self::new(target)
        }
    }

    /// The setpoint.
    pub fn target(&self) -> F {
        self.target
    }

    /// The accumulated (clamped) integral of the error.
    pub fn integral(&self) -> F {
        self.integral
    }

    /// The error seen by the latest computation.
    pub fn error(&self) -> F {
        self.last_error
    }

    /// The most recent output.
    pub fn output(&self) -> F {
        self.last_output
    }

    /// Number of consecutive samples within the error range.
    pub fn settled_ticks(&self) -> u32 {
        self.settled_ticks
    }

    /// True once [`SETTLE_TICKS`] consecutive samples were within the error range.
    pub fn is_settled(&self) -> bool {
        self.settled_ticks >= SETTLE_TICKS
    }
}

/// A functional implementation of a PID controller.
///
/// The controller holds only its configuration; the running state lives in a [`PidContext`]
/// that is passed in and returned by each call to `compute`.
#[derive(Copy, Clone, Debug)]
pub struct FuncPidController<F: Float> {
    config: PidConfig<F>,
}

impl<F: Float> FuncPidController<F> {
    /// Creates a controller with the given configuration.
    pub fn new(config: PidConfig<F>) -> Self {
        FuncPidController { config }
    }

    /// The configuration.
    pub fn config(&self) -> &PidConfig<F> {
        &self.config
    }

    /// Mutable access to the configuration; changes apply from the next sample.
    pub fn config_mut(&mut self) -> &mut PidConfig<F> {
        &mut self.config
    }

    /// Computes one correction from a measurement.
    ///
    /// A non-finite measurement is treated as a stale reading: the context is returned
    /// unchanged together with the previous output.
    pub fn compute(&self, mut ctx: PidContext<F>, measurement: F) -> (F, PidContext<F>) {
        if !measurement.is_finite() {
            return (ctx.last_output, ctx);
        }

        let cfg = &self.config;
        let error = ctx.target - measurement;

        // Clamp i-term to prevent windup
        let integral = ctx.integral + error * cfg.dt;
        ctx.integral = num_traits::clamp(integral, -cfg.max_integral, cfg.max_integral);

        let derivative = (error - ctx.last_error) / cfg.dt;

        let output = cfg.kp * error + cfg.ki * ctx.integral + cfg.kd * derivative + cfg.bias;

        ctx.settled_ticks = if error.abs() <= cfg.error_range {
            ctx.settled_ticks.saturating_add(1)
        } else {
            0
        };
        ctx.last_error = error;
        ctx.last_output = output;
        (output, ctx)
    }
}

/// A stateful implementation of a PID controller.
///
/// This controller maintains its own [`PidContext`], so it can be used without passing a
/// context object. Call [`PidController::reset`] at the start of every new motion.
#[derive(Copy, Clone, Debug)]
pub struct PidController<F: Float> {
    ctx: PidContext<F>,
    controller: FuncPidController<F>,
}

impl<F: Float> PidController<F> {
    /// Creates a controller with a zero target.
    pub fn new(config: PidConfig<F>) -> Self {
        Self {
            ctx: PidContext::new(F::zero()),
            controller: FuncPidController::new(config),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &PidConfig<F> {
        self.controller.config()
    }

    /// Mutable access to the configuration; changes apply from the next sample.
    pub fn config_mut(&mut self) -> &mut PidConfig<F> {
        self.controller.config_mut()
    }

    /// The controller's context.
    pub fn context(&self) -> &PidContext<F> {
        &self.ctx
    }

    /// The current setpoint.
    pub fn target(&self) -> F {
        self.ctx.target
    }

    /// Retargets the controller, discarding the integral, derivative history and settle count.
    pub fn reset(&mut self, target: F, current: Option<F>) {
        self.ctx = match current {
            Some(current) => PidContext::with_measurement(target, current),
            None => PidContext::new(target),
        };
    }

    /// Samples `measurement` and returns the new output. A non-finite sample repeats the previous output.
    pub fn compute(&mut self, measurement: F) -> F {
        let (output, ctx) = self.controller.compute(self.ctx, measurement);
        self.ctx = ctx;
        output
    }

    /// Whether the error has stayed in range for enough consecutive samples.
    pub fn is_settled(&self) -> bool {
        self.ctx.is_settled()
    }
}
