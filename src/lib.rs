#![warn(missing_docs)]

//! # Closed-loop chassis motion for competition robots
//!
//! This library turns high-level motion commands (drive 24 inches, turn 90 degrees, strafe,
//! drive a diagonal) into continuous motor velocity commands, using PID feedback from the
//! wheel encoders.
//!
//! ## Features
//!
//! - A discrete PID controller with:
//!   - Fully validated gains, bias, integral limit, error range and tick interval.
//!   - Anti reset-windup: the integral magnitude never exceeds its limit.
//!   - Debounced settling: the error must stay in range for several consecutive ticks.
//!   - Both functional and stateful forms.
//!
//! - Two drivetrain topologies behind one capability trait:
//!   - [`Tank`](chassis::Tank): left and right motor groups.
//!   - [`HDrive`](chassis::HDrive): adds a perpendicular center group for strafing and
//!     diagonal motion.
//!
//! - Blocking and non-blocking motions sharing one state machine per axis group:
//!   - A new command cancels the motion on the same groups and waits for it to exit first.
//!   - [`stop`](chassis::Chassis::stop) zeroes every group immediately.
//!   - Acceleration ramping and speed caps on every velocity command.
//!
//! Hardware is injected: implement [`Mechanism`](mechanism::Mechanism) for your motor groups
//! and, optionally, [`Delay`](time::Delay) for your scheduler.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//!
//! use wpid::chassis::{Chassis, Geometry, Tank};
//! use wpid::mechanism::{BrakeMode, Mechanism, RotationUnits};
//! use wpid::pid::PidConfigBuilder;
//! use wpid::task::MotionOutcome;
//! use wpid::time::YieldDelay;
//!
//! // A motor group that moves a fixed fraction of its commanded velocity each tick
//! #[derive(Debug, Default)]
//! struct Motors {
//!     degrees: Mutex<f64>,
//! }
//!
//! impl Mechanism for Motors {
//!     fn spin(&self, velocity: f64) {
//!         *self.degrees.lock().unwrap() += 0.5 * velocity;
//!     }
//!     fn position(&self, units: RotationUnits) -> f64 {
//!         units.from_degrees(*self.degrees.lock().unwrap())
//!     }
//!     fn reset_position(&self) {
//!         *self.degrees.lock().unwrap() = 0.0;
//!     }
//!     fn set_brake_mode(&self, _mode: BrakeMode) {}
//! }
//!
//! let chassis = Tank::with_delay(
//!     Geometry::new(12.625, 1.625, 1.0).expect("Invalid geometry"),
//!     Arc::new(Motors::default()),
//!     Arc::new(Motors::default()),
//!     Arc::new(YieldDelay),
//! );
//!
//! let straight = PidConfigBuilder::default()
//!     .kp(0.5)
//!     .error_range(1.0)
//!     .tick_interval(Duration::from_millis(10))
//!     .build()
//!     .expect("Invalid PID config");
//! chassis.set_straight_pid(straight);
//! chassis.set_brake_type(BrakeMode::Brake);
//!
//! let outcome = chassis.straight(24.0, 100.0).expect("Motion rejected");
//! assert_eq!(outcome, MotionOutcome::Settled);
//!
//! // Or keep working while the chassis drives
//! chassis.turn_async(90.0, 60.0).expect("Motion rejected");
//! // ... run other subsystems ...
//! assert_eq!(chassis.wait_until_settled(), Some(MotionOutcome::Settled));
//! ```
//!
//! ## License
//!
//! MIT

/// The discrete PID controller.
pub mod pid;

/// The delay service that paces control loops.
pub mod time;

/// The boundary to motor hardware.
pub mod mechanism;

/// Handles to motions running on their own threads.
pub mod task;

/// Tank and H-drive chassis built from mechanisms and PID controllers.
pub mod chassis;

#[doc(hidden)]
#[cfg(feature = "simulation")]
pub mod sim;

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;
