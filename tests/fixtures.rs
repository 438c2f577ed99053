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

#[cfg(test)]
#[allow(dead_code)]
pub mod test_pid {

    use wpid::pid::*;

    pub fn make_controller() -> (FuncPidController<f64>, PidContext<f64>) {
        let config = PidConfig::default();
        let controller = FuncPidController::new(config);
        let ctx = PidContext::new(0.0);
        (controller, ctx)
    }

    pub fn make_stateful_controller() -> PidController<f64> {
        let config = PidConfig::default();
        PidController::new(config)
    }
}

#[cfg(test)]
#[allow(dead_code)]
pub mod test_chassis {

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread::{self, ThreadId};
    use std::time::Duration;

    use wpid::chassis::{Geometry, HDrive, Tank};
    use wpid::mechanism::{BrakeMode, Mechanism, RotationUnits};
    use wpid::pid::{PidConfig, PidConfigBuilder};
    use wpid::time::StdDelay;

    /// Motor degrees the mock moves per unit of commanded velocity, once per command.
    pub const PLANT_GAIN: f64 = 0.5;
    pub const TICK: Duration = Duration::from_millis(5);
    pub const ERROR_RANGE: f64 = 1.0;

    pub const TRACK_WIDTH: f64 = 12.625;
    pub const WHEEL_RADIUS: f64 = 1.625;
    pub const CENTER_WHEEL_RADIUS: f64 = 1.375;

    // Orders commands across every mock in the process
    static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct Command {
        pub seq: usize,
        pub thread: ThreadId,
        pub velocity: f64,
        /// Position when the command arrived, i.e. the latest sample the loop could have read.
        pub position: f64,
    }

    #[derive(Debug, Default)]
    struct MockState {
        degrees: f64,
        commands: Vec<Command>,
        brake: Option<BrakeMode>,
        stale_reads: usize,
    }

    /// A motor group that moves `PLANT_GAIN * velocity` degrees on every spin command, so a
    /// motion advances exactly one plant step per tick.
    #[derive(Debug, Default)]
    pub struct MockMechanism {
        state: Mutex<MockState>,
    }

    impl MockMechanism {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// A group whose first `count` position reads are NaN, like an encoder still booting.
        pub fn with_stale_reads(count: usize) -> Arc<Self> {
            let mock = Self::default();
            mock.state.lock().unwrap().stale_reads = count;
            Arc::new(mock)
        }

        pub fn commands(&self) -> Vec<Command> {
            self.state.lock().unwrap().commands.clone()
        }

        pub fn velocities(&self) -> Vec<f64> {
            self.commands().iter().map(|c| c.velocity).collect()
        }

        pub fn last_velocity(&self) -> Option<f64> {
            self.commands().last().map(|c| c.velocity)
        }

        pub fn degrees(&self) -> f64 {
            self.state.lock().unwrap().degrees
        }

        pub fn brake_mode(&self) -> Option<BrakeMode> {
            self.state.lock().unwrap().brake
        }
    }

    impl Mechanism for MockMechanism {
        fn spin(&self, velocity: f64) {
            let mut state = self.state.lock().unwrap();
            let command = Command {
                seq: SEQUENCE.fetch_add(1, Ordering::SeqCst),
                thread: thread::current().id(),
                velocity,
                position: state.degrees,
            };
            state.commands.push(command);
            state.degrees += PLANT_GAIN * velocity;
        }

        fn position(&self, units: RotationUnits) -> f64 {
            let mut state = self.state.lock().unwrap();
            if state.stale_reads > 0 {
                state.stale_reads -= 1;
                return f64::NAN;
            }
            units.from_degrees(state.degrees)
        }

        fn reset_position(&self) {
            self.state.lock().unwrap().degrees = 0.0;
        }

        fn set_brake_mode(&self, mode: BrakeMode) {
            self.state.lock().unwrap().brake = Some(mode);
        }
    }

    pub fn make_pid(kp: f64) -> PidConfig<f64> {
        make_pid_with_tick(kp, TICK)
    }

    pub fn make_pid_with_tick(kp: f64, tick: Duration) -> PidConfig<f64> {
        PidConfigBuilder::default()
            .kp(kp)
            .error_range(ERROR_RANGE)
            .tick_interval(tick)
            .build()
            .unwrap()
    }

    pub fn make_geometry() -> Geometry {
        Geometry::new(TRACK_WIDTH, WHEEL_RADIUS, 1.0).unwrap()
    }

    pub fn make_tank() -> (Tank, Arc<MockMechanism>, Arc<MockMechanism>) {
        let left = MockMechanism::new();
        let right = MockMechanism::new();
        let tank = Tank::with_delay(
            make_geometry(),
            left.clone(),
            right.clone(),
            Arc::new(StdDelay),
        );
        tank.set_straight_pid(make_pid(0.5));
        tank.set_turn_pid(make_pid(0.5));
        (tank, left, right)
    }

    pub fn make_hdrive() -> (
        HDrive,
        Arc<MockMechanism>,
        Arc<MockMechanism>,
        Arc<MockMechanism>,
    ) {
        let left = MockMechanism::new();
        let right = MockMechanism::new();
        let center = MockMechanism::new();
        let hdrive = HDrive::with_delay(
            make_geometry(),
            CENTER_WHEEL_RADIUS,
            left.clone(),
            right.clone(),
            center.clone(),
            Arc::new(StdDelay),
        )
        .unwrap();
        hdrive.set_straight_pid(make_pid(0.5));
        hdrive.set_turn_pid(make_pid(0.5));
        hdrive.set_strafe_pid(make_pid(0.5));
        (hdrive, left, right, center)
    }
}
