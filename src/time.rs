// Defines the delay service used to pace control loops
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

use core::fmt::Debug;
use core::time::Duration;

/// A trait for anything that can suspend the calling control loop for one tick.
/// Control loops call this exactly once per iteration and never block anywhere else, so the
/// implementation decides how wall-clock time relates to controller time.
pub trait Delay: Debug + Send + Sync {
    /// Suspends the caller for `duration`
    fn delay(&self, duration: Duration);
}

/// Sleeps the current OS thread for the requested duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Yields to the scheduler without waiting for wall-clock time.
///
/// Meant for plants that advance by one fixed step per command, e.g. the models in the
/// `simulation` feature, where sleeping would only slow the run down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YieldDelay;

impl Delay for YieldDelay {
    fn delay(&self, _duration: Duration) {
        std::thread::yield_now();
    }
}

/// Tests that StdDelay really suspends for at least the requested duration.
#[cfg(test)]
#[test]
fn test_std_delay_sleeps() {
    let start = std::time::Instant::now();
    StdDelay.delay(Duration::from_millis(5));
    assert!(start.elapsed() >= Duration::from_millis(5));
}
