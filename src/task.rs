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

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::error;

/// Observable state of an axis group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionState {
    /// Nothing is driving the axis group.
    Idle,
    /// Targets are being computed and the controllers reset.
    Targeting,
    /// The control loop is running.
    Converging,
    /// Every controller settled; the brake is being applied.
    Settled,
}

/// How a motion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionOutcome {
    /// Every controller of the motion settled and the brake was applied.
    Settled,
    /// The motion was stopped or superseded before settling. No brake was applied.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running(MotionState),
    Finished(MotionOutcome),
}

#[derive(Debug)]
struct TaskInner {
    name: String,
    cancelled: AtomicBool,
    phase: Mutex<Phase>,
    changed: Condvar,
    thread: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TaskInner {
    fn set_phase(&self, phase: Phase) {
        let mut current = lock(&self.phase);
        // Finished is terminal
        if let Phase::Finished(_) = *current {
            return;
        }
        *current = phase;
        self.changed.notify_all();
    }
}

/// Handle to one in-flight asynchronous motion.
///
/// Handles are cheap to clone; every clone observes the same motion. The chassis keeps one
/// per axis group, so dropping the handle returned by an `*_async` call does not stop the
/// motion.
#[derive(Debug, Clone)]
pub struct MotionHandle {
    inner: Arc<TaskInner>,
}

/// The worker side of a [`MotionHandle`], handed to the control loop.
///
/// Dropping it without calling [`TaskControl::finish`] (e.g. because the loop panicked)
/// finishes the motion as cancelled so waiters are released.
#[derive(Debug)]
pub struct TaskControl {
    inner: Arc<TaskInner>,
}

impl TaskControl {
    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Publishes the loop's progress.
    pub fn advance(&self, state: MotionState) {
        self.inner.set_phase(Phase::Running(state));
    }

    /// Publishes the final outcome and wakes every waiter.
    pub fn finish(self, outcome: MotionOutcome) {
        self.inner.set_phase(Phase::Finished(outcome));
    }
}

impl Drop for TaskControl {
    fn drop(&mut self) {
        self.inner.set_phase(Phase::Finished(MotionOutcome::Cancelled));
    }
}

impl MotionHandle {
    /// Runs `body` on a new named thread.
    ///
    /// The body receives the worker side of the handle and returns how the motion ended.
    pub fn spawn<B>(name: &str, body: B) -> io::Result<Self>
    where
        B: FnOnce(&TaskControl) -> MotionOutcome + Send + 'static,
    {
        let inner = Arc::new(TaskInner {
            name: name.to_owned(),
            cancelled: AtomicBool::new(false),
            phase: Mutex::new(Phase::Running(MotionState::Targeting)),
            changed: Condvar::new(),
            thread: Mutex::new(None),
        });
        let control = TaskControl {
            inner: Arc::clone(&inner),
        };

        let thread = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let outcome = body(&control);
                control.finish(outcome);
            })?;
        *lock(&inner.thread) = Some(thread);

        Ok(Self { inner })
    }

    /// The worker thread's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Requests cancellation. The control loop observes it within one tick.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Current state; [`MotionState::Idle`] once the motion has finished.
    pub fn state(&self) -> MotionState {
        match *lock(&self.inner.phase) {
            Phase::Running(state) => state,
            Phase::Finished(_) => MotionState::Idle,
        }
    }

    /// How the motion ended, or `None` while it is still running.
    pub fn outcome(&self) -> Option<MotionOutcome> {
        match *lock(&self.inner.phase) {
            Phase::Running(_) => None,
            Phase::Finished(outcome) => Some(outcome),
        }
    }

    /// Whether the motion has finished, settled or cancelled.
    pub fn is_finished(&self) -> bool {
        self.outcome().is_some()
    }

    /// Blocks until the motion finishes, then reaps its worker thread.
    ///
    /// There is no timeout: a motion that can never settle blocks until cancelled.
    pub fn wait(&self) -> MotionOutcome {
        let outcome = {
            let mut phase = lock(&self.inner.phase);
            loop {
                if let Phase::Finished(outcome) = *phase {
                    break outcome;
                }
                phase = self
                    .inner
                    .changed
                    .wait(phase)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let thread = lock(&self.inner.thread).take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                error!("motion worker `{}` panicked", self.inner.name);
            }
        }
        outcome
    }

    /// Requests cancellation and waits for the loop to observe it.
    pub fn cancel_and_wait(&self) -> MotionOutcome {
        self.cancel();
        self.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_outcome_is_reported_once_finished() {
        let handle = MotionHandle::spawn("settles", |control| {
            control.advance(MotionState::Converging);
            MotionOutcome::Settled
        })
        .unwrap();

        assert_eq!(handle.wait(), MotionOutcome::Settled);
        assert_eq!(handle.state(), MotionState::Idle);
        assert_eq!(handle.outcome(), Some(MotionOutcome::Settled));
    }

    #[test]
    fn test_cancellation_is_observed_by_the_worker() {
        let handle = MotionHandle::spawn("spins", |control| {
            control.advance(MotionState::Converging);
            while !control.is_cancelled() {
                thread::sleep(Duration::from_millis(1));
            }
            MotionOutcome::Cancelled
        })
        .unwrap();

        thread::sleep(Duration::from_millis(5));
        assert_eq!(handle.state(), MotionState::Converging);
        assert_eq!(handle.cancel_and_wait(), MotionOutcome::Cancelled);
        assert!(handle.is_finished());
    }

    #[test]
    fn test_panicking_worker_releases_waiters() {
        let handle = MotionHandle::spawn("panics", |_| panic!("lost the encoder")).unwrap();
        assert_eq!(handle.wait(), MotionOutcome::Cancelled);
        // A second wait returns immediately
        assert_eq!(handle.wait(), MotionOutcome::Cancelled);
    }
}
