//! Benchmark for the PID controllers
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

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use wpid::pid;

fn make_config() -> pid::PidConfig<f64> {
    pid::PidConfigBuilder::default()
        .kp(1.0)
        .ki(0.5)
        .kd(0.1)
        .max_integral(10.0)
        .tick_interval(Duration::from_millis(10))
        .build()
        .unwrap()
}

/// The functional controller copies its context in and out of every call.
fn bench_func_pid(c: &mut Criterion) {
    let pid = pid::FuncPidController::new(make_config());
    let mut ctx = pid::PidContext::with_measurement(1.0, 0.9);
    let mut measurement = 0.9;
    let mut output: f64 = 0.0;

    c.bench_function("functional PID", |b| {
        b.iter(|| {
            (output, ctx) = pid.compute(ctx, black_box(measurement));
            measurement += 0.0001; // prevent constant inputs
            black_box(output);
        });
    });
}

/// The stateful controller keeps its context inline, which the optimizer can keep in registers.
fn bench_stateful_pid(c: &mut Criterion) {
    let mut pid = pid::PidController::new(make_config());
    pid.reset(1.0, Some(0.9));
    let mut measurement = 0.9;

    c.bench_function("stateful PID", |b| {
        b.iter(|| {
            let output = pid.compute(black_box(measurement));
            measurement += 0.0001; // prevent constant inputs
            black_box(output);
        });
    });
}

struct SimplePidConfig {
    kp: f64,
    ki: f64,
    kd: f64,
}

// The naive PID law with a fixed period and the integral clamp, but no settle tracking and no
// stale-sample handling. The controllers above should not be much slower than this.
fn bench_naive_pid(c: &mut Criterion) {
    let cfg = SimplePidConfig {
        kp: 1.0,
        ki: 0.5,
        kd: 0.1,
    };
    let dt = 0.01;
    let mut err_sum: f64 = 0.0;
    let mut last_err: f64 = 0.1;

    let mut measurement = 0.9;
    let setpoint = 1.0;

    c.bench_function("naive PID", |b| {
        b.iter(|| {
            let error = black_box(setpoint) - black_box(measurement);
            err_sum = (err_sum + error * dt).clamp(-10.0, 10.0);
            let d_err = (error - last_err) / dt;

            let output = cfg.kp * error + cfg.ki * err_sum + cfg.kd * d_err;
            last_err = error;
            black_box(output);

            measurement += 0.0001; // prevent constant inputs
        });
    });
}

criterion_group!(benches, bench_func_pid, bench_stateful_pid, bench_naive_pid,);
criterion_main!(benches);
