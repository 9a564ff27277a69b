// Benchmark for profile synthesis and full trajectory calculation
// Run with: cargo bench

use criterion::{Criterion, criterion_group, criterion_main};
use otg_rs::motion::{KinematicState, Limits, synthesize};
use otg_rs::{InputParameter, Otg, Path, PathWaypoint};
use std::hint::black_box;

fn limited_input(dofs: usize) -> InputParameter {
    let mut input = InputParameter::new(dofs);
    input.max_velocity = vec![2.0; dofs];
    input.max_acceleration = vec![2.0; dofs];
    input.max_jerk = vec![1.0; dofs];
    input
}

fn bench_single_dof(c: &mut Criterion) {
    let limits = Limits::symmetric(2.0, 2.0, 1.0);
    let current = KinematicState::new(0.0, 0.4, -0.3);
    let target = KinematicState::new(3.0, 0.5, 0.0);
    c.bench_function("synthesize 1 DoF", |b| {
        b.iter(|| synthesize(black_box(&current), black_box(&target), black_box(&limits)).unwrap());
    });
}

fn bench_synchronized(c: &mut Criterion) {
    let otg = Otg::new(3, 0.001).unwrap();
    let mut input = limited_input(3);
    input.current_velocity = vec![0.2, -0.5, 0.0];
    input.target_position = vec![0.5, 2.0, -1.0];
    c.bench_function("calculate 3 DoFs synchronized", |b| {
        b.iter(|| otg.calculate(black_box(&input)).unwrap());
    });
}

fn bench_path(c: &mut Criterion) {
    let otg = Otg::new(3, 0.001).unwrap();
    let waypoints = vec![
        PathWaypoint::absolute(vec![1.0, 0.0, 0.0]),
        PathWaypoint::absolute(vec![1.0, 1.0, -3.0]),
        PathWaypoint::absolute(vec![0.0, 0.0, 0.0]),
    ];
    let mut input = limited_input(3);
    input.path = Some(Path::new(vec![0.0; 3], waypoints, 0.1).unwrap());
    c.bench_function("calculate 3 DoFs along a blended path", |b| {
        b.iter(|| otg.calculate(black_box(&input)).unwrap());
    });
}

criterion_group!(benches, bench_single_dof, bench_synchronized, bench_path);
criterion_main!(benches);
