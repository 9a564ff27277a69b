// Randomized property tests for single-DoF synthesis and synchronization

#[cfg(test)]
mod tests {
    use otg_rs::OtgError;
    use otg_rs::motion::{
        DofSolver, KinematicState, Limits, PositionSolver, Profile, SyncOptions, synchronize, synthesize, with_duration,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const EPS: f64 = 1e-8;

    fn random_symmetric_limits(rng: &mut StdRng) -> Limits {
        Limits::symmetric(
            rng.random_range(0.5..3.0),
            rng.random_range(0.5..3.0),
            rng.random_range(0.5..3.0),
        )
    }

    /// Random boundary states with asymmetric limits. The current state may
    /// need a brake; the target is reachable without one.
    fn random_case(rng: &mut StdRng) -> (KinematicState, KinematicState, Limits) {
        let limits = Limits::new(
            rng.random_range(0.5..3.0),
            Some(-rng.random_range(0.5..3.0)),
            rng.random_range(0.5..3.0),
            Some(-rng.random_range(0.5..3.0)),
            rng.random_range(0.5..3.0),
        );
        let current = KinematicState::new(
            rng.random_range(-5.0..5.0),
            rng.random_range(limits.min_velocity..limits.max_velocity),
            rng.random_range(limits.min_acceleration..limits.max_acceleration),
        );
        let target = loop {
            let velocity = rng.random_range(limits.min_velocity..limits.max_velocity);
            let acceleration = rng.random_range(limits.min_acceleration..limits.max_acceleration);
            let carry = acceleration * acceleration / (2.0 * limits.max_jerk);
            if (acceleration > 0.0 && velocity - carry < limits.min_velocity)
                || (acceleration < 0.0 && velocity + carry > limits.max_velocity)
            {
                continue;
            }
            break KinematicState::new(rng.random_range(-5.0..5.0), velocity, acceleration);
        };
        (current, target, limits)
    }

    /// Velocity is checked once it is back inside its bounds after the brake.
    fn assert_within_limits(profile: &Profile, limits: &Limits) {
        let samples = 400;
        let start = profile.brake_duration();
        let mut inside_once = false;
        for k in 0..=samples {
            let t = start + (profile.duration() - start) * k as f64 / samples as f64;
            let state = profile.state_at(t);
            let inside = state.velocity <= limits.max_velocity + EPS && state.velocity >= limits.min_velocity - EPS;
            inside_once |= inside;
            if inside_once {
                assert!(inside, "velocity {} leaves the bounds at t = {t}", state.velocity);
            }
            assert!(state.acceleration <= limits.max_acceleration + EPS && state.acceleration >= limits.min_acceleration - EPS);
        }
        for segment in profile.segments() {
            assert!(segment.jerk.abs() <= limits.max_jerk * (1.0 + EPS));
        }
    }

    #[test]
    fn test_profiles_respect_limits_and_reach_target() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..300 {
            let (current, target, limits) = random_case(&mut rng);
            let profile = synthesize(&current, &target, &limits).unwrap();
            assert_within_limits(&profile, &limits);

            let end = profile.state_at(profile.duration());
            assert_eq!(end, target);
            let integrated = profile
                .segments()
                .last()
                .map_or(current, |s| s.end());
            assert!((integrated.position - target.position).abs() < 1e-7);
            assert!((integrated.velocity - target.velocity).abs() < 1e-7);
            assert!((integrated.acceleration - target.acceleration).abs() < 1e-7);
        }
    }

    #[test]
    fn test_segments_are_continuous() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let (current, target, limits) = random_case(&mut rng);
            let profile = synthesize(&current, &target, &limits).unwrap();
            let mut state = current;
            for segment in profile.segments() {
                assert!((segment.start.position - state.position).abs() < 1e-12 * (1.0 + state.position.abs()));
                assert!((segment.start.velocity - state.velocity).abs() < 1e-12 * (1.0 + state.velocity.abs()));
                assert!((segment.start.acceleration - state.acceleration).abs() < 1e-12);
                state = segment.end();
            }
        }
    }

    #[test]
    fn test_no_shorter_profile_exists() {
        let mut rng = StdRng::seed_from_u64(23);
        for _ in 0..40 {
            let (current, target, limits) = random_case(&mut rng);
            let profile = synthesize(&current, &target, &limits).unwrap();
            if profile.duration() < 1e-3 {
                continue;
            }
            for factor in [0.9, 0.98] {
                let err = with_duration(&current, &target, &limits, profile.duration() * factor).unwrap_err();
                assert!(matches!(err, OtgError::SynchronizationInfeasible { .. }));
            }
        }
    }

    #[test]
    fn test_synchronized_durations_match() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let solvers: Vec<DofSolver> = (0..3)
                .map(|_| {
                    let limits = random_symmetric_limits(&mut rng);
                    let current = KinematicState::at_rest(rng.random_range(-2.0..2.0));
                    let target = KinematicState::at_rest(rng.random_range(-2.0..2.0));
                    DofSolver::Position(PositionSolver::new(current, target, limits))
                })
                .collect();
            let synced = synchronize(&solvers, &SyncOptions::default()).unwrap();
            let slowest = synced.independent_min_durations.iter().copied().fold(0.0, f64::max);
            assert!((synced.duration - slowest).abs() < 1e-9);
            for (profile, solver) in synced.profiles.iter().zip(&solvers) {
                assert!((profile.duration() - synced.duration).abs() < 1e-7);
                if let DofSolver::Position(s) = solver {
                    assert_within_limits(profile, &s.limits);
                    assert_eq!(profile.end(), s.target);
                }
            }
        }
    }

    #[test]
    fn test_asymmetric_limits() {
        let limits = Limits::new(1.0, Some(-0.5), 2.0, Some(-1.0), 1.5);
        let current = KinematicState::at_rest(0.0);
        for target in [3.0, -3.0] {
            let profile = synthesize(&current, &KinematicState::at_rest(target), &limits).unwrap();
            assert_within_limits(&profile, &limits);
            assert_eq!(profile.end().position, target);
        }
    }
}
