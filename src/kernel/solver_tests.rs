use crate::assert_float_eq;
use crate::ensemble::{Ensemble, PointMass};
use crate::kernel::{Backend, RsqrtMode, SimdAccumulate, Solver, SolverOptions};
use crate::utils::GRAVITATIONAL_CONSTANT;
use approx::assert_relative_eq;

fn step_into_vec<T: SimdAccumulate>(solver: &mut Solver<T>, ensemble: &mut Ensemble<T>) -> Vec<T> {
    solver.step(ensemble).expect("Step failed");
    let (ax, ay, az) = ensemble.accelerations();
    ax.iter().chain(ay).chain(az).copied().collect()
}

fn reference_accels<T: SimdAccumulate>(ensemble: &mut Ensemble<T>) -> Vec<T> {
    let mut solver = Solver::new(SolverOptions::default());
    step_into_vec(&mut solver, ensemble)
}

#[test]
fn test_two_body_scenario_with_default_solver() {
    let bodies = [
        PointMass::new([0.0, 0.0, 0.0], 1.0).unwrap(),
        PointMass::new([1.0, 0.0, 0.0], 1.0).unwrap(),
    ];
    let mut ensemble =
        Ensemble::<f64>::from_point_masses(&bodies, 1.0).expect("Failed to create ensemble");

    let mut solver = Solver::new(SolverOptions::default());
    solver.step(&mut ensemble).expect("Step failed");

    let (ax, ay, az) = ensemble.accelerations();
    assert_float_eq(ax[0], 1.0, 1e-12, None);
    assert_float_eq(ax[1], -1.0, 1e-12, None);
    assert_eq!(ay[0], 0.0);
    assert_eq!(az[1], 0.0);
}

#[test]
fn test_every_f64_variant_agrees_with_the_scalar_reference() {
    let n = 61;
    let mut ensemble = Ensemble::<f64>::random_cloud(n, 1.0, 12.0, 2024)
        .expect("Failed to create ensemble");
    let reference = reference_accels(&mut ensemble);

    for backend in [Backend::Scalar, Backend::Simd] {
        for threads in [1, 2, 4, 7, 0] {
            let mut solver = Solver::new(SolverOptions {
                backend,
                threads,
                rsqrt: RsqrtMode::Exact,
            });
            let result = step_into_vec(&mut solver, &mut ensemble);
            for (got, want) in result.iter().zip(reference.iter()) {
                assert_relative_eq!(*got, *want, max_relative = 1e-9, epsilon = 1e-12);
            }
        }
    }
}

#[test]
fn test_every_f32_variant_agrees_with_the_scalar_reference() {
    let n = 45;
    let mut ensemble = Ensemble::<f32>::random_cloud(n, 1.0, 12.0, 31)
        .expect("Failed to create ensemble");
    let reference = reference_accels(&mut ensemble);

    for backend in [Backend::Scalar, Backend::Simd] {
        for threads in [1, 3, 8] {
            let mut solver = Solver::new(SolverOptions {
                backend,
                threads,
                rsqrt: RsqrtMode::Exact,
            });
            let result = step_into_vec(&mut solver, &mut ensemble);
            for (got, want) in result.iter().zip(reference.iter()) {
                assert_relative_eq!(*got, *want, max_relative = 1e-3, epsilon = 1e-4);
            }
        }
    }
}

#[test]
fn test_repeated_steps_produce_identical_output() {
    // Unchanged positions must give bit-identical output on every variant;
    // any leakage from a previous step would show up here.
    let mut ensemble = Ensemble::<f64>::random_cloud(33, 1.0, 6.0, 77)
        .expect("Failed to create ensemble");

    for backend in [Backend::Scalar, Backend::Simd] {
        for threads in [1, 4] {
            let mut solver = Solver::new(SolverOptions {
                backend,
                threads,
                rsqrt: RsqrtMode::Exact,
            });
            let first = step_into_vec(&mut solver, &mut ensemble);
            let second = step_into_vec(&mut solver, &mut ensemble);
            assert_eq!(first, second);
        }
    }
}

#[test]
fn test_single_body_yields_zero_acceleration() {
    let bodies = [PointMass::new([3.0, -2.0, 9.0], 5.0).unwrap()];
    let mut ensemble =
        Ensemble::<f64>::from_point_masses(&bodies, 1.0).expect("Failed to create ensemble");

    let mut solver = Solver::new(SolverOptions {
        threads: 4,
        ..SolverOptions::default()
    });
    solver.step(&mut ensemble).expect("Step failed");

    let (ax, ay, az) = ensemble.accelerations();
    assert_eq!((ax[0], ay[0], az[0]), (0.0, 0.0, 0.0));
}

#[test]
fn test_solver_replans_when_the_ensemble_size_changes() {
    let mut solver = Solver::new(SolverOptions {
        threads: 4,
        ..SolverOptions::default()
    });

    let mut small = Ensemble::<f64>::random_cloud(10, 1.0, 5.0, 3)
        .expect("Failed to create ensemble");
    let small_result = step_into_vec(&mut solver, &mut small);
    let small_reference = reference_accels(&mut small);

    let mut large = Ensemble::<f64>::random_cloud(33, 1.0, 5.0, 4)
        .expect("Failed to create ensemble");
    let large_result = step_into_vec(&mut solver, &mut large);
    let large_reference = reference_accels(&mut large);

    for (got, want) in small_result.iter().zip(small_reference.iter()) {
        assert_relative_eq!(*got, *want, max_relative = 1e-12, epsilon = 1e-15);
    }
    for (got, want) in large_result.iter().zip(large_reference.iter()) {
        assert_relative_eq!(*got, *want, max_relative = 1e-12, epsilon = 1e-15);
    }
}

#[test]
fn test_earth_moon_acceleration_in_si_units() {
    let bodies = [
        PointMass::new([0.0, 0.0, 0.0], 5.972e24).unwrap(),
        PointMass::new([3.844e8, 0.0, 0.0], 7.348e22).unwrap(),
    ];
    let mut ensemble = Ensemble::<f64>::from_point_masses(&bodies, GRAVITATIONAL_CONSTANT)
        .expect("Failed to create ensemble");

    let mut solver = Solver::new(SolverOptions::default());
    assert_eq!(solver.options().backend, Backend::Scalar);
    solver.step(&mut ensemble).expect("Step failed");

    // G * m_earth / r^2: the familiar ~2.7 mm/s^2 of the Moon's orbit.
    let (ax, _, _) = ensemble.accelerations();
    assert_relative_eq!(ax[1], -2.697e-3, max_relative = 1e-3);
}

#[test]
fn test_coincident_bodies_propagate_non_finite_output() {
    let bodies = [
        PointMass::new([1.0, 1.0, 1.0], 2.0).unwrap(),
        PointMass::new([1.0, 1.0, 1.0], 3.0).unwrap(),
    ];
    let mut ensemble =
        Ensemble::<f64>::from_point_masses(&bodies, 1.0).expect("Failed to create ensemble");

    let mut solver = Solver::new(SolverOptions::default());
    solver.step(&mut ensemble).expect("Step failed");

    // Division by zero is not guarded; the caller-facing check reports it.
    assert!(!ensemble.accelerations_finite());
}
