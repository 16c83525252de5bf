//! Results must not depend on worker count, granularity or backend.

use proptest::prelude::*;
use relax_core::{Granularity, Grid, Seed};
use relax_engine::{Backend, Engine, EngineConfig, RelaxReport};
use relax_test_utils::fixtures::{example_grid, ramp_grid, EXAMPLE_PRECISION};
use relax_test_utils::serial_reference;

fn run(
    grid: Grid,
    workers: usize,
    backend: Backend,
    granularity: Granularity,
    precision: f64,
) -> RelaxReport {
    let cfg = EngineConfig {
        rows: grid.rows(),
        cols: grid.cols(),
        precision,
        workers,
        backend,
        granularity,
        max_iterations: None,
    };
    Engine::new(cfg).unwrap().run(grid).unwrap()
}

#[test]
fn worker_count_does_not_change_result() {
    let baseline = run(ramp_grid(11, 13), 1, Backend::SharedMemory, Granularity::Cells, 0.01);
    for workers in [1, 2, 4, 7] {
        for granularity in [Granularity::Cells, Granularity::Rows] {
            let r = run(ramp_grid(11, 13), workers, Backend::SharedMemory, granularity, 0.01);
            assert_eq!(r.iterations, baseline.iterations, "{workers} {granularity:?}");
            assert_eq!(r.grid.current(), baseline.grid.current(), "{workers} {granularity:?}");
        }
    }
}

#[test]
fn distributed_matches_shared_memory() {
    for workers in [1, 2, 4, 7] {
        let shared = run(
            example_grid(),
            workers,
            Backend::SharedMemory,
            Granularity::Cells,
            EXAMPLE_PRECISION,
        );
        let dist = run(
            example_grid(),
            workers,
            Backend::Distributed,
            Granularity::Rows,
            EXAMPLE_PRECISION,
        );
        assert_eq!(shared.iterations, dist.iterations, "workers={workers}");
        assert_eq!(shared.grid.current(), dist.grid.current(), "workers={workers}");
        assert_eq!(shared.converged, dist.converged);
    }
}

#[test]
fn more_workers_than_cells() {
    // 4x4 has 4 interior cells and 2 interior rows.
    let reference = serial_reference(ramp_grid(4, 4), 0.1, None);
    for backend in [Backend::SharedMemory, Backend::Distributed] {
        let r = run(ramp_grid(4, 4), 9, backend, Granularity::Cells, 0.1);
        assert_eq!(r.iterations, reference.iterations, "{backend:?}");
        assert_eq!(r.grid.current(), reference.values.as_slice(), "{backend:?}");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_grids_match_serial_reference(
        rows in 3usize..10,
        cols in 3usize..10,
        workers in 1usize..6,
        seed in any::<u64>(),
        by_rows in any::<bool>(),
        distributed in any::<bool>(),
    ) {
        let grid = Seed::Random { seed }.build(rows, cols).unwrap();
        let reference = serial_reference(grid.clone(), 0.05, None);
        let granularity = if by_rows { Granularity::Rows } else { Granularity::Cells };
        let backend = if distributed { Backend::Distributed } else { Backend::SharedMemory };
        let r = run(grid, workers, backend, granularity, 0.05);
        prop_assert!(r.converged);
        prop_assert_eq!(r.iterations, reference.iterations);
        prop_assert_eq!(r.grid.current(), reference.values.as_slice());
    }
}
