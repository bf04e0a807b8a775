//! Testable properties #9 and #10: the three NNS backends must agree on
//! who is a neighbor of whom, independent of which one happens to be
//! selected.

use std::collections::HashSet;

use tissuesim_core::cell::CellId;
use tissuesim_core::nns::{NnsBackend, NnsChoice, INFLUENCE_RANGE};
use tissuesim_core::simulation::Simulation;

/// Exact (brute-force) neighbor set for a cell, used as the ground truth
/// both backends are checked against.
fn brute_force_neighbors(sim: &Simulation, id: CellId) -> HashSet<CellId> {
    let cells = sim.cells.curr();
    let me = &cells[id];
    cells
        .iter()
        .enumerate()
        .filter(|&(other_id, other)| {
            other_id != id && me.dist_sq(other).sqrt() <= INFLUENCE_RANGE
        })
        .map(|(other_id, _)| other_id)
        .collect()
}

fn neighbor_sets(mut nns: NnsBackend, sim: &Simulation) -> Vec<HashSet<CellId>> {
    let n = sim.n_cells();
    for id in 0..n {
        let c = sim.cells.curr_cell(id);
        nns.add_position(c.x, c.y, id);
    }
    nns.setup(sim.cells.curr());

    let mut out = vec![HashSet::new(); n];
    nns.set_start_position();
    while nns.has_next_position() {
        let id = nns.get_current_cell_id();
        let found: HashSet<CellId> = nns
            .query_current_range(sim.cells.curr(), INFLUENCE_RANGE)
            .iter()
            .copied()
            .collect();
        out[id] = found;
        nns.advance();
    }
    out
}

/// A square lattice with no DIVIDE rule — square-grid auto-selection stays
/// enabled, so `Auto` resolves to the grid backend directly.
fn build_lattice() -> Simulation {
    let mut sim = Simulation::new(64);
    sim.define_chemical("u", 1.0, false);
    sim.create_square_grid(5, 5, 0.0, 0.0, 0.0, false, false);
    sim
}

#[test]
fn square_grid_matches_kdtree_on_a_lattice() {
    let sim = build_lattice();
    let n = sim.n_cells();

    let grid = NnsBackend::select(NnsChoice::Auto, sim.grid_layout_for_nns(), false);
    assert_eq!(grid.name(), "square grid");
    let grid_sets = neighbor_sets(grid, &sim);

    let kd = NnsBackend::select(NnsChoice::KdTree, None, false);
    let kd_sets = neighbor_sets(kd, &sim);

    let mut brute_sets = Vec::with_capacity(n);
    for id in 0..n {
        brute_sets.push(brute_force_neighbors(&sim, id));
    }

    for id in 0..n {
        assert_eq!(grid_sets[id], brute_sets[id], "square grid mismatch at cell {id}");
        assert_eq!(kd_sets[id], brute_sets[id], "k-d tree mismatch at cell {id}");
    }
}

/// A denser, non-lattice domain (packed) where spatial sorting's windowed
/// scan is expected to approximate, not exactly match, the true neighbor
/// set — but should stay close to it.
#[test]
fn spatial_sorting_miss_rate_is_small_on_a_packed_domain() {
    let mut sim = Simulation::new(256);
    sim.define_chemical("u", 1.0, false);
    sim.use_seed(7);
    sim.create_square_circle(12, 0.0, 0.0, 0.3, false);
    let n = sim.n_cells();
    assert!(n > 50, "expected a reasonably dense packed domain, got {n} cells");

    let ss = NnsBackend::select(NnsChoice::SpatialSorting, None, true);
    let ss_sets = neighbor_sets(ss, &sim);

    let kd = NnsBackend::select(NnsChoice::KdTree, None, false);
    let kd_sets = neighbor_sets(kd, &sim);

    let mut missed = 0usize;
    let mut total = 0usize;
    for id in 0..n {
        total += kd_sets[id].len();
        missed += kd_sets[id].difference(&ss_sets[id]).count();
    }
    let miss_rate = missed as f64 / total.max(1) as f64;
    assert!(
        miss_rate < 0.05,
        "spatial sorting missed {missed}/{total} true neighbors ({miss_rate:.3} miss rate)"
    );
}
