//! Simulation step driver (spec.md §4.4, §4.5, component C6).
//!
//! `Engine` owns the simulation state, the selected NNS backend, and the
//! running statistics pass — the single owning context spec.md §9 asks for
//! in place of the original's three free-standing globals. `tick()`/`run()`
//! follow the same "rebuild spatial index, sweep once, log a summary" shape
//! as the teacher's `EbbForgeMaster::tick()` (`swarm/master_pipeline.rs`),
//! generalized from one SIMD physics pass into the rule-evaluator +
//! neighbor-interaction loop from `original_source/simulation.cpp`.

use tracing::{debug, info};

use crate::cell::{Cell, CellId};
use crate::nns::{NnsBackend, NnsChoice, INFLUENCE_RANGE};
use crate::rule::{divide_cell, evaluate_cell};
use crate::simulation::Simulation;
use crate::statistics::StatisticsPass;

/// Default step budget when `stop_at` is unset (spec.md §6).
pub const DEFAULT_STEP_BUDGET: i64 = 10_000;

pub struct Engine {
    pub sim: Simulation,
    pub nns: NnsBackend,
}

impl Engine {
    /// `init(nns_choice, detect_stability)` (spec.md §6 lifecycle).
    pub fn init(mut sim: Simulation, nns_choice: NnsChoice, detect_stability: bool) -> Self {
        let layout = sim.grid_layout_for_nns();
        let mut nns = NnsBackend::select(nns_choice, layout, sim.domain_is_packed);
        info!(backend = nns.name(), "nns: selected backend");

        let mut stats = StatisticsPass::start(sim.n_chemicals());
        for id in 0..sim.n_cells() {
            let cell = *sim.cells.curr_cell(id);
            stats.observe(&cell.conc);
            nns.add_position(cell.x, cell.y, id);
        }
        sim.detect_stability = detect_stability;
        let _ = stats.finish();

        Engine { sim, nns }
    }

    /// `run(steps)`: loops `step()` at most `steps` times, breaking on
    /// `iteration == stop_at` or on stability (spec.md §4.5, §6).
    pub fn run(&mut self, steps: i64) {
        for _ in 0..steps {
            self.step();
            if Some(self.sim.iteration) == self.sim.stop_at {
                info!(iteration = self.sim.iteration, "sim: stopped at configured iteration");
                self.sim.is_running = false;
                break;
            } else if self.sim.detect_stability && self.sim.is_stable {
                break;
            }
        }
    }

    /// One simulation step (spec.md §4.5).
    pub fn step(&mut self) {
        // 1. packed-domain recompute
        if self.sim.domain_is_packed {
            let area = self.sim.n_cells() as f32 * self.sim.domain_packed_factor;
            let side = area.sqrt() - 2.0;
            self.sim.domain = crate::geometry::Domain::square(side / 2.0);
        }

        // 2. nns.setup()
        self.nns.setup(self.sim.cells.curr());

        // 3-4. statistics.start(); snapshot n_cells
        let mut stats = StatisticsPass::start(self.sim.n_chemicals());
        let n_cells = self.sim.n_cells();
        let mut n_divisions = 0usize;

        let dt = self.sim.time_step;
        let iteration = self.sim.iteration;

        // 5. walk the NNS cursor
        self.nns.set_start_position();
        while self.nns.has_next_position() {
            let curr_id = self.nns.get_current_cell_id();
            let curr_cell = *self.sim.cells.curr_cell(curr_id);

            let outcome = evaluate_cell(
                &self.sim.rules,
                &curr_cell,
                iteration,
                dt,
                &mut self.sim.mappings,
                &mut self.sim.rng,
            );
            let mut next_cell = outcome.next;

            let candidates: Vec<CellId> = self
                .nns
                .query_current_range(self.sim.cells.curr(), INFLUENCE_RANGE)
                .to_vec();

            let n_neighbors = self.interact_with_neighbors(
                &curr_cell,
                &mut next_cell,
                &candidates,
                outcome.polarity_source,
                dt,
            );
            next_cell.neighbors = n_neighbors;

            // clamp position, clamp concentrations
            let (x, y) = if curr_cell.fixed {
                (next_cell.x, next_cell.y)
            } else {
                self.sim.domain.clamp(next_cell.x, next_cell.y)
            };
            next_cell.x = x;
            next_cell.y = y;

            for (ch, chemical) in self.sim.chemicals.iter().enumerate() {
                next_cell.conc[ch] = next_cell.conc[ch].clamp(0.0, chemical.limit);
            }

            // normalize polarity
            if outcome.polarity_source.is_some() {
                let n = (next_cell.px * next_cell.px + next_cell.py * next_cell.py).sqrt();
                if n > 1e-4 {
                    next_cell.px /= n;
                    next_cell.py /= n;
                } else {
                    next_cell.px = curr_cell.px;
                    next_cell.py = curr_cell.py;
                }
            }

            self.sim.cells.set_next(curr_id, next_cell);
            stats.observe(&next_cell.conc);

            if let Some((dir, dev)) = outcome.divide {
                if self.sim.division_limit == 0 || curr_cell.neighbors <= self.sim.division_limit {
                    if let Some(child_id) = self.sim.cells.reserve_child() {
                        let child = divide_cell(&curr_cell, iteration, dir, dev, &mut self.sim.rng);
                        self.sim.cells.set_next(child_id, child);
                        n_divisions += 1;
                    }
                }
            }

            self.nns.advance();
        }

        // 6. mirroring pass
        if self.sim.mirroring {
            for &(a, b) in &self.sim.mirror_list.clone() {
                let mut ca = *self.sim.cells.next_cell(a);
                let mut cb = *self.sim.cells.next_cell(b);
                for ch in 0..self.sim.n_chemicals() {
                    let conc = (ca.conc[ch] + cb.conc[ch]) / 2.0;
                    let diff = (ca.diff[ch] + cb.diff[ch]) / 2.0;
                    ca.conc[ch] = conc;
                    cb.conc[ch] = conc;
                    ca.diff[ch] = diff;
                    cb.diff[ch] = diff;
                }
                self.sim.cells.set_next(a, ca);
                self.sim.cells.set_next(b, cb);
            }
        }

        // 7. stability check
        if self.sim.detect_stability {
            let mut stable = true;
            for id in 0..n_cells {
                let delta = (self.sim.cells.next_cell(id).conc[0] - self.sim.cells.curr_cell(id).conc[0]).abs();
                if delta >= 1e-4 {
                    stable = false;
                    break;
                }
            }
            if stable {
                info!(iteration = self.sim.iteration, "sim: stability reached");
                self.sim.is_stable = true;
            }
        }

        // 8. swap, increment iteration
        self.sim.cells.swap();
        self.sim.iteration += 1;

        // 9. reconcile NNS with new positions
        self.nns.update_all_positions(self.sim.cells.curr());

        // 10. insert newly divided cells
        for id in n_cells..n_cells + n_divisions {
            let cell = *self.sim.cells.curr_cell(id);
            self.nns.add_position(cell.x, cell.y, id);
            stats.observe(&cell.conc);
        }

        // 11. finish statistics
        let names: Vec<String> = self.sim.chemicals.iter().map(|c| c.name.clone()).collect();
        stats.log_summary(self.sim.iteration, &names);
        debug!(iteration = self.sim.iteration, n_cells = n_cells + n_divisions, n_divisions, "step complete");
    }

    /// Neighbor interaction loop (spec.md §4.4). Returns the neighbor count.
    fn interact_with_neighbors(
        &self,
        curr_cell: &Cell,
        next_cell: &mut Cell,
        candidates: &[CellId],
        polarity_source: Option<usize>,
        dt: f32,
    ) -> u32 {
        let mut n_neighbors = 0u32;
        for &neig_id in candidates {
            let neig_cell = self.sim.cells.curr_cell(neig_id);

            let mut dx = neig_cell.x - curr_cell.x;
            let mut dy = neig_cell.y - curr_cell.y;
            let mut norm = (dx * dx + dy * dy).sqrt();

            if norm > INFLUENCE_RANGE {
                if dx > INFLUENCE_RANGE {
                    dx = -2.0;
                } else if dx < -INFLUENCE_RANGE {
                    dx = 2.0;
                }
                if dy > INFLUENCE_RANGE {
                    dy = -2.0;
                } else if dy < -INFLUENCE_RANGE {
                    dy = 2.0;
                }
                norm = (dx * dx + dy * dy).sqrt();
            }

            n_neighbors += 1;

            for (ch, chemical) in self.sim.chemicals.iter().enumerate() {
                let d = curr_cell.diff[ch].min(neig_cell.diff[ch]);
                let delta = neig_cell.conc[ch] - curr_cell.conc[ch];
                if chemical.anisotropic {
                    let px = curr_cell.px;
                    let py = curr_cell.py;
                    let dot = if px != 0.0 || py != 0.0 {
                        (dx * px + dy * py).abs() / norm
                    } else {
                        1.0
                    };
                    next_cell.conc[ch] += d * delta * dt * dot;
                } else {
                    next_cell.conc[ch] += d * delta * dt;
                }
            }

            if let Some(psrc) = polarity_source {
                next_cell.px += (neig_cell.conc[psrc] - curr_cell.conc[psrc]) * dx / norm;
                next_cell.py += (neig_cell.conc[psrc] - curr_cell.conc[psrc]) * dy / norm;
            }

            if Some(neig_id) == self.sim.tracked_id {
                next_cell.marker = true;
            }

            if !curr_cell.fixed && norm > 0.0 && norm < 2.0 {
                next_cell.x -= (0.5 / norm - 0.25) * dx;
                next_cell.y -= (0.5 / norm - 0.25) * dy;
            }
        }
        n_neighbors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nns::NnsChoice;
    use crate::rule::{Action, Parameter, Predicate, Rule};

    /// Scenario S1: two isolated cells collide and separate slightly.
    #[test]
    fn s1_collision_pushes_cells_apart() {
        let mut sim = Simulation::new(8);
        sim.define_chemical("u", 1.0, false);
        sim.create_cell(-0.9, 0.0, false);
        sim.create_cell(0.9, 0.0, false);

        let mut engine = Engine::init(sim, NnsChoice::KdTree, false);
        engine.step();

        let a = engine.sim.cells.curr_cell(0);
        let b = engine.sim.cells.curr_cell(1);
        assert!((a.x - (-0.95)).abs() < 1e-4, "a.x = {}", a.x);
        assert!((b.x - 0.95).abs() < 1e-4, "b.x = {}", b.x);
    }

    /// Scenario S3: symmetric isotropic diffusion averages concentrations.
    #[test]
    fn s3_diffusion_is_symmetric() {
        let mut sim = Simulation::new(8);
        sim.define_chemical("u", 10.0, false);
        sim.define_time_step(0.1);
        let a = sim.create_cell(-0.5, 0.0, true).unwrap();
        let b = sim.create_cell(0.5, 0.0, true).unwrap();
        sim.set_cell_diffusion(a, 0, 1.0, 0.0);
        sim.set_cell_diffusion(b, 0, 1.0, 0.0);
        sim.set_cell_concentration(a, 0, 1.0, 0.0);
        sim.set_cell_concentration(b, 0, 0.0, 0.0);

        let mut engine = Engine::init(sim, NnsChoice::KdTree, false);
        engine.step();

        assert!((engine.sim.cells.curr_cell(a).conc[0] - 0.5).abs() < 1e-3);
        assert!((engine.sim.cells.curr_cell(b).conc[0] - 0.5).abs() < 1e-3);
    }

    /// Scenario S4: bounded exponential division, gated by age.
    #[test]
    fn s4_division_stops_after_age_five() {
        let mut sim = Simulation::new(256);
        sim.define_chemical("u", 1.0, false);
        sim.define_division_limit(6);
        sim.create_cell(0.0, 0.0, false);
        sim.add_rule(Rule {
            from: 0,
            until: i64::MAX,
            predicate: Predicate::IfLessThan(Parameter::Age, Parameter::Constant(5.0)),
            action: Action::And,
        });
        sim.add_rule(Rule {
            from: 0,
            until: i64::MAX,
            predicate: Predicate::Always,
            action: Action::Divide {
                dir: Parameter::Constant(0.0),
                dev: Parameter::Constant(0.0),
            },
        });

        let mut engine = Engine::init(sim, NnsChoice::KdTree, false);
        let mut bound = 0usize;
        for t in 0..5i64 {
            engine.run(1);
            bound += 1usize << t;
            assert!(engine.sim.n_cells() <= bound, "iteration {} n_cells {} > bound {}", t, engine.sim.n_cells(), bound);
        }
    }

    /// Scenario S5: mirror pair averages to the mean, position/polarity untouched.
    #[test]
    fn s5_mirror_pair_averages_concentration() {
        let mut sim = Simulation::new(8);
        sim.define_chemical("u", 1.0, false);
        let a = sim.create_cell(-5.0, 0.0, true).unwrap();
        let b = sim.create_cell(5.0, 0.0, true).unwrap();
        sim.set_cell_concentration(a, 0, 1.0, 0.0);
        sim.set_cell_concentration(b, 0, 0.0, 0.0);
        sim.define_mirror_pair(a, b);

        let mut engine = Engine::init(sim, NnsChoice::KdTree, false);
        engine.step();

        assert!((engine.sim.cells.curr_cell(a).conc[0] - 0.5).abs() < 1e-6);
        assert!((engine.sim.cells.curr_cell(b).conc[0] - 0.5).abs() < 1e-6);
        assert_eq!(engine.sim.cells.curr_cell(a).x, -5.0);
        assert_eq!(engine.sim.cells.curr_cell(b).x, 5.0);
    }
}
