//! Simulation state and setup API (spec.md §3, §6, §9, component C7).
//!
//! Bundles what the original exposes as three free-standing globals
//! (`simulation`, plus the setup-time-only `cell_parameters` statics) into one
//! owned struct, per spec.md §9's design note ("wrap them in a single owning
//! context passed explicitly"). The NNS backend and statistics accumulator
//! are kept separate and owned by [`crate::step::Engine`], since they have a
//! different lifecycle (selected at `init`, not at construction).

use crate::cell::{Cell, CellId, CellStore, MAX_CHEMICALS};
use crate::chemical::Chemical;
use crate::geometry::{Domain, SimRng};
use crate::nns::GridLayout;
use crate::rule::Rule;

/// Process-wide mapping registers (spec.md §3: "indexed beyond
/// `2·MAX_CHEMICALS`"). The original has no fixed bound; this crate picks one
/// compile-time bound the same way it already bounds chemicals.
pub const MAX_MAPPING_SLOTS: usize = 16;

/// Defaults applied by `use_chemical_concentration`/`use_chemical_diffusion`/
/// `use_polarity` to every subsequently-created cell, mirroring
/// `original_source/simulation.cpp`'s file-static `CellParameters`.
#[derive(Clone, Copy, Debug)]
struct CellDefaults {
    polarity: Option<f32>,
    polarity_dev: f32,
    conc: [f32; MAX_CHEMICALS],
    conc_dev: [f32; MAX_CHEMICALS],
    diff: [f32; MAX_CHEMICALS],
    diff_dev: [f32; MAX_CHEMICALS],
}

impl Default for CellDefaults {
    fn default() -> Self {
        CellDefaults {
            polarity: None,
            polarity_dev: 0.0,
            conc: [0.0; MAX_CHEMICALS],
            conc_dev: [0.0; MAX_CHEMICALS],
            diff: [0.0; MAX_CHEMICALS],
            diff_dev: [0.0; MAX_CHEMICALS],
        }
    }
}

pub struct Simulation {
    pub cells: CellStore,
    pub chemicals: Vec<Chemical>,
    pub rules: Vec<Rule>,
    pub mirror_list: Vec<(CellId, CellId)>,
    pub mappings: [f32; MAX_MAPPING_SLOTS],
    pub domain: Domain,
    pub time_step: f32,
    pub iteration: i64,
    pub stop_at: Option<i64>,
    pub division_limit: u32,
    pub domain_is_packed: bool,
    pub domain_packed_factor: f32,
    pub mirroring: bool,
    pub detect_stability: bool,
    pub is_stable: bool,
    pub is_running: bool,
    pub tracked_id: Option<CellId>,
    pub rng: SimRng,
    defaults: CellDefaults,
    grid_layout: Option<GridLayout>,
    has_divide_rule: bool,
}

impl Simulation {
    pub fn new(capacity: usize) -> Self {
        Simulation {
            cells: CellStore::new(capacity),
            chemicals: Vec::new(),
            rules: Vec::new(),
            mirror_list: Vec::new(),
            mappings: [0.0; MAX_MAPPING_SLOTS],
            domain: Domain::square(50.0),
            time_step: 1.0,
            iteration: 0,
            stop_at: None,
            division_limit: 0,
            domain_is_packed: false,
            domain_packed_factor: 3.2, // original's empirical default, between unit-circle and square packing
            mirroring: false,
            detect_stability: false,
            is_stable: false,
            is_running: true,
            tracked_id: None,
            rng: SimRng::new(0),
            defaults: CellDefaults::default(),
            grid_layout: None,
            has_divide_rule: false,
        }
    }

    pub fn n_cells(&self) -> usize {
        self.cells.n_cells()
    }

    pub fn n_chemicals(&self) -> usize {
        self.chemicals.len()
    }

    /// Disables the square-grid auto-selection path once any `DIVIDE` rule is
    /// added (spec.md §4.2.1: "disabled if any DIVIDE rule exists").
    pub fn grid_layout_for_nns(&self) -> Option<GridLayout> {
        if self.has_divide_rule {
            None
        } else {
            self.grid_layout
        }
    }

    /*---------------- define_* ----------------*/

    pub fn define_chemical(&mut self, name: impl Into<String>, limit: f32, anisotropic: bool) -> usize {
        self.chemicals.push(Chemical::new(name, limit, anisotropic));
        self.chemicals.len() - 1
    }

    pub fn define_division_limit(&mut self, n: u32) {
        self.division_limit = n;
    }

    pub fn define_domain(&mut self, width: f32, height: f32) {
        self.domain = Domain::rect(width, height);
    }

    /// Declares the domain as packed (spec.md §4.5 step 1, §9 glossary): its
    /// side is recomputed every step from `√(n_cells·factor) − 2`.
    pub fn define_packed_domain(&mut self, factor: f32) {
        self.domain_is_packed = true;
        self.domain_packed_factor = factor;
    }

    pub fn define_time_step(&mut self, time_step: f32) {
        self.time_step = time_step;
    }

    pub fn define_mirror_pair(&mut self, id1: CellId, id2: CellId) {
        self.mirroring = true;
        self.mirror_list.push((id1, id2));
    }

    pub fn track_cell(&mut self, id: CellId) {
        self.tracked_id = Some(id);
    }

    /*---------------- use_* ----------------*/

    pub fn use_chemical_concentration(&mut self, chemical: usize, value: f32, deviation: f32) {
        self.defaults.conc[chemical] = value;
        self.defaults.conc_dev[chemical] = deviation;
    }

    pub fn use_chemical_diffusion(&mut self, chemical: usize, value: f32, deviation: f32) {
        self.defaults.diff[chemical] = value;
        self.defaults.diff_dev[chemical] = deviation;
    }

    pub fn use_polarity(&mut self, angle_deg: f32, deviation: f32) {
        self.defaults.polarity = Some(angle_deg);
        self.defaults.polarity_dev = deviation;
    }

    /// `seed == 0` seeds from wall clock (spec.md §6, §9).
    pub fn use_seed(&mut self, seed: u64) {
        self.rng = SimRng::new(seed);
    }

    /*---------------- create_* ----------------*/

    /// Setup-time cell creation (spec.md §4.1, §6). Returns `None` on
    /// capacity exhaustion, the idiomatic counterpart of the original's
    /// sentinel id `-1`.
    pub fn create_cell(&mut self, x: f32, y: f32, fixed: bool) -> Option<CellId> {
        let mut cell = Cell {
            birth: 0,
            neighbors: 0,
            x,
            y,
            ..Cell::default()
        };
        if let Some(angle) = self.defaults.polarity {
            let a = self.rng.deviate(angle, self.defaults.polarity_dev);
            let rad = std::f32::consts::PI * a / 180.0;
            cell.px = rad.cos();
            cell.py = rad.sin();
        }
        for i in 0..MAX_CHEMICALS {
            cell.conc[i] = self.rng.deviate(self.defaults.conc[i], self.defaults.conc_dev[i]);
            cell.diff[i] = self.rng.deviate(self.defaults.diff[i], self.defaults.diff_dev[i]);
        }
        cell.fixed = fixed;
        self.cells.create_cell(cell)
    }

    pub fn create_square_grid(
        &mut self,
        count_x: usize,
        count_y: usize,
        center_x: f32,
        center_y: f32,
        dev: f32,
        fixed: bool,
        wrap: bool,
    ) {
        self.grid_layout = Some(GridLayout {
            dim_x: count_x,
            dim_y: count_y,
            wrap,
        });
        for cy in 0..count_y {
            let y = center_y + (cy as f32 - count_y as f32 / 2.0) * 2.0 + 1.0;
            for cx in 0..count_x {
                let x = center_x + (cx as f32 - count_x as f32 / 2.0) * 2.0 + 1.0;
                self.create_offset_cell(x, y, dev, fixed);
            }
        }
    }

    pub fn create_square_circle(&mut self, count: usize, center_x: f32, center_y: f32, dev: f32, fixed: bool) {
        let half = count as f32 / 2.0;
        for cy in 0..count {
            let y = center_y + (cy as f32 - half) * 2.0 + 1.0;
            for cx in 0..count {
                let x = center_x + (cx as f32 - half) * 2.0 + 1.0;
                let gy = cy as f32 - half + 0.5;
                let gx = cx as f32 - half + 0.5;
                if gy * gy + gx * gx <= (count * count) as f32 / 4.0 {
                    self.create_offset_cell(x, y, dev, fixed);
                }
            }
        }
    }

    pub fn create_hexagonal_grid(&mut self, count_x: usize, count_y: usize, center_x: f32, center_y: f32, dev: f32, fixed: bool) {
        for cy in 0..count_y {
            let y = center_y + (cy as f32 - count_y as f32 / 2.0) * 1.7321 + 0.866;
            for cx in 0..count_x {
                let mut x = center_x + (cx as f32 - count_x as f32 / 2.0) * 2.0 + 1.0;
                if cy % 2 == 1 {
                    x += 1.0;
                }
                self.create_offset_cell(x, y, dev, fixed);
            }
        }
    }

    pub fn create_hexagonal_circle(&mut self, count: i64, center_x: f32, center_y: f32, dev: f32, fixed: bool) {
        for cy in -count..count {
            let y = center_y + cy as f32 * 1.7321;
            for cx in -count..count {
                let mut x = center_x + cx as f32 * 2.0;
                if cy % 2 != 0 {
                    x += 1.0;
                }
                if (x - center_x).powi(2) + (y - center_y).powi(2) <= (count * count) as f32 {
                    self.create_offset_cell(x, y, dev, fixed);
                }
            }
        }
    }

    fn create_offset_cell(&mut self, x: f32, y: f32, dev: f32, fixed: bool) {
        if dev == 0.0 {
            self.create_cell(x, y, fixed);
        } else {
            let ox = self.rng.deviate(-dev, dev);
            let oy = self.rng.deviate(-dev, dev);
            self.create_cell(x + ox, y + oy, fixed);
        }
    }

    /*---------------- set_* ----------------*/

    pub fn set_cell_concentration(&mut self, id: CellId, chemical: usize, value: f32, deviation: f32) {
        let v = self.rng.deviate(value, deviation);
        let mut cell = *self.cells.curr_cell(id);
        cell.conc[chemical] = v;
        self.cells.set_curr(id, cell);
    }

    pub fn set_cell_diffusion(&mut self, id: CellId, chemical: usize, value: f32, deviation: f32) {
        let v = self.rng.deviate(value, deviation);
        let mut cell = *self.cells.curr_cell(id);
        cell.diff[chemical] = v;
        self.cells.set_curr(id, cell);
    }

    pub fn set_cell_polarity(&mut self, id: CellId, angle_deg: Option<f32>, deviation: f32) {
        let mut cell = *self.cells.curr_cell(id);
        if let Some(angle) = angle_deg {
            let a = self.rng.deviate(angle, deviation);
            let rad = std::f32::consts::PI * a / 180.0;
            cell.px = rad.cos();
            cell.py = rad.sin();
        } else {
            cell.px = 0.0;
            cell.py = 0.0;
        }
        self.cells.set_curr(id, cell);
    }

    pub fn set_cell_fixed(&mut self, id: CellId, fixed: bool) {
        let mut cell = *self.cells.curr_cell(id);
        cell.fixed = fixed;
        self.cells.set_curr(id, cell);
    }

    /*---------------- rules ----------------*/

    pub fn add_rule(&mut self, rule: Rule) {
        if matches!(rule.action, crate::rule::Action::Divide { .. }) {
            self.has_divide_rule = true;
        }
        self.rules.push(rule);
    }
}
