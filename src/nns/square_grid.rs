//! Uniform square-grid backend (spec.md §4.2.1).
//!
//! Two-pass bucket build (count → prefix-sum offsets → scatter), the same
//! shape as the teacher's `SpatialHashGrid`
//! (`swarm/grid.rs::rebuild`/`count_agent`/`compute_offsets`/`scatter_agent`),
//! but keyed by literal `(dim_x, dim_y)` lattice coordinates instead of a
//! hashed table — the layout is known exactly when this backend is chosen,
//! so there is no collision risk to hash away.

use crate::cell::{Cell, CellId};

pub struct SquareGrid {
    dim_x: usize,
    dim_y: usize,
    wrap: bool,
    cell_size: f32,
    origin_x: f32,
    origin_y: f32,
    counts: Vec<u32>,
    offsets: Vec<u32>,
    data: Vec<CellId>,
    cursor: usize,
    n_cells: usize,
    scratch: Vec<CellId>,
}

impl SquareGrid {
    pub fn new(dim_x: usize, dim_y: usize, wrap: bool) -> Self {
        let n_buckets = dim_x.max(1) * dim_y.max(1);
        SquareGrid {
            dim_x: dim_x.max(1),
            dim_y: dim_y.max(1),
            wrap,
            cell_size: super::INFLUENCE_RANGE,
            origin_x: 0.0,
            origin_y: 0.0,
            counts: vec![0; n_buckets],
            offsets: vec![0; n_buckets],
            data: Vec::new(),
            cursor: 0,
            n_cells: 0,
            scratch: Vec::new(),
        }
    }

    #[inline]
    fn bucket_coord(&self, x: f32, y: f32) -> (i64, i64) {
        (
            ((x - self.origin_x) / self.cell_size).floor() as i64,
            ((y - self.origin_y) / self.cell_size).floor() as i64,
        )
    }

    /// Folds a raw lattice coordinate into `[0, dim)`, wrapping or clamping
    /// depending on the declared boundary condition.
    #[inline]
    fn fold(&self, v: i64, dim: usize) -> usize {
        if self.wrap {
            v.rem_euclid(dim as i64) as usize
        } else {
            v.clamp(0, dim as i64 - 1) as usize
        }
    }

    #[inline]
    fn bucket_index(&self, cx: i64, cy: i64) -> usize {
        let bx = self.fold(cx, self.dim_x);
        let by = self.fold(cy, self.dim_y);
        by * self.dim_x + bx
    }

    /// Folds a coordinate delta to its nearest periodic image when wrapping
    /// (spec.md §4.2.1: "neighbor enumeration includes periodic images").
    /// A no-op when `wrap` is false.
    #[inline]
    fn wrapped_delta(&self, delta: f32, dim: usize) -> f32 {
        if !self.wrap {
            return delta;
        }
        let period = dim as f32 * self.cell_size;
        if delta > period / 2.0 {
            delta - period
        } else if delta < -period / 2.0 {
            delta + period
        } else {
            delta
        }
    }

    pub fn add_position(&mut self, _x: f32, _y: f32, _id: CellId) {
        // Positions are read directly from `cells` on `setup`; nothing to
        // stage ahead of time for this backend.
    }

    pub fn setup(&mut self, cells: &[Cell]) {
        self.n_cells = cells.len();
        if cells.is_empty() {
            self.counts.iter_mut().for_each(|c| *c = 0);
            self.data.clear();
            self.cursor = 0;
            return;
        }

        let (mut xmin, mut ymin) = (f32::MAX, f32::MAX);
        for c in cells {
            xmin = xmin.min(c.x);
            ymin = ymin.min(c.y);
        }
        self.origin_x = xmin;
        self.origin_y = ymin;

        self.counts.iter_mut().for_each(|c| *c = 0);
        for cell in cells {
            let (cx, cy) = self.bucket_coord(cell.x, cell.y);
            let h = self.bucket_index(cx, cy);
            self.counts[h] += 1;
        }

        let mut running = 0u32;
        for h in 0..self.counts.len() {
            self.offsets[h] = running;
            running += self.counts[h];
        }

        if self.data.len() < cells.len() {
            self.data.resize(cells.len(), 0);
        }
        let mut cursors = self.offsets.clone();
        for (id, cell) in cells.iter().enumerate() {
            let (cx, cy) = self.bucket_coord(cell.x, cell.y);
            let h = self.bucket_index(cx, cy);
            self.data[cursors[h] as usize] = id;
            cursors[h] += 1;
        }

        self.cursor = 0;
    }

    pub fn set_start_position(&mut self) {
        self.cursor = 0;
    }

    pub fn has_next_position(&self) -> bool {
        self.cursor < self.n_cells
    }

    pub fn get_current_cell_id(&self) -> CellId {
        self.cursor
    }

    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    pub fn query_current_range(&mut self, cells: &[Cell], r: f32) -> &[CellId] {
        self.scratch.clear();
        let me = self.cursor;
        let origin = &cells[me];
        let r2 = r * r;
        let reach = (r / self.cell_size).ceil() as i64 + 1;
        let (cx, cy) = self.bucket_coord(origin.x, origin.y);

        // Fold bucket columns/rows to their distinct indices first: on a
        // lattice smaller than `2*reach + 1`, several raw offsets alias to
        // the same wrapped bucket, and scanning the unfolded range would
        // visit — and report — that bucket's occupants more than once.
        let mut bxs: Vec<usize> = (-reach..=reach).map(|dx| self.fold(cx + dx, self.dim_x)).collect();
        bxs.sort_unstable();
        bxs.dedup();
        let mut bys: Vec<usize> = (-reach..=reach).map(|dy| self.fold(cy + dy, self.dim_y)).collect();
        bys.sort_unstable();
        bys.dedup();

        for &by in &bys {
            for &bx in &bxs {
                let h = by * self.dim_x + bx;
                let start = self.offsets[h] as usize;
                let end = start + self.counts[h] as usize;
                for &id in &self.data[start..end] {
                    if id == me {
                        continue;
                    }
                    // Periodic distance, not raw: a wrapped neighbor's raw
                    // coordinates can be a full domain-width away even
                    // though its nearest image is within `r`.
                    let dx = self.wrapped_delta(cells[id].x - origin.x, self.dim_x);
                    let dy = self.wrapped_delta(cells[id].y - origin.y, self.dim_y);
                    if dx * dx + dy * dy <= r2 {
                        self.scratch.push(id);
                    }
                }
            }
        }
        &self.scratch
    }

    pub fn update_all_positions(&mut self, cells: &[Cell]) {
        self.setup(cells);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn lattice(dim: usize, spacing: f32) -> Vec<Cell> {
        let mut cells = Vec::new();
        for gy in 0..dim {
            for gx in 0..dim {
                let mut c = Cell::default();
                c.x = gx as f32 * spacing;
                c.y = gy as f32 * spacing;
                cells.push(c);
            }
        }
        cells
    }

    #[test]
    fn finds_orthogonal_neighbors_on_unit_lattice() {
        let cells = lattice(3, 2.0);
        let mut grid = SquareGrid::new(3, 3, false);
        grid.setup(&cells);
        grid.set_start_position();
        // center cell is index 4 (gx=1, gy=1)
        while grid.has_next_position() && grid.get_current_cell_id() != 4 {
            grid.advance();
        }
        let neighbors = grid.query_current_range(&cells, super::super::INFLUENCE_RANGE).to_vec();
        assert_eq!(neighbors.len(), 4);
        assert!(!neighbors.contains(&4));
    }

    #[test]
    fn wrap_connects_opposite_edges() {
        let cells = lattice(3, 2.0);
        let mut grid = SquareGrid::new(3, 3, true);
        grid.setup(&cells);
        // corner cell index 0 (gx=0, gy=0) should see its direct neighbors
        // at (1,0)=id1 and (0,1)=id3, plus the periodic images at
        // (2,0)=id2 and (0,2)=id6 wrapped back to distance 2.
        let neighbors: HashSet<CellId> = grid
            .query_current_range(&cells, super::super::INFLUENCE_RANGE)
            .iter()
            .copied()
            .collect();
        assert_eq!(neighbors, HashSet::from([1, 2, 3, 6]));
    }
}
