//! Spatial-sorting backend (spec.md §4.2.2).
//!
//! Sorts cells once per iteration along a space-filling (Morton/Z) order so
//! that spatially close cells land close together in the sorted array, then
//! answers a query by scanning a fixed-size rank window around the cell's
//! position in that order — the same argsort-then-scan shape as the
//! teacher's `sort_memory_by_spatial_hash`/`apply_permutation`
//! (`swarm/ebbforge_engine.rs`), adapted from a cache-locality pass into a
//! neighbor-candidate filter.

use crate::cell::{Cell, CellId};

pub struct SpatialSorting {
    m: usize,
    cell_size: f32,
    origin_x: f32,
    origin_y: f32,
    order: Vec<CellId>,
    rank: Vec<usize>,
    cursor: usize,
    scratch: Vec<CellId>,
}

impl SpatialSorting {
    pub fn new(m: usize) -> Self {
        SpatialSorting {
            m,
            cell_size: super::INFLUENCE_RANGE,
            origin_x: 0.0,
            origin_y: 0.0,
            order: Vec::new(),
            rank: Vec::new(),
            cursor: 0,
            scratch: Vec::new(),
        }
    }

    /// Interleaves the low 32 bits of `cx`/`cy` into a 64-bit Morton code —
    /// the space-filling key used to order cells so nearby positions stay
    /// nearby in the sorted array.
    #[inline]
    fn morton(cx: u32, cy: u32) -> u64 {
        fn spread(v: u32) -> u64 {
            let mut x = v as u64 & 0xFFFFFFFF;
            x = (x | (x << 16)) & 0x0000FFFF0000FFFF;
            x = (x | (x << 8)) & 0x00FF00FF00FF00FF;
            x = (x | (x << 4)) & 0x0F0F0F0F0F0F0F0F;
            x = (x | (x << 2)) & 0x3333333333333333;
            x = (x | (x << 1)) & 0x5555555555555555;
            x
        }
        spread(cx) | (spread(cy) << 1)
    }

    #[inline]
    fn key_for(&self, c: &Cell) -> u64 {
        // Offset by a large bias so near-origin negative coordinates never
        // underflow the u32 cast; the domain is bounded, so this is safe in
        // practice for any pattern this simulator runs.
        const BIAS: f32 = 1_000_000.0;
        let cx = ((c.x - self.origin_x) / self.cell_size + BIAS) as u32;
        let cy = ((c.y - self.origin_y) / self.cell_size + BIAS) as u32;
        Self::morton(cx, cy)
    }

    pub fn add_position(&mut self, _x: f32, _y: f32, _id: CellId) {}

    pub fn setup(&mut self, cells: &[Cell]) {
        let n = cells.len();
        self.order = (0..n).collect();
        self.order.sort_unstable_by_key(|&id| self.key_for(&cells[id]));
        self.rank = vec![0; n];
        for (r, &id) in self.order.iter().enumerate() {
            self.rank[id] = r;
        }
        self.cursor = 0;
    }

    pub fn set_start_position(&mut self) {
        self.cursor = 0;
    }

    pub fn has_next_position(&self) -> bool {
        self.cursor < self.order.len()
    }

    pub fn get_current_cell_id(&self) -> CellId {
        self.order[self.cursor]
    }

    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    pub fn query_current_range(&mut self, cells: &[Cell], r: f32) -> &[CellId] {
        self.scratch.clear();
        let me = self.order[self.cursor];
        let origin = &cells[me];
        let r2 = r * r;

        let my_rank = self.rank[me];
        let half = self.m / 2;
        let lo = my_rank.saturating_sub(half);
        let hi = (my_rank + half).min(self.order.len().saturating_sub(1));

        for rank in lo..=hi {
            let id = self.order[rank];
            if id == me {
                continue;
            }
            if origin.dist_sq(&cells[id]) <= r2 {
                self.scratch.push(id);
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
    fn window_scan_finds_orthogonal_neighbors() {
        let cells = lattice(5, 2.0);
        let mut nns = SpatialSorting::new(48);
        nns.setup(&cells);
        // center cell of a 5x5 lattice is index 12 (gx=2, gy=2)
        nns.set_start_position();
        while nns.has_next_position() && nns.get_current_cell_id() != 12 {
            nns.advance();
        }
        let neighbors = nns.query_current_range(&cells, super::super::INFLUENCE_RANGE);
        assert!(neighbors.contains(&7)); // (2,1)
        assert!(neighbors.contains(&17)); // (2,3)
        assert!(neighbors.contains(&11)); // (1,2)
        assert!(neighbors.contains(&13)); // (3,2)
        assert!(!neighbors.contains(&12));
    }

    #[test]
    fn empty_store_has_no_positions() {
        let cells: Vec<Cell> = Vec::new();
        let mut nns = SpatialSorting::new(48);
        nns.setup(&cells);
        nns.set_start_position();
        assert!(!nns.has_next_position());
    }
}
