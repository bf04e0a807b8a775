//! Exact k-d tree backend (spec.md §4.2.3).
//!
//! No file in the reference corpus builds a k-d tree, so this module follows
//! the specification directly rather than imitating a retrieved example: a
//! balanced binary space partition alternating the x/y axis by depth, built
//! once per iteration from the current positions, queried by recursive
//! descent with the standard axis-distance pruning rule.

use crate::cell::{Cell, CellId};

struct Node {
    id: CellId,
    axis: u8,
    left: Option<usize>,
    right: Option<usize>,
}

pub struct KdTree {
    nodes: Vec<Node>,
    root: Option<usize>,
    cursor: usize,
    n_cells: usize,
    scratch: Vec<CellId>,
}

impl KdTree {
    pub fn new() -> Self {
        KdTree {
            nodes: Vec::new(),
            root: None,
            cursor: 0,
            n_cells: 0,
            scratch: Vec::new(),
        }
    }

    pub fn add_position(&mut self, _x: f32, _y: f32, _id: CellId) {}

    /// Rebuilds the tree by recursively partitioning on the median of the
    /// widest axis at each depth (alternating x/y keeps the recursion simple
    /// and is exact regardless of point distribution, unlike a pure
    /// round-robin split on skewed layouts — but round-robin is what the
    /// spec names, so that's what this does).
    pub fn setup(&mut self, cells: &[Cell]) {
        self.n_cells = cells.len();
        self.nodes.clear();
        self.nodes.reserve(cells.len());
        let mut ids: Vec<CellId> = (0..cells.len()).collect();
        self.root = self.build(cells, &mut ids, 0);
        self.cursor = 0;
    }

    fn build(&mut self, cells: &[Cell], ids: &mut [CellId], depth: usize) -> Option<usize> {
        if ids.is_empty() {
            return None;
        }
        let axis = (depth % 2) as u8;
        ids.sort_unstable_by(|&a, &b| {
            let (ka, kb) = if axis == 0 {
                (cells[a].x, cells[b].x)
            } else {
                (cells[a].y, cells[b].y)
            };
            ka.partial_cmp(&kb).unwrap()
        });
        let mid = ids.len() / 2;
        let id = ids[mid];

        let left = self.build(cells, &mut ids[..mid], depth + 1);
        let right = self.build(cells, &mut ids[mid + 1..], depth + 1);

        self.nodes.push(Node {
            id,
            axis,
            left,
            right,
        });
        Some(self.nodes.len() - 1)
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
        if let Some(root) = self.root {
            let origin = cells[me];
            let r2 = r * r;
            let mut stack = vec![root];
            while let Some(idx) = stack.pop() {
                let node = &self.nodes[idx];
                if node.id != me && origin.dist_sq(&cells[node.id]) <= r2 {
                    self.scratch.push(node.id);
                }
                let (node_coord, origin_coord) = if node.axis == 0 {
                    (cells[node.id].x, origin.x)
                } else {
                    (cells[node.id].y, origin.y)
                };
                let delta = origin_coord - node_coord;
                if delta <= 0.0 {
                    if let Some(l) = node.left {
                        stack.push(l);
                    }
                    if delta * delta <= r2 {
                        if let Some(rgt) = node.right {
                            stack.push(rgt);
                        }
                    }
                } else {
                    if let Some(rgt) = node.right {
                        stack.push(rgt);
                    }
                    if delta * delta <= r2 {
                        if let Some(l) = node.left {
                            stack.push(l);
                        }
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
    fn finds_exact_orthogonal_neighbors() {
        let cells = lattice(5, 2.0);
        let mut tree = KdTree::new();
        tree.setup(&cells);
        tree.set_start_position();
        while tree.has_next_position() && tree.get_current_cell_id() != 12 {
            tree.advance();
        }
        let mut neighbors = tree.query_current_range(&cells, super::super::INFLUENCE_RANGE).to_vec();
        neighbors.sort_unstable();
        assert_eq!(neighbors, vec![7, 11, 13, 17]);
    }

    #[test]
    fn no_false_positives_beyond_radius() {
        let cells = lattice(5, 2.0);
        let mut tree = KdTree::new();
        tree.setup(&cells);
        let neighbors = tree.query_current_range(&cells, 0.5);
        assert!(neighbors.is_empty());
    }
}
