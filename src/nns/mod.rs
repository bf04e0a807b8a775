//! Nearest-neighbor-search abstraction (spec.md §4.2, component C3).
//!
//! Three interchangeable backends behind one enum — a sum type, per the
//! design note in spec.md §9 ("no backend is composed with another at
//! runtime"), the same shape the teacher uses for its single active spatial
//! structure (`swarm::SpatialHashGrid` in `grid.rs`) rather than a `dyn`
//! trait object.

pub mod kdtree;
pub mod spatial_sort;
pub mod square_grid;

use crate::cell::{Cell, CellId};
use kdtree::KdTree;
use spatial_sort::SpatialSorting;
use square_grid::SquareGrid;

/// Interaction radius: the sum of two unit cell radii (spec.md glossary).
pub const INFLUENCE_RANGE: f32 = 2.0;

/// Target neighborhood size for the spatial-sorting backend (spec.md §4.2.2).
pub const SPATIAL_SORT_M: usize = 48;

/// CLI/auto-selection choice (spec.md §4.2.4, §6).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NnsChoice {
    Auto,
    SpatialSorting,
    KdTree,
}

/// Parameters describing the square-grid lattice layout, if the pattern
/// declared one (spec.md §4.2.1: "used when the initial layout declares a
/// lattice of dim_x × dim_y cells").
#[derive(Clone, Copy, Debug)]
pub struct GridLayout {
    pub dim_x: usize,
    pub dim_y: usize,
    pub wrap: bool,
}

pub enum NnsBackend {
    SquareGrid(SquareGrid),
    SpatialSorting(SpatialSorting),
    KdTree(KdTree),
}

impl NnsBackend {
    /// Auto-selection per spec.md §4.2.4: grid if the pattern declared a
    /// lattice layout (and no `DIVIDE` rule exists — the grid is disabled by
    /// the caller before this is reached), else spatial sorting if the
    /// domain is packed, else the k-d tree. A CLI override forces spatial
    /// sorting or the k-d tree regardless of layout.
    pub fn select(choice: NnsChoice, layout: Option<GridLayout>, domain_is_packed: bool) -> Self {
        match choice {
            NnsChoice::SpatialSorting => {
                NnsBackend::SpatialSorting(SpatialSorting::new(SPATIAL_SORT_M))
            }
            NnsChoice::KdTree => NnsBackend::KdTree(KdTree::new()),
            NnsChoice::Auto => {
                if let Some(layout) = layout {
                    NnsBackend::SquareGrid(SquareGrid::new(layout.dim_x, layout.dim_y, layout.wrap))
                } else if domain_is_packed {
                    NnsBackend::SpatialSorting(SpatialSorting::new(SPATIAL_SORT_M))
                } else {
                    NnsBackend::KdTree(KdTree::new())
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NnsBackend::SquareGrid(_) => "square grid",
            NnsBackend::SpatialSorting(_) => "spatial sorting",
            NnsBackend::KdTree(_) => "k-d tree",
        }
    }

    pub fn add_position(&mut self, x: f32, y: f32, id: CellId) {
        match self {
            NnsBackend::SquareGrid(b) => b.add_position(x, y, id),
            NnsBackend::SpatialSorting(b) => b.add_position(x, y, id),
            NnsBackend::KdTree(b) => b.add_position(x, y, id),
        }
    }

    /// Rebuilds/refreshes internal indices. Called once per iteration before
    /// any queries.
    pub fn setup(&mut self, cells: &[Cell]) {
        match self {
            NnsBackend::SquareGrid(b) => b.setup(cells),
            NnsBackend::SpatialSorting(b) => b.setup(cells),
            NnsBackend::KdTree(b) => b.setup(cells),
        }
    }

    pub fn set_start_position(&mut self) {
        match self {
            NnsBackend::SquareGrid(b) => b.set_start_position(),
            NnsBackend::SpatialSorting(b) => b.set_start_position(),
            NnsBackend::KdTree(b) => b.set_start_position(),
        }
    }

    pub fn has_next_position(&self) -> bool {
        match self {
            NnsBackend::SquareGrid(b) => b.has_next_position(),
            NnsBackend::SpatialSorting(b) => b.has_next_position(),
            NnsBackend::KdTree(b) => b.has_next_position(),
        }
    }

    pub fn get_current_cell_id(&self) -> CellId {
        match self {
            NnsBackend::SquareGrid(b) => b.get_current_cell_id(),
            NnsBackend::SpatialSorting(b) => b.get_current_cell_id(),
            NnsBackend::KdTree(b) => b.get_current_cell_id(),
        }
    }

    pub fn advance(&mut self) {
        match self {
            NnsBackend::SquareGrid(b) => b.advance(),
            NnsBackend::SpatialSorting(b) => b.advance(),
            NnsBackend::KdTree(b) => b.advance(),
        }
    }

    /// Returns candidate neighbor ids within radius `r` of the current cell
    /// (cursor position), excluding the cell itself. The original interface
    /// returns a sentinel(`-1`)-terminated raw buffer "valid only until the
    /// next query"; here that's simply a borrowed slice, so the same
    /// single-writer/single-reader lifetime is enforced by the borrow
    /// checker instead of by convention.
    pub fn query_current_range(&mut self, cells: &[Cell], r: f32) -> &[CellId] {
        match self {
            NnsBackend::SquareGrid(b) => b.query_current_range(cells, r),
            NnsBackend::SpatialSorting(b) => b.query_current_range(cells, r),
            NnsBackend::KdTree(b) => b.query_current_range(cells, r),
        }
    }

    pub fn update_all_positions(&mut self, cells: &[Cell]) {
        match self {
            NnsBackend::SquareGrid(b) => b.update_all_positions(cells),
            NnsBackend::SpatialSorting(b) => b.update_all_positions(cells),
            NnsBackend::KdTree(b) => b.update_all_positions(cells),
        }
    }
}
