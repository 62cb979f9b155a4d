//! Top-down occupancy raster and free-space queries

use crate::geometry::{Aabb, Direction};

use super::graph::SceneGraph;
use super::{Room, Scene};

/// Raster resolution
pub const CELLS_PER_METRE: f64 = 100.0;

/// Half-open cell range `[x0, x1) x [z0, z1)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub x0: usize,
    pub x1: usize,
    pub z0: usize,
    pub z1: usize,
}

/// Boolean grid over the room floor, `cells[z][x]` stored row-major
#[derive(Debug, Clone)]
pub struct OccupancyField {
    cols: usize,
    rows: usize,
    cells: Vec<bool>,
}

impl OccupancyField {
    pub fn new(room: &Room) -> Self {
        let cols = (room.width * CELLS_PER_METRE) as usize;
        let rows = (room.depth * CELLS_PER_METRE) as usize;
        Self {
            cols,
            rows,
            cells: vec![false; cols * rows],
        }
    }

    /// Paint every box's footprint onto an empty field
    pub fn rasterize<'a>(room: &Room, boxes: impl IntoIterator<Item = &'a Aabb>) -> Self {
        let mut field = Self::new(room);
        for b in boxes {
            field.paint(b);
        }
        field
    }

    /// Field used for free-space queries around `node`: every collidable
    /// floor entity except the node's own subtree.
    pub fn excluding_subtree(scene: &Scene, graph: &SceneGraph, node: usize) -> Self {
        let mut skip = vec![false; scene.entities().len()];
        skip[node] = true;
        for d in graph.descendants(node) {
            skip[d] = true;
        }
        let boxes: Vec<Aabb> = scene
            .entities()
            .iter()
            .enumerate()
            .filter(|(i, e)| !skip[*i] && e.is_solid())
            .map(|(_, e)| e.aabb())
            .collect();
        Self::rasterize(scene.room(), &boxes)
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Cell range covered by a box, clamped to the room
    pub fn cell_rect(&self, b: &Aabb) -> CellRect {
        let clamp = |v: f64, hi: usize| (v * CELLS_PER_METRE).round().clamp(0.0, hi as f64) as usize;
        CellRect {
            x0: clamp(b.min.x, self.cols),
            x1: clamp(b.max.x, self.cols),
            z0: clamp(b.min.z, self.rows),
            z1: clamp(b.max.z, self.rows),
        }
    }

    pub fn paint(&mut self, b: &Aabb) {
        let r = self.cell_rect(b);
        for z in r.z0..r.z1 {
            let row = z * self.cols;
            self.cells[row + r.x0..row + r.x1].fill(true);
        }
    }

    pub fn is_occupied(&self, x: usize, z: usize) -> bool {
        self.cells[z * self.cols + x]
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Clear distance (metres) from the extent to the nearest occupied cell
    /// or wall in `dir`.
    ///
    /// Returns 0 when the extent already touches the wall in that direction
    /// and the room's longer side when the extent is degenerate.
    pub fn free_space(&self, extent: &Aabb, dir: Direction) -> f64 {
        let r = self.cell_rect(extent);
        let degenerate = r.x0 == self.cols
            || r.z0 == self.rows
            || r.x1 == 0
            || r.z1 == 0
            || r.x0 >= r.x1
            || r.z0 >= r.z1;
        if degenerate {
            return self.cols.max(self.rows) as f64 / CELLS_PER_METRE;
        }

        let cells = match dir {
            Direction::PosX => {
                if r.x1 == self.cols {
                    return 0.0;
                }
                (r.z0..r.z1)
                    .map(|z| {
                        (r.x1..self.cols)
                            .position(|x| self.is_occupied(x, z))
                            .unwrap_or(self.cols - r.x1)
                    })
                    .min()
            }
            Direction::NegX => {
                if r.x0 == 0 {
                    return 0.0;
                }
                (r.z0..r.z1)
                    .map(|z| {
                        (0..r.x0)
                            .rev()
                            .position(|x| self.is_occupied(x, z))
                            .unwrap_or(r.x0)
                    })
                    .min()
            }
            Direction::PosZ => {
                if r.z1 == self.rows {
                    return 0.0;
                }
                (r.x0..r.x1)
                    .map(|x| {
                        (r.z1..self.rows)
                            .position(|z| self.is_occupied(x, z))
                            .unwrap_or(self.rows - r.z1)
                    })
                    .min()
            }
            Direction::NegZ => {
                if r.z0 == 0 {
                    return 0.0;
                }
                (r.x0..r.x1)
                    .map(|x| {
                        (0..r.z0)
                            .rev()
                            .position(|z| self.is_occupied(x, z))
                            .unwrap_or(r.z0)
                    })
                    .min()
            }
        };
        cells.unwrap_or(0) as f64 / CELLS_PER_METRE
    }
}

/// Free space around an entity and everything placed relative to it, in
/// [`Direction::ALL`] order.
pub fn free_space_around(scene: &Scene, graph: &SceneGraph, node: usize) -> [f64; 4] {
    let field = OccupancyField::excluding_subtree(scene, graph, node);
    let entities = scene.entities();
    let extent = graph
        .descendants(node)
        .into_iter()
        .fold(entities[node].aabb(), |acc, d| acc.union(&entities[d].aabb()));
    Direction::ALL.map(|dir| field.free_space(&extent, dir))
}
