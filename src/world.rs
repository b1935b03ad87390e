//! Static occupancy grid. Cell `(x, y)` of a continuous position is
//! `cells[floor(y)][floor(x)]`; `0` is open floor, anything else a wall id.

use crate::error::{Error, Result};

pub const ARENA_W: usize = 16;
pub const ARENA_H: usize = 16;

#[rustfmt::skip]
const ARENA: [[u8; ARENA_W]; ARENA_H] = [
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
    [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
];

#[derive(Clone, Debug, PartialEq)]
pub struct GridMap {
    width: usize,
    height: usize,
    cells: Vec<u8>,
}

impl GridMap {
    /// The shipped level: a bordered room with a hollow block in the middle.
    pub fn arena() -> Self {
        Self {
            width: ARENA_W,
            height: ARENA_H,
            cells: ARENA.iter().flatten().copied().collect(),
        }
    }

    /// Open floor enclosed by a one-cell wall border.
    pub fn bordered(width: usize, height: usize) -> Self {
        let mut cells = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                    cells[y * width + x] = 1;
                }
            }
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        if width == 0 {
            return Err(Error::Map("grid has no cells".into()));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::Map(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                width
            )));
        }
        Ok(Self {
            width,
            height,
            cells: rows.iter().flatten().copied().collect(),
        })
    }

    #[inline(always)]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline(always)]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Wall code at integer cell coordinates, `None` outside the grid.
    #[inline(always)]
    pub fn cell(&self, ix: i32, iy: i32) -> Option<u8> {
        if ix < 0 || iy < 0 || ix as usize >= self.width || iy as usize >= self.height {
            return None;
        }
        Some(self.cells[iy as usize * self.width + ix as usize])
    }

    /// Out-of-grid cells count as solid so traversal always terminates.
    #[inline(always)]
    pub fn is_solid(&self, ix: i32, iy: i32) -> bool {
        self.cell(ix, iy).map_or(true, |c| c > 0)
    }

    #[inline(always)]
    pub fn is_walkable(&self, x: f64, y: f64) -> bool {
        if !x.is_finite() || !y.is_finite() {
            return false;
        }
        !self.is_solid(x.floor() as i32, y.floor() as i32)
    }
}
