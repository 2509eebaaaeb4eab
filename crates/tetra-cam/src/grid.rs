use serde::Deserialize;
use thiserror::Error;

use crate::command::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

/// Full CMUcam2 frame at the resolution the robot runs it.
pub const CMUCAM_VIEWPORT: Viewport = Viewport { width: 160, height: 150 };

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GridError {
    #[error("grid needs at least one cell per axis, got {x_count}x{y_count}")]
    EmptyAxis { x_count: u16, y_count: u16 },
    #[error("{count} cells do not fit in {dim} pixels")]
    TooFine { dim: u16, count: u16 },
    #[error("cell ({x}, {y}) is outside the {x_count}x{y_count} grid")]
    CellOutOfRange { x: u16, y: u16, x_count: u16, y_count: u16 },
}

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub x0: u16,
    pub y0: u16,
    pub x1: u16,
    pub y1: u16,
}

impl CellBounds {
    pub fn width(&self) -> u16 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u16 {
        self.y1 - self.y0
    }

    /// The camera numbers pixels from 1 and takes inclusive corners.
    pub fn window(&self) -> Command {
        Command::VirtualWindow {
            x0: self.x0 + 1,
            y0: self.y0 + 1,
            x1: self.x1,
            y1: self.y1,
        }
    }
}

/// A viewport cut into `x_count` by `y_count` cells. Interior cells are all
/// `x_step` by `y_step`; the division remainder goes to the last column and
/// the last row only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    viewport: Viewport,
    x_count: u16,
    y_count: u16,
    x_step: u16,
    y_step: u16,
    x_residual: u16,
    y_residual: u16,
}

impl Grid {
    pub fn build(viewport: Viewport, x_count: u16, y_count: u16) -> Result<Self, GridError> {
        if x_count == 0 || y_count == 0 {
            return Err(GridError::EmptyAxis { x_count, y_count });
        }
        if x_count > viewport.width {
            return Err(GridError::TooFine { dim: viewport.width, count: x_count });
        }
        if y_count > viewport.height {
            return Err(GridError::TooFine { dim: viewport.height, count: y_count });
        }

        let x_step = viewport.width / x_count;
        let y_step = viewport.height / y_count;
        Ok(Self {
            viewport,
            x_count,
            y_count,
            x_step,
            y_step,
            x_residual: viewport.width - x_step * x_count,
            y_residual: viewport.height - y_step * y_count,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn counts(&self) -> (u16, u16) {
        (self.x_count, self.y_count)
    }

    pub fn steps(&self) -> (u16, u16) {
        (self.x_step, self.y_step)
    }

    pub fn residuals(&self) -> (u16, u16) {
        (self.x_residual, self.y_residual)
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        x < self.x_count && y < self.y_count
    }

    /// Bottom-right cell.
    pub fn last_cell(&self) -> (u16, u16) {
        (self.x_count - 1, self.y_count - 1)
    }

    pub fn cell_bounds(&self, x: u16, y: u16) -> Result<CellBounds, GridError> {
        if !self.contains(x, y) {
            return Err(GridError::CellOutOfRange { x, y, x_count: self.x_count, y_count: self.y_count });
        }

        let mut x1 = (x + 1) * self.x_step;
        if x == self.x_count - 1 {
            x1 += self.x_residual;
        }
        let mut y1 = (y + 1) * self.y_step;
        if y == self.y_count - 1 {
            y1 += self.y_residual;
        }

        Ok(CellBounds { x0: x * self.x_step, y0: y * self.y_step, x1, y1 })
    }

    /// All cells, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (u16, u16, CellBounds)> + '_ {
        (0..self.y_count).flat_map(move |y| {
            (0..self.x_count).filter_map(move |x| self.cell_bounds(x, y).ok().map(|b| (x, y, b)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn robot_grid_steps_and_residuals() {
        let g = Grid::build(CMUCAM_VIEWPORT, 26, 26).unwrap();
        assert_eq!(g.steps(), (6, 5));
        assert_eq!(g.residuals(), (4, 20));

        let interior = g.cell_bounds(24, 24).unwrap();
        assert_eq!((interior.width(), interior.height()), (6, 5));

        let corner = g.cell_bounds(25, 25).unwrap();
        assert_eq!(corner, CellBounds { x0: 150, y0: 125, x1: 160, y1: 150 });
        assert_eq!((corner.width(), corner.height()), (10, 25));

        let last_col = g.cell_bounds(25, 0).unwrap();
        assert_eq!((last_col.width(), last_col.height()), (10, 5));
    }

    #[test]
    fn window_is_one_based_inclusive() {
        let g = Grid::build(CMUCAM_VIEWPORT, 26, 26).unwrap();
        let b = g.cell_bounds(5, 19).unwrap();
        assert_eq!(b, CellBounds { x0: 30, y0: 95, x1: 36, y1: 100 });
        assert_eq!(b.window().to_string(), "VW 31 96 36 100");

        let first = g.cell_bounds(0, 0).unwrap();
        assert_eq!(first.window().to_string(), "VW 1 1 6 5");
    }

    #[test]
    fn cells_tile_viewport_exactly() {
        let viewports = [
            Viewport { width: 160, height: 150 },
            Viewport { width: 159, height: 150 },
            Viewport { width: 1, height: 1 },
            Viewport { width: 37, height: 11 },
        ];
        for vp in viewports {
            for xc in 1..=vp.width.min(30) {
                for yc in 1..=vp.height.min(30) {
                    let g = Grid::build(vp, xc, yc).unwrap();
                    let mut hits = vec![0u8; vp.width as usize * vp.height as usize];
                    for (x, y, b) in g.cells() {
                        if x + 1 < xc {
                            assert_eq!(b.width(), g.steps().0);
                        }
                        if y + 1 < yc {
                            assert_eq!(b.height(), g.steps().1);
                        }
                        for py in b.y0..b.y1 {
                            for px in b.x0..b.x1 {
                                hits[py as usize * vp.width as usize + px as usize] += 1;
                            }
                        }
                    }
                    assert!(hits.iter().all(|&h| h == 1), "{:?} {}x{} does not tile", vp, xc, yc);
                }
            }
        }
    }

    #[test]
    fn degenerate_grids_rejected() {
        assert_eq!(
            Grid::build(CMUCAM_VIEWPORT, 0, 4),
            Err(GridError::EmptyAxis { x_count: 0, y_count: 4 })
        );
        assert_eq!(
            Grid::build(CMUCAM_VIEWPORT, 161, 4),
            Err(GridError::TooFine { dim: 160, count: 161 })
        );
        let g = Grid::build(CMUCAM_VIEWPORT, 26, 26).unwrap();
        assert!(g.cell_bounds(26, 0).is_err());
        assert!(g.cell_bounds(0, 26).is_err());
    }
}
