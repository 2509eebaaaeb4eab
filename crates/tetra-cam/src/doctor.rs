use anyhow::Result;
use tracing::warn;

use crate::grid::{Grid, Viewport};
use crate::CameraConfig;

pub fn check_camera(cfg: &CameraConfig) -> Result<()> {
    if !cfg.autodetect {
        anyhow::ensure!(
            cfg.serial_dev.as_ref().map(|s| !s.is_empty()).unwrap_or(false),
            "camera.serial_dev missing (or set camera.autodetect = true)"
        );
    }
    anyhow::ensure!(cfg.baud > 0, "camera.baud invalid");
    anyhow::ensure!(cfg.active_color.is_detectable(), "camera.active_color {:?} has no threshold rule", cfg.active_color);
    anyhow::ensure!(cfg.polling.ack_polls >= 1, "camera.polling.ack_polls must be >= 1");
    anyhow::ensure!(cfg.polling.mean_polls >= 1, "camera.polling.mean_polls must be >= 1");
    anyhow::ensure!(cfg.polling.poll_interval_us <= 10_000, "camera.polling.poll_interval_us should be <= 10000");
    Ok(())
}

pub fn check_grid(viewport: Viewport, x_cells: u16, y_cells: u16) -> Result<Grid> {
    let grid = Grid::build(viewport, x_cells, y_cells)?;
    let (xs, ys) = grid.steps();
    // A one-pixel window still works, it is just noisy.
    if xs < 2 || ys < 2 {
        warn!("doctor: grid cells are {}x{} px, mean color will be noisy", xs, ys);
    }
    Ok(grid)
}
