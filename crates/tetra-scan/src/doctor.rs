use anyhow::Result;
use tetra_cam::Grid;

use crate::program::{Opcode, ScanProgram};
use crate::translate::{StartingPosition, TranslationTable};
use crate::ScanConfig;

pub fn check_timing(cfg: &ScanConfig) -> Result<()> {
    anyhow::ensure!(cfg.tick_ms >= 5 && cfg.tick_ms <= 1000, "scan.tick_ms should be 5..1000");
    if let Some(budget) = cfg.tick_budget_ms {
        anyhow::ensure!(budget >= 1 && budget <= cfg.tick_ms, "scan.tick_budget_ms must be 1..=tick_ms");
    }
    Ok(())
}

/// Every probe must address a cell of `grid`.
pub fn check_program(program: &ScanProgram, grid: &Grid) -> Result<()> {
    let (xc, yc) = grid.counts();
    for (index, op) in program.ops().iter().enumerate() {
        if let Opcode::Probe { x, y, .. } = *op {
            anyhow::ensure!(grid.contains(x, y), "scan.program[{}]: probe ({}, {}) outside the {}x{} grid", index, x, y, xc, yc);
        }
    }
    anyhow::ensure!(program.positions().next().is_some(), "scan.program has no start markers");
    Ok(())
}

/// Every virtual target a block probes must translate to a physical target
/// for that block's starting position.
pub fn check_translation(program: &ScanProgram, translation: &TranslationTable) -> Result<()> {
    for position in program.positions() {
        let pos = StartingPosition::new(position);
        for target in program.virtual_targets(position) {
            anyhow::ensure!(
                translation.lookup(pos, target).is_some(),
                "scan: {} probes virtual target {} but its translation row has {} entries",
                pos,
                target,
                translation.row(pos).map_or(0, |r| r.len())
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tetra_cam::CMUCAM_VIEWPORT;

    fn grid() -> Grid {
        Grid::build(CMUCAM_VIEWPORT, 26, 26).unwrap()
    }

    #[test]
    fn builtin_tables_pass() {
        let program = ScanProgram::builtin();
        check_program(&program, &grid()).unwrap();
        check_translation(&program, &TranslationTable::builtin()).unwrap();
        check_timing(&ScanConfig::default()).unwrap();
    }

    #[test]
    fn probe_outside_grid_fails() {
        let program = ScanProgram::new(vec![
            Opcode::StartMarker { position: 0 },
            Opcode::Probe { x: 26, y: 0, target: 0 },
            Opcode::End,
        ])
        .unwrap();
        assert!(check_program(&program, &grid()).is_err());
    }

    #[test]
    fn untranslatable_target_fails() {
        let program = ScanProgram::new(vec![
            Opcode::StartMarker { position: 1 },
            Opcode::Probe { x: 0, y: 0, target: 4 },
            Opcode::End,
        ])
        .unwrap();
        let err = check_translation(&program, &TranslationTable::builtin()).unwrap_err();
        assert!(err.to_string().contains("virtual target 4"));
    }
}
