use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::translate::POSITION_COUNT;

/// Accumulator slots per scan; probe targets index into this.
pub const MAX_VIRTUAL_TARGETS: usize = 16;

/// One step of a scan program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Opcode {
    /// First opcode of the block run from starting position `position`.
    StartMarker { position: u8 },
    SetAngle { angle: u8 },
    Grab,
    Probe { x: u16, y: u16, target: u8 },
    End,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProgramError {
    #[error("scan program is empty")]
    Empty,
    #[error("scan program must finish with `end`")]
    MissingEnd,
    #[error("opcode {index}: `end` before the last opcode")]
    EarlyEnd { index: usize },
    #[error("opcode {index}: virtual target {target} out of range (max {max})", max = MAX_VIRTUAL_TARGETS - 1)]
    TargetOutOfRange { index: usize, target: u8 },
    #[error("opcode {index}: starting position {position} out of range")]
    PositionOutOfRange { index: usize, position: u8 },
    #[error("opcode {index}: second start marker for position {position}")]
    DuplicateMarker { index: usize, position: u8 },
}

/// Immutable opcode table. Clones share storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgram {
    ops: Arc<[Opcode]>,
}

impl ScanProgram {
    pub fn new(ops: Vec<Opcode>) -> Result<Self, ProgramError> {
        match ops.last() {
            None => return Err(ProgramError::Empty),
            Some(Opcode::End) => {}
            Some(_) => return Err(ProgramError::MissingEnd),
        }

        let mut seen = [false; POSITION_COUNT as usize];
        for (index, op) in ops.iter().enumerate() {
            match *op {
                Opcode::End if index + 1 < ops.len() => return Err(ProgramError::EarlyEnd { index }),
                Opcode::Probe { target, .. } if target as usize >= MAX_VIRTUAL_TARGETS => {
                    return Err(ProgramError::TargetOutOfRange { index, target });
                }
                Opcode::StartMarker { position } => {
                    let slot = seen
                        .get_mut(position as usize)
                        .ok_or(ProgramError::PositionOutOfRange { index, position })?;
                    if *slot {
                        return Err(ProgramError::DuplicateMarker { index, position });
                    }
                    *slot = true;
                }
                _ => {}
            }
        }

        Ok(Self { ops: ops.into() })
    }

    /// The program the robot ships with. Only starting position 0 has a
    /// block; the others scan nothing.
    pub fn builtin() -> Self {
        Self { ops: BUILTIN.into() }
    }

    pub fn ops(&self) -> &[Opcode] {
        &self.ops
    }

    pub fn get(&self, cursor: usize) -> Option<Opcode> {
        self.ops.get(cursor).copied()
    }

    /// Index of the start marker for `position`.
    pub fn find_start(&self, position: u8) -> Option<usize> {
        self.ops
            .iter()
            .position(|op| matches!(op, Opcode::StartMarker { position: p } if *p == position))
    }

    /// Index of the terminating `End`.
    pub fn end_index(&self) -> usize {
        self.ops.len() - 1
    }

    /// Opcodes run for `position`: everything after its marker up to the next
    /// marker or `End`.
    pub fn block(&self, position: u8) -> Option<&[Opcode]> {
        let start = self.find_start(position)? + 1;
        let len = self.ops[start..]
            .iter()
            .position(|op| matches!(op, Opcode::StartMarker { .. } | Opcode::End))
            .unwrap_or(self.ops.len() - start);
        Some(&self.ops[start..start + len])
    }

    /// Starting positions that have a block, in table order.
    pub fn positions(&self) -> impl Iterator<Item = u8> + '_ {
        self.ops.iter().filter_map(|op| match op {
            Opcode::StartMarker { position } => Some(*position),
            _ => None,
        })
    }

    /// Distinct virtual targets probed by `position`'s block, ascending.
    pub fn virtual_targets(&self, position: u8) -> Vec<u8> {
        let mut used = [false; MAX_VIRTUAL_TARGETS];
        for op in self.block(position).unwrap_or(&[]) {
            if let Opcode::Probe { target, .. } = op {
                used[*target as usize] = true;
            }
        }
        (0..MAX_VIRTUAL_TARGETS as u8).filter(|t| used[*t as usize]).collect()
    }
}

const fn probe(x: u16, y: u16, target: u8) -> Opcode {
    Opcode::Probe { x, y, target }
}

const fn angle(angle: u8) -> Opcode {
    Opcode::SetAngle { angle }
}

const GRAB: Opcode = Opcode::Grab;

#[rustfmt::skip]
const BUILTIN: &[Opcode] = &[
    Opcode::StartMarker { position: 0 },
    angle(110), GRAB,
    probe(18, 20, 1), probe(18, 21, 1), probe(18, 22, 1),
    probe(19, 21, 1), probe(19, 22, 1),
    probe(20, 21, 1), probe(20, 22, 1),
    probe(14, 24, 0), probe(15, 24, 0),
    probe(5, 19, 2), probe(5, 20, 2),
    probe(6, 19, 2), probe(6, 20, 2), probe(6, 21, 2),
    probe(7, 20, 2),
    angle(128), GRAB,
    probe(14, 20, 2), probe(14, 21, 2),
    probe(15, 20, 2), probe(15, 21, 2),
    probe(16, 20, 2),
    angle(146), GRAB,
    probe(15, 21, 3), probe(15, 22, 3),
    probe(16, 21, 3), probe(16, 22, 3),
    probe(10, 16, 4), probe(10, 17, 4), probe(10, 18, 4),
    probe(11, 16, 4), probe(11, 17, 4), probe(11, 18, 4),
    probe(11, 16, 4),
    probe(12, 16, 4), probe(12, 17, 4), probe(12, 18, 4),
    Opcode::End,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_is_well_formed() {
        let p = ScanProgram::builtin();
        assert_eq!(ScanProgram::new(p.ops().to_vec()), Ok(p.clone()));
        assert_eq!(p.positions().collect::<Vec<_>>(), vec![0]);
        assert_eq!(p.find_start(0), Some(0));
        assert_eq!(p.find_start(3), None);
        assert_eq!(p.virtual_targets(0), vec![0, 1, 2, 3, 4]);
        assert_eq!(p.block(0).map(|b| b.len()), Some(p.ops().len() - 2));
    }

    #[test]
    fn structure_is_validated() {
        assert_eq!(ScanProgram::new(vec![]), Err(ProgramError::Empty));
        assert_eq!(ScanProgram::new(vec![Opcode::Grab]), Err(ProgramError::MissingEnd));
        assert_eq!(
            ScanProgram::new(vec![Opcode::End, Opcode::End]),
            Err(ProgramError::EarlyEnd { index: 0 })
        );
        assert_eq!(
            ScanProgram::new(vec![probe(0, 0, 16), Opcode::End]),
            Err(ProgramError::TargetOutOfRange { index: 0, target: 16 })
        );
        assert_eq!(
            ScanProgram::new(vec![Opcode::StartMarker { position: 6 }, Opcode::End]),
            Err(ProgramError::PositionOutOfRange { index: 0, position: 6 })
        );
        assert_eq!(
            ScanProgram::new(vec![
                Opcode::StartMarker { position: 1 },
                Opcode::StartMarker { position: 1 },
                Opcode::End,
            ]),
            Err(ProgramError::DuplicateMarker { index: 1, position: 1 })
        );
    }

    #[test]
    fn block_stops_at_next_marker() {
        let p = ScanProgram::new(vec![
            Opcode::StartMarker { position: 2 },
            probe(1, 1, 0),
            Opcode::StartMarker { position: 4 },
            GRAB,
            probe(2, 2, 5),
            Opcode::End,
        ])
        .unwrap();
        assert_eq!(p.block(2), Some(&[probe(1, 1, 0)][..]));
        assert_eq!(p.block(4), Some(&[GRAB, probe(2, 2, 5)][..]));
        assert_eq!(p.virtual_targets(4), vec![5]);
        assert_eq!(p.end_index(), 5);
    }

    #[test]
    fn opcodes_read_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            program: Vec<Opcode>,
        }
        let doc: Doc = toml::from_str(
            r#"
            program = [
                { op = "start_marker", position = 0 },
                { op = "set_angle", angle = 110 },
                { op = "grab" },
                { op = "probe", x = 5, y = 19, target = 2 },
                { op = "end" },
            ]
            "#,
        )
        .unwrap();
        assert_eq!(doc.program[3], probe(5, 19, 2));
        assert!(ScanProgram::new(doc.program).is_ok());
    }
}
