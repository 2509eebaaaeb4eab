use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of starting positions on the field.
pub const POSITION_COUNT: u8 = 6;
/// Physical target ids are `0..PHYSICAL_TARGETS`.
pub const PHYSICAL_TARGETS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alliance {
    Red,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSide {
    Left,
    Center,
    Right,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {what} `{name}`")]
pub struct UnknownName {
    what: &'static str,
    name: String,
}

impl FromStr for Alliance {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" => Ok(Alliance::Red),
            "blue" => Ok(Alliance::Blue),
            _ => Err(UnknownName { what: "alliance", name: s.to_string() }),
        }
    }
}

impl FromStr for FieldSide {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(FieldSide::Left),
            "center" | "centre" => Ok(FieldSide::Center),
            "right" => Ok(FieldSide::Right),
            _ => Err(UnknownName { what: "field side", name: s.to_string() }),
        }
    }
}

impl fmt::Display for Alliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Alliance::Red => "red",
            Alliance::Blue => "blue",
        })
    }
}

impl fmt::Display for FieldSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldSide::Left => "left",
            FieldSide::Center => "center",
            FieldSide::Right => "right",
        })
    }
}

/// Where the robot starts the match. Positions outside `0..6` are allowed and
/// simply have no scan block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StartingPosition(u8);

impl StartingPosition {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub fn from_field(alliance: Alliance, side: FieldSide) -> Self {
        let base = match alliance {
            Alliance::Blue => 0,
            Alliance::Red => 3,
        };
        let offset = match side {
            FieldSide::Left => 0,
            FieldSide::Center => 1,
            FieldSide::Right => 2,
        };
        Self(base + offset)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn is_known(self) -> bool {
        self.0 < POSITION_COUNT
    }
}

impl fmt::Display for StartingPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "position {}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("translation table needs {want} rows, got {got}", want = POSITION_COUNT)]
    RowCount { got: usize },
    #[error("translation row {row}, entry {index}: physical id {id} out of range")]
    PhysicalOutOfRange { row: usize, index: usize, id: u8 },
}

/// Per starting position, virtual target index -> physical target id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationTable {
    rows: Vec<Vec<u8>>,
}

impl TranslationTable {
    pub fn new(rows: Vec<Vec<u8>>) -> Result<Self, TranslationError> {
        if rows.len() != POSITION_COUNT as usize {
            return Err(TranslationError::RowCount { got: rows.len() });
        }
        for (row, ids) in rows.iter().enumerate() {
            if let Some((index, &id)) = ids.iter().enumerate().find(|(_, id)| **id as usize >= PHYSICAL_TARGETS) {
                return Err(TranslationError::PhysicalOutOfRange { row, index, id });
            }
        }
        Ok(Self { rows })
    }

    pub fn builtin() -> Self {
        Self {
            rows: vec![
                vec![7, 2, 3, 6, 1],
                vec![3, 6, 1, 4],
                vec![6, 1, 4, 5, 0],
                vec![5, 0, 4, 6, 1],
                vec![4, 6, 1, 3],
                vec![6, 1, 3, 7, 3],
            ],
        }
    }

    pub fn row(&self, position: StartingPosition) -> Option<&[u8]> {
        self.rows.get(position.index() as usize).map(Vec::as_slice)
    }

    /// `None` when the position has no row or the row is too short.
    pub fn lookup(&self, position: StartingPosition, virtual_target: u8) -> Option<u8> {
        self.row(position)?.get(virtual_target as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_positions() {
        use Alliance::*;
        use FieldSide::*;
        let cases = [
            (Blue, Left, 0),
            (Blue, Center, 1),
            (Blue, Right, 2),
            (Red, Left, 3),
            (Red, Center, 4),
            (Red, Right, 5),
        ];
        for (a, s, want) in cases {
            assert_eq!(StartingPosition::from_field(a, s).index(), want, "{} {}", a, s);
        }
        assert!(!StartingPosition::new(6).is_known());
    }

    #[test]
    fn names_parse() {
        assert_eq!("RED".parse::<Alliance>(), Ok(Alliance::Red));
        assert_eq!("centre".parse::<FieldSide>(), Ok(FieldSide::Center));
        assert!("green".parse::<Alliance>().is_err());
    }

    #[test]
    fn lookup_is_bounded_by_row_length() {
        let t = TranslationTable::builtin();
        assert_eq!(t.lookup(StartingPosition::new(0), 2), Some(3));
        assert_eq!(t.lookup(StartingPosition::new(1), 3), Some(4));
        assert_eq!(t.lookup(StartingPosition::new(1), 4), None);
        assert_eq!(t.lookup(StartingPosition::new(9), 0), None);
    }

    #[test]
    fn builtin_passes_validation() {
        let t = TranslationTable::builtin();
        assert_eq!(TranslationTable::new(t.rows.clone()), Ok(t));
        assert_eq!(
            TranslationTable::new(vec![vec![]; 5]),
            Err(TranslationError::RowCount { got: 5 })
        );
        let mut rows = vec![vec![0u8]; 6];
        rows[4] = vec![1, 8];
        assert_eq!(
            TranslationTable::new(rows),
            Err(TranslationError::PhysicalOutOfRange { row: 4, index: 1, id: 8 })
        );
    }
}
