pub mod doctor;
pub mod machine;
pub mod preempt;
pub mod program;
pub mod sink;
pub mod translate;

pub use machine::{Scanner, Sightings, SETTLE_TICKS};
pub use preempt::{Deadline, Preempt};
pub use program::{Opcode, ProgramError, ScanProgram};
pub use sink::EventSink;
pub use translate::{Alliance, FieldSide, StartingPosition, TranslationError, TranslationTable};

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Control loop period. The robot's loop runs at about 38 Hz.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// How much of each tick the scan may spend on camera traffic before it
    /// must hand control back. Defaults to the whole tick minus a margin.
    pub tick_budget_ms: Option<u64>,

    /// Replaces the built-in program.
    pub program: Option<Vec<Opcode>>,

    /// Replaces the built-in translation table: one row per starting
    /// position, virtual target index -> physical target id.
    pub translation: Option<Vec<Vec<u8>>>,
}

fn default_tick_ms() -> u64 { 26 }

impl Default for ScanConfig {
    fn default() -> Self {
        Self { tick_ms: default_tick_ms(), tick_budget_ms: None, program: None, translation: None }
    }
}

impl ScanConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn tick_budget(&self) -> Duration {
        let ms = self.tick_budget_ms.unwrap_or(self.tick_ms.saturating_sub(6));
        Duration::from_millis(ms.min(self.tick_ms))
    }

    pub fn program(&self) -> Result<ScanProgram, ProgramError> {
        match &self.program {
            Some(ops) => ScanProgram::new(ops.clone()),
            None => Ok(ScanProgram::builtin()),
        }
    }

    pub fn translation(&self) -> Result<TranslationTable, TranslationError> {
        match &self.translation {
            Some(rows) => TranslationTable::new(rows.clone()),
            None => Ok(TranslationTable::builtin()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_builtin_tables() {
        let cfg: ScanConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.tick(), Duration::from_millis(26));
        assert_eq!(cfg.tick_budget(), Duration::from_millis(20));
        assert_eq!(cfg.program().unwrap(), ScanProgram::builtin());
        assert_eq!(cfg.translation().unwrap(), TranslationTable::builtin());
    }

    #[test]
    fn overrides_are_validated() {
        let cfg: ScanConfig = toml::from_str(
            r#"
            tick_ms = 20
            tick_budget_ms = 50
            translation = [[0], [1], [2], [3], [4]]
            program = [{ op = "grab" }]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.tick_budget(), Duration::from_millis(20));
        assert_eq!(cfg.program(), Err(ProgramError::MissingEnd));
        assert_eq!(cfg.translation(), Err(TranslationError::RowCount { got: 5 }));
    }
}
