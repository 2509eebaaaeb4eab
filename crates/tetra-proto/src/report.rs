use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub ts_unix_ms: i64,
    pub position: u8,
    pub alliance: String,
    pub side: String,
    // detections per physical target 0..=7
    pub counts: [u16; 8],
    pub best_target: Option<u8>,
    pub ticks: u32,
    // Link health
    pub acks: u32,
    pub nacks: u32,
    pub timeouts: u32,
}
