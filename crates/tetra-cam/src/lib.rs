pub mod autodetect;
pub mod camera;
pub mod client;
pub mod color;
pub mod command;
pub mod doctor;
pub mod error;
pub mod grid;

pub use camera::{Camera, MeanSample};
pub use client::{CommandClient, LinkStats, PollConfig, Reply};
pub use color::ColorCategory;
pub use command::Command;
pub use error::CamError;
pub use grid::{CellBounds, Grid, GridError, Viewport, CMUCAM_VIEWPORT};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// When autodetect=false: fixed port config
    pub serial_dev: Option<String>,
    #[serde(default = "default_baud")]
    pub baud: u32,

    /// If true, probe candidate ports/bauds and keep the first one that
    /// answers a ping.
    #[serde(default)]
    pub autodetect: bool,
    pub candidate_devs: Option<Vec<String>>,
    pub candidate_bauds: Option<Vec<u32>>,

    /// Frame noise filter threshold (`NF`).
    #[serde(default = "default_noise_filter")]
    pub noise_filter: u8,

    /// Raw register writes applied after the mode commands, in order.
    /// Register 0 selects the color space: 32 for YCrCb, 8 for RGB.
    #[serde(default = "default_registers")]
    pub registers: Vec<(u8, u8)>,

    #[serde(default = "default_active_color")]
    pub active_color: ColorCategory,

    /// Log the raw receive buffer of every probe at info level.
    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub polling: PollConfig,
}

fn default_baud() -> u32 { 115_200 }
fn default_noise_filter() -> u8 { 6 }
fn default_registers() -> Vec<(u8, u8)> { vec![(0, 32), (18, 0)] }
fn default_active_color() -> ColorCategory { ColorCategory::Green }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            serial_dev: None,
            baud: default_baud(),
            autodetect: false,
            candidate_devs: None,
            candidate_bauds: None,
            noise_filter: default_noise_filter(),
            registers: default_registers(),
            active_color: default_active_color(),
            verbose: false,
            polling: PollConfig::default(),
        }
    }
}
