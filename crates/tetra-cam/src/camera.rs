use tetra_link::Transport;
use tracing::{debug, info, warn};

use crate::client::{CommandClient, LinkStats, Reply};
use crate::color::{classify, ColorCategory, MEAN_REPLY_LEN};
use crate::command::Command;
use crate::error::Result;
use crate::grid::Grid;
use crate::CameraConfig;

const AIM_SERVO: u8 = 0;

/// One mean-color reading of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeanSample {
    pub x: u16,
    pub y: u16,
    pub bytes: [u8; MEAN_REPLY_LEN],
    pub category: ColorCategory,
}

/// CMUcam2 driver: setup, aiming, frame capture and per-cell color reads.
pub struct Camera<T: Transport> {
    client: CommandClient<T>,
    noise_filter: u8,
    registers: Vec<(u8, u8)>,
    active: ColorCategory,
    verbose: bool,
}

impl<T: Transport> Camera<T> {
    pub fn new(link: T, cfg: &CameraConfig) -> Self {
        Self {
            client: CommandClient::new(link, cfg.polling.clone()),
            noise_filter: cfg.noise_filter,
            registers: cfg.registers.clone(),
            active: cfg.active_color,
            verbose: cfg.verbose,
        }
    }

    pub fn active_color(&self) -> ColorCategory {
        self.active
    }

    pub fn stats(&self) -> &LinkStats {
        self.client.stats()
    }

    pub fn client_mut(&mut self) -> &mut CommandClient<T> {
        &mut self.client
    }

    pub fn ping(&mut self) -> Reply {
        self.client.send_and_await(&Command::Ping)
    }

    /// Reset clears every camera register. The follow-up ping confirms the
    /// camera came back and is listening.
    pub fn reset(&mut self) -> Result<()> {
        self.client.expect_ack(&Command::Reset)?;
        self.client.expect_ack(&Command::Ping)
    }

    /// Put the camera in a known state for cell probing. Stops at the first
    /// command the camera does not acknowledge.
    pub fn initialize(&mut self) -> Result<()> {
        if let Err(e) = self.reset() {
            warn!("camera: reset not confirmed: {}", e);
        }

        let mut setup = vec![
            Command::BufferMode(1),
            Command::PollMode(true),
            Command::RawMode(1),
            Command::NoiseFilter(self.noise_filter),
        ];
        setup.extend(self.registers.iter().map(|&(reg, value)| Command::SetRegister { reg, value }));
        setup.push(Command::ServoOutput { servo: AIM_SERVO, level: 1 });

        for cmd in &setup {
            self.client.expect_ack(cmd)?;
        }

        self.client.await_full_response();
        self.client.clear_rx();
        info!("camera: initialized ({} setup commands)", setup.len());
        Ok(())
    }

    /// Point the aim servo. The camera needs a few ticks to get there before
    /// a grabbed frame is worth anything.
    pub fn aim(&mut self, position: u8) -> Result<()> {
        self.client.expect_ack(&Command::SetServo { servo: AIM_SERVO, position })?;
        self.client.await_full_response();
        Ok(())
    }

    /// Latch a new frame into the camera's buffer.
    pub fn grab_frame(&mut self) -> Result<()> {
        self.client.expect_ack(&Command::ReadFrame)?;
        self.client.await_full_response();
        self.client.clear_rx();
        Ok(())
    }

    /// Window the camera onto one cell and read back its mean color.
    pub fn sample(&mut self, grid: &Grid, x: u16, y: u16) -> Result<MeanSample> {
        let bounds = grid.cell_bounds(x, y)?;

        self.client.expect_ack(&bounds.window())?;
        self.client.expect_ack(&Command::GetMean)?;

        let reply = self.client.await_reply_len(MEAN_REPLY_LEN)?;
        let mut bytes = [0u8; MEAN_REPLY_LEN];
        bytes.copy_from_slice(&reply[..MEAN_REPLY_LEN]);
        let category = classify(reply, self.active);

        if self.verbose {
            info!("camera: [{},{}] {:?} buffer={:?}", x, y, category, reply);
        } else {
            debug!("camera: [{},{}] {:?}", x, y, category);
        }
        Ok(MeanSample { x, y, bytes, category })
    }

    /// Color of one cell, `Unknown` if the camera did not answer properly.
    pub fn classify(&mut self, grid: &Grid, x: u16, y: u16) -> ColorCategory {
        match self.sample(grid, x, y) {
            Ok(s) => s.category,
            Err(e) => {
                debug!("camera: [{},{}] unreadable: {}", x, y, e);
                ColorCategory::Unknown
            }
        }
    }

    pub fn into_link(self) -> T {
        self.client.into_inner()
    }
}
