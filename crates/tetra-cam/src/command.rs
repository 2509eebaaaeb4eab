use std::fmt;

/// Longest line the camera's input buffer accepts, terminator included.
pub const MAX_COMMAND_LEN: usize = 64;
pub const TERMINATOR: u8 = b'\r';

/// Commands understood by the CMUcam2 firmware that this driver uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Empty line; the camera answers with an ACK if it is listening.
    Ping,
    Reset,
    /// `BM 1` keeps a captured frame in the buffer until the next `RF`.
    BufferMode(u8),
    PollMode(bool),
    RawMode(u8),
    NoiseFilter(u8),
    SetRegister { reg: u8, value: u8 },
    ServoOutput { servo: u8, level: u8 },
    /// 1-based inclusive window in camera pixels.
    VirtualWindow { x0: u16, y0: u16, x1: u16, y1: u16 },
    GetMean,
    ReadFrame,
    SetServo { servo: u8, position: u8 },
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Command::*;
        match *self {
            Ping => Ok(()),
            Reset => f.write_str("RS"),
            BufferMode(m) => write!(f, "BM {}", m),
            PollMode(on) => write!(f, "PM {}", on as u8),
            RawMode(m) => write!(f, "RM {}", m),
            NoiseFilter(level) => write!(f, "NF {}", level),
            SetRegister { reg, value } => write!(f, "CR {} {}", reg, value),
            ServoOutput { servo, level } => write!(f, "SO {} {}", servo, level),
            VirtualWindow { x0, y0, x1, y1 } => write!(f, "VW {} {} {} {}", x0, y0, x1, y1),
            GetMean => f.write_str("GM"),
            ReadFrame => f.write_str("RF"),
            SetServo { servo, position } => write!(f, "SV {} {}", servo, position),
        }
    }
}

impl Command {
    /// Wire form: command text plus the carriage return.
    pub fn encode(&self) -> Vec<u8> {
        let mut line = self.to_string().into_bytes();
        assert!(
            line.len() < MAX_COMMAND_LEN,
            "camera command `{}` exceeds {} bytes",
            self,
            MAX_COMMAND_LEN
        );
        line.push(TERMINATOR);
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_matches_camera_mnemonics() {
        assert_eq!(Command::Reset.to_string(), "RS");
        assert_eq!(Command::PollMode(true).to_string(), "PM 1");
        assert_eq!(Command::SetRegister { reg: 18, value: 0 }.to_string(), "CR 18 0");
        assert_eq!(
            Command::VirtualWindow { x0: 31, y0: 96, x1: 36, y1: 100 }.to_string(),
            "VW 31 96 36 100"
        );
        assert_eq!(Command::SetServo { servo: 0, position: 146 }.to_string(), "SV 0 146");
    }

    #[test]
    fn encode_appends_carriage_return() {
        assert_eq!(Command::GetMean.encode(), b"GM\r".to_vec());
        assert_eq!(Command::Ping.encode(), b"\r".to_vec());
    }

    #[test]
    fn widest_window_fits_buffer() {
        let cmd = Command::VirtualWindow { x0: u16::MAX, y0: u16::MAX, x1: u16::MAX, y1: u16::MAX };
        assert!(cmd.encode().len() <= MAX_COMMAND_LEN);
    }
}
