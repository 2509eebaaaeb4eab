use anyhow::Result;
use std::time::Instant;
use tetra_link::{SerialTransport, Transport};
use tracing::{info, warn};

use crate::client::{CommandClient, PollConfig, Reply};
use crate::command::Command;

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub dev: String,
    pub baud: u32,
    pub acked: bool,
    pub elapsed_ms: u64,
    pub note: String,
}

#[derive(Debug, Clone)]
pub struct AutodetectResult {
    pub chosen: Option<(String, u32)>,
    pub probes: Vec<ProbeResult>,
}

pub fn default_candidate_devs() -> Vec<String> {
    vec![
        "/dev/ttyUSB0".into(),
        "/dev/ttyUSB1".into(),
        "/dev/ttyACM0".into(),
        "/dev/serial0".into(),
        "/dev/ttyAMA0".into(),
        "/dev/ttyS0".into(),
    ]
}

/// CMUcam2 jumper-selectable rates, fastest first.
pub fn default_candidate_bauds() -> Vec<u32> {
    vec![115_200, 57_600, 38_400, 19_200, 9_600]
}

pub fn autodetect_camera(
    candidate_devs: Vec<String>,
    candidate_bauds: Vec<u32>,
    polling: &PollConfig,
) -> Result<AutodetectResult> {
    probe_candidates(candidate_devs, candidate_bauds, polling, |dev, baud| {
        SerialTransport::open(dev, baud)
    })
}

/// Try every dev/baud pair in order and stop at the first one whose camera
/// acknowledges an empty line. `open` is the only place hardware is touched.
pub fn probe_candidates<T, F>(
    candidate_devs: Vec<String>,
    candidate_bauds: Vec<u32>,
    polling: &PollConfig,
    mut open: F,
) -> Result<AutodetectResult>
where
    T: Transport,
    F: FnMut(&str, u32) -> Result<T>,
{
    let mut probes = Vec::new();

    for dev in candidate_devs {
        for baud in &candidate_bauds {
            let start = Instant::now();
            let mut acked = false;

            let note = match open(&dev, *baud) {
                Ok(link) => {
                    let mut client = CommandClient::new(link, polling.clone());
                    match client.send_and_await(&Command::Ping) {
                        Reply::Ack => {
                            acked = true;
                            "ack".to_string()
                        }
                        Reply::Nack => "rejected ping".to_string(),
                        Reply::Timeout => "no ack".to_string(),
                    }
                }
                Err(e) => {
                    warn!("camera autodetect probe failed dev={} baud={} err={:#}", dev, baud, e);
                    format!("open failed: {:#}", e)
                }
            };

            probes.push(ProbeResult {
                dev: dev.clone(),
                baud: *baud,
                acked,
                elapsed_ms: start.elapsed().as_millis() as u64,
                note,
            });

            if acked {
                info!("camera autodetect: OK {} @ {}", dev, baud);
                return Ok(AutodetectResult { chosen: Some((dev, *baud)), probes });
            }
        }
    }

    Ok(AutodetectResult { chosen: None, probes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tetra_link::mock::MockLink;

    fn fast() -> PollConfig {
        PollConfig { ack_polls: 3, data_polls: 3, mean_polls: 3, poll_interval_us: 0 }
    }

    #[test]
    fn first_acking_candidate_wins() {
        let res = probe_candidates(
            vec!["/dev/a".into(), "/dev/b".into()],
            vec![115_200, 9_600],
            &fast(),
            |dev, baud| {
                anyhow::ensure!(dev != "/dev/a", "no such device");
                Ok(if baud == 9_600 { MockLink::acking() } else { MockLink::silent() })
            },
        )
        .unwrap();

        assert_eq!(res.chosen, Some(("/dev/b".to_string(), 9_600)));
        assert_eq!(res.probes.len(), 4);
        assert!(res.probes[0].note.starts_with("open failed"));
        assert_eq!(res.probes[2].note, "no ack");
        assert!(res.probes[3].acked);
    }

    #[test]
    fn nothing_answers() {
        let res = probe_candidates(vec!["/dev/a".into()], vec![115_200], &fast(), |_, _| {
            Ok(MockLink::new(|_| vec![vec![crate::client::NACK]]))
        })
        .unwrap();
        assert!(res.chosen.is_none());
        assert_eq!(res.probes[0].note, "rejected ping");
    }
}
