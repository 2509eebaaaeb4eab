use serde::{Deserialize, Serialize};

/// Why a camera exchange did not produce what the caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fault {
    Nack,
    Timeout,
    MalformedReply { got: usize, want: usize },
    /// Probe addressed a cell the active grid does not have.
    OutsideGrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Init,
    Wait,
    Scan,
    Sum,
    Done,
}

/// Diagnostics emitted while a scan runs. Delivery is best effort; a scan
/// never waits on whoever consumes these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanEvent {
    PhaseEntered {
        phase: ScanPhase,
        cursor: usize,
    },
    CommandFailed {
        command: String,
        fault: Fault,
    },
    NoStartMarker {
        position: u8,
    },
    Sighting {
        x: u16,
        y: u16,
        target: u8,
    },
    Untranslated {
        position: u8,
        target: u8,
        count: u16,
    },
    Finished {
        position: u8,
        counts: [u16; 8],
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_kind_tag() {
        let ev = ScanEvent::CommandFailed {
            command: "VW 31 96 36 100".into(),
            fault: Fault::MalformedReply { got: 2, want: 5 },
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"kind\":\"command_failed\""));
        assert!(json.contains("\"type\":\"malformed_reply\""));
        let back: ScanEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }
}
