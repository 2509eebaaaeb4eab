use tetra_proto::event::Fault;
use thiserror::Error;

use crate::grid::GridError;

/// Ways a single camera exchange can fail. None of these are fatal; callers
/// degrade to a negative result and carry on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CamError {
    #[error("camera rejected `{command}`")]
    Nack { command: String },
    #[error("no acknowledgement for `{command}`")]
    Timeout { command: String },
    #[error("short reply to `{command}`: got {got} of {want} bytes")]
    MalformedReply { command: String, got: usize, want: usize },
    #[error(transparent)]
    OutsideGrid(#[from] GridError),
}

impl CamError {
    pub fn command(&self) -> &str {
        match self {
            CamError::Nack { command }
            | CamError::Timeout { command }
            | CamError::MalformedReply { command, .. } => command,
            CamError::OutsideGrid(_) => "VW",
        }
    }

    pub fn fault(&self) -> Fault {
        match self {
            CamError::Nack { .. } => Fault::Nack,
            CamError::Timeout { .. } => Fault::Timeout,
            CamError::MalformedReply { got, want, .. } => Fault::MalformedReply { got: *got, want: *want },
            CamError::OutsideGrid(_) => Fault::OutsideGrid,
        }
    }
}

pub type Result<T> = core::result::Result<T, CamError>;
