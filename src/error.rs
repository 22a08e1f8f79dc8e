//! Render-time error kinds.
//!
//! Every failure carries the offending machine name, and provisioning
//! failures also carry the zero-based step index, so the caller can fix the
//! cause and re-invoke the same render.

use crate::hypervisor::HypervisorError;

/// Failure rendering a single machine
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("machine '{machine}': base image '{image}' not found")]
    ImageNotFound { machine: String, image: String },
    #[error("machine '{machine}': network attach failed: {reason}")]
    NetworkBind { machine: String, reason: String },
    #[error("machine '{machine}': provision step {step} exited with status {status}")]
    Provision {
        machine: String,
        step: usize,
        status: i32,
    },
    #[error("machine '{machine}': control surface failure")]
    Control {
        machine: String,
        #[source]
        source: HypervisorError,
    },
}

impl RenderError {
    /// Name of the machine this failure belongs to
    pub fn machine(&self) -> &str {
        match self {
            RenderError::ImageNotFound { machine, .. }
            | RenderError::NetworkBind { machine, .. }
            | RenderError::Provision { machine, .. }
            | RenderError::Control { machine, .. } => machine,
        }
    }
}
