//! Recording driver.
//!
//! Records every control-surface call instead of executing it. Backs the
//! CLI's dry-run mode and the test suite's invocation-order assertions.

use std::fmt;

use crate::provision::ShellInvocation;

use super::types::{
    CreateMachineRequest, HypervisorError, MachineState, NetworkAttachment, NetworkInterface,
};
use super::Hypervisor;

/// A single recorded control-surface call.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedCall {
    Create {
        machine: String,
        image: String,
        memory_mb: u32,
        cpus: u32,
    },
    AttachNetwork {
        machine: String,
        interfaces: Vec<NetworkInterface>,
    },
    RunStep {
        machine: String,
        step_index: usize,
        invocation: ShellInvocation,
    },
    Destroy {
        machine: String,
    },
}

impl fmt::Display for PlannedCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedCall::Create {
                machine,
                image,
                memory_mb,
                cpus,
            } => write!(
                f,
                "create {} from '{}' ({} MB, {} cpus)",
                machine, image, memory_mb, cpus
            ),
            PlannedCall::AttachNetwork {
                machine,
                interfaces,
            } => {
                write!(f, "attach {} interface(s) to {}", interfaces.len(), machine)
            }
            PlannedCall::RunStep {
                machine,
                step_index,
                invocation,
            } => write!(
                f,
                "run step {} on {}: {} {}",
                step_index,
                machine,
                invocation.program,
                invocation.args.join(" ")
            ),
            PlannedCall::Destroy { machine } => write!(f, "destroy {}", machine),
        }
    }
}

/// Driver that records calls instead of executing them.
#[derive(Debug, Default)]
pub struct PlanHypervisor {
    calls: Vec<PlannedCall>,
}

impl PlanHypervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// The calls recorded so far, in issue order
    pub fn calls(&self) -> &[PlannedCall] {
        &self.calls
    }
}

impl Hypervisor for PlanHypervisor {
    fn create_machine(&mut self, request: &CreateMachineRequest) -> Result<(), HypervisorError> {
        self.calls.push(PlannedCall::Create {
            machine: request.name.clone(),
            image: request.image.to_string(),
            memory_mb: request.memory_mb,
            cpus: request.cpus,
        });
        Ok(())
    }

    fn attach_network(
        &mut self,
        machine: &str,
        attachment: &NetworkAttachment,
    ) -> Result<(), HypervisorError> {
        self.calls.push(PlannedCall::AttachNetwork {
            machine: machine.to_string(),
            interfaces: attachment.interfaces.clone(),
        });
        Ok(())
    }

    fn run_step(
        &mut self,
        machine: &str,
        step_index: usize,
        invocation: &ShellInvocation,
    ) -> Result<(), HypervisorError> {
        self.calls.push(PlannedCall::RunStep {
            machine: machine.to_string(),
            step_index,
            invocation: invocation.clone(),
        });
        Ok(())
    }

    fn state(&self, _machine: &str) -> Result<MachineState, HypervisorError> {
        Ok(MachineState::NotCreated)
    }

    fn destroy(&mut self, machine: &str) -> Result<(), HypervisorError> {
        self.calls.push(PlannedCall::Destroy {
            machine: machine.to_string(),
        });
        Ok(())
    }
}
