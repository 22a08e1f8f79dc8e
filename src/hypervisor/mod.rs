//! External virtualization control surface.
//!
//! The hypervisor itself is an external collaborator; this crate only
//! constructs the parameters for it. The [`Hypervisor`] trait is the seam:
//! [`CommandHypervisor`] shells out to the provider's control program, while
//! [`PlanHypervisor`] records the calls it would make (dry runs and tests).

pub mod command;
pub mod plan;
pub mod types;

pub use command::CommandHypervisor;
pub use plan::{PlanHypervisor, PlannedCall};
pub use types::{
    CreateMachineRequest, HypervisorError, MachineState, NetworkAttachment, NetworkInterface,
};

use crate::provision::ShellInvocation;

/// Operations the renderer issues against the external virtualization tool.
///
/// Implementations must not retry: failures are reported to the renderer,
/// which assumes provisioning steps are idempotent and leaves re-invocation
/// to the caller.
pub trait Hypervisor {
    /// Create a VM from a base image with the given sizing, or reuse an
    /// existing VM of the same name.
    fn create_machine(&mut self, request: &CreateMachineRequest) -> Result<(), HypervisorError>;

    /// Attach network interfaces to a machine.
    fn attach_network(
        &mut self,
        machine: &str,
        attachment: &NetworkAttachment,
    ) -> Result<(), HypervisorError>;

    /// Run one provisioning step against a machine. A non-zero exit status
    /// is reported as [`HypervisorError::StepFailed`].
    fn run_step(
        &mut self,
        machine: &str,
        step_index: usize,
        invocation: &ShellInvocation,
    ) -> Result<(), HypervisorError>;

    /// Query the current state of a machine.
    fn state(&self, machine: &str) -> Result<MachineState, HypervisorError>;

    /// Tear down a machine.
    fn destroy(&mut self, machine: &str) -> Result<(), HypervisorError>;
}
