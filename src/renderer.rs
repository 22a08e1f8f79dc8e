//! Topology renderer.
//!
//! Renders each machine in listed order: create the VM from its base image,
//! attach its network interfaces, then run its provisioning steps. Rendering
//! fails fast within one machine's step sequence but continues across
//! machines, so one broken machine never blocks the rest of the topology.

use log::{error, info};
use std::path::Path;

use crate::config::{ConfigError, MachineSpec, Topology};
use crate::error::RenderError;
use crate::hypervisor::{
    CreateMachineRequest, Hypervisor, HypervisorError, MachineState, NetworkAttachment,
};
use crate::provision::resolve_step;

/// Outcome of rendering one machine.
#[derive(Debug)]
pub struct RenderOutcome {
    pub machine: String,
    pub result: Result<(), RenderError>,
}

/// Per-machine outcomes of one render pass, in topology order.
#[derive(Debug, Default)]
pub struct RenderReport {
    pub outcomes: Vec<RenderOutcome>,
}

impl RenderReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Names of machines that rendered successfully
    pub fn succeeded(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.machine.as_str())
    }

    /// Failures, in topology order
    pub fn failures(&self) -> impl Iterator<Item = &RenderError> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().err())
    }
}

/// Select the machines a command applies to: the whole topology, or one
/// machine by name. An unknown name fails before any hypervisor call.
fn select_machines<'a>(
    topology: &'a Topology,
    target: Option<&str>,
) -> Result<Vec<&'a MachineSpec>, ConfigError> {
    match target {
        Some(name) => match topology.machine(name) {
            Some(machine) => Ok(vec![machine]),
            None => Err(ConfigError::UnknownMachine(name.to_string())),
        },
        None => Ok(topology.machines.iter().collect()),
    }
}

/// Bring up all machines in the topology, or one machine by name.
pub fn render_topology(
    topology: &Topology,
    topology_dir: &Path,
    hypervisor: &mut dyn Hypervisor,
    target: Option<&str>,
) -> Result<RenderReport, ConfigError> {
    let machines = select_machines(topology, target)?;
    let mut report = RenderReport::default();

    for machine in machines {
        info!("Rendering machine '{}'", machine.name);
        let result = render_machine(machine, topology_dir, hypervisor);
        match &result {
            Ok(()) => info!("Machine '{}' rendered", machine.name),
            Err(e) => error!("{}", e),
        }
        report.outcomes.push(RenderOutcome {
            machine: machine.name.clone(),
            result,
        });
    }

    Ok(report)
}

/// Re-run provisioning steps only, against machines assumed already created
/// and networked.
pub fn provision_topology(
    topology: &Topology,
    topology_dir: &Path,
    hypervisor: &mut dyn Hypervisor,
    target: Option<&str>,
) -> Result<RenderReport, ConfigError> {
    let machines = select_machines(topology, target)?;
    let mut report = RenderReport::default();

    for machine in machines {
        info!("Provisioning machine '{}'", machine.name);
        let result = run_provision_steps(machine, topology_dir, hypervisor);
        if let Err(e) = &result {
            error!("{}", e);
        }
        report.outcomes.push(RenderOutcome {
            machine: machine.name.clone(),
            result,
        });
    }

    Ok(report)
}

/// Tear down all machines in the topology, or one machine by name.
pub fn destroy_topology(
    topology: &Topology,
    hypervisor: &mut dyn Hypervisor,
    target: Option<&str>,
) -> Result<RenderReport, ConfigError> {
    let machines = select_machines(topology, target)?;
    let mut report = RenderReport::default();

    for machine in machines {
        info!("Destroying machine '{}'", machine.name);
        let result = hypervisor
            .destroy(&machine.name)
            .map_err(|source| RenderError::Control {
                machine: machine.name.clone(),
                source,
            });
        if let Err(e) = &result {
            error!("{}", e);
        }
        report.outcomes.push(RenderOutcome {
            machine: machine.name.clone(),
            result,
        });
    }

    Ok(report)
}

/// Query the state of every machine in the topology.
pub fn topology_status(
    topology: &Topology,
    hypervisor: &dyn Hypervisor,
) -> Vec<(String, MachineState)> {
    topology
        .machines
        .iter()
        .map(|machine| {
            let state = hypervisor
                .state(&machine.name)
                .unwrap_or(MachineState::Unknown);
            (machine.name.clone(), state)
        })
        .collect()
}

/// Render one machine: create, attach network, provision. Fails fast on the
/// first error; provisioning never starts before the machine's own network
/// attachment succeeded.
fn render_machine(
    machine: &MachineSpec,
    topology_dir: &Path,
    hypervisor: &mut dyn Hypervisor,
) -> Result<(), RenderError> {
    let request = CreateMachineRequest::for_machine(machine);
    hypervisor
        .create_machine(&request)
        .map_err(|e| match e {
            HypervisorError::ImageNotFound(image) => RenderError::ImageNotFound {
                machine: machine.name.clone(),
                image,
            },
            source => RenderError::Control {
                machine: machine.name.clone(),
                source,
            },
        })?;

    let attachment = NetworkAttachment::for_machine(machine);
    hypervisor
        .attach_network(&machine.name, &attachment)
        .map_err(|e| match e {
            HypervisorError::NetworkBind(reason) => RenderError::NetworkBind {
                machine: machine.name.clone(),
                reason,
            },
            source => RenderError::Control {
                machine: machine.name.clone(),
                source,
            },
        })?;

    run_provision_steps(machine, topology_dir, hypervisor)
}

fn run_provision_steps(
    machine: &MachineSpec,
    topology_dir: &Path,
    hypervisor: &mut dyn Hypervisor,
) -> Result<(), RenderError> {
    for (index, step) in machine.provision.iter().enumerate() {
        let invocation = resolve_step(step, topology_dir);
        hypervisor
            .run_step(&machine.name, index, &invocation)
            .map_err(|e| match e {
                HypervisorError::StepFailed { status } => RenderError::Provision {
                    machine: machine.name.clone(),
                    step: index,
                    status,
                },
                source => RenderError::Control {
                    machine: machine.name.clone(),
                    source,
                },
            })?;
    }
    Ok(())
}
