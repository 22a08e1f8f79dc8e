//! Rendered-machine summary.
//!
//! After a successful bring-up the renderer writes a `machines.json`
//! summary into the state directory: name, image, private IP, and port
//! forwardings per rendered machine. Purely informational; the hypervisor's
//! own state store remains opaque to this crate.

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{PortForward, Topology};
use crate::renderer::RenderReport;

/// Summary record for one rendered machine.
#[derive(Serialize, Debug)]
pub struct MachineRecord {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    pub public_network: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub forwarded_ports: Vec<PortForward>,
}

/// Registry of all machines rendered in the last bring-up.
#[derive(Serialize, Debug)]
pub struct MachineRegistry {
    pub machines: Vec<MachineRecord>,
}

impl MachineRegistry {
    /// Collect the machines that rendered successfully in this pass.
    pub fn from_report(topology: &Topology, report: &RenderReport) -> Self {
        let machines = report
            .succeeded()
            .filter_map(|name| topology.machine(name))
            .map(|machine| MachineRecord {
                name: machine.name.clone(),
                image: machine.image.to_string(),
                private_ip: machine.private_ip.map(|ip| ip.to_string()),
                public_network: machine.public_network,
                forwarded_ports: machine.forwarded_ports.clone(),
            })
            .collect();
        MachineRegistry { machines }
    }
}

/// Write the registry as `machines.json` into the state directory and
/// return the written path.
pub fn write_registry(registry: &MachineRegistry, state_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(state_dir)
        .wrap_err_with(|| format!("Failed to create state directory '{}'", state_dir.display()))?;

    let path = state_dir.join("machines.json");
    let json = serde_json::to_string_pretty(registry)?;
    fs::write(&path, json)
        .wrap_err_with(|| format!("Failed to write registry '{}'", path.display()))?;

    info!("Wrote machine registry: {:?}", path);
    Ok(path)
}
