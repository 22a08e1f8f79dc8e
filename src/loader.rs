use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, Topology};
use crate::provision::warn_missing_scripts;

/// Load and validate a topology from a YAML file.
///
/// Validation failures are reported before any hypervisor call is made.
pub fn load_topology(path: &Path) -> Result<Topology, ConfigError> {
    info!("Loading topology from: {:?}", path);

    let file = File::open(path)?;
    let topology: Topology = serde_yaml::from_reader(file)?;

    topology.validate()?;
    info!(
        "Loaded topology with {} machine(s)",
        topology.machines.len()
    );

    warn_missing_scripts(&topology.machines, &topology_dir(path));

    Ok(topology)
}

/// Directory the topology file lives in; script paths and the state dir are
/// resolved against it.
pub fn topology_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf()
}
