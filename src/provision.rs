//! Provisioning step resolution.
//!
//! A step is either inline shell text or a path to a script file. Both are
//! resolved into a single shell invocation handed to the control surface;
//! script paths are resolved relative to the topology file's directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single provisioning step, executed once against a machine after its
/// network attachment.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ProvisionStep {
    /// Inline shell command text
    Inline { shell: String },
    /// Path to a shell script, relative to the topology file
    Script { script: PathBuf },
}

/// A provisioning step resolved into one shell invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellInvocation {
    pub program: String,
    pub args: Vec<String>,
}

/// Resolve a step into the shell invocation to run in the guest.
///
/// Inline text runs through `/bin/sh -c`; a script path is resolved against
/// `topology_dir` and handed to `/bin/sh` directly.
pub fn resolve_step(step: &ProvisionStep, topology_dir: &Path) -> ShellInvocation {
    match step {
        ProvisionStep::Inline { shell } => ShellInvocation {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), shell.clone()],
        },
        ProvisionStep::Script { script } => {
            let path = resolve_script_path(script, topology_dir);
            ShellInvocation {
                program: "/bin/sh".to_string(),
                args: vec![path.to_string_lossy().to_string()],
            }
        }
    }
}

/// Resolve a script path against the topology file's directory
pub fn resolve_script_path(script: &Path, topology_dir: &Path) -> PathBuf {
    if script.is_absolute() {
        script.to_path_buf()
    } else {
        topology_dir.join(script)
    }
}

/// Warn about script files that do not exist yet.
///
/// A missing file is not a load error: provisioning problems are render-time
/// concerns, and the script may appear between load and render.
pub fn warn_missing_scripts(machines: &[crate::config::MachineSpec], topology_dir: &Path) {
    for machine in machines {
        for (index, step) in machine.provision.iter().enumerate() {
            if let ProvisionStep::Script { script } = step {
                let path = resolve_script_path(script, topology_dir);
                if !path.exists() {
                    log::warn!(
                        "Machine '{}' step {}: script {:?} does not exist",
                        machine.name,
                        index,
                        path
                    );
                }
            }
        }
    }
}
