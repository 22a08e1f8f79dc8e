use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use crate::provision::ProvisionStep;

/// Hypervisor provider selection.
///
/// A closed set of providers so that an unknown provider name fails at
/// topology load time rather than at hypervisor-call time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum Provider {
    /// VirtualBox driven through its command-line control program
    Virtualbox {
        /// Control program override (defaults to "VBoxManage")
        #[serde(skip_serializing_if = "Option::is_none")]
        control_program: Option<String>,
        /// Host bridge interface for public networking
        #[serde(skip_serializing_if = "Option::is_none")]
        bridge: Option<String>,
        /// Host-only network for private static IPs (defaults to "vboxnet0")
        #[serde(skip_serializing_if = "Option::is_none")]
        host_network: Option<String>,
    },
}

impl Provider {
    /// Name of the external control program for this provider
    pub fn control_program(&self) -> &str {
        match self {
            Provider::Virtualbox { control_program, .. } => {
                control_program.as_deref().unwrap_or("VBoxManage")
            }
        }
    }

    /// Host bridge interface for public networking, if configured
    pub fn bridge(&self) -> Option<&str> {
        match self {
            Provider::Virtualbox { bridge, .. } => bridge.as_deref(),
        }
    }

    /// Host-only network name used for private static IPs
    pub fn host_network(&self) -> &str {
        match self {
            Provider::Virtualbox { host_network, .. } => {
                host_network.as_deref().unwrap_or("vboxnet0")
            }
        }
    }
}

/// Base image a machine is instantiated from.
///
/// Either the name of an image already registered with the hypervisor, or a
/// path to an image file on disk.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum BaseImage {
    /// Image registered with the hypervisor under a name
    Name(String),
    /// Image file on disk (e.g., an exported appliance)
    File { path: PathBuf },
}

impl fmt::Display for BaseImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseImage::Name(name) => write!(f, "{}", name),
            BaseImage::File { path } => write!(f, "{}", path.display()),
        }
    }
}

/// A single guest-to-host port forwarding, passed through to the hypervisor
/// unchanged.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PortForward {
    pub guest: u16,
    pub host: u16,
}

/// Declaration of a single virtual machine within a topology.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MachineSpec {
    /// Machine name, unique within the topology
    pub name: String,
    /// Base image to instantiate from
    pub image: BaseImage,
    /// Memory size in megabytes
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u32,
    /// Number of virtual CPUs
    #[serde(default = "default_cpu_count")]
    pub cpus: u32,
    /// Static IPv4 address on the private host-only network
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<Ipv4Addr>,
    /// Whether to attach a bridged public interface
    #[serde(default)]
    pub public_network: bool,
    /// Ordered guest-to-host port forwardings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forwarded_ports: Vec<PortForward>,
    /// Ordered provisioning steps, run once after network attachment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provision: Vec<ProvisionStep>,
}

fn default_memory_mb() -> u32 {
    512
}

fn default_cpu_count() -> u32 {
    1
}

/// Topology-wide settings.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    /// Directory for the rendered-machine summary (defaults to ".multivm"
    /// next to the topology file)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    /// When set, every private IP must fall inside this subnet
    /// (e.g., "192.168.56.0/24"). Unset leaves the shared-prefix convention
    /// unchecked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_subnet: Option<String>,
}

/// The full set of machine definitions describing a multi-VM environment.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Topology {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub settings: Settings,
    pub machines: Vec<MachineSpec>,
}

impl Topology {
    /// Validate the topology.
    ///
    /// Checks that the machine list is non-empty, that machine names and
    /// private IPs are unique, that per-machine sizing is sane, and that
    /// private IPs fall inside `settings.private_subnet` when it is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.machines.is_empty() {
            return Err(ConfigError::EmptyTopology);
        }

        let subnet = self
            .settings
            .private_subnet
            .as_deref()
            .map(|s| Subnet::parse(s).ok_or_else(|| ConfigError::InvalidSubnet(s.to_string())))
            .transpose()?;

        let mut names: HashSet<&str> = HashSet::new();
        let mut ips: HashMap<Ipv4Addr, &str> = HashMap::new();

        for machine in &self.machines {
            if machine.name.is_empty() {
                return Err(ConfigError::InvalidMachine {
                    machine: machine.name.clone(),
                    reason: "machine name cannot be empty".to_string(),
                });
            }
            if !names.insert(&machine.name) {
                return Err(ConfigError::DuplicateName(machine.name.clone()));
            }
            if machine.memory_mb == 0 {
                return Err(ConfigError::InvalidMachine {
                    machine: machine.name.clone(),
                    reason: "memory_mb must be greater than zero".to_string(),
                });
            }
            if machine.cpus == 0 {
                return Err(ConfigError::InvalidMachine {
                    machine: machine.name.clone(),
                    reason: "cpus must be greater than zero".to_string(),
                });
            }

            if let Some(ip) = machine.private_ip {
                if let Some(first) = ips.insert(ip, &machine.name) {
                    return Err(ConfigError::DuplicateIp {
                        ip,
                        first: first.to_string(),
                        second: machine.name.clone(),
                    });
                }
                if let Some(subnet) = &subnet {
                    if !subnet.contains(ip) {
                        return Err(ConfigError::IpOutsideSubnet {
                            machine: machine.name.clone(),
                            ip,
                            subnet: subnet.to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Look up a machine by name
    pub fn machine(&self, name: &str) -> Option<&MachineSpec> {
        self.machines.iter().find(|m| m.name == name)
    }
}

/// An IPv4 subnet in prefix notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subnet {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Subnet {
    /// Parse "a.b.c.d/len" notation. Returns None on any malformation.
    pub fn parse(s: &str) -> Option<Self> {
        let (addr, len) = s.split_once('/')?;
        let network: Ipv4Addr = addr.parse().ok()?;
        let prefix_len: u8 = len.parse().ok()?;
        if prefix_len > 32 {
            return None;
        }
        Some(Subnet {
            network,
            prefix_len,
        })
    }

    /// Whether the given address falls inside this subnet
    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        };
        (u32::from(ip) & mask) == (u32::from(self.network) & mask)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

/// Topology loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("topology defines no machines")]
    EmptyTopology,
    #[error("duplicate machine name '{0}'")]
    DuplicateName(String),
    #[error("duplicate private IP {ip} (machines '{first}' and '{second}')")]
    DuplicateIp {
        ip: Ipv4Addr,
        first: String,
        second: String,
    },
    #[error("invalid machine '{machine}': {reason}")]
    InvalidMachine { machine: String, reason: String },
    #[error("invalid private subnet '{0}'")]
    InvalidSubnet(String),
    #[error("machine '{machine}': private IP {ip} is outside subnet {subnet}")]
    IpOutsideSubnet {
        machine: String,
        ip: Ipv4Addr,
        subnet: String,
    },
    #[error("no machine named '{0}' in topology")]
    UnknownMachine(String),
    #[error("failed to parse topology: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Default implementations
impl Default for Provider {
    fn default() -> Self {
        Provider::Virtualbox {
            control_program: None,
            bridge: None,
            host_network: None,
        }
    }
}
