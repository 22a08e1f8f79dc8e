//! Control-surface parameter types.
//!
//! This module contains the typed requests handed to the external
//! virtualization control surface. The renderer constructs these from a
//! validated topology; drivers translate them into control-program
//! invocations.

use std::fmt;
use std::net::Ipv4Addr;

use crate::config::{BaseImage, MachineSpec, PortForward};

/// Request to create (or reuse) a VM from a base image.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateMachineRequest {
    /// Machine name, unique within the topology
    pub name: String,
    /// Base image to instantiate from
    pub image: BaseImage,
    /// Memory size in megabytes
    pub memory_mb: u32,
    /// Number of virtual CPUs
    pub cpus: u32,
}

impl CreateMachineRequest {
    pub fn for_machine(spec: &MachineSpec) -> Self {
        CreateMachineRequest {
            name: spec.name.clone(),
            image: spec.image.clone(),
            memory_mb: spec.memory_mb,
            cpus: spec.cpus,
        }
    }
}

/// One network interface to attach, as a closed set of modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkInterface {
    /// Host-only interface with a static IPv4 address
    PrivateStatic { ip: Ipv4Addr },
    /// Bridged interface onto the named host bridge
    PublicBridged { bridge: Option<String> },
    /// NAT interface with guest-to-host port forwardings, passed through
    /// unchanged
    NatForwarded { forwards: Vec<PortForward> },
}

/// The full set of interfaces to attach to one machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkAttachment {
    pub interfaces: Vec<NetworkInterface>,
}

impl NetworkAttachment {
    /// Build the attachment for a machine spec: private static IP, optional
    /// bridged public interface, NAT forwards, in that order.
    pub fn for_machine(spec: &MachineSpec) -> Self {
        let mut interfaces = Vec::new();
        if let Some(ip) = spec.private_ip {
            interfaces.push(NetworkInterface::PrivateStatic { ip });
        }
        if spec.public_network {
            interfaces.push(NetworkInterface::PublicBridged { bridge: None });
        }
        if !spec.forwarded_ports.is_empty() {
            interfaces.push(NetworkInterface::NatForwarded {
                forwards: spec.forwarded_ports.clone(),
            });
        }
        NetworkAttachment { interfaces }
    }
}

/// Machine state as reported by the control surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineState {
    NotCreated,
    Running,
    Stopped,
    Unknown,
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MachineState::NotCreated => write!(f, "not created"),
            MachineState::Running => write!(f, "running"),
            MachineState::Stopped => write!(f, "stopped"),
            MachineState::Unknown => write!(f, "unknown"),
        }
    }
}

/// Control-surface errors
#[derive(Debug, thiserror::Error)]
pub enum HypervisorError {
    #[error("base image '{0}' not found")]
    ImageNotFound(String),
    #[error("cannot bind network interface: {0}")]
    NetworkBind(String),
    #[error("step exited with status {status}")]
    StepFailed { status: i32 },
    #[error("control program '{program}' failed: {detail}")]
    Control { program: String, detail: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
