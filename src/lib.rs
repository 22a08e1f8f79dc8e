//! # MultiVM - Configuration utility for declarative multi-VM topologies
//!
//! This library loads a declarative topology of virtual machines from a YAML
//! file, validates it, and renders the corresponding hypervisor invocations:
//! create a VM from a base image, attach its network interfaces, and run its
//! provisioning steps in order.
//!
//! ## Overview
//!
//! MultiVM does not manage VM lifecycles itself. The hypervisor is an
//! external collaborator reached through the [`hypervisor::Hypervisor`]
//! trait; this crate only constructs and issues the parameters. A failed
//! machine never aborts the rest of the topology: every machine gets its own
//! outcome in the [`renderer::RenderReport`].
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `config`: Type-safe topology structures and load-time validation
//! - `loader`: Topology file loading
//! - `provision`: Provisioning step resolution (inline shell or script file)
//! - `hypervisor`: Control-surface trait, parameter types, and drivers
//! - `renderer`: Ordered per-machine rendering with continue-on-error
//! - `registry`: Rendered-machine summary emission
//! - `error`: Render-time error kinds
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use multivm::hypervisor::PlanHypervisor;
//! use multivm::{loader, renderer};
//!
//! // Load and validate the topology
//! let topology = loader::load_topology(Path::new("multivms.yaml"))?;
//!
//! // Render against a recording driver (dry run)
//! let mut driver = PlanHypervisor::new();
//! let report = renderer::render_topology(&topology, Path::new("."), &mut driver, None)?;
//!
//! for outcome in &report.outcomes {
//!     println!("{}: {:?}", outcome.machine, outcome.result);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Topology Format
//!
//! Topologies use YAML format:
//!
//! ```yaml
//! provider:
//!   name: virtualbox
//!
//! settings:
//!   private_subnet: "192.168.56.0/24"
//!
//! machines:
//!   - name: web01
//!     image: ubuntu/jammy64
//!     memory_mb: 1024
//!     private_ip: 192.168.56.41
//!     forwarded_ports:
//!       - { guest: 80, host: 8080 }
//!     provision:
//!       - shell: |
//!           apt-get update
//!       - script: scripts/deploy.sh
//! ```
//!
//! ## Error Handling
//!
//! Load-time problems are reported as [`config::ConfigError`] before any
//! hypervisor call is made. Render-time failures carry the offending machine
//! name and step index as [`error::RenderError`]. The renderer never retries;
//! provisioning steps are assumed idempotent so the caller may safely
//! re-invoke the same render after fixing the cause.

pub mod config;
pub mod error;
pub mod hypervisor;
pub mod loader;
pub mod provision;
pub mod registry;
pub mod renderer;
