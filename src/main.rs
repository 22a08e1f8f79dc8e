use clap::{Parser, Subcommand};
use color_eyre::Result;
use env_logger::Env;
use log::{error, info};
use std::path::PathBuf;

use multivm::hypervisor::{CommandHypervisor, PlanHypervisor};
use multivm::registry::{self, MachineRegistry};
use multivm::renderer::RenderReport;
use multivm::{loader, renderer};

/// Configuration utility for declarative multi-VM topologies
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the topology YAML file
    #[arg(short, long, default_value = "multivms.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create, network, and provision machines
    Up {
        /// Limit to one machine by name
        machine: Option<String>,

        /// Print the planned control invocations instead of executing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-run provisioning steps against existing machines
    Provision {
        /// Limit to one machine by name
        machine: Option<String>,
    },
    /// Query machine states from the hypervisor
    Status,
    /// Tear down machines
    Destroy {
        /// Limit to one machine by name
        machine: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Topology file: {:?}", args.config);

    let topology = loader::load_topology(&args.config)?;
    let topology_dir = loader::topology_dir(&args.config);

    match args.command {
        Command::Up { machine, dry_run } => {
            if dry_run {
                let mut plan = PlanHypervisor::new();
                renderer::render_topology(&topology, &topology_dir, &mut plan, machine.as_deref())?;
                for call in plan.calls() {
                    println!("{}", call);
                }
                return Ok(());
            }

            let mut driver = CommandHypervisor::new(&topology.provider);
            let report =
                renderer::render_topology(&topology, &topology_dir, &mut driver, machine.as_deref())?;

            // Record what was brought up, even on partial failure
            let state_dir = state_dir(&topology, &topology_dir);
            let machine_registry = MachineRegistry::from_report(&topology, &report);
            registry::write_registry(&machine_registry, &state_dir)?;

            finish(&report)
        }
        Command::Provision { machine } => {
            let mut driver = CommandHypervisor::new(&topology.provider);
            let report = renderer::provision_topology(
                &topology,
                &topology_dir,
                &mut driver,
                machine.as_deref(),
            )?;
            finish(&report)
        }
        Command::Status => {
            let driver = CommandHypervisor::new(&topology.provider);
            for (name, state) in renderer::topology_status(&topology, &driver) {
                println!("{:<24} {}", name, state);
            }
            Ok(())
        }
        Command::Destroy { machine } => {
            let mut driver = CommandHypervisor::new(&topology.provider);
            let report = renderer::destroy_topology(&topology, &mut driver, machine.as_deref())?;
            finish(&report)
        }
    }
}

fn state_dir(topology: &multivm::config::Topology, topology_dir: &std::path::Path) -> PathBuf {
    let dir = topology
        .settings
        .state_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(".multivm"));
    if dir.is_absolute() {
        dir
    } else {
        topology_dir.join(dir)
    }
}

/// Summarize the report; exit non-zero when any machine failed.
fn finish(report: &RenderReport) -> Result<()> {
    let failed = report.failures().count();
    if failed == 0 {
        info!(
            "All {} machine(s) completed successfully",
            report.outcomes.len()
        );
        Ok(())
    } else {
        error!(
            "{} of {} machine(s) failed",
            failed,
            report.outcomes.len()
        );
        std::process::exit(1);
    }
}
