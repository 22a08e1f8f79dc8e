//! Control-program driver.
//!
//! Translates control-surface requests into invocations of the provider's
//! command-line tool (VBoxManage for the `virtualbox` provider). Argv
//! construction is kept in pure functions; execution is a thin wrapper
//! around `std::process::Command`.

use log::{debug, info};
use std::process::{Command, Output};

use crate::config::{BaseImage, PortForward, Provider};
use crate::provision::ShellInvocation;

use super::types::{
    CreateMachineRequest, HypervisorError, MachineState, NetworkAttachment, NetworkInterface,
};
use super::Hypervisor;

/// Driver that shells out to the provider's control program.
#[derive(Debug)]
pub struct CommandHypervisor {
    program: String,
    bridge: Option<String>,
    host_network: String,
}

impl CommandHypervisor {
    pub fn new(provider: &Provider) -> Self {
        CommandHypervisor {
            program: provider.control_program().to_string(),
            bridge: provider.bridge().map(|s| s.to_string()),
            host_network: provider.host_network().to_string(),
        }
    }

    fn control(&self, args: &[String]) -> Result<Output, HypervisorError> {
        debug!("Running control program: {} {:?}", self.program, args);
        let output = Command::new(&self.program).args(args).output()?;
        Ok(output)
    }

    /// Run a control invocation that must succeed.
    fn control_ok(&self, args: &[String]) -> Result<(), HypervisorError> {
        let output = self.control(args)?;
        if output.status.success() {
            Ok(())
        } else {
            Err(HypervisorError::Control {
                program: self.program.clone(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn vm_exists(&self, name: &str) -> Result<bool, HypervisorError> {
        let output = self.control(&show_vm_info_args(name))?;
        Ok(output.status.success())
    }
}

impl Hypervisor for CommandHypervisor {
    fn create_machine(&mut self, request: &CreateMachineRequest) -> Result<(), HypervisorError> {
        match &request.image {
            BaseImage::Name(image) => {
                if !self.vm_exists(image)? {
                    return Err(HypervisorError::ImageNotFound(image.clone()));
                }
                if self.vm_exists(&request.name)? {
                    info!("Machine '{}' already exists, reusing", request.name);
                } else {
                    self.control_ok(&clone_vm_args(image, &request.name))?;
                }
            }
            BaseImage::File { path } => {
                if !path.exists() {
                    return Err(HypervisorError::ImageNotFound(
                        path.to_string_lossy().to_string(),
                    ));
                }
                if self.vm_exists(&request.name)? {
                    info!("Machine '{}' already exists, reusing", request.name);
                } else {
                    self.control_ok(&import_image_args(
                        &path.to_string_lossy(),
                        &request.name,
                    ))?;
                }
            }
        }

        self.control_ok(&modify_sizing_args(
            &request.name,
            request.memory_mb,
            request.cpus,
        ))
    }

    fn attach_network(
        &mut self,
        machine: &str,
        attachment: &NetworkAttachment,
    ) -> Result<(), HypervisorError> {
        // nic1 stays NAT; extra interfaces start at nic2
        let mut nic = 2;
        for interface in &attachment.interfaces {
            match interface {
                NetworkInterface::PrivateStatic { ip } => {
                    self.control_ok(&host_only_nic_args(machine, nic, &self.host_network))
                        .map_err(bind_error)?;
                    self.control_ok(&guest_ip_property_args(machine, nic, &ip.to_string()))
                        .map_err(bind_error)?;
                    nic += 1;
                }
                NetworkInterface::PublicBridged { bridge } => {
                    let bridge = bridge
                        .as_deref()
                        .or(self.bridge.as_deref())
                        .ok_or_else(|| {
                            HypervisorError::NetworkBind(
                                "no host bridge interface configured".to_string(),
                            )
                        })?;
                    self.control_ok(&bridged_nic_args(machine, nic, bridge))
                        .map_err(bind_error)?;
                    nic += 1;
                }
                NetworkInterface::NatForwarded { forwards } => {
                    for (index, forward) in forwards.iter().enumerate() {
                        self.control_ok(&nat_forward_args(machine, index, forward))
                            .map_err(bind_error)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn run_step(
        &mut self,
        machine: &str,
        step_index: usize,
        invocation: &ShellInvocation,
    ) -> Result<(), HypervisorError> {
        info!("Machine '{}': running provision step {}", machine, step_index);
        let output = self.control(&run_step_args(machine, invocation))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(HypervisorError::StepFailed {
                status: output.status.code().unwrap_or(-1),
            })
        }
    }

    fn state(&self, machine: &str) -> Result<MachineState, HypervisorError> {
        let output = self.control(&machine_readable_info_args(machine))?;
        if !output.status.success() {
            return Ok(MachineState::NotCreated);
        }
        Ok(parse_vm_state(&String::from_utf8_lossy(&output.stdout)))
    }

    fn destroy(&mut self, machine: &str) -> Result<(), HypervisorError> {
        if !self.vm_exists(machine)? {
            info!("Machine '{}' does not exist, nothing to destroy", machine);
            return Ok(());
        }
        // Power off first; a machine that is already off makes this fail,
        // which is fine.
        let _ = self.control(&power_off_args(machine));
        self.control_ok(&unregister_args(machine))
    }
}

/// Control failures while attaching interfaces surface as bind errors
fn bind_error(error: HypervisorError) -> HypervisorError {
    match error {
        HypervisorError::Control { detail, .. } => HypervisorError::NetworkBind(detail),
        other => other,
    }
}

fn show_vm_info_args(name: &str) -> Vec<String> {
    vec!["showvminfo".to_string(), name.to_string()]
}

fn machine_readable_info_args(name: &str) -> Vec<String> {
    vec![
        "showvminfo".to_string(),
        name.to_string(),
        "--machinereadable".to_string(),
    ]
}

fn clone_vm_args(image: &str, name: &str) -> Vec<String> {
    vec![
        "clonevm".to_string(),
        image.to_string(),
        "--name".to_string(),
        name.to_string(),
        "--register".to_string(),
    ]
}

fn import_image_args(path: &str, name: &str) -> Vec<String> {
    vec![
        "import".to_string(),
        path.to_string(),
        "--vsys".to_string(),
        "0".to_string(),
        "--vmname".to_string(),
        name.to_string(),
    ]
}

fn modify_sizing_args(name: &str, memory_mb: u32, cpus: u32) -> Vec<String> {
    vec![
        "modifyvm".to_string(),
        name.to_string(),
        "--memory".to_string(),
        memory_mb.to_string(),
        "--cpus".to_string(),
        cpus.to_string(),
    ]
}

fn host_only_nic_args(name: &str, nic: u32, host_network: &str) -> Vec<String> {
    vec![
        "modifyvm".to_string(),
        name.to_string(),
        format!("--nic{}", nic),
        "hostonly".to_string(),
        format!("--hostonlyadapter{}", nic),
        host_network.to_string(),
    ]
}

fn guest_ip_property_args(name: &str, nic: u32, ip: &str) -> Vec<String> {
    vec![
        "guestproperty".to_string(),
        "set".to_string(),
        name.to_string(),
        format!("/VirtualBox/GuestInfo/Net/{}/V4/IP", nic - 1),
        ip.to_string(),
    ]
}

fn bridged_nic_args(name: &str, nic: u32, bridge: &str) -> Vec<String> {
    vec![
        "modifyvm".to_string(),
        name.to_string(),
        format!("--nic{}", nic),
        "bridged".to_string(),
        format!("--bridgeadapter{}", nic),
        bridge.to_string(),
    ]
}

fn nat_forward_args(name: &str, index: usize, forward: &PortForward) -> Vec<String> {
    vec![
        "modifyvm".to_string(),
        name.to_string(),
        "--natpf1".to_string(),
        format!("fwd{},tcp,,{},,{}", index, forward.host, forward.guest),
    ]
}

fn run_step_args(name: &str, invocation: &ShellInvocation) -> Vec<String> {
    let mut args = vec![
        "guestcontrol".to_string(),
        name.to_string(),
        "run".to_string(),
        "--exe".to_string(),
        invocation.program.clone(),
        "--".to_string(),
        invocation.program.clone(),
    ];
    args.extend(invocation.args.iter().cloned());
    args
}

fn power_off_args(name: &str) -> Vec<String> {
    vec![
        "controlvm".to_string(),
        name.to_string(),
        "poweroff".to_string(),
    ]
}

fn unregister_args(name: &str) -> Vec<String> {
    vec![
        "unregistervm".to_string(),
        name.to_string(),
        "--delete".to_string(),
    ]
}

/// Parse the VMState line out of `showvminfo --machinereadable` output
fn parse_vm_state(output: &str) -> MachineState {
    for line in output.lines() {
        if let Some(value) = line.strip_prefix("VMState=") {
            return match value.trim_matches('"') {
                "running" | "starting" => MachineState::Running,
                "poweroff" | "aborted" | "saved" | "paused" => MachineState::Stopped,
                _ => MachineState::Unknown,
            };
        }
    }
    MachineState::Unknown
}
