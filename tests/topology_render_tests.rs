#[cfg(test)]
mod topology_render_tests {
    use std::collections::{HashMap, HashSet};
    use std::io::Write;
    use std::path::Path;
    use tempfile::NamedTempFile;

    use multivm::config::{ConfigError, PortForward};
    use multivm::error::RenderError;
    use multivm::hypervisor::{
        CreateMachineRequest, Hypervisor, HypervisorError, MachineState, NetworkAttachment,
        NetworkInterface,
    };
    use multivm::provision::ShellInvocation;
    use multivm::{loader, renderer};

    /// Control-surface double that records every call and fails on cue.
    #[derive(Default)]
    struct RecordingHypervisor {
        created: Vec<String>,
        attached: Vec<(String, NetworkAttachment)>,
        steps: Vec<(String, usize, ShellInvocation)>,
        step_counts: HashMap<String, usize>,
        missing_images: HashSet<String>,
        deny_bridge: bool,
        fail_step: Option<(String, usize)>,
    }

    impl Hypervisor for RecordingHypervisor {
        fn create_machine(
            &mut self,
            request: &CreateMachineRequest,
        ) -> Result<(), HypervisorError> {
            let image = request.image.to_string();
            if self.missing_images.contains(&image) {
                return Err(HypervisorError::ImageNotFound(image));
            }
            self.created.push(request.name.clone());
            Ok(())
        }

        fn attach_network(
            &mut self,
            machine: &str,
            attachment: &NetworkAttachment,
        ) -> Result<(), HypervisorError> {
            if self.deny_bridge
                && attachment
                    .interfaces
                    .iter()
                    .any(|i| matches!(i, NetworkInterface::PublicBridged { .. }))
            {
                return Err(HypervisorError::NetworkBind(
                    "no matching host bridge".to_string(),
                ));
            }
            self.attached
                .push((machine.to_string(), attachment.clone()));
            Ok(())
        }

        fn run_step(
            &mut self,
            machine: &str,
            step_index: usize,
            invocation: &ShellInvocation,
        ) -> Result<(), HypervisorError> {
            self.steps
                .push((machine.to_string(), step_index, invocation.clone()));
            if self.fail_step.as_ref() == Some(&(machine.to_string(), step_index)) {
                return Err(HypervisorError::StepFailed { status: 1 });
            }
            *self.step_counts.entry(machine.to_string()).or_insert(0) += 1;
            Ok(())
        }

        fn state(&self, machine: &str) -> Result<MachineState, HypervisorError> {
            if self.created.iter().any(|m| m == machine) {
                Ok(MachineState::Running)
            } else {
                Ok(MachineState::NotCreated)
            }
        }

        fn destroy(&mut self, machine: &str) -> Result<(), HypervisorError> {
            self.created.retain(|m| m != machine);
            Ok(())
        }
    }

    fn write_topology(yaml: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();
        temp_file
    }

    const THREE_MACHINES: &str = r#"
settings:
  private_subnet: "192.168.56.0/24"

machines:
  - name: web01
    image: ubuntu/jammy64
    private_ip: 192.168.56.41
    provision:
      - shell: "echo web ready"
  - name: web02
    image: ubuntu/jammy64
    private_ip: 192.168.56.42
    provision:
      - shell: "echo web ready"
  - name: db01
    image: ubuntu/jammy64
    private_ip: 192.168.56.43
    provision:
      - shell: "echo preparing"
      - shell: "exit 1"
      - shell: "echo never reached"
"#;

    /// Unique names and IPs load; rendering issues exactly one
    /// create/attach/provision sequence per machine, in declared order.
    #[test]
    fn test_render_issues_one_sequence_per_machine() {
        let temp_file = write_topology(THREE_MACHINES);
        let topology = loader::load_topology(temp_file.path()).unwrap();

        let mut hv = RecordingHypervisor::default();
        let report =
            renderer::render_topology(&topology, Path::new("."), &mut hv, None).unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(hv.created, vec!["web01", "web02", "db01"]);
        assert_eq!(hv.attached.len(), 3);

        // Step order within a machine is the declared order
        let db01_steps: Vec<usize> = hv
            .steps
            .iter()
            .filter(|(m, _, _)| m == "db01")
            .map(|(_, i, _)| *i)
            .collect();
        assert_eq!(db01_steps, vec![0, 1, 2]);
    }

    /// Failing db01's provisioning still leaves web01 and web02 rendered,
    /// and the report names db01 and the failing step index.
    #[test]
    fn test_failed_machine_does_not_abort_others() {
        let temp_file = write_topology(THREE_MACHINES);
        let topology = loader::load_topology(temp_file.path()).unwrap();

        let mut hv = RecordingHypervisor {
            fail_step: Some(("db01".to_string(), 1)),
            ..Default::default()
        };
        let report =
            renderer::render_topology(&topology, Path::new("."), &mut hv, None).unwrap();

        assert!(!report.is_success());
        let succeeded: Vec<&str> = report.succeeded().collect();
        assert_eq!(succeeded, vec!["web01", "web02"]);

        let failures: Vec<&RenderError> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        match failures[0] {
            RenderError::Provision {
                machine,
                step,
                status,
            } => {
                assert_eq!(machine, "db01");
                assert_eq!(*step, 1);
                assert_eq!(*status, 1);
            }
            other => panic!("expected Provision error, got {:?}", other),
        }

        // Fail-fast within db01: step 2 was never attempted
        assert!(!hv.steps.iter().any(|(m, i, _)| m == "db01" && *i == 2));
    }

    /// Duplicate machine names fail at load with ConfigError, before any
    /// hypervisor call is made.
    #[test]
    fn test_duplicate_name_fails_before_side_effects() {
        let temp_file = write_topology(
            r#"
machines:
  - name: web
    image: ubuntu/jammy64
  - name: web
    image: ubuntu/jammy64
"#,
        );

        let result = loader::load_topology(temp_file.path());
        assert!(matches!(result, Err(ConfigError::DuplicateName(name)) if name == "web"));
    }

    #[test]
    fn test_duplicate_ip_fails_before_side_effects() {
        let temp_file = write_topology(
            r#"
machines:
  - name: web01
    image: ubuntu/jammy64
    private_ip: 192.168.56.41
  - name: web02
    image: ubuntu/jammy64
    private_ip: 192.168.56.41
"#,
        );

        assert!(matches!(
            loader::load_topology(temp_file.path()),
            Err(ConfigError::DuplicateIp { .. })
        ));
    }

    /// A forwarded port pair is passed through to the attach call unchanged.
    #[test]
    fn test_forwarded_ports_reach_attach_unchanged() {
        let temp_file = write_topology(
            r#"
machines:
  - name: web01
    image: ubuntu/jammy64
    forwarded_ports:
      - { guest: 80, host: 8080 }
"#,
        );
        let topology = loader::load_topology(temp_file.path()).unwrap();

        let mut hv = RecordingHypervisor::default();
        renderer::render_topology(&topology, Path::new("."), &mut hv, None).unwrap();

        let (_, attachment) = &hv.attached[0];
        match &attachment.interfaces[0] {
            NetworkInterface::NatForwarded { forwards } => {
                assert_eq!(
                    forwards,
                    &vec![PortForward {
                        guest: 80,
                        host: 8080
                    }]
                );
            }
            other => panic!("expected NatForwarded, got {:?}", other),
        }
    }

    /// Re-rendering the same topology replays the same step sequence; the
    /// renderer itself adds no retries and no skips.
    #[test]
    fn test_rerender_replays_steps() {
        let temp_file = write_topology(THREE_MACHINES);
        let topology = loader::load_topology(temp_file.path()).unwrap();

        let mut hv = RecordingHypervisor::default();
        renderer::render_topology(&topology, Path::new("."), &mut hv, None).unwrap();
        renderer::render_topology(&topology, Path::new("."), &mut hv, None).unwrap();

        assert_eq!(hv.step_counts.get("web01"), Some(&2));
        assert_eq!(hv.step_counts.get("web02"), Some(&2));
        assert_eq!(hv.created.len(), 6);
    }

    /// A missing base image fails that machine with ImageNotFound; nothing
    /// further happens for it and other machines continue.
    #[test]
    fn test_image_not_found_isolated_to_machine() {
        let temp_file = write_topology(
            r#"
machines:
  - name: web01
    image: ubuntu/jammy64
    provision:
      - shell: "echo ready"
  - name: db01
    image: ghost/image
    provision:
      - shell: "echo ready"
"#,
        );
        let topology = loader::load_topology(temp_file.path()).unwrap();

        let mut hv = RecordingHypervisor {
            missing_images: HashSet::from(["ghost/image".to_string()]),
            ..Default::default()
        };
        let report =
            renderer::render_topology(&topology, Path::new("."), &mut hv, None).unwrap();

        let failures: Vec<&RenderError> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        match failures[0] {
            RenderError::ImageNotFound { machine, image } => {
                assert_eq!(machine, "db01");
                assert_eq!(image, "ghost/image");
            }
            other => panic!("expected ImageNotFound, got {:?}", other),
        }

        assert_eq!(hv.created, vec!["web01"]);
        assert!(!hv.steps.iter().any(|(m, _, _)| m == "db01"));
    }

    /// A network bind failure stops that machine before provisioning.
    #[test]
    fn test_network_bind_failure_blocks_provisioning() {
        let temp_file = write_topology(
            r#"
machines:
  - name: edge01
    image: ubuntu/jammy64
    public_network: true
    provision:
      - shell: "echo ready"
"#,
        );
        let topology = loader::load_topology(temp_file.path()).unwrap();

        let mut hv = RecordingHypervisor {
            deny_bridge: true,
            ..Default::default()
        };
        let report =
            renderer::render_topology(&topology, Path::new("."), &mut hv, None).unwrap();

        let failures: Vec<&RenderError> = report.failures().collect();
        assert!(
            matches!(failures[0], RenderError::NetworkBind { machine, .. } if machine == "edge01")
        );
        assert!(hv.steps.is_empty());
    }

    /// Per-machine targeting renders only the named machine; an unknown name
    /// is a ConfigError issued before any hypervisor call.
    #[test]
    fn test_single_machine_targeting() {
        let temp_file = write_topology(THREE_MACHINES);
        let topology = loader::load_topology(temp_file.path()).unwrap();

        let mut hv = RecordingHypervisor::default();
        let report =
            renderer::render_topology(&topology, Path::new("."), &mut hv, Some("web02")).unwrap();
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(hv.created, vec!["web02"]);

        let mut hv = RecordingHypervisor::default();
        let result = renderer::render_topology(&topology, Path::new("."), &mut hv, Some("web99"));
        assert!(matches!(result, Err(ConfigError::UnknownMachine(_))));
        assert!(hv.created.is_empty());
    }

    /// Destroy walks the topology with the same continue-on-error model.
    #[test]
    fn test_destroy_topology() {
        let temp_file = write_topology(THREE_MACHINES);
        let topology = loader::load_topology(temp_file.path()).unwrap();

        let mut hv = RecordingHypervisor::default();
        renderer::render_topology(&topology, Path::new("."), &mut hv, None).unwrap();
        assert_eq!(hv.created.len(), 3);

        let report = renderer::destroy_topology(&topology, &mut hv, None).unwrap();
        assert!(report.is_success());
        assert!(hv.created.is_empty());
    }
}
