//! The ordered in-image script for a run.

use super::{AptFlag, ImageStep, Op, Phase};
use crate::config::BuildConfig;
use crate::mode::RunMode;

/// Ordered steps executed once the image is mounted.
///
/// Later steps depend on earlier ones (package installs need the
/// repository registered), so the order is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandScript {
    steps: Vec<ImageStep>,
}

impl CommandScript {
    /// Build the script for a run mode.
    ///
    /// Repository registration runs in every mode; installation steps
    /// are only added for [`RunMode::BuildAll`].
    pub fn for_mode(config: &BuildConfig, mode: RunMode) -> Self {
        let mut steps = repository_steps(config);
        if mode.installs_software() {
            steps.extend(installation_steps(config));
        }
        Self { steps }
    }

    pub fn steps(&self) -> &[ImageStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Distinct phases in execution order.
    pub fn phases(&self) -> Vec<Phase> {
        let mut phases: Vec<Phase> = Vec::new();
        for step in &self.steps {
            if phases.last() != Some(&step.phase) {
                phases.push(step.phase);
            }
        }
        phases
    }
}

fn repository_steps(config: &BuildConfig) -> Vec<ImageStep> {
    let repo = &config.repository;
    let key_path = config.key_download_path();
    vec![
        ImageStep::new(
            Phase::Repository,
            "Register package repository",
            Op::WriteFile {
                path: repo.list_file.clone(),
                content: repo.source_line.clone(),
            },
        ),
        ImageStep::new(
            Phase::Repository,
            "Download repository signing key",
            Op::Fetch {
                url: repo.key_url.clone(),
                dest: key_path.clone(),
            },
        ),
        ImageStep::new(
            Phase::Repository,
            "Import repository signing key",
            Op::ImportKey(key_path),
        ),
        ImageStep::new(
            Phase::Repository,
            "Refresh package index",
            Op::RefreshIndex,
        ),
    ]
}

fn installation_steps(config: &BuildConfig) -> Vec<ImageStep> {
    let packages = &config.packages;
    let mut steps = vec![
        ImageStep::new(
            Phase::Firmware,
            "Install GPU libraries and firmware",
            Op::AptInstall {
                packages: packages.hardware.clone(),
                flags: vec![AptFlag::ForceYes, AptFlag::NoInstallRecommends],
            },
        ),
        ImageStep::new(
            Phase::Permissions,
            format!(
                "Grant group '{}' access to {}",
                config.device_access.group, config.device_access.subsystem
            ),
            Op::WriteFile {
                path: config.device_access.rule_file.clone(),
                content: config.device_rule(),
            },
        ),
        // Packages may re-stage files shipped by the firmware packages.
        ImageStep::new(
            Phase::Packages,
            "Install application packages",
            Op::AptInstall {
                packages: packages.application.clone(),
                flags: vec![AptFlag::ForceOverwrite],
            },
        ),
    ];

    for service in &packages.stop_services {
        steps.push(
            ImageStep::new(
                Phase::Services,
                format!("Stop service '{service}'"),
                Op::StopService(service.clone()),
            )
            .allow_fail(),
        );
    }

    if !packages.pip.is_empty() {
        steps.push(ImageStep::new(
            Phase::Runtime,
            "Install pip packages",
            Op::PipInstall(packages.pip.clone()),
        ));
    }

    steps.push(ImageStep::new(
        Phase::Linker,
        format!("Refresh library cache for {}", config.linker.library_path),
        Op::Ldconfig(config.linker.library_path.clone()),
    ));

    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::minimal;

    #[test]
    fn test_prepare_only_registers_repository_only() {
        let script = CommandScript::for_mode(&minimal(), RunMode::PrepareOnly);
        assert_eq!(script.len(), 4);
        assert_eq!(script.phases(), vec![Phase::Repository]);

        let commands: Vec<String> = script.steps().iter().map(|s| s.command_line()).collect();
        assert!(commands[0].contains("/etc/apt/sources.list.d/test.list"));
        assert_eq!(
            commands[1],
            "wget -O /tmp/key.gpg http://example.invalid/key.gpg"
        );
        assert_eq!(commands[2], "apt-key add /tmp/key.gpg");
        assert_eq!(commands[3], "apt-get update");
    }

    #[test]
    fn test_build_all_order() {
        let script = CommandScript::for_mode(&minimal(), RunMode::BuildAll);
        assert_eq!(
            script.phases(),
            vec![
                Phase::Repository,
                Phase::Firmware,
                Phase::Permissions,
                Phase::Packages,
                Phase::Linker,
            ]
        );
        assert_eq!(
            script.steps().last().unwrap().command_line(),
            "ldconfig /opt/lib"
        );
    }

    #[test]
    fn test_application_install_forces_overwrite() {
        let script = CommandScript::for_mode(&minimal(), RunMode::BuildAll);
        let install = script
            .steps()
            .iter()
            .find(|s| s.phase == Phase::Packages)
            .unwrap();
        assert_eq!(
            install.command_line(),
            "apt-get install -y -o Dpkg::Options::=--force-overwrite app-a app-b"
        );
    }

    #[test]
    fn test_only_hardware_install_allows_unauthenticated_packages() {
        let script = CommandScript::for_mode(&minimal(), RunMode::BuildAll);
        let forced: Vec<Phase> = script
            .steps()
            .iter()
            .filter(|s| s.command_line().contains("--force-yes"))
            .map(|s| s.phase)
            .collect();
        assert_eq!(forced, vec![Phase::Firmware]);
    }

    #[test]
    fn test_pip_step_only_when_list_non_empty() {
        let mut config = minimal();
        let script = CommandScript::for_mode(&config, RunMode::BuildAll);
        assert!(!script.phases().contains(&Phase::Runtime));

        config.packages.pip = vec!["requests".into()];
        let script = CommandScript::for_mode(&config, RunMode::BuildAll);
        let pip: Vec<_> = script
            .steps()
            .iter()
            .filter(|s| s.phase == Phase::Runtime)
            .collect();
        assert_eq!(pip.len(), 1);
        assert_eq!(pip[0].command_line(), "pip install requests");
        // pip runs before the library cache refresh
        assert_eq!(script.steps().last().unwrap().phase, Phase::Linker);
    }

    #[test]
    fn test_stopping_services_tolerates_failure() {
        let mut config = minimal();
        config.packages.stop_services = vec!["ssh".into()];
        let script = CommandScript::for_mode(&config, RunMode::BuildAll);
        let stops: Vec<_> = script
            .steps()
            .iter()
            .filter(|s| s.phase == Phase::Services)
            .collect();
        assert_eq!(stops.len(), 1);
        assert!(stops[0].allow_fail);
        assert_eq!(stops[0].command_line(), "/etc/init.d/ssh stop");
        assert!(script
            .steps()
            .iter()
            .filter(|s| s.phase != Phase::Services)
            .all(|s| !s.allow_fail));
    }

    #[test]
    fn test_builtin_script_writes_device_rule() {
        let config = BuildConfig::builtin().unwrap();
        let script = CommandScript::for_mode(&config, RunMode::BuildAll);
        let rule = script
            .steps()
            .iter()
            .find(|s| s.phase == Phase::Permissions)
            .unwrap();
        assert_eq!(
            rule.op,
            Op::WriteFile {
                path: "/etc/udev/rules.d/10-vchiq-permissions.rules".into(),
                content: r#"SUBSYSTEM=="vchiq",GROUP="adm",MODE="0660""#.into(),
            }
        );
    }
}
