//! Declarative steps run inside the mounted image.
//!
//! Steps describe WHAT has to happen (write this file, install these
//! packages); [`Op::command_line`] turns each one into the shell command
//! the sysroot executes. Keeping the list as data means the full script
//! for a run can be inspected and tested without touching an image.
//!
//! # Example
//!
//! ```rust
//! use kanux_image::component::{ImageStep, Op, Phase};
//!
//! let step = ImageStep::new(Phase::Repository, "Refresh package index", Op::RefreshIndex);
//! assert_eq!(step.op.command_line(), "apt-get update");
//! ```

pub mod script;

pub use script::CommandScript;

use std::fmt;

/// Phases of in-image work, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Phase {
    /// Package repository registration.
    Repository = 1,
    /// GPU libraries and firmware.
    Firmware = 2,
    /// Device access rules.
    Permissions = 3,
    /// Application packages.
    Packages = 4,
    /// Services left running by installation.
    Services = 5,
    /// Language-runtime packages.
    Runtime = 6,
    /// Shared-library cache.
    Linker = 7,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Repository => write!(f, "Repository"),
            Phase::Firmware => write!(f, "Firmware"),
            Phase::Permissions => write!(f, "Permissions"),
            Phase::Packages => write!(f, "Packages"),
            Phase::Services => write!(f, "Services"),
            Phase::Runtime => write!(f, "Runtime"),
            Phase::Linker => write!(f, "Linker"),
        }
    }
}

/// Extra `apt-get install` behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AptFlag {
    NoInstallRecommends,
    /// Let dpkg replace files already owned by another package.
    ForceOverwrite,
    ForceYes,
}

impl AptFlag {
    fn as_arg(self) -> &'static str {
        match self {
            AptFlag::NoInstallRecommends => "--no-install-recommends",
            AptFlag::ForceOverwrite => "-o Dpkg::Options::=--force-overwrite",
            AptFlag::ForceYes => "--force-yes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Overwrite a file with a single line of content.
    WriteFile { path: String, content: String },

    /// Download a URL to a path.
    Fetch { url: String, dest: String },

    /// Trust an apt signing key file.
    ImportKey(String),

    RefreshIndex,

    AptInstall {
        packages: Vec<String>,
        flags: Vec<AptFlag>,
    },

    /// Stop a SysV init service.
    StopService(String),

    PipInstall(Vec<String>),

    /// Refresh the shared-library cache for a directory.
    Ldconfig(String),
}

impl Op {
    /// Render the shell command executed inside the image.
    pub fn command_line(&self) -> String {
        match self {
            Op::WriteFile { path, content } => {
                let inner = format!(
                    "printf '%s\\n' {} > {}",
                    shell_quote(content),
                    shell_quote(path)
                );
                format!("/bin/sh -c {}", shell_quote(&inner))
            }
            Op::Fetch { url, dest } => {
                format!("wget -O {} {}", shell_quote(dest), shell_quote(url))
            }
            Op::ImportKey(path) => format!("apt-key add {}", shell_quote(path)),
            Op::RefreshIndex => "apt-get update".to_string(),
            Op::AptInstall { packages, flags } => {
                let mut cmd = String::from("apt-get install -y");
                for flag in flags {
                    cmd.push(' ');
                    cmd.push_str(flag.as_arg());
                }
                push_words(&mut cmd, packages);
                cmd
            }
            Op::StopService(name) => format!("/etc/init.d/{} stop", shell_quote(name)),
            Op::PipInstall(packages) => {
                let mut cmd = String::from("pip install");
                push_words(&mut cmd, packages);
                cmd
            }
            Op::Ldconfig(path) => format!("ldconfig {}", shell_quote(path)),
        }
    }
}

fn push_words(cmd: &mut String, words: &[String]) {
    for word in words {
        cmd.push(' ');
        cmd.push_str(&shell_quote(word));
    }
}

/// Quote a word for a POSIX shell. Plain words pass through untouched.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+@%,".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// One described operation in the in-image script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageStep {
    pub phase: Phase,
    pub description: String,
    pub op: Op,
    /// A non-zero exit is logged and the script continues.
    pub allow_fail: bool,
}

impl ImageStep {
    pub fn new(phase: Phase, description: impl Into<String>, op: Op) -> Self {
        Self {
            phase,
            description: description.into(),
            op,
            allow_fail: false,
        }
    }

    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    pub fn command_line(&self) -> String {
        self.op.command_line()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_phase_ordering() {
        assert!(Phase::Repository < Phase::Firmware);
        assert!(Phase::Firmware < Phase::Permissions);
        assert!(Phase::Packages < Phase::Services);
        assert!(Phase::Runtime < Phase::Linker);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::Repository.to_string(), "Repository");
        assert_eq!(Phase::Permissions.to_string(), "Permissions");
        assert_eq!(Phase::Linker.to_string(), "Linker");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("apt-get"), "apt-get");
        assert_eq!(shell_quote("/opt/vc/lib"), "/opt/vc/lib");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn test_write_file_command() {
        let op = Op::WriteFile {
            path: "/etc/udev/rules.d/10-vchiq.rules".into(),
            content: r#"SUBSYSTEM=="vchiq",GROUP="adm""#.into(),
        };
        assert_eq!(
            op.command_line(),
            r#"/bin/sh -c 'printf '\''%s\n'\'' '\''SUBSYSTEM=="vchiq",GROUP="adm"'\'' > /etc/udev/rules.d/10-vchiq.rules'"#
        );
    }

    #[test]
    fn test_apt_install_command() {
        let op = Op::AptInstall {
            packages: words(&["kdesk", "make-pong"]),
            flags: vec![AptFlag::ForceOverwrite],
        };
        assert_eq!(
            op.command_line(),
            "apt-get install -y -o Dpkg::Options::=--force-overwrite kdesk make-pong"
        );

        let firmware = Op::AptInstall {
            packages: words(&["linux-firmware"]),
            flags: vec![AptFlag::ForceYes, AptFlag::NoInstallRecommends],
        };
        assert_eq!(
            firmware.command_line(),
            "apt-get install -y --force-yes --no-install-recommends linux-firmware"
        );
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(
            Op::Fetch {
                url: "http://repo.kano.me/archive/repo.gpg.key".into(),
                dest: "/tmp/repo.gpg.key".into(),
            }
            .command_line(),
            "wget -O /tmp/repo.gpg.key http://repo.kano.me/archive/repo.gpg.key"
        );
        assert_eq!(
            Op::ImportKey("/tmp/repo.gpg.key".into()).command_line(),
            "apt-key add /tmp/repo.gpg.key"
        );
        assert_eq!(
            Op::StopService("ssh".into()).command_line(),
            "/etc/init.d/ssh stop"
        );
        assert_eq!(
            Op::PipInstall(words(&["docopt"])).command_line(),
            "pip install docopt"
        );
        assert_eq!(
            Op::Ldconfig("/opt/vc/lib".into()).command_line(),
            "ldconfig /opt/vc/lib"
        );
    }

    #[test]
    fn test_step_allow_fail_builder() {
        let step = ImageStep::new(Phase::Services, "Stop ssh", Op::StopService("ssh".into()));
        assert!(!step.allow_fail);
        assert!(step.allow_fail().allow_fail);
    }
}
