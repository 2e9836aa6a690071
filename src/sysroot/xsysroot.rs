//! [`Sysroot`] backed by the `xsysroot` command line tool.

use super::{Sysroot, QCOW_IMAGE_KEY};
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tracing::{debug, info};

pub const XSYSROOT_BIN: &str = "xsysroot";

const IS_MOUNTED: &str = "--is-mounted";
const UMOUNT: &str = "--umount";
const RENEW: &str = "--renew";
const EXPAND: &str = "--expand";
const MOUNT: &str = "--mount";
const EXECUTE: &str = "--execute";
const QUERY: &str = "--query";

/// Handle on one xsysroot profile.
#[derive(Debug, Clone)]
pub struct Xsysroot {
    program: PathBuf,
    profile: String,
}

impl Xsysroot {
    /// Find `xsysroot` in PATH and bind it to `profile`.
    ///
    /// # Errors
    ///
    /// Fails if the tool is not installed or the profile is not
    /// configured in `xsysroot.conf`.
    pub fn resolve(profile: &str) -> Result<Self> {
        let program = which::which(XSYSROOT_BIN).with_context(|| {
            format!(
                "could not find {XSYSROOT_BIN} tool in PATH\n\
                 Please install from https://github.com/skarbat/xsysroot"
            )
        })?;
        info!("{XSYSROOT_BIN} found at: {}", program.display());
        Self::with_program(program, profile)
    }

    /// Bind an explicit xsysroot executable to `profile`.
    pub fn with_program(program: impl Into<PathBuf>, profile: &str) -> Result<Self> {
        let sysroot = Self {
            program: program.into(),
            profile: profile.to_string(),
        };
        sysroot.check_profile().with_context(|| {
            format!(
                "xsysroot profile '{profile}' is not usable; \
                 create it in xsysroot.conf (see the README)"
            )
        })?;
        Ok(sysroot)
    }

    fn check_profile(&self) -> Result<()> {
        self.query_value(QCOW_IMAGE_KEY).map(|_| ())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["--profile", &self.profile]);
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(
            "[sysroot:{}] {} {}",
            self.profile,
            self.program.display(),
            args.join(" ")
        );
        self.command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("running {} {}", self.program.display(), args.join(" ")))
    }

    /// Run a lifecycle flag, inheriting stdout so progress stays visible.
    fn transition(&self, flag: &str) -> Result<()> {
        info!("[sysroot:{}] {}", self.profile, flag.trim_start_matches('-'));
        let status = self
            .command()
            .arg(flag)
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("running {} {}", self.program.display(), flag))?;
        if !status.success() {
            bail!(
                "{XSYSROOT_BIN} {} failed for profile '{}' with status {}",
                flag,
                self.profile,
                status
            );
        }
        Ok(())
    }

    fn query_value(&self, key: &str) -> Result<String> {
        let output = self.output(&[QUERY, key])?;
        if !output.status.success() {
            bail!(
                "{XSYSROOT_BIN} {QUERY} {} failed for profile '{}' with status {}: {}",
                key,
                self.profile,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if value.is_empty() {
            bail!(
                "{XSYSROOT_BIN} returned no value for '{}' in profile '{}'",
                key,
                self.profile
            );
        }
        Ok(value)
    }
}

impl Sysroot for Xsysroot {
    fn profile(&self) -> &str {
        &self.profile
    }

    /// Exit 0 means mounted and 1 means not mounted. Anything else is
    /// an xsysroot failure, so the mount state is unknown.
    fn is_mounted(&mut self) -> Result<bool> {
        let output = self.output(&[IS_MOUNTED])?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => bail!(
                "{XSYSROOT_BIN} {IS_MOUNTED} failed for profile '{}' with status {}: {}",
                self.profile,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        }
    }

    fn unmount(&mut self) -> Result<()> {
        self.transition(UMOUNT)
    }

    fn renew(&mut self) -> Result<()> {
        self.transition(RENEW)
    }

    fn expand(&mut self) -> Result<()> {
        self.transition(EXPAND)
    }

    fn mount(&mut self) -> Result<()> {
        self.transition(MOUNT)
    }

    fn execute(&mut self, command_line: &str) -> Result<i32> {
        let status = self
            .command()
            .args([EXECUTE, command_line])
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("running {XSYSROOT_BIN} {EXECUTE} '{command_line}'"))?;
        // Killed by a signal: report like a shell would.
        Ok(status.code().unwrap_or(128))
    }

    fn query(&mut self, key: &str) -> Result<String> {
        self.query_value(key)
    }
}
