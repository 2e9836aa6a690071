//! Image build pipeline.
//!
//! [`Orchestrator::run`] drives one build from a fresh base image:
//!
//! ```text
//! unmount (if mounted) → renew → unmount → expand → mount
//!     → repository steps
//!     → [build-all] install steps → unmount → convert
//!     → report
//! ```
//!
//! Every step is guarded: the first failure aborts the rest of the run.
//! Nothing is retried and nothing runs concurrently, since all steps
//! mutate the same image.

use crate::component::{CommandScript, ImageStep};
use crate::config::BuildConfig;
use crate::convert::ImageConverter;
use crate::error::{BuildError, Transition};
use crate::mode::RunMode;
use crate::sysroot::{Sysroot, QCOW_IMAGE_KEY};
use anyhow::{anyhow, Context};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub mode: RunMode,
    /// The flashable image. Only produced by [`RunMode::BuildAll`].
    pub artifact: Option<PathBuf>,
    pub elapsed: Duration,
}

impl BuildResult {
    /// One-line report for the operator.
    pub fn summary(&self) -> String {
        let secs = self.elapsed.as_secs_f64();
        match &self.artifact {
            Some(path) => format!(
                "Process finished in {:.1} secs - image ready at {}",
                secs,
                path.display()
            ),
            None => format!(
                "Process finished in {:.1} secs - image mounted, ready for manual installation",
                secs
            ),
        }
    }
}

pub struct Orchestrator<S, C> {
    config: BuildConfig,
    sysroot: S,
    converter: C,
    output_dir: PathBuf,
}

impl<S: Sysroot, C: ImageConverter> Orchestrator<S, C> {
    /// Artifacts land in the current working directory unless
    /// [`with_output_dir`](Self::with_output_dir) says otherwise.
    pub fn new(config: BuildConfig, sysroot: S, converter: C) -> Self {
        Self {
            config,
            sysroot,
            converter,
            output_dir: PathBuf::from("."),
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn sysroot(&self) -> &S {
        &self.sysroot
    }

    /// Versioned path of the flashable image.
    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(self.config.artifact_file_name())
    }

    /// Run the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first failure. After a failed final unmount the image
    /// is left mounted as-is and [`BuildError::Busy`] is returned.
    pub fn run(&mut self, mode: RunMode) -> Result<BuildResult, BuildError> {
        let started = Instant::now();
        info!(
            "[build:{}] starting {} run",
            self.sysroot.profile(),
            mode
        );

        self.ensure_unmounted()?;
        self.transition(Transition::Renew)?;
        // renew leaves the image mounted; expand needs it unmounted
        self.transition(Transition::Unmount)?;
        self.transition(Transition::Expand)?;
        self.transition(Transition::Mount)?;

        let script = CommandScript::for_mode(&self.config, mode);
        self.run_script(&script)?;

        let artifact = match mode {
            RunMode::PrepareOnly => None,
            RunMode::BuildAll => {
                self.final_unmount()?;
                Some(self.convert()?)
            }
        };

        Ok(BuildResult {
            mode,
            artifact,
            elapsed: started.elapsed(),
        })
    }

    /// Clear a mount left over from an earlier run.
    fn ensure_unmounted(&mut self) -> Result<(), BuildError> {
        let mounted = self
            .sysroot
            .is_mounted()
            .map_err(|cause| BuildError::Lifecycle {
                transition: Transition::Unmount,
                cause: cause.context("checking mount state"),
            })?;
        if mounted {
            info!("Image is still mounted from a previous run, unmounting");
            self.transition(Transition::Unmount)?;
        }
        Ok(())
    }

    fn transition(&mut self, transition: Transition) -> Result<(), BuildError> {
        let result = match transition {
            Transition::Unmount => self.sysroot.unmount(),
            Transition::Renew => self.sysroot.renew(),
            Transition::Expand => self.sysroot.expand(),
            Transition::Mount => self.sysroot.mount(),
        };
        result.map_err(|cause| BuildError::Lifecycle { transition, cause })
    }

    fn run_script(&mut self, script: &CommandScript) -> Result<(), BuildError> {
        for step in script.steps() {
            self.run_step(step)?;
        }
        Ok(())
    }

    fn run_step(&mut self, step: &ImageStep) -> Result<(), BuildError> {
        let command_line = step.command_line();
        info!("[{}] {}", step.phase, step.description);

        let failure = match self.sysroot.execute(&command_line) {
            Ok(0) => return Ok(()),
            Ok(code) => anyhow!("'{}' exited with code {}", command_line, code),
            Err(cause) => cause,
        };

        if step.allow_fail {
            warn!("[{}] {} failed, continuing: {:#}", step.phase, step.description, failure);
            return Ok(());
        }
        Err(BuildError::Command {
            step: step.description.clone(),
            cause: failure,
        })
    }

    fn final_unmount(&mut self) -> Result<(), BuildError> {
        // Forcing the unmount could corrupt the image; leave it for inspection.
        self.sysroot
            .unmount()
            .map_err(|cause| BuildError::Busy { cause })
    }

    fn convert(&mut self) -> Result<PathBuf, BuildError> {
        let source = self
            .sysroot
            .query(QCOW_IMAGE_KEY)
            .context("querying backing image path")
            .map_err(BuildError::conversion)?;
        let source = PathBuf::from(source.trim());
        if source.as_os_str().is_empty() {
            return Err(BuildError::conversion(anyhow!(
                "sysroot reported an empty backing image path"
            )));
        }

        let artifact = self.artifact_path();
        info!("Converting image {}...", source.display());
        remove_if_exists(&artifact)
            .context("removing stale artifact")
            .map_err(BuildError::conversion)?;

        if let Err(cause) = self.converter.convert(&source, &artifact) {
            if let Err(cleanup) = remove_if_exists(&artifact) {
                warn!("could not remove partial artifact: {:#}", cleanup);
            }
            return Err(BuildError::conversion(cause));
        }

        if !artifact.is_file() {
            return Err(BuildError::conversion(anyhow!(
                "converter finished but artifact is missing: {}",
                artifact.display()
            )));
        }
        Ok(artifact)
    }
}

fn remove_if_exists(path: &Path) -> anyhow::Result<()> {
    if path.is_file() {
        fs::remove_file(path).with_context(|| format!("removing '{}'", path.display()))?;
    }
    Ok(())
}
