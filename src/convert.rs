//! Conversion of the sysroot's backing image into a flashable raw image.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::info;

/// Writes a flat disk image from a sysroot backing file.
pub trait ImageConverter {
    fn convert(&self, source: &Path, dest: &Path) -> Result<()>;
}

/// `qemu-img convert`, producing raw output.
#[derive(Debug, Clone)]
pub struct QemuImg {
    program: PathBuf,
}

impl Default for QemuImg {
    fn default() -> Self {
        Self {
            program: PathBuf::from("qemu-img"),
        }
    }
}

impl QemuImg {
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn command(&self, source: &Path, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["convert", "-O", "raw"]).arg(source).arg(dest);
        cmd
    }
}

impl ImageConverter for QemuImg {
    fn convert(&self, source: &Path, dest: &Path) -> Result<()> {
        info!("Converting image {} -> {}", source.display(), dest.display());
        let status = self
            .command(source, dest)
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("running {}", self.program.display()))?;

        if !status.success() {
            bail!(
                "{} convert '{}' -> '{}' failed with status {}",
                self.program.display(),
                source.display(),
                dest.display(),
                status
            );
        }
        Ok(())
    }
}
