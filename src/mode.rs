//! Run mode selection from the command line.

use crate::error::BuildError;
use std::fmt;

pub const PREPARE_ONLY_FLAG: &str = "--prepare-only";
pub const BUILD_ALL_FLAG: &str = "--build-all";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Renew, expand and mount the image with the repository registered,
    /// leaving software installation to the operator.
    PrepareOnly,
    /// Everything above, then install the software and convert the image.
    BuildAll,
}

pub fn usage() -> &'static str {
    "Usage:\n  build-image --prepare-only\n  build-image --build-all"
}

impl RunMode {
    /// Parse the positional arguments (program name already skipped).
    pub fn from_args(args: &[String]) -> Result<Self, BuildError> {
        match args {
            [flag] if flag == PREPARE_ONLY_FLAG => Ok(RunMode::PrepareOnly),
            [flag] if flag == BUILD_ALL_FLAG => Ok(RunMode::BuildAll),
            [] => Err(BuildError::Usage(format!(
                "please specify mode: {BUILD_ALL_FLAG} or {PREPARE_ONLY_FLAG}\n{}",
                usage()
            ))),
            _ => Err(BuildError::Usage(format!(
                "unrecognized option '{}', use one of {BUILD_ALL_FLAG} or {PREPARE_ONLY_FLAG}\n{}",
                args.join(" "),
                usage()
            ))),
        }
    }

    /// Whether this mode installs software and produces an artifact.
    pub fn installs_software(self) -> bool {
        matches!(self, RunMode::BuildAll)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::PrepareOnly => write!(f, "{PREPARE_ONLY_FLAG}"),
            RunMode::BuildAll => write!(f, "{BUILD_ALL_FLAG}"),
        }
    }
}
