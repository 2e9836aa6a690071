//! Failure taxonomy for an image build.
//!
//! Every variant aborts the run. The process exit code stays `1` for all
//! of them; the variants exist so the operator can tell what went wrong
//! and so the busy-on-unmount case can be reported as a warning.

use std::fmt;
use thiserror::Error;

/// Lifecycle transitions driven on the sysroot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unmount,
    Renew,
    Expand,
    Mount,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Unmount => write!(f, "unmount"),
            Transition::Renew => write!(f, "renew"),
            Transition::Expand => write!(f, "expand"),
            Transition::Mount => write!(f, "mount"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("{0}")]
    Usage(String),

    #[error("{cause:#}")]
    Environment { cause: anyhow::Error },

    #[error("failed to {transition} image: {cause:#}")]
    Lifecycle {
        transition: Transition,
        cause: anyhow::Error,
    },

    #[error("in-image step '{step}' failed: {cause:#}")]
    Command { step: String, cause: anyhow::Error },

    #[error(
        "image is busy, most likely installation left some running processes; \
         skipping conversion ({cause:#})"
    )]
    Busy { cause: anyhow::Error },

    #[error("image conversion failed: {cause:#}")]
    Conversion { cause: anyhow::Error },
}

impl BuildError {
    pub fn environment(cause: anyhow::Error) -> Self {
        BuildError::Environment { cause }
    }

    pub fn conversion(cause: anyhow::Error) -> Self {
        BuildError::Conversion { cause }
    }

    /// Process exit code. Zero is reserved for success.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// Busy-on-unmount is reported as a warning, not a generic failure.
    pub fn is_warning(&self) -> bool {
        matches!(self, BuildError::Busy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_every_variant_exits_non_zero() {
        let errors = vec![
            BuildError::Usage("bad".into()),
            BuildError::environment(anyhow!("no xsysroot")),
            BuildError::Lifecycle {
                transition: Transition::Renew,
                cause: anyhow!("status 1"),
            },
            BuildError::Command {
                step: "refresh".into(),
                cause: anyhow!("exit code 100"),
            },
            BuildError::Busy {
                cause: anyhow!("target is busy"),
            },
            BuildError::conversion(anyhow!("qemu-img failed")),
        ];
        for err in errors {
            assert_eq!(err.exit_code(), 1, "{err}");
        }
    }

    #[test]
    fn test_only_busy_is_warning() {
        assert!(BuildError::Busy {
            cause: anyhow!("busy")
        }
        .is_warning());
        assert!(!BuildError::Lifecycle {
            transition: Transition::Unmount,
            cause: anyhow!("busy")
        }
        .is_warning());
    }

    #[test]
    fn test_lifecycle_message_names_transition() {
        let err = BuildError::Lifecycle {
            transition: Transition::Expand,
            cause: anyhow!("no space"),
        };
        assert_eq!(err.to_string(), "failed to expand image: no space");
    }

    #[test]
    fn test_cause_chain_is_rendered() {
        let cause = anyhow!("exit status 1").context("running qemu-img");
        let err = BuildError::conversion(cause);
        assert_eq!(
            err.to_string(),
            "image conversion failed: running qemu-img: exit status 1"
        );
    }
}
