//! Preflight checks for image builds.
//!
//! Validates that the host has the image converter before anything
//! touches the image, so a missing tool fails the run up front instead
//! of halfway through a multi-minute build. The sysroot tool is located
//! by [`Xsysroot::resolve`](crate::sysroot::Xsysroot::resolve) itself.
//!
//! # Example
//!
//! ```rust
//! use kanux_image::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("qemu-img") {
//!     println!("qemu-utils not installed");
//! }
//!
//! let tools = &[("qemu-img", "qemu-utils")];
//! if let Err(e) = check_required_tools(tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};

/// Check if a command exists in PATH.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Host tools an image build needs besides xsysroot.
///
/// Each tuple is (command_name, install_hint).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[("qemu-img", "qemu-utils")];

/// Check that specific tools are available.
///
/// Reports every missing tool at once rather than the first one found.
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, hint)| format!("  {} (install: {})", t, hint))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Check all of [`REQUIRED_TOOLS`].
pub fn check_host_tools() -> Result<()> {
    check_required_tools(REQUIRED_TOOLS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists() {
        // 'ls' should exist on any Unix system
        assert!(command_exists("ls"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_required_tools_success() {
        let tools = &[("ls", "coreutils"), ("sh", "dash")];
        assert!(check_required_tools(tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_lists_every_missing_tool() {
        let tools = &[
            ("nonexistent_command_xyz", "fake-package"),
            ("ls", "coreutils"),
            ("nonexistent_command_abc", "other-package"),
        ];
        let msg = check_required_tools(tools).unwrap_err().to_string();
        assert!(msg.contains("nonexistent_command_xyz (install: fake-package)"));
        assert!(msg.contains("nonexistent_command_abc (install: other-package)"));
        assert!(!msg.contains("coreutils"));
    }

    #[test]
    fn test_required_tools_have_hints() {
        for (tool, hint) in REQUIRED_TOOLS {
            assert!(!tool.is_empty());
            assert!(!hint.is_empty());
        }
    }

    #[test]
    fn test_xsysroot_is_left_to_resolution() {
        use crate::sysroot::xsysroot::XSYSROOT_BIN;
        assert!(REQUIRED_TOOLS.iter().all(|(tool, _)| *tool != XSYSROOT_BIN));
    }
}
