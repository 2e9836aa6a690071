//! Sysroot lifecycle adapter.
//!
//! The image itself is managed by an external tool; the build only needs
//! the capabilities in [`Sysroot`]. [`Xsysroot`] provides them by driving
//! the `xsysroot` command line.

pub mod xsysroot;

pub use xsysroot::Xsysroot;

use anyhow::Result;

/// Query key for the path of the image's qcow2 backing file.
pub const QCOW_IMAGE_KEY: &str = "qcow_image";

/// A disk image bound to one profile.
///
/// Lifecycle methods return `Err` when the transition did not happen.
pub trait Sysroot {
    /// Profile this handle is bound to.
    fn profile(&self) -> &str;

    fn is_mounted(&mut self) -> Result<bool>;

    fn unmount(&mut self) -> Result<()>;

    /// Discard the image and recreate it from its base. Leaves it mounted.
    fn renew(&mut self) -> Result<()>;

    /// Grow the filesystem to its target size. Requires an unmounted image.
    fn expand(&mut self) -> Result<()>;

    fn mount(&mut self) -> Result<()>;

    /// Run a shell command inside the mounted image and return its exit code.
    ///
    /// `Err` means the command could not be run at all.
    fn execute(&mut self, command_line: &str) -> Result<i32>;

    /// Read a named property of the image.
    fn query(&mut self, key: &str) -> Result<String>;
}
