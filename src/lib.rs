//! Builds a flashable Ubuntu image with KanoOS software for the Raspberry Pi 2.
//!
//! Each run starts from a fresh copy of the base image held by an
//! xsysroot profile:
//!
//! 1. Renew the image and expand it to fit a 4GB SD card
//! 2. Register the KanoOS repository (and, for a full build, install the software)
//! 3. Convert the result into a raw image ready to flash and boot
//!
//! # Architecture
//!
//! ```text
//! build-image (bin)
//!     │
//!     ├── mode          --prepare-only | --build-all
//!     ├── preflight     host tool checks
//!     └── orchestrator  guarded lifecycle pipeline
//!             │
//!             ├── component  declarative in-image steps
//!             ├── sysroot    Sysroot trait, xsysroot backend
//!             └── convert    ImageConverter trait, qemu-img backend
//! ```
//!
//! The orchestrator takes its sysroot and converter as values, so tests
//! substitute in-memory fakes for both.

pub mod component;
pub mod config;
pub mod convert;
pub mod error;
pub mod mode;
pub mod orchestrator;
pub mod preflight;
pub mod sysroot;

pub use component::{CommandScript, ImageStep, Op, Phase};
pub use config::BuildConfig;
pub use convert::{ImageConverter, QemuImg};
pub use error::{BuildError, Transition};
pub use mode::RunMode;
pub use orchestrator::{BuildResult, Orchestrator};
pub use sysroot::{Sysroot, Xsysroot};
