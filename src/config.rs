//! Build configuration.
//!
//! The values an image build depends on (sysroot profile, output name,
//! repository, packages) live in one immutable [`BuildConfig`]. The
//! shipped values are compiled in from `config/kanux.toml`; tests build
//! their own from smaller TOML documents.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// The compiled-in configuration document.
const BUILTIN_CONFIG: &str = include_str!("../config/kanux.toml");

/// Directory inside the image where the repository key is downloaded.
const KEY_DOWNLOAD_DIR: &str = "/tmp";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// xsysroot profile holding the base image.
    pub profile: String,
    /// Artifact name stem, e.g. `UbuntuKanux`.
    pub image_name: String,
    /// Version stamped into the artifact file name.
    pub version: String,
    pub repository: RepositoryConfig,
    pub device_access: DeviceAccessConfig,
    pub packages: PackageConfig,
    pub linker: LinkerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// apt source line, written verbatim to `list_file`.
    pub source_line: String,
    pub list_file: String,
    pub key_url: String,
}

/// udev rule granting a group access to a device subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceAccessConfig {
    pub rule_file: String,
    pub subsystem: String,
    pub group: String,
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    /// Firmware and GPU libraries, installed before everything else.
    pub hardware: Vec<String>,
    /// Application set, installed with dpkg's force-overwrite.
    pub application: Vec<String>,
    /// Installed with pip, skipped when empty.
    #[serde(default)]
    pub pip: Vec<String>,
    /// Services started by package installation that must not stay running.
    #[serde(default)]
    pub stop_services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkerConfig {
    /// Non-standard library directory to register with ldconfig.
    pub library_path: String,
}

impl BuildConfig {
    /// The configuration compiled into this binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CONFIG).context("parsing built-in configuration")
    }

    /// Parse and validate a configuration document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: BuildConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        require_non_blank("profile", &self.profile)?;
        require_non_blank("image_name", &self.image_name)?;
        require_non_blank("version", &self.version)?;
        if self.image_name.contains('/') || self.version.contains('/') {
            bail!("image_name and version must not contain '/'");
        }

        require_non_blank("repository.source_line", &self.repository.source_line)?;
        require_absolute("repository.list_file", &self.repository.list_file)?;
        require_non_blank("repository.key_url", &self.repository.key_url)?;
        if key_file_name(&self.repository.key_url).is_none() {
            bail!(
                "repository.key_url '{}' does not end in a file name",
                self.repository.key_url
            );
        }

        require_absolute("device_access.rule_file", &self.device_access.rule_file)?;
        require_non_blank("device_access.subsystem", &self.device_access.subsystem)?;
        require_non_blank("device_access.group", &self.device_access.group)?;
        let mode = &self.device_access.mode;
        if mode.len() != 4 || !mode.chars().all(|c| ('0'..='7').contains(&c)) {
            bail!("device_access.mode must be four octal digits, got '{}'", mode);
        }

        for (field, list) in [
            ("packages.hardware", &self.packages.hardware),
            ("packages.application", &self.packages.application),
            ("packages.pip", &self.packages.pip),
            ("packages.stop_services", &self.packages.stop_services),
        ] {
            if list.iter().any(|name| name.trim().is_empty()) {
                bail!("{field} contains a blank entry");
            }
        }

        require_absolute("linker.library_path", &self.linker.library_path)?;
        Ok(())
    }

    /// Versioned file name of the flashable image, e.g. `UbuntuKanux-0.7.img`.
    pub fn artifact_file_name(&self) -> String {
        format!("{}-{}.img", self.image_name, self.version)
    }

    /// Where the repository signing key is downloaded inside the image.
    pub fn key_download_path(&self) -> String {
        let name = key_file_name(&self.repository.key_url).unwrap_or("repo.key");
        format!("{KEY_DOWNLOAD_DIR}/{name}")
    }

    /// The udev rule line written to `device_access.rule_file`.
    pub fn device_rule(&self) -> String {
        let access = &self.device_access;
        format!(
            "SUBSYSTEM==\"{}\",GROUP=\"{}\",MODE=\"{}\"",
            access.subsystem, access.group, access.mode
        )
    }
}

fn key_file_name(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|name| !name.is_empty())
}

fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} must not be empty");
    }
    Ok(())
}

fn require_absolute(field: &str, value: &str) -> Result<()> {
    require_non_blank(field, value)?;
    if !value.starts_with('/') {
        bail!("{field} must be an absolute path inside the image, got '{}'", value);
    }
    Ok(())
}
