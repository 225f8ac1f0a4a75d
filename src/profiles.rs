//! Named connection profiles stored in `[profiles.<name>]` tables.

use std::collections::BTreeMap;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use ortho_config::ConfigDiscovery;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use ortho_config::toml;

use crate::connection::ProfileSettings;
use crate::error::Ec2Error;

const APP_NAME: &str = "ec2kit";
const CONFIG_ENV_VAR: &str = "EC2KIT_CONFIG_PATH";
const CONFIG_FILE_NAME: &str = "ec2kit.toml";
const DOTFILE_NAME: &str = ".ec2kit.toml";
const PROJECT_FILE_NAME: &str = "ec2kit.toml";
const PROFILES_SECTION: &str = "profiles";

/// Profiles keyed by name.
pub type Profiles = BTreeMap<String, ProfileSettings>;

/// Errors raised while reading profile tables.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ProfileError {
    /// Raised when file system operations fail.
    #[error("failed to access {path}: {message}")]
    Io {
        /// Path that could not be accessed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the file is not valid TOML.
    #[error("failed to parse {path}: {message}")]
    Parse {
        /// Path that could not be parsed.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the profile tables have an unexpected shape.
    #[error("invalid profiles in {path}: {message}")]
    InvalidStructure {
        /// Path that had invalid content.
        path: Utf8PathBuf,
        /// Human-readable error message.
        message: String,
    },
}

impl From<ProfileError> for Ec2Error {
    fn from(value: ProfileError) -> Self {
        Self::Configuration(value.to_string())
    }
}

/// Reads profiles from the first configuration file discovery finds.
#[derive(Clone, Debug)]
pub struct ProfileFile {
    discovery: ConfigDiscovery,
}

impl ProfileFile {
    /// Uses the standard `ec2kit.toml` discovery settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            discovery: ConfigDiscovery::builder(APP_NAME)
                .env_var(CONFIG_ENV_VAR)
                .config_file_name(CONFIG_FILE_NAME)
                .dotfile_name(DOTFILE_NAME)
                .project_file_name(PROJECT_FILE_NAME)
                .build(),
        }
    }

    /// Uses an explicit discovery configuration.
    #[must_use]
    pub const fn with_discovery(discovery: ConfigDiscovery) -> Self {
        Self { discovery }
    }

    /// Loads every profile. A missing file yields no profiles.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError`] when the discovered file cannot be read or
    /// its profile tables are malformed.
    pub fn load(&self) -> Result<Profiles, ProfileError> {
        for candidate in self.discovery.utf8_candidates() {
            if path_exists(&candidate)? {
                debug!(path = %candidate, "reading profiles");
                let contents = read_config(&candidate)?;
                return parse_profiles(&candidate, &contents);
            }
        }
        Ok(Profiles::new())
    }
}

impl Default for ProfileFile {
    fn default() -> Self {
        Self::new()
    }
}

fn split_path(path: &Utf8Path) -> Result<(&Utf8Path, &str), ProfileError> {
    let parent = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| ProfileError::InvalidStructure {
            path: path.to_path_buf(),
            message: String::from("configuration file path is missing a filename"),
        })?;
    Ok((parent, file_name))
}

fn path_exists(path: &Utf8Path) -> Result<bool, ProfileError> {
    let (parent, file_name) = split_path(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir.try_exists(file_name).map_err(|err| ProfileError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(ProfileError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        }),
    }
}

fn read_config(path: &Utf8Path) -> Result<String, ProfileError> {
    let (parent, file_name) = split_path(path)?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| ProfileError::Io {
        path: parent.to_path_buf(),
        message: err.to_string(),
    })?;
    dir.read_to_string(file_name).map_err(|err| ProfileError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn parse_profiles(path: &Utf8Path, contents: &str) -> Result<Profiles, ProfileError> {
    if contents.trim().is_empty() {
        return Ok(Profiles::new());
    }

    let value: toml::Value = toml::from_str(contents).map_err(|err| ProfileError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let table = value.as_table().ok_or_else(|| ProfileError::InvalidStructure {
        path: path.to_path_buf(),
        message: String::from("configuration root is not a table"),
    })?;

    let Some(section) = table.get(PROFILES_SECTION) else {
        return Ok(Profiles::new());
    };
    let profiles = section
        .as_table()
        .ok_or_else(|| ProfileError::InvalidStructure {
            path: path.to_path_buf(),
            message: format!("[{PROFILES_SECTION}] must be a table"),
        })?;

    profiles
        .iter()
        .map(|(name, raw)| {
            ProfileSettings::deserialize(raw.clone())
                .map(|settings| (name.clone(), settings))
                .map_err(|err| ProfileError::InvalidStructure {
                    path: path.to_path_buf(),
                    message: format!("[{PROFILES_SECTION}.{name}]: {err}"),
                })
        })
        .collect()
}
