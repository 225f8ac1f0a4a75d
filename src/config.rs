//! Configuration loading via `ortho-config`.

use std::ffi::OsString;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::error::Ec2Error;
use crate::module::LaunchPolicy;

/// Process-wide defaults derived from environment variables and
/// configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "EC2",
    discovery(
        app_name = "ec2kit",
        env_var = "EC2KIT_CONFIG_PATH",
        config_file_name = "ec2kit.toml",
        dotfile_name = ".ec2kit.toml",
        project_file_name = "ec2kit.toml"
    )
)]
pub struct Ec2Config {
    /// Region used when a call names none. Defaults to `us-east-1`.
    #[ortho_config(default = "us-east-1".to_owned())]
    pub region: String,
    /// Secret access key. Leave unset to use instance-role credentials.
    pub key: Option<String>,
    /// Access key identifier paired with `key`.
    pub keyid: Option<String>,
    /// Instance type requested by `run` when the caller names none.
    #[ortho_config(default = "m1.small".to_owned())]
    pub default_instance_type: String,
    /// Seconds between launch status checks.
    #[ortho_config(default = 5)]
    pub poll_interval_secs: u64,
    /// Number of launch status checks before giving up.
    #[ortho_config(default = 60)]
    pub max_poll_attempts: u32,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }

    fn hint(&self) -> String {
        format!(
            "set {} or add {} to ec2kit.toml",
            self.env_var, self.toml_key
        )
    }
}

const REGION: FieldMetadata = FieldMetadata::new("region", "EC2_REGION", "region");
const KEY: FieldMetadata = FieldMetadata::new("secret access key", "EC2_KEY", "key");
const KEYID: FieldMetadata = FieldMetadata::new("access key id", "EC2_KEYID", "keyid");
const INSTANCE_TYPE: FieldMetadata = FieldMetadata::new(
    "default instance type",
    "EC2_DEFAULT_INSTANCE_TYPE",
    "default_instance_type",
);

impl Ec2Config {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    fn require_partner(
        value: Option<&String>,
        partner: Option<&String>,
        metadata: &FieldMetadata,
    ) -> Result<(), ConfigError> {
        if value.is_none() && partner.is_some() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: {}",
                metadata.description,
                metadata.hint()
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("ec2kit")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation. Error messages name the environment
    /// variable and file key that supply each field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is blank
    /// or only half of the key pair is set, and [`ConfigError::InvalidValue`]
    /// when polling is configured to never run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.region, &REGION)?;
        Self::require_field(&self.default_instance_type, &INSTANCE_TYPE)?;
        Self::require_partner(self.key.as_ref(), self.keyid.as_ref(), &KEY)?;
        Self::require_partner(self.keyid.as_ref(), self.key.as_ref(), &KEYID)?;
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "poll_interval_secs must be greater than zero",
            )));
        }
        if self.max_poll_attempts == 0 {
            return Err(ConfigError::InvalidValue(String::from(
                "max_poll_attempts must be greater than zero",
            )));
        }
        Ok(())
    }

    /// Derives the launch polling bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn launch_policy(&self) -> Result<LaunchPolicy, ConfigError> {
        self.validate()?;
        Ok(LaunchPolicy::new(
            Duration::from_secs(self.poll_interval_secs),
            self.max_poll_attempts,
        ))
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a field holds an unusable value.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

impl From<ConfigError> for Ec2Error {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}
