//! Callable operations over instances, images, key pairs, and network
//! interfaces.
//!
//! [`Ec2Module`] owns the collaborators every operation needs. Each call
//! validates its selectors, connects, resolves its target to exactly one
//! resource, and only then issues a mutating request.

mod images;
mod instances;
mod interfaces;
mod keys;
mod launch;

use tracing::error;

use crate::api::RemoteError;
use crate::config::{ConfigError, Ec2Config};
use crate::error::Ec2Error;

pub use images::ImageOptions;
pub use instances::{InstanceTarget, LaunchRequest};
pub use interfaces::{CreateInterfaceRequest, DetachTarget, InterfaceTarget, api_attribute_name};
pub use launch::LaunchPolicy;

/// Instance type requested when neither the caller nor configuration names
/// one.
pub const DEFAULT_INSTANCE_TYPE: &str = "m1.small";

/// Entry point for every operation.
///
/// `C` builds region-bound clients, `S` maps subnets to VPCs, and `G` maps
/// security group names to identifiers.
#[derive(Clone, Debug)]
pub struct Ec2Module<C, S, G> {
    connector: C,
    subnets: S,
    groups: G,
    launch: LaunchPolicy,
    default_instance_type: String,
}

impl<C, S, G> Ec2Module<C, S, G> {
    /// Creates a module with default launch polling.
    #[must_use]
    pub fn new(connector: C, subnets: S, groups: G) -> Self {
        Self {
            connector,
            subnets,
            groups,
            launch: LaunchPolicy::default(),
            default_instance_type: DEFAULT_INSTANCE_TYPE.to_owned(),
        }
    }

    /// Creates a module using the polling bounds and instance type from
    /// `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `config` fails validation.
    pub fn from_config(
        connector: C,
        subnets: S,
        groups: G,
        config: &Ec2Config,
    ) -> Result<Self, ConfigError> {
        let launch = config.launch_policy()?;
        Ok(Self::new(connector, subnets, groups)
            .with_launch_policy(launch)
            .with_default_instance_type(config.default_instance_type.clone()))
    }

    /// Overrides launch polling bounds.
    #[must_use]
    pub const fn with_launch_policy(mut self, launch: LaunchPolicy) -> Self {
        self.launch = launch;
        self
    }

    /// Overrides the instance type used when a launch request names none.
    #[must_use]
    pub fn with_default_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.default_instance_type = instance_type.into();
        self
    }

    /// Returns the connector.
    #[must_use]
    pub const fn connector(&self) -> &C {
        &self.connector
    }

    /// Returns the launch polling bounds.
    #[must_use]
    pub const fn launch_policy(&self) -> LaunchPolicy {
        self.launch
    }
}

fn remote_failure(operation: &'static str, err: RemoteError) -> Ec2Error {
    error!(operation, error = %err, "remote call failed");
    Ec2Error::Remote(err)
}

#[cfg(test)]
mod tests;
