//! Error taxonomy shared by every operation.

use thiserror::Error;

use crate::api::RemoteError;
use crate::finder::ResourceClass;

/// Errors raised by the adapter.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Ec2Error {
    /// Raised when no usable credentials or region can be determined.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Raised when a required selector is missing, contradictory, or an
    /// attribute is outside its allow-list.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Raised when a selector matches nothing where one match is required.
    #[error("no {class} matches {selector}")]
    NotFound {
        /// Resource class that was queried.
        class: ResourceClass,
        /// Rendered selector.
        selector: String,
    },
    /// Raised when a selector matches several resources where exactly one is
    /// required.
    #[error("{count} {class} resources match {selector}; exactly one is required")]
    AmbiguousSelector {
        /// Resource class that was queried.
        class: ResourceClass,
        /// Rendered selector.
        selector: String,
        /// Number of matches returned by the provider.
        count: usize,
    },
    /// Raised when a create request reuses a name that is already taken.
    #[error("a {class} with Name tag {name} already exists")]
    DuplicateName {
        /// Resource class being created.
        class: ResourceClass,
        /// Requested name.
        name: String,
    },
    /// Raised when a subnet does not belong to any VPC.
    #[error("subnet_id {subnet_id} does not map to a valid vpc id")]
    SubnetWithoutVpc {
        /// Subnet supplied by the caller.
        subnet_id: String,
    },
    /// Raised when security group names cannot be mapped to group ids.
    #[error("security groups {groups:?} do not map to valid security group ids")]
    UnresolvedSecurityGroups {
        /// Group names supplied by the caller.
        groups: Vec<String>,
    },
    /// Raised when an operation needs the attachment of an unattached
    /// interface.
    #[error("no attachment id found for network interface {interface_id}")]
    MissingAttachment {
        /// Interface identifier.
        interface_id: String,
    },
    /// Raised when the provider refuses to reserve capacity for a launch.
    #[error("instances could not be reserved for image {image_id}")]
    ReservationRefused {
        /// Image requested by the caller.
        image_id: String,
    },
    /// Raised when a launched instance settles in a state other than
    /// `running`.
    #[error("instance {instance_id} could not be started: status is {state}")]
    StartupFailed {
        /// Provider instance identifier.
        instance_id: String,
        /// Terminal state reported by the provider.
        state: String,
    },
    /// Raised when a launched instance is still pending after the configured
    /// number of checks.
    #[error("timeout waiting for instance {instance_id} to start after {attempts} status checks")]
    StartupTimeout {
        /// Provider instance identifier.
        instance_id: String,
        /// Number of status checks performed.
        attempts: u32,
    },
    /// Raised when private key material cannot be written locally.
    #[error("failed to save key material to {path}: {message}")]
    KeyMaterial {
        /// Destination path.
        path: String,
        /// Underlying I/O error message.
        message: String,
    },
    /// Wrapper for provider level failures.
    #[error("provider error: {0}")]
    Remote(#[from] RemoteError),
}

impl Ec2Error {
    /// Builds a [`Ec2Error::Validation`] from any message.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
