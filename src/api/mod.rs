//! Remote control-plane client interface.
//!
//! [`Ec2Api`] mirrors the provider's RPC surface one method per call. The
//! transport behind it (request signing, retries, timeouts) belongs to the
//! implementation; this crate only sequences calls and interprets results.

mod model;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::ErrorBody;
use crate::projection::InstanceAttribute;
use crate::types::{AttachmentId, FilterSet, ImageId, InstanceId, NetworkInterfaceId, Tags};

pub use model::{
    AttributeResponse, GroupIdentifier, Image, ImageSpec, Instance, InterfaceAssociation,
    InterfaceAttachment, InterfaceAttributeChange, InterfaceSpec, KeyPair, LaunchSpec,
    NetworkInterface, PrivateIpAddress, Reservation,
};

/// Error returned by the provider when it rejects a call.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RemoteError {
    /// Provider error code, for example `InvalidInstanceID.NotFound`.
    pub code: Option<String>,
    /// Provider supplied message.
    pub message: String,
}

impl RemoteError {
    /// Creates an error carrying only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Creates an error carrying a provider code and message.
    #[must_use]
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Normalises the provider error into the envelope error body.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody::new(self.to_string())
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Future returned by remote calls.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Client bound to one region and credential set.
pub trait Ec2Api: Send + Sync {
    /// Lists availability zone names for the bound region.
    fn describe_zones(&self) -> ApiFuture<'_, Vec<String>>;

    /// Lists reservations whose instances match `filters`.
    fn describe_instances<'a>(&'a self, filters: &'a FilterSet)
    -> ApiFuture<'a, Vec<Reservation>>;

    /// Re-fetches the lifecycle state of one instance.
    fn instance_state<'a>(&'a self, instance_id: &'a InstanceId) -> ApiFuture<'a, String>;

    /// Requests a new instance. `None` means the reservation was refused.
    fn run_instances<'a>(&'a self, spec: &'a LaunchSpec) -> ApiFuture<'a, Option<Reservation>>;

    /// Adds or overwrites tags on any taggable resource.
    fn create_tags<'a>(&'a self, resource_id: &'a str, tags: &'a Tags) -> ApiFuture<'a, ()>;

    /// Terminates one instance.
    fn terminate_instance<'a>(&'a self, instance_id: &'a InstanceId) -> ApiFuture<'a, ()>;

    /// Snapshots an instance into a new image.
    fn create_image<'a>(
        &'a self,
        instance_id: &'a InstanceId,
        spec: &'a ImageSpec,
    ) -> ApiFuture<'a, ImageId>;

    /// Lists images matching `filters`.
    fn describe_images<'a>(&'a self, filters: &'a FilterSet) -> ApiFuture<'a, Vec<Image>>;

    /// Fetches a key pair by name.
    fn get_key_pair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<KeyPair>>;

    /// Generates a key pair; the result carries the private material.
    fn create_key_pair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, KeyPair>;

    /// Registers an existing public key.
    fn import_key_pair<'a>(
        &'a self,
        name: &'a str,
        public_key_material: &'a str,
    ) -> ApiFuture<'a, KeyPair>;

    /// Deletes a key pair.
    fn delete_key_pair<'a>(&'a self, name: &'a str) -> ApiFuture<'a, bool>;

    /// Lists key pairs, optionally restricted to `names` and `filters`.
    fn describe_key_pairs<'a>(
        &'a self,
        names: &'a [String],
        filters: &'a FilterSet,
    ) -> ApiFuture<'a, Vec<KeyPair>>;

    /// Reads one instance attribute.
    fn get_instance_attribute<'a>(
        &'a self,
        instance_id: &'a InstanceId,
        attribute: InstanceAttribute,
    ) -> ApiFuture<'a, AttributeResponse>;

    /// Changes one instance attribute.
    fn modify_instance_attribute<'a>(
        &'a self,
        instance_id: &'a InstanceId,
        attribute: InstanceAttribute,
        value: &'a Value,
    ) -> ApiFuture<'a, bool>;

    /// Lists network interfaces matching `filters`.
    fn describe_network_interfaces<'a>(
        &'a self,
        filters: &'a FilterSet,
    ) -> ApiFuture<'a, Vec<NetworkInterface>>;

    /// Creates a network interface.
    fn create_network_interface<'a>(
        &'a self,
        spec: &'a InterfaceSpec,
    ) -> ApiFuture<'a, NetworkInterface>;

    /// Deletes a network interface.
    fn delete_network_interface<'a>(
        &'a self,
        interface_id: &'a NetworkInterfaceId,
    ) -> ApiFuture<'a, bool>;

    /// Attaches a network interface to an instance.
    fn attach_network_interface<'a>(
        &'a self,
        interface_id: &'a NetworkInterfaceId,
        instance_id: &'a InstanceId,
        device_index: u32,
    ) -> ApiFuture<'a, AttachmentId>;

    /// Detaches a network interface.
    fn detach_network_interface<'a>(
        &'a self,
        attachment_id: &'a AttachmentId,
        force: bool,
    ) -> ApiFuture<'a, bool>;

    /// Changes one network interface attribute.
    fn modify_network_interface_attribute<'a>(
        &'a self,
        interface_id: &'a NetworkInterfaceId,
        change: &'a InterfaceAttributeChange,
    ) -> ApiFuture<'a, bool>;
}
