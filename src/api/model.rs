//! Request and response shapes exchanged with the remote control plane.
//!
//! Every field the provider may omit depending on API version is typed as an
//! `Option`, so projections never probe for presence at runtime.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{
    AttachmentId, GroupId, ImageId, InstanceId, NAME_TAG, NetworkInterfaceId, SubnetId, Tags,
    VpcId,
};

/// Compute instance as reported by the provider.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Instance {
    /// Provider identifier.
    pub id: InstanceId,
    /// Lifecycle state (`pending`, `running`, …).
    pub state: String,
    /// Image the instance was launched from.
    pub image_id: Option<ImageId>,
    /// Instance type, for example `m1.small`.
    pub instance_type: Option<String>,
    /// Primary private address.
    pub private_ip_address: Option<String>,
    /// Public address, when assigned.
    pub public_ip_address: Option<String>,
    /// Tags attached to the instance.
    #[serde(default)]
    pub tags: Tags,
}

impl Instance {
    /// Returns the value of the `Name` tag.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.tags.get(NAME_TAG).map(String::as_str)
    }
}

/// Group of instances created by a single launch request.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Reservation {
    /// Reservation identifier.
    pub id: String,
    /// Instances belonging to the reservation.
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// Launch parameters forwarded to `RunInstances`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct LaunchSpec {
    /// Image to boot.
    pub image_id: ImageId,
    /// Instance type to request.
    pub instance_type: String,
    /// Key pair installed on the instance.
    pub key_name: Option<String>,
    /// Security group names applied at launch.
    #[serde(default)]
    pub security_groups: Vec<String>,
    /// User data passed to the instance.
    pub user_data: Option<String>,
    /// Availability zone placement.
    pub placement: Option<String>,
}

/// Parameters forwarded to `CreateImage`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ImageSpec {
    /// Name of the new image.
    pub name: String,
    /// Optional image description.
    pub description: Option<String>,
    /// Skip rebooting the source instance before snapshotting.
    pub no_reboot: bool,
    /// Ask the provider to validate the request without creating anything.
    pub dry_run: bool,
}

/// Machine image as reported by the provider.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Image {
    /// Provider identifier.
    pub id: ImageId,
    /// Image name (distinct from the `Name` tag).
    pub name: Option<String>,
    /// Availability state.
    pub state: Option<String>,
    /// Owning account.
    pub owner_id: Option<String>,
    /// Tags attached to the image.
    #[serde(default)]
    pub tags: Tags,
}

/// SSH key pair registered with the provider.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct KeyPair {
    /// Key pair name.
    pub name: String,
    /// Key fingerprint.
    pub fingerprint: String,
    /// Private key material, only returned when the provider generated it.
    pub material: Option<String>,
}

/// Attribute map returned by `DescribeInstanceAttribute`, keyed by the API
/// attribute name.
pub type AttributeResponse = BTreeMap<String, Value>;

/// Security group reference attached to a network interface.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct GroupIdentifier {
    /// Group identifier.
    pub id: GroupId,
    /// Group name.
    pub name: String,
}

/// Private address assigned to a network interface.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PrivateIpAddress {
    /// Address in dotted notation.
    pub private_ip_address: String,
    /// Whether this is the interface's primary address.
    pub primary: bool,
}

/// Public address association of a network interface.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct InterfaceAssociation {
    /// Association identifier.
    pub association_id: Option<String>,
    /// Elastic IP allocation identifier.
    pub allocation_id: Option<String>,
    /// Associated public address.
    pub public_ip: Option<String>,
    /// Public DNS name.
    pub public_dns_name: Option<String>,
    /// Account owning the public address.
    pub ip_owner_id: Option<String>,
}

/// Binding between a network interface and an instance.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct InterfaceAttachment {
    /// Attachment identifier.
    pub id: Option<AttachmentId>,
    /// Attachment status (`attaching`, `attached`, …).
    pub status: Option<String>,
    /// Attachment timestamp as reported by the provider.
    pub attach_time: Option<String>,
    /// Device index on the instance.
    pub device_index: Option<u32>,
    /// Whether the interface is deleted with the instance.
    pub delete_on_termination: Option<bool>,
    /// Instance the interface is attached to.
    pub instance_id: Option<InstanceId>,
    /// Account owning that instance.
    pub instance_owner_id: Option<String>,
}

/// Elastic network interface as reported by the provider.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct NetworkInterface {
    /// Provider identifier.
    pub id: NetworkInterfaceId,
    /// Region the interface lives in.
    pub region: String,
    /// Interface status (`available`, `in-use`, …).
    pub status: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Availability zone.
    pub availability_zone: Option<String>,
    /// Identifier of the service that created the interface.
    pub requester_id: Option<String>,
    /// Whether the interface is managed by a provider service.
    pub requester_managed: Option<bool>,
    /// Hardware address.
    pub mac_address: Option<String>,
    /// Primary private address.
    pub private_ip_address: Option<String>,
    /// VPC the interface belongs to.
    pub vpc_id: Option<VpcId>,
    /// Subnet the interface belongs to.
    pub subnet_id: Option<SubnetId>,
    /// Whether source/destination checking is enabled.
    pub source_dest_check: Option<bool>,
    /// Owning account.
    pub owner_id: Option<String>,
    /// Public address association.
    pub association: Option<InterfaceAssociation>,
    /// Tags attached to the interface.
    #[serde(default)]
    pub tags: Tags,
    /// Security groups applied to the interface.
    #[serde(default)]
    pub groups: Vec<GroupIdentifier>,
    /// Private addresses in provider order.
    #[serde(default)]
    pub private_ip_addresses: Vec<PrivateIpAddress>,
    /// Attachment, absent while the interface is detached.
    pub attachment: Option<InterfaceAttachment>,
}

impl NetworkInterface {
    /// Returns the value of the `Name` tag.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.tags.get(NAME_TAG).map(String::as_str)
    }
}

/// Parameters forwarded to `CreateNetworkInterface`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct InterfaceSpec {
    /// Subnet to create the interface in.
    pub subnet_id: SubnetId,
    /// Requested primary private address.
    pub private_ip_address: Option<String>,
    /// Interface description.
    pub description: Option<String>,
    /// Security groups, already resolved to identifiers.
    #[serde(default)]
    pub groups: Vec<GroupId>,
}

/// Parameters forwarded to `ModifyNetworkInterfaceAttribute`.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct InterfaceAttributeChange {
    /// API attribute name (`groupSet`, `sourceDestCheck`, …).
    pub attribute: String,
    /// New value.
    pub value: Value,
    /// Attachment targeted by `deleteOnTermination` changes.
    pub attachment_id: Option<AttachmentId>,
}
