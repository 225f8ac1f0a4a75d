//! Projection of provider objects into flat, caller-facing records.
//!
//! Projections are pure: no I/O, and the same input always yields the same
//! record. Fields the provider omitted stay absent in the output instead of
//! being defaulted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{
    AttributeResponse, GroupIdentifier, InterfaceAttachment, NetworkInterface, PrivateIpAddress,
};
use crate::error::Ec2Error;
use crate::types::{AttachmentId, InstanceId, NetworkInterfaceId, SubnetId, Tags, VpcId};

/// Instance attributes that can be read or modified.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceAttribute {
    /// `instanceType`
    InstanceType,
    /// `kernel`
    Kernel,
    /// `ramdisk`
    Ramdisk,
    /// `userData`
    UserData,
    /// `disableApiTermination`
    DisableApiTermination,
    /// `instanceInitiatedShutdownBehavior`
    InstanceInitiatedShutdownBehavior,
    /// `rootDeviceName`
    RootDeviceName,
    /// `blockDeviceMapping`
    BlockDeviceMapping,
    /// `productCodes`
    ProductCodes,
    /// `sourceDestCheck`
    SourceDestCheck,
    /// `groupSet`
    GroupSet,
    /// `ebsOptimized`
    EbsOptimized,
    /// `sriovNetSupport`
    SriovNetSupport,
}

impl InstanceAttribute {
    /// Every supported attribute, in documentation order.
    pub const ALL: [Self; 13] = [
        Self::InstanceType,
        Self::Kernel,
        Self::Ramdisk,
        Self::UserData,
        Self::DisableApiTermination,
        Self::InstanceInitiatedShutdownBehavior,
        Self::RootDeviceName,
        Self::BlockDeviceMapping,
        Self::ProductCodes,
        Self::SourceDestCheck,
        Self::GroupSet,
        Self::EbsOptimized,
        Self::SriovNetSupport,
    ];

    /// Returns the attribute name used by the provider API.
    #[must_use]
    pub const fn api_name(self) -> &'static str {
        match self {
            Self::InstanceType => "instanceType",
            Self::Kernel => "kernel",
            Self::Ramdisk => "ramdisk",
            Self::UserData => "userData",
            Self::DisableApiTermination => "disableApiTermination",
            Self::InstanceInitiatedShutdownBehavior => "instanceInitiatedShutdownBehavior",
            Self::RootDeviceName => "rootDeviceName",
            Self::BlockDeviceMapping => "blockDeviceMapping",
            Self::ProductCodes => "productCodes",
            Self::SourceDestCheck => "sourceDestCheck",
            Self::GroupSet => "groupSet",
            Self::EbsOptimized => "ebsOptimized",
            Self::SriovNetSupport => "sriovNetSupport",
        }
    }
}

impl fmt::Display for InstanceAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_name())
    }
}

impl FromStr for InstanceAttribute {
    type Err = Ec2Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|attribute| attribute.api_name() == value)
            .ok_or_else(|| {
                let allowed = Self::ALL
                    .iter()
                    .map(|attribute| attribute.api_name())
                    .collect::<Vec<_>>()
                    .join(", ");
                Ec2Error::validation(format!("attribute must be one of: {allowed}; got {value:?}"))
            })
    }
}

/// Instance attribute values keyed by attribute.
pub type AttributeRecord = BTreeMap<InstanceAttribute, Value>;

/// Copies `attribute` out of a provider response when present.
#[must_use]
pub fn project_attribute(
    attribute: InstanceAttribute,
    response: &AttributeResponse,
) -> AttributeRecord {
    response
        .get(attribute.api_name())
        .map(|value| AttributeRecord::from([(attribute, value.clone())]))
        .unwrap_or_default()
}

/// Flattened view of an interface attachment.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AttachmentDescription {
    /// Attachment status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Attachment timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attach_time: Option<String>,
    /// Device index on the instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_index: Option<u32>,
    /// Whether the interface is deleted with the instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_on_termination: Option<bool>,
    /// Attached instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<InstanceId>,
    /// Account owning the attached instance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_owner_id: Option<String>,
    /// Attachment identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<AttachmentId>,
}

impl AttachmentDescription {
    fn project(attachment: &InterfaceAttachment) -> Option<Self> {
        let description = Self {
            status: attachment.status.clone(),
            attach_time: attachment.attach_time.clone(),
            device_index: attachment.device_index,
            delete_on_termination: attachment.delete_on_termination,
            instance_id: attachment.instance_id.clone(),
            instance_owner_id: attachment.instance_owner_id.clone(),
            id: attachment.id.clone(),
        };
        (description != Self::default()).then_some(description)
    }
}

/// Flattened view of a network interface.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct NetworkInterfaceDescription {
    /// Interface identifier.
    pub id: NetworkInterfaceId,
    /// Region name.
    pub region: String,
    /// Interface status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Availability zone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
    /// Requesting service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_id: Option<String>,
    /// Whether a provider service manages the interface.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requester_managed: Option<bool>,
    /// Hardware address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Primary private address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
    /// Owning VPC.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<VpcId>,
    /// Owning subnet.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<SubnetId>,
    /// Source/destination checking.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_dest_check: Option<bool>,
    /// Owning account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    /// Public address association identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub association_id: Option<String>,
    /// Elastic IP allocation identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allocation_id: Option<String>,
    /// Associated public address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    /// Public DNS name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_dns_name: Option<String>,
    /// Account owning the public address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_owner_id: Option<String>,
    /// Tags.
    pub tags: Tags,
    /// Security groups, in provider order.
    pub groups: Vec<GroupIdentifier>,
    /// Private addresses, in provider order.
    pub private_ip_addresses: Vec<PrivateIpAddress>,
    /// Attachment, absent while detached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentDescription>,
}

impl NetworkInterfaceDescription {
    /// Returns the attachment identifier, when attached.
    #[must_use]
    pub fn attachment_id(&self) -> Option<&AttachmentId> {
        self.attachment
            .as_ref()
            .and_then(|attachment| attachment.id.as_ref())
    }
}

/// Projects a provider network interface into its description record.
#[must_use]
pub fn describe_network_interface(interface: &NetworkInterface) -> NetworkInterfaceDescription {
    let association = interface.association.clone().unwrap_or_default();
    NetworkInterfaceDescription {
        id: interface.id.clone(),
        region: interface.region.clone(),
        status: interface.status.clone(),
        description: interface.description.clone(),
        availability_zone: interface.availability_zone.clone(),
        requester_id: interface.requester_id.clone(),
        requester_managed: interface.requester_managed,
        mac_address: interface.mac_address.clone(),
        private_ip_address: interface.private_ip_address.clone(),
        vpc_id: interface.vpc_id.clone(),
        subnet_id: interface.subnet_id.clone(),
        source_dest_check: interface.source_dest_check,
        owner_id: interface.owner_id.clone(),
        association_id: association.association_id,
        allocation_id: association.allocation_id,
        public_ip: association.public_ip,
        public_dns_name: association.public_dns_name,
        ip_owner_id: association.ip_owner_id,
        tags: interface.tags.clone(),
        groups: interface.groups.clone(),
        private_ip_addresses: interface.private_ip_addresses.clone(),
        attachment: interface
            .attachment
            .as_ref()
            .and_then(AttachmentDescription::project),
    }
}
