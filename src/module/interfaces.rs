//! Elastic network interface operations.
//!
//! Every operation here answers with an [`Envelope`]: lookup, resolution,
//! and provider failures become `Envelope::Error` so a caller sequencing
//! several steps can stop at the first failure. Only missing selectors and
//! connection failures surface as `Err`.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{Ec2Api, InterfaceAttributeChange, InterfaceSpec, NetworkInterface};
use crate::collaborators::{SecurityGroupResolver, SubnetResolver};
use crate::connection::{ConnectionParams, Connector};
use crate::envelope::Envelope;
use crate::error::Ec2Error;
use crate::finder::{self, ResourceClass, Selector};
use crate::projection::{NetworkInterfaceDescription, describe_network_interface};
use crate::types::{
    AttachmentId, GroupId, InstanceId, NAME_TAG, NetworkInterfaceId, SubnetId, Tags, VpcId,
};

use super::{Ec2Module, remote_failure};

const GROUP_SET: &str = "groupSet";
const DELETE_ON_TERMINATION: &str = "deleteOnTermination";
const DETACH_WITHOUT_ATTACHMENT: &str = "Attachment id not found for this ENI.";

/// Network interface addressed by identifier or `Name` tag.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InterfaceTarget {
    /// Interface identifier.
    Id(NetworkInterfaceId),
    /// Value of the `Name` tag.
    Name(String),
}

impl InterfaceTarget {
    /// Builds a target from optional name and identifier arguments. The
    /// identifier wins when both are given.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] when neither is supplied.
    pub fn from_options(name: Option<&str>, id: Option<&str>) -> Result<Self, Ec2Error> {
        match (
            id.filter(|value| !value.is_empty()),
            name.filter(|value| !value.is_empty()),
        ) {
            (Some(interface_id), _) => Ok(Self::Id(NetworkInterfaceId::from(interface_id))),
            (None, Some(interface_name)) => Ok(Self::Name(interface_name.to_owned())),
            (None, None) => Err(Ec2Error::validation(
                "either name or network_interface_id must be provided",
            )),
        }
    }

    /// Selector used to look the interface up.
    #[must_use]
    pub fn selector(&self) -> Selector {
        match self {
            Self::Id(interface_id) => Selector::by_id(interface_id.as_str()),
            Self::Name(name) => Selector::by_name(name.as_str()),
        }
    }
}

/// What [`Ec2Module::detach_network_interface`] acts on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DetachTarget {
    /// Look the interface up and use its current attachment.
    Interface(InterfaceTarget),
    /// Use a known attachment directly, skipping the lookup.
    Attachment(AttachmentId),
}

impl DetachTarget {
    /// Builds a target from optional arguments. A supplied attachment
    /// identifier wins.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] when nothing is supplied.
    pub fn from_options(
        name: Option<&str>,
        id: Option<&str>,
        attachment_id: Option<&str>,
    ) -> Result<Self, Ec2Error> {
        if let Some(attachment) = attachment_id.filter(|value| !value.is_empty()) {
            return Ok(Self::Attachment(AttachmentId::from(attachment)));
        }
        InterfaceTarget::from_options(name, id)
            .map(Self::Interface)
            .map_err(|_| {
                Ec2Error::validation(
                    "either name or network_interface_id or attachment_id must be provided",
                )
            })
    }
}

/// Parameters for [`Ec2Module::create_network_interface`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateInterfaceRequest {
    /// `Name` tag; must not already be in use.
    pub name: String,
    /// Subnet to create the interface in.
    pub subnet_id: SubnetId,
    /// Requested primary private address.
    pub private_ip_address: Option<String>,
    /// Interface description.
    pub description: Option<String>,
    /// Security group names, resolved within the subnet's VPC.
    pub groups: Vec<String>,
}

impl CreateInterfaceRequest {
    /// Creates a request for an interface called `name` in `subnet_id`.
    #[must_use]
    pub fn new(name: impl Into<String>, subnet_id: impl Into<SubnetId>) -> Self {
        Self {
            name: name.into(),
            subnet_id: subnet_id.into(),
            ..Self::default()
        }
    }

    /// Adds a security group by name.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }
}

/// Translates a caller-facing attribute name into the provider's.
///
/// Names without a translation pass through unchanged.
#[must_use]
pub fn api_attribute_name(attribute: &str) -> String {
    match attribute {
        "groups" => GROUP_SET.to_owned(),
        "source_dest_check" => String::from("sourceDestCheck"),
        "delete_on_termination" => DELETE_ON_TERMINATION.to_owned(),
        other => other.to_owned(),
    }
}

fn group_names(value: &Value) -> Result<Vec<String>, Ec2Error> {
    let invalid = || Ec2Error::validation("groups must be a group name or a list of group names");
    match value {
        Value::String(name) => Ok(vec![name.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_owned).ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

async fn lookup_interface<A>(
    api: &A,
    target: &InterfaceTarget,
) -> Result<NetworkInterface, Ec2Error>
where
    A: Ec2Api + ?Sized,
{
    let selector = target.selector();
    finder::find_network_interfaces(api, &selector)
        .await?
        .into_unique(ResourceClass::NetworkInterface, &selector)
}

impl<C, S, G> Ec2Module<C, S, G>
where
    C: Connector,
    S: SubnetResolver,
    G: SecurityGroupResolver,
{
    /// Returns the identifier of the interface tagged `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] for a blank name and
    /// [`Ec2Error::Configuration`] when connecting fails.
    pub async fn get_network_interface_id(
        &self,
        name: &str,
        params: &ConnectionParams,
    ) -> Result<Envelope<NetworkInterfaceId>, Ec2Error> {
        let target = InterfaceTarget::from_options(Some(name), None)?;
        let api = self.connector.connect(params)?;
        let found = lookup_interface(&api, &target).await;
        Ok(found.map(|interface| interface.id).into())
    }

    /// Describes the targeted interface. Nothing matching is a successful
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Configuration`] when connecting fails.
    pub async fn get_network_interface(
        &self,
        target: &InterfaceTarget,
        params: &ConnectionParams,
    ) -> Result<Envelope<Option<NetworkInterfaceDescription>>, Ec2Error> {
        let api = self.connector.connect(params)?;
        let described = match lookup_interface(&api, target).await {
            Ok(interface) => Ok(Some(describe_network_interface(&interface))),
            Err(Ec2Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        };
        Ok(described.into())
    }

    /// Creates an interface, tags it with its name, and describes it.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] for a blank name or subnet and
    /// [`Ec2Error::Configuration`] when connecting fails.
    pub async fn create_network_interface(
        &self,
        request: &CreateInterfaceRequest,
        params: &ConnectionParams,
    ) -> Result<Envelope<NetworkInterfaceDescription>, Ec2Error> {
        if request.name.trim().is_empty() {
            return Err(Ec2Error::validation("name must be provided"));
        }
        if request.subnet_id.is_empty() {
            return Err(Ec2Error::validation("subnet_id must be provided"));
        }
        let api = self.connector.connect(params)?;
        Ok(self.create_interface(&api, request, params).await.into())
    }

    async fn create_interface(
        &self,
        api: &C::Api,
        request: &CreateInterfaceRequest,
        params: &ConnectionParams,
    ) -> Result<NetworkInterfaceDescription, Ec2Error> {
        let by_name = Selector::by_name(request.name.as_str());
        let existing = finder::find_network_interfaces(api, &by_name).await?;
        if !existing.is_empty() {
            warn!(name = %request.name, count = existing.len(), "interface name already in use");
            return Err(Ec2Error::DuplicateName {
                class: ResourceClass::NetworkInterface,
                name: request.name.clone(),
            });
        }

        let association = self
            .subnets
            .subnet_association(std::slice::from_ref(&request.subnet_id), params)
            .await
            .map_err(|err| remote_failure("subnet_association", err))?;
        let vpc_id = association.vpc_id.ok_or_else(|| Ec2Error::SubnetWithoutVpc {
            subnet_id: request.subnet_id.to_string(),
        })?;

        let groups = self.resolve_groups(&request.groups, &vpc_id, params).await?;
        let spec = InterfaceSpec {
            subnet_id: request.subnet_id.clone(),
            private_ip_address: request.private_ip_address.clone(),
            description: request.description.clone(),
            groups,
        };
        let mut interface = api
            .create_network_interface(&spec)
            .await
            .map_err(|err| remote_failure("create_network_interface", err))?;

        let name_tag = Tags::from([(NAME_TAG.to_owned(), request.name.clone())]);
        api.create_tags(&interface.id, &name_tag)
            .await
            .map_err(|err| remote_failure("create_tags", err))?;
        interface.tags.extend(name_tag);
        info!(interface_id = %interface.id, %vpc_id, "network interface created");
        Ok(describe_network_interface(&interface))
    }

    async fn resolve_groups(
        &self,
        names: &[String],
        vpc_id: &VpcId,
        params: &ConnectionParams,
    ) -> Result<Vec<GroupId>, Ec2Error> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let ids = self
            .groups
            .group_ids(names, vpc_id, params)
            .await
            .map_err(|err| remote_failure("group_ids", err))?;
        if ids.is_empty() {
            return Err(Ec2Error::UnresolvedSecurityGroups {
                groups: names.to_vec(),
            });
        }
        debug!(%vpc_id, ?ids, "security groups resolved");
        Ok(ids)
    }

    /// Deletes the targeted interface.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Configuration`] when connecting fails.
    pub async fn delete_network_interface(
        &self,
        target: &InterfaceTarget,
        params: &ConnectionParams,
    ) -> Result<Envelope<bool>, Ec2Error> {
        let api = self.connector.connect(params)?;
        let deleted = async {
            let interface = lookup_interface(&api, target).await?;
            api.delete_network_interface(&interface.id)
                .await
                .map_err(|err| remote_failure("delete_network_interface", err))
        }
        .await;
        Ok(deleted.into())
    }

    /// Attaches the targeted interface to `instance_id` at `device_index`
    /// and returns the new attachment identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] for a blank instance identifier and
    /// [`Ec2Error::Configuration`] when connecting fails.
    pub async fn attach_network_interface(
        &self,
        target: &InterfaceTarget,
        instance_id: &InstanceId,
        device_index: u32,
        params: &ConnectionParams,
    ) -> Result<Envelope<AttachmentId>, Ec2Error> {
        if instance_id.is_empty() {
            return Err(Ec2Error::validation(
                "instance_id and device_index are required parameters",
            ));
        }
        let api = self.connector.connect(params)?;
        let attached = async {
            let interface = lookup_interface(&api, target).await?;
            let attachment_id = api
                .attach_network_interface(&interface.id, instance_id, device_index)
                .await
                .map_err(|err| remote_failure("attach_network_interface", err))?;
            info!(
                interface_id = %interface.id,
                %instance_id,
                device_index,
                %attachment_id,
                "network interface attached"
            );
            Ok::<_, Ec2Error>(attachment_id)
        }
        .await;
        Ok(attached.into())
    }

    /// Detaches an interface, looking up its attachment unless one is given.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Configuration`] when connecting fails.
    pub async fn detach_network_interface(
        &self,
        target: &DetachTarget,
        force: bool,
        params: &ConnectionParams,
    ) -> Result<Envelope<bool>, Ec2Error> {
        let api = self.connector.connect(params)?;
        let attachment_id = match target {
            DetachTarget::Attachment(attachment_id) => attachment_id.clone(),
            DetachTarget::Interface(interface) => match lookup_interface(&api, interface).await {
                Ok(found) => {
                    let description = describe_network_interface(&found);
                    let Some(attachment_id) = description.attachment_id().cloned() else {
                        warn!(interface_id = %found.id, "interface is not attached");
                        return Ok(Envelope::error(DETACH_WITHOUT_ATTACHMENT));
                    };
                    attachment_id
                }
                Err(err) => return Ok(Envelope::from(Err(err))),
            },
        };
        let detached = api
            .detach_network_interface(&attachment_id, force)
            .await
            .map_err(|err| remote_failure("detach_network_interface", err));
        Ok(detached.into())
    }

    /// Changes one attribute of the targeted interface.
    ///
    /// `groups`, `source_dest_check`, and `delete_on_termination` are
    /// translated to their provider names. Group names are resolved to
    /// identifiers when the interface belongs to a VPC, and
    /// `delete_on_termination` is applied through the current attachment.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] for a blank attribute or malformed
    /// group list and [`Ec2Error::Configuration`] when connecting fails.
    pub async fn modify_network_interface_attribute(
        &self,
        target: &InterfaceTarget,
        attribute: &str,
        value: &Value,
        params: &ConnectionParams,
    ) -> Result<Envelope<bool>, Ec2Error> {
        if attribute.trim().is_empty() {
            return Err(Ec2Error::validation("attr and value must be provided"));
        }
        let api_name = api_attribute_name(attribute);
        let requested_groups = if api_name == GROUP_SET {
            Some(group_names(value)?)
        } else {
            None
        };
        let api = self.connector.connect(params)?;
        let modified = async {
            let interface = lookup_interface(&api, target).await?;
            let description = describe_network_interface(&interface);

            let resolved_value = match (&requested_groups, &description.vpc_id) {
                (Some(names), Some(_)) if names.is_empty() => {
                    return Err(Ec2Error::UnresolvedSecurityGroups { groups: Vec::new() });
                }
                (Some(names), Some(vpc_id)) => {
                    let ids = self.resolve_groups(names, vpc_id, params).await?;
                    Value::from(ids.iter().map(GroupId::as_str).collect::<Vec<_>>())
                }
                _ => value.clone(),
            };
            let attachment_id = if api_name == DELETE_ON_TERMINATION {
                Some(description.attachment_id().cloned().ok_or_else(|| {
                    Ec2Error::MissingAttachment {
                        interface_id: interface.id.to_string(),
                    }
                })?)
            } else {
                None
            };

            let change = InterfaceAttributeChange {
                attribute: api_name.clone(),
                value: resolved_value,
                attachment_id,
            };
            api.modify_network_interface_attribute(&interface.id, &change)
                .await
                .map_err(|err| remote_failure("modify_network_interface_attribute", err))
        }
        .await;
        Ok(modified.into())
    }
}
