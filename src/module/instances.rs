//! Instance lookup, launch, termination, and attribute access.

use serde_json::Value;
use tracing::{info, warn};

use crate::api::{Ec2Api, Instance, LaunchSpec};
use crate::connection::{ConnectionParams, Connector};
use crate::error::Ec2Error;
use crate::finder::{self, Matches, ResourceClass, Selector};
use crate::projection::{AttributeRecord, InstanceAttribute, project_attribute};
use crate::types::{FilterSet, ImageId, InstanceId, NAME_TAG, Tags};

use super::launch::wait_until_started;
use super::{Ec2Module, remote_failure};

/// Instance addressed by exactly one of name or identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstanceTarget {
    /// Instance identifier.
    Id(InstanceId),
    /// Value of the `Name` tag.
    Name(String),
}

impl InstanceTarget {
    /// Builds a target from optional name and identifier arguments.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] unless exactly one of the two is
    /// supplied.
    pub fn from_options(name: Option<&str>, id: Option<&str>) -> Result<Self, Ec2Error> {
        match (
            name.filter(|value| !value.is_empty()),
            id.filter(|value| !value.is_empty()),
        ) {
            (Some(_), Some(_)) => Err(Ec2Error::validation(
                "instance_name and instance_id cannot both be specified",
            )),
            (None, None) => Err(Ec2Error::validation(
                "one of instance_name or instance_id must be specified",
            )),
            (Some(instance_name), None) => Ok(Self::Name(instance_name.to_owned())),
            (None, Some(instance_id)) => Ok(Self::Id(InstanceId::from(instance_id))),
        }
    }
}

/// Parameters for [`Ec2Module::run`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LaunchRequest {
    /// Image to boot.
    pub image_id: ImageId,
    /// `Name` tag applied once the instance is running.
    pub name: Option<String>,
    /// Tags applied once the instance is running.
    pub tags: Tags,
    /// Instance type; the module default when unset.
    pub instance_type: Option<String>,
    /// Key pair installed on the instance.
    pub key_name: Option<String>,
    /// Security group names.
    pub security_groups: Vec<String>,
    /// User data passed to the instance.
    pub user_data: Option<String>,
    /// Availability zone.
    pub placement: Option<String>,
}

impl LaunchRequest {
    /// Creates a request for `image_id` with every option unset.
    #[must_use]
    pub fn new(image_id: impl Into<ImageId>) -> Self {
        Self {
            image_id: image_id.into(),
            ..Self::default()
        }
    }

    /// Sets the `Name` tag.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Sets the instance type.
    #[must_use]
    pub fn with_instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = Some(instance_type.into());
        self
    }

    fn tags_after_start(&self) -> Tags {
        let mut tags = self.tags.clone();
        if let Some(name) = &self.name {
            tags.insert(NAME_TAG.to_owned(), name.clone());
        }
        tags
    }
}

impl<C, S, G> Ec2Module<C, S, G>
where
    C: Connector,
{
    /// Lists availability zone names for the resolved region.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Configuration`] when connecting fails and
    /// [`Ec2Error::Remote`] when the provider rejects the call.
    pub async fn get_zones(&self, params: &ConnectionParams) -> Result<Vec<String>, Ec2Error> {
        let api = self.connector.connect(params)?;
        api.describe_zones()
            .await
            .map_err(|err| remote_failure("describe_zones", err))
    }

    /// Lists instances matching `selector`. An empty selector lists every
    /// instance.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Configuration`] when connecting fails and
    /// [`Ec2Error::Remote`] when the provider rejects the query.
    pub async fn find_instances(
        &self,
        selector: &Selector,
        params: &ConnectionParams,
    ) -> Result<Matches<Instance>, Ec2Error> {
        let api = self.connector.connect(params)?;
        finder::find_instances(&api, selector, &FilterSet::new()).await
    }

    /// Returns the identifier of the instance carrying `name` and `tags`.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::AmbiguousSelector`] when several instances match,
    /// plus the errors of [`Ec2Module::find_instances`].
    pub async fn get_id(
        &self,
        name: Option<&str>,
        tags: &Tags,
        params: &ConnectionParams,
    ) -> Result<Option<InstanceId>, Ec2Error> {
        let selector = Selector {
            id: None,
            name: name.map(str::to_owned),
            tags: tags.clone(),
        };
        match self.find_instances(&selector, params).await? {
            Matches::None => {
                warn!(%selector, "could not find instance");
                Ok(None)
            }
            Matches::One(instance) => {
                info!(%selector, instance_id = %instance.id, "instance found");
                Ok(Some(instance.id))
            }
            many @ Matches::Many(_) => many
                .into_unique(ResourceClass::Instance, &selector)
                .map(|instance| Some(instance.id)),
        }
    }

    /// Returns true when at least one instance matches `selector`.
    ///
    /// Always connects with default parameters: no region, credential, or
    /// profile hint is forwarded, so the lookup runs against the process
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Configuration`] when connecting fails and
    /// [`Ec2Error::Remote`] when the provider rejects the query.
    pub async fn exists(&self, selector: &Selector) -> Result<bool, Ec2Error> {
        let matches = self
            .find_instances(selector, &ConnectionParams::default())
            .await?;
        if matches.is_empty() {
            warn!(%selector, "instance does not exist");
            Ok(false)
        } else {
            info!(%selector, "instance exists");
            Ok(true)
        }
    }

    /// Terminates the single instance matching `selector`.
    ///
    /// Returns `Ok(false)` without terminating anything when the selector
    /// matches no instance or more than one.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] for an empty selector,
    /// [`Ec2Error::Configuration`] when connecting fails, and
    /// [`Ec2Error::Remote`] when the provider rejects a call.
    pub async fn terminate(
        &self,
        selector: &Selector,
        params: &ConnectionParams,
    ) -> Result<bool, Ec2Error> {
        if selector.is_empty() {
            return Err(Ec2Error::validation(
                "an instance id, name, or tags must be specified",
            ));
        }
        let api = self.connector.connect(params)?;
        match finder::find_instances(&api, selector, &FilterSet::new()).await? {
            Matches::One(instance) => {
                api.terminate_instance(&instance.id)
                    .await
                    .map_err(|err| remote_failure("terminate_instance", err))?;
                info!(instance_id = %instance.id, "instance terminated");
                Ok(true)
            }
            Matches::None => {
                warn!(%selector, "no instance to terminate");
                Ok(false)
            }
            Matches::Many(instances) => {
                warn!(
                    %selector,
                    count = instances.len(),
                    "refusing to terminate multiple instances at once"
                );
                Ok(false)
            }
        }
    }

    /// Launches an instance and waits for it to start.
    ///
    /// The name and tags are applied once the instance reports `running`.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::ReservationRefused`] when no capacity is reserved,
    /// [`Ec2Error::StartupFailed`] when the instance settles in another
    /// state, and [`Ec2Error::StartupTimeout`] when it is still pending after
    /// the launch policy's attempts.
    pub async fn run(
        &self,
        request: &LaunchRequest,
        params: &ConnectionParams,
    ) -> Result<InstanceId, Ec2Error> {
        if request.image_id.is_empty() {
            return Err(Ec2Error::validation("image_id must be specified"));
        }
        let api = self.connector.connect(params)?;
        let spec = LaunchSpec {
            image_id: request.image_id.clone(),
            instance_type: request
                .instance_type
                .clone()
                .unwrap_or_else(|| self.default_instance_type.clone()),
            key_name: request.key_name.clone(),
            security_groups: request.security_groups.clone(),
            user_data: request.user_data.clone(),
            placement: request.placement.clone(),
        };

        let reservation = api
            .run_instances(&spec)
            .await
            .map_err(|err| remote_failure("run_instances", err))?;
        let Some(instance) = reservation.and_then(|found| found.instances.into_iter().next())
        else {
            warn!(image_id = %request.image_id, "instances could not be reserved");
            return Err(Ec2Error::ReservationRefused {
                image_id: request.image_id.to_string(),
            });
        };

        wait_until_started(&api, &instance.id, self.launch).await?;

        let tags = request.tags_after_start();
        if !tags.is_empty() {
            api.create_tags(&instance.id, &tags)
                .await
                .map_err(|err| remote_failure("create_tags", err))?;
        }
        info!(instance_id = %instance.id, "instance running");
        Ok(instance.id)
    }

    /// Reads one attribute of the targeted instance.
    ///
    /// An attribute the provider does not report yields an empty record.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] for an unknown attribute before any
    /// remote call, [`Ec2Error::NotFound`] or [`Ec2Error::AmbiguousSelector`]
    /// when a name does not identify exactly one instance, and
    /// [`Ec2Error::Remote`] when the provider rejects a call.
    pub async fn get_attribute(
        &self,
        attribute: &str,
        target: &InstanceTarget,
        params: &ConnectionParams,
    ) -> Result<AttributeRecord, Ec2Error> {
        let parsed: InstanceAttribute = attribute.parse()?;
        let api = self.connector.connect(params)?;
        let instance_id = resolve_instance(&api, target).await?;
        let response = api
            .get_instance_attribute(&instance_id, parsed)
            .await
            .map_err(|err| remote_failure("get_instance_attribute", err))?;
        Ok(project_attribute(parsed, &response))
    }

    /// Changes one attribute of the targeted instance.
    ///
    /// # Errors
    ///
    /// Same as [`Ec2Module::get_attribute`].
    pub async fn set_attribute(
        &self,
        attribute: &str,
        value: &Value,
        target: &InstanceTarget,
        params: &ConnectionParams,
    ) -> Result<bool, Ec2Error> {
        let parsed: InstanceAttribute = attribute.parse()?;
        let api = self.connector.connect(params)?;
        let instance_id = resolve_instance(&api, target).await?;
        api.modify_instance_attribute(&instance_id, parsed, value)
            .await
            .map_err(|err| remote_failure("modify_instance_attribute", err))
    }
}

async fn resolve_instance<A>(api: &A, target: &InstanceTarget) -> Result<InstanceId, Ec2Error>
where
    A: Ec2Api + ?Sized,
{
    match target {
        InstanceTarget::Id(instance_id) => Ok(instance_id.clone()),
        InstanceTarget::Name(name) => {
            let selector = Selector::by_name(name.as_str());
            finder::find_instances(api, &selector, &FilterSet::new())
                .await?
                .into_unique(ResourceClass::Instance, &selector)
                .map(|instance| instance.id)
        }
    }
}
