//! Resource lookup by identifier, `Name` tag, and arbitrary tags.
//!
//! Lookups issue exactly one list query and report what came back as
//! [`Matches`]. Turning matches into the single resource a mutation needs is
//! [`Matches::into_unique`]'s job; nothing here mutates remote state.

use std::fmt;

use tracing::{debug, error};

use crate::api::{Ec2Api, Image, Instance, KeyPair, NetworkInterface};
use crate::error::Ec2Error;
use crate::types::{FilterSet, ImageId, InstanceId, NetworkInterfaceId, ResourceRef, Tags};

/// Kind of remote resource a selector is resolved against.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ResourceClass {
    /// Compute instance.
    Instance,
    /// Machine image.
    Image,
    /// Elastic network interface.
    NetworkInterface,
    /// SSH key pair.
    KeyPair,
}

impl ResourceClass {
    /// Filter key carrying an identifier of this class.
    #[must_use]
    pub const fn id_filter(self) -> &'static str {
        match self {
            Self::Instance => "instance_ids",
            Self::Image => "image_ids",
            Self::NetworkInterface => "network_interface_ids",
            Self::KeyPair => "key_names",
        }
    }

    /// Filter key carrying the human-readable name of this class.
    ///
    /// Images match on their image name rather than the `Name` tag, and key
    /// pairs are identified by name.
    #[must_use]
    pub const fn name_filter(self) -> &'static str {
        match self {
            Self::Instance | Self::NetworkInterface => "tag:Name",
            Self::Image => "name",
            Self::KeyPair => "key_names",
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Instance => "instance",
            Self::Image => "image",
            Self::NetworkInterface => "network interface",
            Self::KeyPair => "key pair",
        })
    }
}

/// Identifier, name, and tag criteria locating remote resources.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Selector {
    /// Provider identifier.
    pub id: Option<String>,
    /// Name (`Name` tag, image name, or key name depending on the class).
    pub name: Option<String>,
    /// Additional tags that must all match.
    pub tags: Tags,
}

impl Selector {
    /// Selects by identifier.
    #[must_use]
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Selects by name.
    #[must_use]
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Selects by tags.
    #[must_use]
    pub fn by_tags(tags: Tags) -> Self {
        Self {
            tags,
            ..Self::default()
        }
    }

    /// Adds a tag criterion.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Returns true when the selector carries no criteria at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.tags.is_empty()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(id) = &self.id {
            parts.push(format!("id={id}"));
        }
        if let Some(name) = &self.name {
            parts.push(format!("name={name}"));
        }
        parts.extend(
            self.tags
                .iter()
                .map(|(key, value)| format!("tag:{key}={value}")),
        );
        if parts.is_empty() {
            f.write_str("<any>")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

/// Image lookup criteria.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImageSelector {
    /// Image name.
    pub name: Option<String>,
    /// Accounts allowed to launch the image (`self`, `all`, account ids).
    pub executable_by: Vec<String>,
    /// Image owners (`self`, `amazon`, account ids).
    pub owners: Vec<String>,
    /// Explicit image identifiers.
    pub image_ids: Vec<String>,
    /// Tags that must all match.
    pub tags: Tags,
}

impl ImageSelector {
    /// Returns the generic part of the criteria.
    #[must_use]
    pub fn selector(&self) -> Selector {
        Selector {
            id: None,
            name: self.name.clone(),
            tags: self.tags.clone(),
        }
    }

    /// Returns the image-only filters.
    #[must_use]
    pub fn extra_filters(&self) -> FilterSet {
        let mut filters = FilterSet::new();
        for (key, values) in [
            ("executable_by", &self.executable_by),
            ("owners", &self.owners),
            ("image_ids", &self.image_ids),
        ] {
            if !values.is_empty() {
                filters.insert(key, values.clone());
            }
        }
        filters
    }
}

impl fmt::Display for ImageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let extra = self.extra_filters();
        if extra.is_empty() {
            write!(f, "{}", self.selector())
        } else {
            write!(f, "{} {extra}", self.selector())
        }
    }
}

/// Builds the provider filter set for `selector` against `class`.
#[must_use]
pub fn build_filters(class: ResourceClass, selector: &Selector, extra: &FilterSet) -> FilterSet {
    let mut filters = FilterSet::new();
    if let Some(id) = &selector.id {
        filters.insert(class.id_filter(), vec![id.clone()]);
    }
    if let Some(name) = &selector.name {
        filters.insert(class.name_filter(), name.as_str());
    }
    for (key, value) in &selector.tags {
        filters.insert(format!("tag:{key}"), value.as_str());
    }
    filters.merge(extra);
    filters
}

/// Resources that expose a provider identifier.
pub trait Identified {
    /// Identifier type.
    type Id: Clone + AsRef<str>;

    /// Returns the provider identifier.
    fn resource_id(&self) -> &Self::Id;

    /// Human-facing label, usually the `Name` tag.
    fn label(&self) -> Option<&str> {
        None
    }

    /// Identifier and label, for logs and error reports.
    fn resource_ref(&self) -> ResourceRef {
        ResourceRef::new(self.resource_id().as_ref(), self.label().map(str::to_owned))
    }
}

impl Identified for Instance {
    type Id = InstanceId;

    fn resource_id(&self) -> &Self::Id {
        &self.id
    }

    fn label(&self) -> Option<&str> {
        self.name()
    }
}

impl Identified for Image {
    type Id = ImageId;

    fn resource_id(&self) -> &Self::Id {
        &self.id
    }

    fn label(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Identified for NetworkInterface {
    type Id = NetworkInterfaceId;

    fn resource_id(&self) -> &Self::Id {
        &self.id
    }

    fn label(&self) -> Option<&str> {
        self.name()
    }
}

impl Identified for KeyPair {
    type Id = String;

    fn resource_id(&self) -> &Self::Id {
        &self.name
    }
}

/// Outcome of a lookup: nothing, exactly one resource, or several.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Matches<T> {
    /// Nothing matched.
    None,
    /// Exactly one resource matched.
    One(T),
    /// Two or more resources matched.
    Many(Vec<T>),
}

impl<T> Matches<T> {
    /// Classifies a provider listing.
    #[must_use]
    pub fn from_vec(mut items: Vec<T>) -> Self {
        match items.len() {
            0 => Self::None,
            1 => items.pop().map_or(Self::None, Self::One),
            _ => Self::Many(items),
        }
    }

    /// Number of matches.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    /// Returns true when nothing matched.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns every match in provider order.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::None => Vec::new(),
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }

    /// Borrows every match in provider order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        match self {
            Self::None => &[],
            Self::One(item) => std::slice::from_ref(item),
            Self::Many(items) => items,
        }
    }

    /// Reduces the matches to the single resource a mutation may act on.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::NotFound`] when nothing matched and
    /// [`Ec2Error::AmbiguousSelector`] when several resources did.
    pub fn into_unique(
        self,
        class: ResourceClass,
        selector: &impl fmt::Display,
    ) -> Result<T, Ec2Error> {
        match self {
            Self::One(item) => Ok(item),
            Self::None => Err(Ec2Error::NotFound {
                class,
                selector: selector.to_string(),
            }),
            Self::Many(items) => Err(Ec2Error::AmbiguousSelector {
                class,
                selector: selector.to_string(),
                count: items.len(),
            }),
        }
    }
}

impl<T: Identified> Matches<T> {
    /// Returns the identifiers of every match.
    #[must_use]
    pub fn ids(&self) -> Vec<T::Id> {
        self.as_slice()
            .iter()
            .map(|item| item.resource_id().clone())
            .collect()
    }

    /// Returns an identifier and label for every match.
    #[must_use]
    pub fn refs(&self) -> Vec<ResourceRef> {
        self.as_slice().iter().map(Identified::resource_ref).collect()
    }
}

fn log_remote(class: ResourceClass, filters: &FilterSet, err: Ec2Error) -> Ec2Error {
    error!(%class, %filters, error = %err, "lookup failed");
    err
}

/// Lists instances matching `selector` plus `extra` filters.
///
/// # Errors
///
/// Returns [`Ec2Error::Remote`] when the provider rejects the query.
pub async fn find_instances<A>(
    api: &A,
    selector: &Selector,
    extra: &FilterSet,
) -> Result<Matches<Instance>, Ec2Error>
where
    A: Ec2Api + ?Sized,
{
    let class = ResourceClass::Instance;
    let filters = build_filters(class, selector, extra);
    let reservations = api
        .describe_instances(&filters)
        .await
        .map_err(|err| log_remote(class, &filters, err.into()))?;
    let found = Matches::from_vec(
        reservations
            .into_iter()
            .flat_map(|reservation| reservation.instances)
            .collect(),
    );
    debug!(%filters, matches = ?found.refs(), "instance lookup");
    Ok(found)
}

/// Lists images matching `selector`.
///
/// # Errors
///
/// Returns [`Ec2Error::Remote`] when the provider rejects the query.
pub async fn find_images<A>(api: &A, selector: &ImageSelector) -> Result<Matches<Image>, Ec2Error>
where
    A: Ec2Api + ?Sized,
{
    let class = ResourceClass::Image;
    let filters = build_filters(class, &selector.selector(), &selector.extra_filters());
    let images = api
        .describe_images(&filters)
        .await
        .map_err(|err| log_remote(class, &filters, err.into()))?;
    let found = Matches::from_vec(images);
    debug!(%filters, matches = ?found.refs(), "image lookup");
    Ok(found)
}

/// Lists network interfaces matching `selector`.
///
/// # Errors
///
/// Returns [`Ec2Error::Remote`] when the provider rejects the query.
pub async fn find_network_interfaces<A>(
    api: &A,
    selector: &Selector,
) -> Result<Matches<NetworkInterface>, Ec2Error>
where
    A: Ec2Api + ?Sized,
{
    let class = ResourceClass::NetworkInterface;
    let filters = build_filters(class, selector, &FilterSet::new());
    let interfaces = api
        .describe_network_interfaces(&filters)
        .await
        .map_err(|err| log_remote(class, &filters, err.into()))?;
    let found = Matches::from_vec(interfaces);
    debug!(%filters, matches = ?found.refs(), "network interface lookup");
    Ok(found)
}
