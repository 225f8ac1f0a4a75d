//! Image creation and lookup.

use tracing::info;

use crate::api::{Ec2Api, Image, ImageSpec};
use crate::connection::{ConnectionParams, Connector};
use crate::error::Ec2Error;
use crate::finder::{self, ImageSelector, Matches, ResourceClass, Selector};
use crate::types::{FilterSet, ImageId};

use super::{Ec2Module, remote_failure};

/// Options for [`Ec2Module::create_image`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImageOptions {
    /// Name of the new image.
    pub name: String,
    /// Image description.
    pub description: Option<String>,
    /// Skip rebooting the source instance.
    pub no_reboot: bool,
    /// Validate the request without creating anything.
    pub dry_run: bool,
}

impl ImageOptions {
    /// Creates options for an image called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl<C, S, G> Ec2Module<C, S, G>
where
    C: Connector,
{
    /// Snapshots the single instance matching `source` into a new image.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Validation`] for a blank image name or empty
    /// selector, [`Ec2Error::NotFound`] or [`Ec2Error::AmbiguousSelector`]
    /// unless exactly one instance matches, and [`Ec2Error::Remote`] when
    /// the provider rejects a call.
    pub async fn create_image(
        &self,
        options: &ImageOptions,
        source: &Selector,
        params: &ConnectionParams,
    ) -> Result<ImageId, Ec2Error> {
        if options.name.trim().is_empty() {
            return Err(Ec2Error::validation("an image name must be specified"));
        }
        if source.is_empty() {
            return Err(Ec2Error::validation(
                "a source instance id, name, or tags must be specified",
            ));
        }

        let api = self.connector.connect(params)?;
        let instance = finder::find_instances(&api, source, &FilterSet::new())
            .await?
            .into_unique(ResourceClass::Instance, source)?;
        let spec = ImageSpec {
            name: options.name.clone(),
            description: options.description.clone(),
            no_reboot: options.no_reboot,
            dry_run: options.dry_run,
        };
        let image_id = api
            .create_image(&instance.id, &spec)
            .await
            .map_err(|err| remote_failure("create_image", err))?;
        info!(%image_id, instance_id = %instance.id, "image requested");
        Ok(image_id)
    }

    /// Lists images matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Configuration`] when connecting fails and
    /// [`Ec2Error::Remote`] when the provider rejects the query.
    pub async fn find_images(
        &self,
        selector: &ImageSelector,
        params: &ConnectionParams,
    ) -> Result<Matches<Image>, Ec2Error> {
        let api = self.connector.connect(params)?;
        finder::find_images(&api, selector).await
    }
}
