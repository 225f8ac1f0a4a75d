//! Connection parameter resolution and client construction.
//!
//! Every operation receives [`ConnectionParams`]. A [`Connector`] turns them
//! into a region-bound [`Ec2Api`] client; [`resolve_settings`] holds the
//! precedence rules so connectors only build clients.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use tracing::debug;

use crate::api::Ec2Api;
use crate::config::Ec2Config;
use crate::error::Ec2Error;

/// Region used when no other source names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Region, credential, and profile hints supplied with a call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConnectionParams {
    /// Region name.
    pub region: Option<String>,
    /// Secret access key.
    pub key: Option<String>,
    /// Access key identifier.
    pub keyid: Option<String>,
    /// Profile supplying any values not given explicitly.
    pub profile: Option<Profile>,
}

impl ConnectionParams {
    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets static credentials.
    #[must_use]
    pub fn with_credentials(mut self, keyid: impl Into<String>, key: impl Into<String>) -> Self {
        self.keyid = Some(keyid.into());
        self.key = Some(key.into());
        self
    }

    /// Sets the profile.
    #[must_use]
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = Some(profile);
        self
    }
}

/// Profile reference: a name to look up, or the settings themselves.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Profile {
    /// Named profile resolved through a [`ProfileSource`].
    Named(String),
    /// Settings supplied inline.
    Inline(ProfileSettings),
}

/// Values a profile may provide.
#[derive(Clone, Default, Deserialize, Eq, PartialEq)]
pub struct ProfileSettings {
    /// Region name.
    pub region: Option<String>,
    /// Secret access key.
    pub key: Option<String>,
    /// Access key identifier.
    pub keyid: Option<String>,
}

impl fmt::Debug for ProfileSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileSettings")
            .field("region", &self.region)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("keyid", &self.keyid)
            .finish()
    }
}

/// Lookup of named profiles.
pub trait ProfileSource {
    /// Returns the settings stored under `name`.
    fn profile(&self, name: &str) -> Option<ProfileSettings>;
}

impl ProfileSource for BTreeMap<String, ProfileSettings> {
    fn profile(&self, name: &str) -> Option<ProfileSettings> {
        self.get(name).cloned()
    }
}

/// Process-wide fallbacks, normally taken from [`Ec2Config`].
#[derive(Clone, Default, Eq, PartialEq)]
pub struct ConnectionDefaults {
    /// Region name.
    pub region: Option<String>,
    /// Secret access key.
    pub key: Option<String>,
    /// Access key identifier.
    pub keyid: Option<String>,
}

impl fmt::Debug for ConnectionDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDefaults")
            .field("region", &self.region)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("keyid", &self.keyid)
            .finish()
    }
}

impl From<&Ec2Config> for ConnectionDefaults {
    fn from(config: &Ec2Config) -> Self {
        Self {
            region: Some(config.region.clone()),
            key: config.key.clone(),
            keyid: config.keyid.clone(),
        }
    }
}

/// Credentials a client authenticates with.
#[derive(Clone, Eq, PartialEq)]
pub enum Credentials {
    /// Explicit access key pair.
    Static {
        /// Access key identifier.
        keyid: String,
        /// Secret access key.
        key: String,
    },
    /// Credentials discovered by the client (instance role, environment).
    Ambient,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static { keyid, .. } => f
                .debug_struct("Static")
                .field("keyid", keyid)
                .field("key", &"<redacted>")
                .finish(),
            Self::Ambient => f.write_str("Ambient"),
        }
    }
}

/// Fully resolved connection settings.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedConnection {
    /// Region the client is bound to.
    pub region: String,
    /// Credentials to authenticate with.
    pub credentials: Credentials,
}

/// Resolves call parameters against the profile and process defaults.
///
/// Precedence is explicit values, then the profile, then `defaults`, then
/// [`DEFAULT_REGION`] for the region.
///
/// # Errors
///
/// Returns [`Ec2Error::Configuration`] when a named profile is unknown or
/// when only one half of a key pair resolves.
pub fn resolve_settings<P>(
    defaults: &ConnectionDefaults,
    profiles: &P,
    params: &ConnectionParams,
) -> Result<ResolvedConnection, Ec2Error>
where
    P: ProfileSource + ?Sized,
{
    let profile = match &params.profile {
        None => ProfileSettings::default(),
        Some(Profile::Inline(settings)) => settings.clone(),
        Some(Profile::Named(name)) => profiles
            .profile(name)
            .ok_or_else(|| Ec2Error::Configuration(format!("unknown profile {name:?}")))?,
    };

    let region = pick(
        params.region.as_deref(),
        profile.region.as_deref(),
        defaults.region.as_deref(),
    )
    .unwrap_or_else(|| DEFAULT_REGION.to_owned());
    let secret = pick(
        params.key.as_deref(),
        profile.key.as_deref(),
        defaults.key.as_deref(),
    );
    let access_key_id = pick(
        params.keyid.as_deref(),
        profile.keyid.as_deref(),
        defaults.keyid.as_deref(),
    );

    let credentials = match (access_key_id, secret) {
        (Some(keyid), Some(key)) => Credentials::Static { keyid, key },
        (None, None) => Credentials::Ambient,
        (Some(_), None) => {
            return Err(Ec2Error::Configuration(String::from(
                "keyid is set but key is missing",
            )));
        }
        (None, Some(_)) => {
            return Err(Ec2Error::Configuration(String::from(
                "key is set but keyid is missing",
            )));
        }
    };

    Ok(ResolvedConnection {
        region,
        credentials,
    })
}

fn pick(explicit: Option<&str>, profile: Option<&str>, fallback: Option<&str>) -> Option<String> {
    explicit
        .or(profile)
        .or(fallback)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_owned)
}

/// Produces a region-bound client for each call.
pub trait Connector: Send + Sync {
    /// Client type produced by this connector.
    type Api: Ec2Api;

    /// Builds a client for `params`. Handles are never cached.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Configuration`] when no usable region or
    /// credentials can be determined.
    fn connect(&self, params: &ConnectionParams) -> Result<Self::Api, Ec2Error>;
}

/// Builds a client from resolved settings.
pub trait ClientFactory: Send + Sync {
    /// Client type produced by this factory.
    type Api: Ec2Api;

    /// Builds a client.
    ///
    /// # Errors
    ///
    /// Returns [`Ec2Error::Configuration`] when the transport rejects the
    /// settings.
    fn build(&self, connection: &ResolvedConnection) -> Result<Self::Api, Ec2Error>;
}

/// [`Connector`] applying [`resolve_settings`] before delegating to a
/// [`ClientFactory`].
#[derive(Clone, Debug)]
pub struct ConfiguredConnector<F, P = BTreeMap<String, ProfileSettings>> {
    factory: F,
    defaults: ConnectionDefaults,
    profiles: P,
}

impl<F, P> ConfiguredConnector<F, P> {
    /// Creates a connector from a factory, defaults, and named profiles.
    #[must_use]
    pub const fn new(factory: F, defaults: ConnectionDefaults, profiles: P) -> Self {
        Self {
            factory,
            defaults,
            profiles,
        }
    }

    /// Returns the client factory.
    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }
}

impl<F, P> Connector for ConfiguredConnector<F, P>
where
    F: ClientFactory,
    P: ProfileSource + Send + Sync,
{
    type Api = F::Api;

    fn connect(&self, params: &ConnectionParams) -> Result<Self::Api, Ec2Error> {
        let resolved = resolve_settings(&self.defaults, &self.profiles, params)?;
        debug!(region = %resolved.region, credentials = ?resolved.credentials, "connecting");
        self.factory.build(&resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn profiles() -> BTreeMap<String, ProfileSettings> {
        BTreeMap::from([(
            String::from("prod"),
            ProfileSettings {
                region: Some(String::from("eu-west-1")),
                key: Some(String::from("prod-secret")),
                keyid: Some(String::from("AKIAPROD")),
            },
        )])
    }

    #[rstest]
    fn defaults_to_us_east_1_with_ambient_credentials(
        profiles: BTreeMap<String, ProfileSettings>,
    ) {
        let resolved = resolve_settings(
            &ConnectionDefaults::default(),
            &profiles,
            &ConnectionParams::default(),
        )
        .expect("empty params should resolve");

        assert_eq!(resolved.region, DEFAULT_REGION);
        assert_eq!(resolved.credentials, Credentials::Ambient);
    }

    #[rstest]
    fn explicit_values_override_profile(profiles: BTreeMap<String, ProfileSettings>) {
        let params = ConnectionParams::default()
            .with_region("ap-south-1")
            .with_profile(Profile::Named(String::from("prod")));

        let resolved = resolve_settings(&ConnectionDefaults::default(), &profiles, &params)
            .expect("profile should resolve");

        assert_eq!(resolved.region, "ap-south-1");
        assert_eq!(
            resolved.credentials,
            Credentials::Static {
                keyid: String::from("AKIAPROD"),
                key: String::from("prod-secret"),
            }
        );
    }

    #[rstest]
    fn profile_overrides_process_defaults(profiles: BTreeMap<String, ProfileSettings>) {
        let defaults = ConnectionDefaults {
            region: Some(String::from("us-west-2")),
            ..ConnectionDefaults::default()
        };
        let params = ConnectionParams::default().with_profile(Profile::Inline(ProfileSettings {
            region: Some(String::from("sa-east-1")),
            ..ProfileSettings::default()
        }));

        let resolved =
            resolve_settings(&defaults, &profiles, &params).expect("inline profile resolves");
        assert_eq!(resolved.region, "sa-east-1");
    }

    #[rstest]
    fn unknown_named_profile_is_a_configuration_error(
        profiles: BTreeMap<String, ProfileSettings>,
    ) {
        let params = ConnectionParams::default().with_profile(Profile::Named(String::from("dev")));
        let err = resolve_settings(&ConnectionDefaults::default(), &profiles, &params)
            .expect_err("unknown profile should fail");
        assert!(matches!(err, Ec2Error::Configuration(ref message) if message.contains("dev")));
    }

    #[rstest]
    #[case(Some("AKIA"), None)]
    #[case(None, Some("secret"))]
    fn half_a_key_pair_is_rejected(
        profiles: BTreeMap<String, ProfileSettings>,
        #[case] keyid: Option<&str>,
        #[case] key: Option<&str>,
    ) {
        let params = ConnectionParams {
            keyid: keyid.map(str::to_owned),
            key: key.map(str::to_owned),
            ..ConnectionParams::default()
        };
        let err = resolve_settings(&ConnectionDefaults::default(), &profiles, &params)
            .expect_err("half a key pair should fail");
        assert!(matches!(err, Ec2Error::Configuration(_)));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let credentials = Credentials::Static {
            keyid: String::from("AKIA"),
            key: String::from("top-secret"),
        };
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("AKIA"));
        assert!(!rendered.contains("top-secret"));
    }
}
