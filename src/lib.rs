//! Execution-time adapter for a cloud compute provider.
//!
//! The crate exposes instance, image, key-pair, and network-interface
//! operations through [`Ec2Module`]. Each operation resolves a connection,
//! narrows a human-supplied selector down to the resources it names, and
//! refuses to mutate anything unless exactly one resource matches.
//!
//! The provider's RPC surface sits behind [`api::Ec2Api`]; subnet and
//! security-group lookups owned by other modules are injected through the
//! [`collaborators`] traits.

pub mod api;
pub mod collaborators;
pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod finder;
pub mod module;
pub mod profiles;
pub mod projection;
pub mod test_support;
pub mod types;

pub use api::{Ec2Api, RemoteError};
pub use collaborators::{SecurityGroupResolver, SubnetAssociation, SubnetResolver};
pub use config::{ConfigError, Ec2Config};
pub use connection::{
    ClientFactory, ConfiguredConnector, ConnectionDefaults, ConnectionParams, Connector,
    Credentials, Profile, ProfileSettings, ResolvedConnection,
};
pub use envelope::{Envelope, ErrorBody};
pub use error::Ec2Error;
pub use finder::{ImageSelector, Matches, ResourceClass, Selector};
pub use module::{
    CreateInterfaceRequest, DetachTarget, Ec2Module, ImageOptions, InstanceTarget,
    InterfaceTarget, LaunchPolicy, LaunchRequest,
};
pub use profiles::{ProfileError, ProfileFile, Profiles};
pub use projection::{AttributeRecord, InstanceAttribute, NetworkInterfaceDescription};
pub use types::{FilterSet, FilterValue, Tags};
