//! Identifier newtypes, tag maps, and filter sets shared across the adapter.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Human-assigned tags attached to a remote resource.
pub type Tags = BTreeMap<String, String>;

/// Tag key holding a resource's human-readable name.
pub const NAME_TAG: &str = "Name";

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a provider identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Provider identifier of a compute instance (`i-…`).
    InstanceId
);
identifier!(
    /// Provider identifier of a machine image (`ami-…`).
    ImageId
);
identifier!(
    /// Provider identifier of an elastic network interface (`eni-…`).
    NetworkInterfaceId
);
identifier!(
    /// Provider identifier of an interface attachment (`eni-attach-…`).
    AttachmentId
);
identifier!(
    /// Provider identifier of a subnet (`subnet-…`).
    SubnetId
);
identifier!(
    /// Provider identifier of a VPC (`vpc-…`).
    VpcId
);
identifier!(
    /// Provider identifier of a security group (`sg-…`).
    GroupId
);

/// Opaque remote identifier plus the optional `Name` tag.
///
/// Identity is the remote identifier alone; the name is a mutable,
/// non-unique label.
#[derive(Clone, Debug, Serialize)]
pub struct ResourceRef {
    /// Provider identifier.
    pub id: String,
    /// Value of the `Name` tag, when set.
    pub name: Option<String>,
}

impl ResourceRef {
    /// Creates a reference from an identifier and optional name.
    #[must_use]
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }
}

impl PartialEq for ResourceRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ResourceRef {}

/// Value side of a filter entry.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// A single value.
    One(String),
    /// Any of several values.
    Many(Vec<String>),
}

impl FilterValue {
    /// Returns the values as a slice-like list.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::One(value) => vec![value.as_str()],
            Self::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Returns true when `candidate` equals any of the values.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.values().contains(&candidate)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_owned())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl From<Vec<String>> for FilterValue {
    fn from(values: Vec<String>) -> Self {
        Self::Many(values)
    }
}

/// Provider-defined filters keyed by filter name (`tag:Name`, `owners`, …).
///
/// Keys are not validated client side; the provider rejects unknown ones.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FilterSet(BTreeMap<String, FilterValue>);

impl FilterSet {
    /// Creates an empty filter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a filter entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style variant of [`FilterSet::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Returns the value registered for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.0.get(key)
    }

    /// Copies every entry of `other` into this set, replacing duplicates.
    pub fn merge(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no filters are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FilterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .iter()
            .map(|(key, value)| format!("{key}={}", value.values().join(",")))
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&rendered)
    }
}
