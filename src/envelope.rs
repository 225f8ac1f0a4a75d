//! Uniform `{result}` / `{error}` wrapper returned by network-interface
//! operations.

use serde::{Deserialize, Serialize};

use crate::error::Ec2Error;
use crate::finder::ResourceClass;

/// Error payload carried by [`Envelope::Error`].
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorBody {
    /// Human-readable failure description.
    pub message: String,
}

impl ErrorBody {
    /// Creates an error body from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<Ec2Error> for ErrorBody {
    fn from(value: Ec2Error) -> Self {
        match value {
            Ec2Error::Remote(remote) => remote.to_body(),
            Ec2Error::NotFound {
                class: ResourceClass::NetworkInterface,
                ..
            } => Self::new("No ENIs found."),
            Ec2Error::AmbiguousSelector {
                class: ResourceClass::NetworkInterface,
                ..
            } => Self::new("Name specified is tagged on multiple ENIs."),
            Ec2Error::DuplicateName {
                class: ResourceClass::NetworkInterface,
                ..
            } => Self::new("An ENI with this Name tag already exists."),
            other => Self::new(other.to_string()),
        }
    }
}

/// Success or failure of a network-interface operation.
///
/// Serialises as `{"result": …}` or `{"error": {"message": …}}`; exactly one
/// key is ever present.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Envelope<T> {
    /// Operation succeeded.
    Result(T),
    /// Operation failed.
    Error(ErrorBody),
}

impl<T> Envelope<T> {
    /// Wraps a failure message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorBody::new(message))
    }

    /// Returns true for [`Envelope::Result`].
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Result(_))
    }

    /// Returns the success value, if any.
    #[must_use]
    pub fn result(self) -> Option<T> {
        match self {
            Self::Result(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    /// Returns the error body, if any.
    #[must_use]
    pub const fn error_body(&self) -> Option<&ErrorBody> {
        match self {
            Self::Result(_) => None,
            Self::Error(body) => Some(body),
        }
    }

    /// Converts into a standard `Result`.
    ///
    /// # Errors
    ///
    /// Returns the [`ErrorBody`] of an [`Envelope::Error`].
    pub fn into_result(self) -> Result<T, ErrorBody> {
        match self {
            Self::Result(value) => Ok(value),
            Self::Error(body) => Err(body),
        }
    }
}

impl<T> From<Result<T, Ec2Error>> for Envelope<T> {
    fn from(value: Result<T, Ec2Error>) -> Self {
        match value {
            Ok(result) => Self::Result(result),
            Err(err) => Self::Error(ErrorBody::from(err)),
        }
    }
}
