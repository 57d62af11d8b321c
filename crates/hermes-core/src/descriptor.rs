//! Operation descriptors.
//!
//! Units declare the operations they expose as compact `"verb=name"` strings.
//! A bare `"name"` is exposed under [`Verb::Post`].

use std::fmt;
use std::str::FromStr;

use http::Method;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between verb and operation name.
pub const VERB_SEPARATOR: char = '=';

/// HTTP verb bucket an operation is exposed under.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    /// `GET`
    Get,
    /// `POST`
    #[default]
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
    /// `PATCH`
    Patch,
}

impl Verb {
    /// All verbs in declaration order.
    pub const ALL: [Verb; 5] = [Self::Get, Self::Post, Self::Put, Self::Delete, Self::Patch];

    /// Maps an HTTP method to its verb bucket. Methods outside the five
    /// supported verbs have no bucket.
    #[must_use]
    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(Self::Get),
            Method::POST => Some(Self::Post),
            Method::PUT => Some(Self::Put),
            Method::DELETE => Some(Self::Delete),
            Method::PATCH => Some(Self::Patch),
            _ => None,
        }
    }

    /// Lowercase verb name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(Self::Get),
            "post" => Ok(Self::Post),
            "put" => Ok(Self::Put),
            "delete" => Ok(Self::Delete),
            "patch" => Ok(Self::Patch),
            other => Err(DescriptorError::UnknownVerb(other.to_string())),
        }
    }
}

/// Errors from parsing a descriptor string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// The verb part is not one of get/post/put/delete/patch.
    #[error("unknown verb '{0}'")]
    UnknownVerb(String),
    /// The operation name is empty.
    #[error("descriptor '{0}' has an empty operation name")]
    EmptyOperation(String),
}

/// A parsed `"verb=name"` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Verb bucket.
    pub verb: Verb,
    /// Operation name.
    pub operation: String,
}

impl OperationDescriptor {
    /// Creates a descriptor directly.
    #[must_use]
    pub fn new(verb: Verb, operation: impl Into<String>) -> Self {
        Self {
            verb,
            operation: operation.into(),
        }
    }

    /// Parses `"verb=name"` or `"name"`.
    ///
    /// # Example
    ///
    /// ```
    /// use hermes_core::{OperationDescriptor, Verb};
    ///
    /// let d = OperationDescriptor::parse("put=update").unwrap();
    /// assert_eq!(d.verb, Verb::Put);
    /// assert_eq!(d.operation, "update");
    ///
    /// let d = OperationDescriptor::parse("list").unwrap();
    /// assert_eq!(d.verb, Verb::Post);
    /// ```
    pub fn parse(raw: &str) -> Result<Self, DescriptorError> {
        let (verb, name) = match raw.split_once(VERB_SEPARATOR) {
            Some((verb, name)) => (verb.parse()?, name),
            None => (Verb::default(), raw),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(DescriptorError::EmptyOperation(raw.to_string()));
        }
        Ok(Self::new(verb, name))
    }
}

impl FromStr for OperationDescriptor {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.verb, VERB_SEPARATOR, self.operation)
    }
}
