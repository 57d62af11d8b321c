//! Parameter manifests and the signature inspector.
//!
//! Every operation is registered with a [`Signature`]: the text of its single
//! destructured parameter, e.g. `"{ __shortToken, name, address }"`. The
//! inspector turns that text into an ordered list of parameter names. Names
//! that start with the middleware marker become the operation's middleware
//! requirements; everything else is filled from the request body.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Declared parameter text of one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    text: String,
}

impl Signature {
    /// Wraps parameter text such as `"{ __shortToken, name }"` or
    /// `"create({ __device, /* optional */ label })"`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Builds a manifest from a typed list of parameter names.
    #[must_use]
    pub fn from_params<I, S>(params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = params.into_iter().map(|p| p.as_ref().to_string()).collect();
        if names.is_empty() {
            return Self::default();
        }
        Self::new(format!("{{ {} }}", names.join(", ")))
    }

    /// An operation that takes no declared parameters.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Raw manifest text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl From<&str> for Signature {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Signature {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// An exposed operation has no registered callable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("An exposed function not found: {unit}.{operation}")]
pub struct MissingCallableError {
    /// Unit name.
    pub unit: String,
    /// Operation name.
    pub operation: String,
}

fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/|//[^\n]*").expect("valid regex"))
}

/// Extracts ordered parameter names from an operation's manifest.
///
/// `None` means the unit exposes `unit.operation` without registering it.
///
/// # Example
///
/// ```
/// use hermes_router::signature::{inspect, Signature};
///
/// let sig = Signature::new("{ __shortToken, name, // trailing note\n address }");
/// let params = inspect("school", "create", Some(&sig)).unwrap();
/// assert_eq!(params, ["__shortToken", "name", "address"]);
/// ```
pub fn inspect(
    unit: &str,
    operation: &str,
    signature: Option<&Signature>,
) -> Result<Vec<String>, MissingCallableError> {
    let signature = signature.ok_or_else(|| MissingCallableError {
        unit: unit.to_string(),
        operation: operation.to_string(),
    })?;
    Ok(parse_params(signature.text()))
}

fn parse_params(text: &str) -> Vec<String> {
    let stripped = comment_pattern().replace_all(text, "");
    let stripped: &str = stripped.as_ref();
    let params = match stripped.find('(') {
        Some(open) => {
            let rest = &stripped[open + 1..];
            rest.find(')').map_or(rest, |close| &rest[..close])
        }
        None => stripped,
    };

    params
        .split(',')
        .flat_map(|segment| {
            let cleaned: String = segment.chars().filter(|c| !matches!(c, '{' | '}' | '/')).collect();
            // `name = default` and `name: alias` both bind `name`.
            let name = cleaned
                .split(|c| c == '=' || c == ':')
                .next()
                .unwrap_or_default()
                .to_string();
            name.split_whitespace()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(text: &str) -> Vec<String> {
        inspect("unit", "op", Some(&Signature::new(text))).unwrap()
    }

    #[test]
    fn test_destructured_parameter() {
        assert_eq!(
            names("{ __shortToken, name, address }"),
            ["__shortToken", "name", "address"]
        );
    }

    #[test]
    fn test_function_style_text() {
        assert_eq!(
            names("async create({ __longToken, __device }) { return 1 }"),
            ["__longToken", "__device"]
        );
    }

    #[test]
    fn test_comments_are_stripped() {
        let text = "{ /* a, b */ __shortToken, // __ghost\n classroomId }";
        assert_eq!(names(text), ["__shortToken", "classroomId"]);
    }

    #[test]
    fn test_defaults_and_aliases_bind_the_name() {
        assert_eq!(
            names("{ username, role = 'student', school: schoolId }"),
            ["username", "role", "school"]
        );
    }

    #[test]
    fn test_empty_manifest_yields_empty_list() {
        assert!(names("").is_empty());
        assert!(names("()").is_empty());
        assert!(names("{ }").is_empty());
    }

    #[test]
    fn test_missing_callable() {
        let err = inspect("school", "explode", None).unwrap_err();
        assert_eq!(err.unit, "school");
        assert_eq!(err.operation, "explode");
        assert!(err.to_string().contains("school.explode"));
    }

    #[test]
    fn test_from_params_round_trips_through_inspector() {
        let sig = Signature::from_params(["__shortToken", "schoolId"]);
        assert_eq!(
            inspect("u", "o", Some(&sig)).unwrap(),
            ["__shortToken", "schoolId"]
        );
        assert_eq!(Signature::from_params(Vec::<String>::new()), Signature::empty());
    }
}
