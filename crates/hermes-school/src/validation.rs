//! Declarative input validation.
//!
//! A [`Schema`] is a list of [`Field`] rules. Validation collects every
//! failing field, rejects keys the schema does not know, fills defaults and
//! returns the normalized object.
//!
//! ```
//! use hermes_school::validation::{Field, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::new()
//!     .field(Field::string("name").required().length(3, 100))
//!     .field(Field::number("capacity").range(1.0, 40.0));
//!
//! let input = json!({ "name": "Room 1" });
//! let valid = schema.validate(input.as_object().unwrap()).unwrap();
//! assert_eq!(valid["name"], "Room 1");
//!
//! let input = json!({ "name": "R", "capacity": 99 });
//! let err = schema.validate(input.as_object().unwrap()).unwrap_err();
//! assert_eq!(err.field_messages().len(), 2);
//! ```

use std::sync::OnceLock;

use hermes_core::{DispatchError, DispatchResult, FieldErrors, JsonMap};
use regex::Regex;
use serde_json::Value;

/// Message of every validation failure. Details are per field.
pub const VALIDATION_FAILED: &str = "Validation failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    Number,
    Object,
}

impl Kind {
    const fn describe(self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Number => "a number",
            Self::Object => "an object",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Object => value.is_object(),
        }
    }
}

/// One field rule.
#[derive(Debug, Clone)]
pub struct Field {
    name: &'static str,
    kind: Kind,
    required: bool,
    min: Option<f64>,
    max: Option<f64>,
    email: bool,
    one_of: &'static [&'static str],
    default: Option<Value>,
    required_message: Option<&'static str>,
    range_message: Option<&'static str>,
    format_message: Option<&'static str>,
}

impl Field {
    fn new(name: &'static str, kind: Kind) -> Self {
        Self {
            name,
            kind,
            required: false,
            min: None,
            max: None,
            email: false,
            one_of: &[],
            default: None,
            required_message: None,
            range_message: None,
            format_message: None,
        }
    }

    /// A string field.
    #[must_use]
    pub fn string(name: &'static str) -> Self {
        Self::new(name, Kind::String)
    }

    /// A numeric field.
    #[must_use]
    pub fn number(name: &'static str) -> Self {
        Self::new(name, Kind::Number)
    }

    /// A JSON object field.
    #[must_use]
    pub fn object(name: &'static str) -> Self {
        Self::new(name, Kind::Object)
    }

    /// Must be present.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Character bounds for strings.
    #[must_use]
    pub fn length(mut self, min: usize, max: usize) -> Self {
        self.min = Some(min as f64);
        self.max = Some(max as f64);
        self
    }

    /// Minimum string length.
    #[must_use]
    pub fn min_length(mut self, min: usize) -> Self {
        self.min = Some(min as f64);
        self
    }

    /// Inclusive numeric bounds.
    #[must_use]
    pub const fn range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Must look like an email address.
    #[must_use]
    pub const fn email(mut self) -> Self {
        self.email = true;
        self
    }

    /// Must be one of these values.
    #[must_use]
    pub const fn one_of(mut self, values: &'static [&'static str]) -> Self {
        self.one_of = values;
        self
    }

    /// Value used when the field is absent.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Message when the field is missing.
    #[must_use]
    pub const fn required_message(mut self, message: &'static str) -> Self {
        self.required_message = Some(message);
        self
    }

    /// Message when a length or numeric bound fails.
    #[must_use]
    pub const fn range_message(mut self, message: &'static str) -> Self {
        self.range_message = Some(message);
        self
    }

    /// Message when the type, email or allowed-value check fails.
    #[must_use]
    pub const fn format_message(mut self, message: &'static str) -> Self {
        self.format_message = Some(message);
        self
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        if !self.kind.matches(value) {
            return Err(self.format_message.map_or_else(
                || format!("{} must be {}", self.name, self.kind.describe()),
                str::to_string,
            ));
        }

        let measured = match value {
            Value::String(s) => Some(s.chars().count() as f64),
            Value::Number(n) => n.as_f64(),
            _ => None,
        };
        if let Some(measured) = measured {
            let below = self.min.is_some_and(|min| measured < min);
            let above = self.max.is_some_and(|max| measured > max);
            if below || above {
                return Err(self
                    .range_message
                    .map_or_else(|| self.default_range_message(), str::to_string));
            }
        }

        if let Value::String(s) = value {
            if self.email && !email_pattern().is_match(s) {
                return Err(self.format_message.map_or_else(
                    || format!("{} must be a valid email", self.name),
                    str::to_string,
                ));
            }
            if !self.one_of.is_empty() && !self.one_of.contains(&s.as_str()) {
                return Err(self.format_message.map_or_else(
                    || format!("{} must be one of: {}", self.name, self.one_of.join(", ")),
                    str::to_string,
                ));
            }
        }
        Ok(())
    }

    fn default_range_message(&self) -> String {
        let unit = if self.kind == Kind::String { " characters" } else { "" };
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("{} must be between {min} and {max}{unit}", self.name),
            (Some(min), None) => format!("{} must be at least {min}{unit}", self.name),
            (None, Some(max)) => format!("{} must be at most {max}{unit}", self.name),
            (None, None) => format!("{} is out of range", self.name),
        }
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid regex"))
}

/// An ordered set of field rules.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule.
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Validates `input`, returning only schema fields with defaults filled.
    ///
    /// `null` counts as absent.
    pub fn validate(&self, input: &JsonMap) -> DispatchResult<JsonMap> {
        let mut errors = FieldErrors::new();
        let mut output = JsonMap::new();

        for key in input.keys() {
            if !self.fields.iter().any(|f| f.name == key) {
                errors.add(key.clone(), format!("{key} is not allowed"));
            }
        }

        for field in &self.fields {
            match input.get(field.name).filter(|v| !v.is_null()) {
                Some(value) => match field.check(value) {
                    Ok(()) => {
                        output.insert(field.name.to_string(), value.clone());
                    }
                    Err(message) => errors.add(field.name, message),
                },
                None if field.required => errors.add(
                    field.name,
                    field
                        .required_message
                        .map_or_else(|| format!("{} is required", field.name), str::to_string),
                ),
                None => {
                    if let Some(default) = &field.default {
                        output.insert(field.name.to_string(), default.clone());
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(output)
        } else {
            Err(DispatchError::validation_with_fields(VALIDATION_FAILED, errors))
        }
    }

    /// Validates an optional object value; absent or `null` means `{}`.
    pub fn validate_value(&self, field: &str, value: Option<&Value>) -> DispatchResult<JsonMap> {
        match value {
            None | Some(Value::Null) => self.validate(&JsonMap::new()),
            Some(Value::Object(map)) => self.validate(map),
            Some(_) => {
                let mut errors = FieldErrors::new();
                errors.add(field, format!("{field} must be an object"));
                Err(DispatchError::validation_with_fields(VALIDATION_FAILED, errors))
            }
        }
    }
}
