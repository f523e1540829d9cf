//! Add-Row Form: declarative fields with validation rules.

use std::{collections::HashMap, fmt};

use regex::Regex;
use shared::domain::DutyDraft;
use thiserror::Error;

pub const ALPHANUMERIC_PATTERN: &str = "^[A-Za-z0-9]+$";

/// One rule attached to a field. A rule may be `required`, carry a
/// `pattern`, or both; `message` is shown when it fails.
#[derive(Debug, Clone)]
pub struct ValidationRule {
    pub required: bool,
    pub pattern: Option<Regex>,
    pub message: String,
}

impl ValidationRule {
    pub fn required(message: impl Into<String>) -> Self {
        Self {
            required: true,
            pattern: None,
            message: message.into(),
        }
    }

    pub fn pattern(pattern: &str, message: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            required: false,
            pattern: Some(Regex::new(pattern)?),
            message: message.into(),
        })
    }

    /// Blank values only fail `required`; pattern checks skip them.
    pub fn accepts(&self, value: &str) -> bool {
        if value.trim().is_empty() {
            return !self.required;
        }
        self.pattern
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(value))
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub placeholder: String,
    pub rules: Vec<ValidationRule>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            placeholder: placeholder.into(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Messages of every failing rule, in declaration order.
    pub fn check(&self, value: &str) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| !rule.accepts(value))
            .map(|rule| rule.message.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("form has no field named '{0}'")]
pub struct UnknownField(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub fields: Vec<(String, Vec<String>)>,
}

impl ValidationErrors {
    pub fn for_field(&self, name: &str) -> &[String] {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, messages)| messages.as_slice())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

#[derive(Debug, Clone)]
pub struct AddRowForm {
    fields: Vec<FieldSpec>,
    values: HashMap<String, String>,
}

impl AddRowForm {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            values: HashMap::new(),
        }
    }

    /// The stock duty form: an alphanumeric `id` and a `name`.
    pub fn duties() -> Result<Self, regex::Error> {
        Ok(Self::new(vec![
            FieldSpec::new("id", "Enter id")
                .rule(ValidationRule::required("Please input the id."))
                .rule(ValidationRule::pattern(
                    ALPHANUMERIC_PATTERN,
                    "The id may only contain letters and digits.",
                )?),
            FieldSpec::new("name", "Enter duty name")
                .rule(ValidationRule::required("Please input the duty name.")),
        ]))
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), UnknownField> {
        if !self.fields.iter().any(|field| field.name == name) {
            return Err(UnknownField(name.to_string()));
        }
        self.values.insert(name.to_string(), value.into());
        Ok(())
    }

    pub fn value(&self, name: &str) -> &str {
        self.values.get(name).map(String::as_str).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let fields: Vec<(String, Vec<String>)> = self
            .fields
            .iter()
            .filter_map(|field| {
                let messages = field.check(self.value(&field.name));
                (!messages.is_empty()).then(|| (field.name.clone(), messages))
            })
            .collect();

        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors { fields })
        }
    }

    /// Validates every field and assembles the create payload.
    pub fn draft(&self) -> Result<DutyDraft, ValidationErrors> {
        self.validate()?;
        Ok(DutyDraft {
            id: self.value("id").to_string(),
            name: self.value("name").to_string(),
        })
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
#[path = "tests/form_tests.rs"]
mod tests;
