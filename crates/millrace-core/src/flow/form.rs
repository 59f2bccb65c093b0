use crate::error::ValidationErrors;
use crate::{CoreError, DataPacket};
use serde_json::Value;

/// Expected type of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Boolean field
    Bool,
    /// Numeric field
    Number,
    /// Text field
    Text,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Number => value.is_number(),
            FieldKind::Text => value.is_string(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            FieldKind::Bool => "boolean",
            FieldKind::Number => "number",
            FieldKind::Text => "string",
        }
    }
}

/// One declared field of a form
#[derive(Debug, Clone)]
struct Field {
    name: String,
    kind: FieldKind,
    required: bool,
}

/// The form/validation collaborator: a declared set of fields that turns
/// raw external input into a validated context update, or a structured
/// validation-error set.
///
/// Only declared fields make it into the output; undeclared input is
/// silently dropped.
#[derive(Debug, Clone, Default)]
pub struct Form {
    fields: Vec<Field>,
}

impl Form {
    /// Create an empty form (accepts any input, produces an empty update)
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an optional field
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            kind,
            required: false,
        });
        self
    }

    /// Declare a required field
    pub fn required(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.to_string(),
            kind,
            required: true,
        });
        self
    }

    /// Validate raw input against the declared fields.
    ///
    /// Returns the validated context update on success, or the full set of
    /// field errors on failure (all fields are checked; validation does not
    /// stop at the first problem).
    pub fn validate(&self, input: &DataPacket) -> Result<DataPacket, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let empty = serde_json::Map::new();
        let fields = match input.as_object() {
            Some(fields) => fields,
            None if input.is_null() => &empty,
            None => {
                errors.add("__all__", "expected an object");
                return Err(errors);
            }
        };

        let mut validated = serde_json::Map::new();

        for field in &self.fields {
            match fields.get(&field.name) {
                Some(value) if field.kind.matches(value) => {
                    validated.insert(field.name.clone(), value.clone());
                }
                Some(_) => {
                    errors.add(&field.name, format!("expected a {}", field.kind.name()));
                }
                None if field.required => {
                    errors.add(&field.name, "this field is required");
                }
                None => {}
            }
        }

        if errors.is_empty() {
            Ok(DataPacket::new(Value::Object(validated)))
        } else {
            Err(errors)
        }
    }
}

/// Builds the context for a freshly spawned process: default data,
/// optionally overlaid with form-validated spawn input.
#[derive(Debug, Clone)]
pub struct ContextFactory {
    defaults: DataPacket,
    form: Option<Form>,
}

impl ContextFactory {
    /// Zero-input factory producing the given default data
    pub fn simple(defaults: DataPacket) -> Self {
        Self {
            defaults,
            form: None,
        }
    }

    /// Form-validating factory: spawn input must pass the form
    pub fn form(defaults: DataPacket, form: Form) -> Self {
        Self {
            defaults,
            form: Some(form),
        }
    }

    /// Build the initial context data for a spawn.
    ///
    /// Fails with `InvalidForm` when a form is configured and the spawn
    /// input does not validate.
    pub fn build(&self, input: &DataPacket) -> Result<DataPacket, CoreError> {
        let mut data = self.defaults.clone();

        if let Some(form) = &self.form {
            let update = form.validate(input).map_err(CoreError::InvalidForm)?;
            if let (Value::Object(target), Some(fields)) =
                (data.as_value_mut(), update.as_object())
            {
                for (key, value) in fields {
                    target.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(data)
    }
}

impl Default for ContextFactory {
    fn default() -> Self {
        Self::simple(DataPacket::object())
    }
}
