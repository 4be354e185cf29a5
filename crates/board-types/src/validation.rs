//! Schema validation for implementation-specific TOML tables.
//!
//! Backends receive their configuration as a raw `toml::Value`
//! (`[backend.implementations.http]`, `[storage.implementations.memory]`).
//! Each backend describes the table it expects with a [`Schema`] and
//! validates it before constructing itself.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// Error that occurs when deserialization fails.
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	/// Prefixes the field path with the name of the enclosing table.
	fn nested_in(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(f) => ValidationError::MissingField(format!("{}.{}", parent, f)),
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// Expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// An integer with optional inclusive bounds.
	Integer {
		min: Option<i64>,
		max: Option<i64>,
	},
	Boolean,
	/// An array whose elements all have the given type.
	Array(Box<FieldType>),
	/// A nested table with its own schema.
	Table(Schema),
}

impl FieldType {
	fn name(&self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Integer { .. } => "integer",
			FieldType::Boolean => "boolean",
			FieldType::Array(_) => "array",
			FieldType::Table(_) => "table",
		}
	}
}

/// Custom check run after type validation; returns an error message on failure.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field of a schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		check_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Required and optional fields of a TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Fails on the first missing required field, type mismatch, bound
	/// violation or failing custom validator. Unknown keys are allowed.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config.as_table().ok_or_else(|| ValidationError::TypeMismatch {
			field: "root".to_string(),
			expected: "table".to_string(),
			actual: config.type_str().to_string(),
		})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn check_type(field: &str, value: &toml::Value, expected: &FieldType) -> Result<(), ValidationError> {
	let mismatch = || ValidationError::TypeMismatch {
		field: field.to_string(),
		expected: expected.name().to_string(),
		actual: value.type_str().to_string(),
	};

	match expected {
		FieldType::String => value.as_str().map(|_| ()).ok_or_else(mismatch),
		FieldType::Boolean => value.as_bool().map(|_| ()).ok_or_else(mismatch),
		FieldType::Integer { min, max } => {
			let n = value.as_integer().ok_or_else(mismatch)?;
			if let Some(min) = min.filter(|min| n < *min) {
				return Err(ValidationError::InvalidValue {
					field: field.to_string(),
					message: format!("Value {} is less than minimum {}", n, min),
				});
			}
			if let Some(max) = max.filter(|max| n > *max) {
				return Err(ValidationError::InvalidValue {
					field: field.to_string(),
					message: format!("Value {} is greater than maximum {}", n, max),
				});
			}
			Ok(())
		},
		FieldType::Array(inner) => {
			let items = value.as_array().ok_or_else(mismatch)?;
			for (i, item) in items.iter().enumerate() {
				check_type(&format!("{}[{}]", field, i), item, inner)?;
			}
			Ok(())
		},
		FieldType::Table(schema) => schema.validate(value).map_err(|e| e.nested_in(field)),
	}
}

/// A configuration schema that can validate TOML values.
///
/// Implemented by each pluggable backend so the builder can reject a bad
/// `implementations.<name>` table before anything is constructed.
pub trait ConfigSchema: Send + Sync {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	fn http_schema() -> Schema {
		Schema::new(
			vec![Field::new("base_url", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => Ok(()),
					_ => Err("must be an http(s) URL".to_string()),
				}
			})],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(300),
				},
			)],
		)
	}

	#[test]
	fn test_valid_table_passes() {
		let config: toml::Value =
			toml::from_str("base_url = \"https://api.example.com\"\ntimeout_seconds = 20").unwrap();
		assert!(http_schema().validate(&config).is_ok());
	}

	#[test]
	fn test_missing_and_mistyped_fields() {
		let config: toml::Value = toml::from_str("timeout_seconds = 20").unwrap();
		assert!(matches!(
			http_schema().validate(&config),
			Err(ValidationError::MissingField(f)) if f == "base_url"
		));

		let config: toml::Value =
			toml::from_str("base_url = \"https://x\"\ntimeout_seconds = \"soon\"").unwrap();
		assert!(matches!(
			http_schema().validate(&config),
			Err(ValidationError::TypeMismatch { field, .. }) if field == "timeout_seconds"
		));
	}

	#[test]
	fn test_bounds_and_custom_validator() {
		let config: toml::Value =
			toml::from_str("base_url = \"https://x\"\ntimeout_seconds = 900").unwrap();
		let err = http_schema().validate(&config).unwrap_err();
		assert!(err.to_string().contains("greater than maximum 300"));

		let config: toml::Value = toml::from_str("base_url = \"ftp://x\"").unwrap();
		let err = http_schema().validate(&config).unwrap_err();
		assert!(err.to_string().contains("http(s) URL"));
	}

	#[test]
	fn test_nested_table_errors_carry_path() {
		let schema = Schema::new(
			vec![Field::new(
				"cors",
				FieldType::Table(Schema::new(
					vec![Field::new("allowed_origins", FieldType::Array(Box::new(FieldType::String)))],
					vec![],
				)),
			)],
			vec![],
		);
		let config: toml::Value = toml::from_str("[cors]\nallowed_origins = [1]").unwrap();
		let err = schema.validate(&config).unwrap_err();
		assert!(err.to_string().contains("cors.allowed_origins[0]"));
	}
}
