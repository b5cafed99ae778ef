//! Error types for integer-coded polymorphic references
//!
//! Registry conflicts and unknown types are configuration errors, unknown codes
//! are data-integrity errors, and inconsistent nullity is invalid state. All of
//! them are returned to the immediate caller; nothing here is retried or logged.

use crate::registry::TypeCode;

/// Errors raised by registries, descriptors, the resolver and typed fields
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum PolytypeError {
	/// A code is already mapped to a different type name in the same scope
	#[error(
		"Duplicate type code {code} in {scope}: already mapped to `{existing}`, cannot map to `{name}`"
	)]
	DuplicateCode {
		scope: String,
		code: TypeCode,
		existing: String,
		name: String,
	},

	/// A type name is already mapped to a different code in the same scope
	#[error(
		"Duplicate type name `{name}` in {scope}: already mapped to {existing}, cannot map to {code}"
	)]
	DuplicateName {
		scope: String,
		name: String,
		existing: TypeCode,
		code: TypeCode,
	},

	/// Encode-time miss: the type has no registered code
	#[error("Unknown type `{name}` in {scope}: no type code registered")]
	UnknownType { scope: String, name: String },

	/// Decode-time miss: the stored code has no registry entry
	#[error("Unknown type code {code} in {scope}: stored value has no registry entry")]
	UnknownCode { scope: String, code: TypeCode },

	/// Exactly one of the id and type columns is null
	#[error("Inconsistent nullity for `{association}`: id is {id:?} but type is {type_value}")]
	InconsistentNullity {
		association: String,
		id: Option<i64>,
		type_value: String,
	},

	/// No global registry was configured for the role
	#[error("No global type registry configured for role `{0}`")]
	UnknownRole(String),

	/// The process-wide registries were already installed
	#[error("Global type registries are already initialized")]
	AlreadyInitialized,

	/// The stored type representation does not match the association's storage
	#[error("Unsupported type storage for `{association}`: {reason}")]
	UnsupportedStorage { association: String, reason: String },

	/// A field was handed to a resolver for a different association
	#[error("Association mismatch: expected `{expected}`, found `{found}`")]
	AssociationMismatch { expected: String, found: String },

	/// Configuration could not be loaded
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	/// Failure reported by the persistence collaborator, passed through unchanged
	#[error("Persistence error: {0}")]
	Persistence(#[source] anyhow::Error),
}

impl PolytypeError {
	/// Returns `true` for errors caused by stored data rather than configuration
	pub fn is_data_integrity(&self) -> bool {
		matches!(
			self,
			Self::UnknownCode { .. } | Self::InconsistentNullity { .. }
		)
	}
}

/// Errors raised while loading code tables from configuration sources
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	/// A code table key is not an integer
	#[error("Invalid type code `{key}` in `{section}`")]
	InvalidCode { section: String, key: String },
}

pub type Result<T> = std::result::Result<T, PolytypeError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unknown_code_is_data_integrity() {
		let err = PolytypeError::UnknownCode {
			scope: "global role `source`".to_string(),
			code: TypeCode::new(99),
		};

		assert!(err.is_data_integrity());
		assert_eq!(
			err.to_string(),
			"Unknown type code 99 in global role `source`: stored value has no registry entry"
		);
	}

	#[test]
	fn test_unknown_type_is_configuration() {
		let err = PolytypeError::UnknownType {
			scope: "association `Link.source`".to_string(),
			name: "Robot".to_string(),
		};

		assert!(!err.is_data_integrity());
		assert!(err.to_string().contains("`Robot`"));
	}

	#[test]
	fn test_config_error_converts() {
		let err: PolytypeError = ConfigError::InvalidCode {
			section: "roles.source".to_string(),
			key: "one".to_string(),
		}
		.into();

		assert!(matches!(err, PolytypeError::Config(_)));
		assert!(err.to_string().contains("Invalid type code `one`"));
	}
}
