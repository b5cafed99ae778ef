//! TOML configuration for type code tables
//!
//! ```toml
//! [roles.source]
//! table = { 1 = "Person", 2 = "Animal" }
//!
//! [roles.target]
//! types = ["Food", "Drink"]
//!
//! [associations."InlineLink.source"]
//! table = { 10 = "Person", 11 = "InlineAnimal" }
//! ```
//!
//! Roles become the process-wide [`GlobalRegistries`]; association entries are
//! local tables looked up by `Owner.role` when declaring an association.

use crate::descriptor::RegistrySource;
use crate::error::{ConfigError, PolytypeError, Result};
use crate::registry::{CodeEntries, GlobalRegistries, RegistryScope, TypeCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

/// Code tables loaded from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolytypeSettings {
	/// Global per-role registries
	pub roles: BTreeMap<String, RoleSettings>,
	/// Local tables keyed by `Owner.role`
	pub associations: BTreeMap<String, AssociationSettings>,
}

/// One global role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleSettings {
	/// Explicit `code = "Name"` table
	pub table: BTreeMap<String, String>,
	/// Participating types, used when no table is given
	pub types: Vec<String>,
}

/// Local table for one association
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationSettings {
	pub table: BTreeMap<String, String>,
	/// Store type names instead of codes
	pub string_typed: bool,
}

impl PolytypeSettings {
	/// Parse settings from a TOML string
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polytype::{PolytypeSettings, TypeCode};
	///
	/// let settings = PolytypeSettings::from_toml_str(
	///     r#"
	/// [roles.source]
	/// table = { 1 = "Person", 2 = "Animal" }
	/// "#,
	/// )
	/// .unwrap();
	///
	/// let registries = settings.global_registries().unwrap();
	/// assert_eq!(
	///     registries.role("source").unwrap().encode("Animal").unwrap(),
	///     TypeCode::new(2)
	/// );
	/// ```
	pub fn from_toml_str(content: &str) -> Result<Self> {
		let settings = toml::from_str(content).map_err(ConfigError::from)?;
		Ok(settings)
	}

	/// Read and parse a TOML file
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let content = fs::read_to_string(path).map_err(ConfigError::from)?;
		tracing::debug!(path = %path.display(), "loading polymorphic type settings");
		Self::from_toml_str(&content)
	}

	/// Build the per-role registries described by `[roles.*]`
	pub fn global_registries(&self) -> Result<GlobalRegistries> {
		let mut builder = GlobalRegistries::builder();
		for (role, settings) in &self.roles {
			if !settings.table.is_empty() {
				let section = format!("roles.{}", role);
				let scope = RegistryScope::global(role.as_str());
				let table = parse_table(&section, &scope, &settings.table)?;
				builder = builder.role_table(role.as_str(), table);
			}
			if !settings.types.is_empty() {
				builder = builder.participants(role.as_str(), settings.types.iter().cloned());
			}
		}
		builder.build()
	}

	/// Parsed local table for `Owner.role`, if configured
	pub fn local_table(&self, association: &str) -> Result<Option<CodeEntries>> {
		match self.associations.get(association) {
			Some(settings) if !settings.table.is_empty() => {
				let section = format!("associations.{}", association);
				let scope = RegistryScope::local(association);
				Ok(Some(parse_table(&section, &scope, &settings.table)?))
			}
			_ => Ok(None),
		}
	}

	/// Registry source for `Owner.role`: its local table, string typing, or
	/// the global role registry when nothing is configured
	pub fn registry_source(&self, association: &str) -> Result<RegistrySource> {
		if self
			.associations
			.get(association)
			.is_some_and(|settings| settings.string_typed)
		{
			return Ok(RegistrySource::Names);
		}
		Ok(self
			.local_table(association)?
			.map_or(RegistrySource::Global, RegistrySource::Table))
	}
}

// Distinct keys such as `1` and `01` can parse to the same code
fn parse_table(
	section: &str,
	scope: &RegistryScope,
	table: &BTreeMap<String, String>,
) -> Result<CodeEntries> {
	let mut seen: HashMap<TypeCode, &str> = HashMap::new();
	let mut entries = CodeEntries::with_capacity(table.len());
	for (key, name) in table {
		let code = key.trim().parse::<i32>().map_err(|_| ConfigError::InvalidCode {
			section: section.to_string(),
			key: key.clone(),
		})?;
		let code = TypeCode::new(code);
		match seen.insert(code, name.as_str()) {
			Some(existing) if existing != name.as_str() => {
				return Err(PolytypeError::DuplicateCode {
					scope: scope.to_string(),
					code,
					existing: existing.to_string(),
					name: name.clone(),
				});
			}
			_ => {}
		}
		entries.push((code, name.clone()));
	}
	Ok(entries)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs::File;
	use std::io::Write;
	use tempfile::TempDir;

	const SETTINGS: &str = r#"
[roles.source]
table = { 1 = "Person", 2 = "Animal" }

[roles.target]
types = ["Food", "Drink"]

[associations."InlineLink.source"]
table = { 10 = "Person", 11 = "InlineAnimal" }

[associations."InlineLink.target"]
table = { 10 = "Food", 13 = "InlineDrink" }

[associations."InlineLink.normal_target"]
string_typed = true
"#;

	#[test]
	fn test_global_registries_from_settings() {
		let settings = PolytypeSettings::from_toml_str(SETTINGS).unwrap();

		let registries = settings.global_registries().unwrap();

		let source = registries.role("source").unwrap();
		let target = registries.role("target").unwrap();
		assert_eq!(source.encode("Person").unwrap(), TypeCode::new(1));
		assert_eq!(target.encode("Drink").unwrap(), TypeCode::new(1));
		assert_eq!(target.encode("Food").unwrap(), TypeCode::new(2));
	}

	#[test]
	fn test_local_tables_parse_numerically() {
		let settings = PolytypeSettings::from_toml_str(SETTINGS).unwrap();

		let table = settings.local_table("InlineLink.target").unwrap().unwrap();

		let codes: Vec<i32> = table.iter().map(|(code, _)| code.get()).collect();
		assert_eq!(codes, vec![10, 13]);
		assert_eq!(settings.local_table("Link.source").unwrap(), None);
	}

	#[test]
	fn test_registry_source_selection() {
		let settings = PolytypeSettings::from_toml_str(SETTINGS).unwrap();

		assert!(matches!(
			settings.registry_source("InlineLink.source").unwrap(),
			RegistrySource::Table(_)
		));
		assert_eq!(
			settings.registry_source("InlineLink.normal_target").unwrap(),
			RegistrySource::Names
		);
		assert_eq!(
			settings.registry_source("Link.source").unwrap(),
			RegistrySource::Global
		);
	}

	#[test]
	fn test_invalid_code_key() {
		let settings = PolytypeSettings::from_toml_str(
			r#"
[roles.source]
table = { one = "Person" }
"#,
		)
		.unwrap();

		let err = settings.global_registries().unwrap_err();

		assert!(matches!(
			err,
			PolytypeError::Config(ConfigError::InvalidCode { ref section, ref key })
				if section == "roles.source" && key == "one"
		));
	}

	#[test]
	fn test_duplicate_name_in_role_table() {
		let settings = PolytypeSettings::from_toml_str(
			r#"
[roles.source]
table = { 1 = "Person", 2 = "Person" }
"#,
		)
		.unwrap();

		let err = settings.global_registries().unwrap_err();

		assert!(matches!(err, PolytypeError::DuplicateName { .. }));
	}

	#[test]
	fn test_role_keys_parsing_to_same_code_rejected() {
		let settings = PolytypeSettings::from_toml_str(
			r#"
[roles.source]
table = { 1 = "Person", 01 = "Animal" }
"#,
		)
		.unwrap();

		let err = settings.global_registries().unwrap_err();

		assert!(matches!(
			err,
			PolytypeError::DuplicateCode { ref scope, code, .. }
				if scope == "global role `source`" && code == TypeCode::new(1)
		));
	}

	#[test]
	fn test_local_keys_parsing_to_same_code_rejected() {
		let settings = PolytypeSettings::from_toml_str(
			r#"
[associations."InlineLink.source"]
table = { 10 = "Person", " 10" = "InlineAnimal" }
"#,
		)
		.unwrap();

		let err = settings.local_table("InlineLink.source").unwrap_err();

		assert!(matches!(
			err,
			PolytypeError::DuplicateCode { ref scope, .. }
				if scope == "association `InlineLink.source`"
		));
		assert!(settings.registry_source("InlineLink.source").is_err());
	}

	#[test]
	fn test_keys_parsing_to_same_code_with_same_name() {
		let settings = PolytypeSettings::from_toml_str(
			r#"
[roles.source]
table = { 1 = "Person", 01 = "Person", 2 = "Animal" }
"#,
		)
		.unwrap();

		let registries = settings.global_registries().unwrap();

		assert_eq!(registries.role("source").unwrap().len(), 2);
	}

	#[test]
	fn test_malformed_toml() {
		let err = PolytypeSettings::from_toml_str("[roles.source\n").unwrap_err();

		assert!(matches!(err, PolytypeError::Config(ConfigError::Toml(_))));
	}

	#[test]
	fn test_from_file() {
		let temp_dir = TempDir::new().unwrap();
		let config_path = temp_dir.path().join("polytype.toml");
		let mut file = File::create(&config_path).unwrap();
		writeln!(file, "{}", SETTINGS).unwrap();

		let settings = PolytypeSettings::from_file(&config_path).unwrap();

		assert_eq!(settings.roles.len(), 2);
		assert_eq!(settings.associations.len(), 3);
	}

	#[test]
	fn test_missing_file() {
		let temp_dir = TempDir::new().unwrap();

		let err = PolytypeSettings::from_file(temp_dir.path().join("missing.toml")).unwrap_err();

		assert!(matches!(err, PolytypeError::Config(ConfigError::Io(_))));
	}
}
