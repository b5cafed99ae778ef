//! # Type Registries
//!
//! Bidirectional mapping between persisted integer type codes and canonical
//! type names.
//!
//! Two scopes exist:
//!
//! - **Global** registries are shared by every association playing a role
//!   (e.g. all `source` associations) that does not declare its own table.
//! - **Local** registries are built from a literal code table supplied when a
//!   single association is declared.
//!
//! Within one registry codes and names form a bijection. Registries are built
//! during configuration and only read afterwards.

use crate::error::{PolytypeError, Result};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Integer persisted in the type column in place of a type name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCode(i32);

impl TypeCode {
	/// Create a type code
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polytype::TypeCode;
	///
	/// let code = TypeCode::new(2);
	/// assert_eq!(code.get(), 2);
	/// ```
	pub const fn new(value: i32) -> Self {
		Self(value)
	}

	/// Get the raw integer value
	pub const fn get(self) -> i32 {
		self.0
	}
}

impl From<i32> for TypeCode {
	fn from(value: i32) -> Self {
		Self(value)
	}
}

impl From<TypeCode> for i32 {
	fn from(code: TypeCode) -> Self {
		code.0
	}
}

impl fmt::Display for TypeCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Display::fmt(&self.0, f)
	}
}

/// Ordered `code -> name` table
pub type CodeTable = BTreeMap<TypeCode, String>;

/// Literal `(code, name)` pairs as declared, conflicts included
///
/// Declarations stay in this form until [`TypeRegistry::from_table`] checks
/// them, so a repeated code surfaces as [`PolytypeError::DuplicateCode`].
pub type CodeEntries = Vec<(TypeCode, String)>;

/// Collect literal pairs into [`CodeEntries`]
///
/// # Examples
///
/// ```
/// use reinhardt_polytype::registry::code_table;
///
/// let table = code_table([(10, "Person"), (11, "InlineAnimal"), (10, "Robot")]);
/// assert_eq!(table.len(), 3);
/// ```
pub fn code_table<I, C, N>(pairs: I) -> CodeEntries
where
	I: IntoIterator<Item = (C, N)>,
	C: Into<TypeCode>,
	N: Into<String>,
{
	pairs
		.into_iter()
		.map(|(code, name)| (code.into(), name.into()))
		.collect()
}

/// Where a registry applies
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryScope {
	/// Shared by every association of a role
	Global { role: String },
	/// Declared inline for one association (e.g. `InlineLink.source`)
	Local { association: String },
}

impl RegistryScope {
	pub fn global(role: impl Into<String>) -> Self {
		Self::Global { role: role.into() }
	}

	pub fn local(association: impl Into<String>) -> Self {
		Self::Local {
			association: association.into(),
		}
	}
}

impl fmt::Display for RegistryScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Global { role } => write!(f, "global role `{}`", role),
			Self::Local { association } => write!(f, "association `{}`", association),
		}
	}
}

/// Bidirectional code/name registry for one scope
#[derive(Debug, Clone)]
pub struct TypeRegistry {
	scope: RegistryScope,
	by_code: CodeTable,
	by_name: HashMap<String, TypeCode>,
}

impl TypeRegistry {
	/// Create an empty registry
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polytype::{RegistryScope, TypeRegistry};
	///
	/// let registry = TypeRegistry::new(RegistryScope::global("source"));
	/// assert!(registry.is_empty());
	/// ```
	pub fn new(scope: RegistryScope) -> Self {
		Self {
			scope,
			by_code: CodeTable::new(),
			by_name: HashMap::new(),
		}
	}

	/// Build a registry from an explicit code table
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polytype::{RegistryScope, TypeCode, TypeRegistry};
	///
	/// let registry = TypeRegistry::from_table(
	///     RegistryScope::local("InlineLink.source"),
	///     [(10, "Person"), (11, "InlineAnimal")],
	/// )
	/// .unwrap();
	/// assert_eq!(registry.encode("InlineAnimal").unwrap(), TypeCode::new(11));
	/// assert_eq!(registry.decode(TypeCode::new(10)).unwrap(), "Person");
	/// ```
	pub fn from_table<I, C, N>(scope: RegistryScope, table: I) -> Result<Self>
	where
		I: IntoIterator<Item = (C, N)>,
		C: Into<TypeCode>,
		N: Into<String>,
	{
		let mut registry = Self::new(scope);
		for (code, name) in table {
			registry.register(code, name)?;
		}
		tracing::debug!(
			scope = %registry.scope,
			codes = registry.len(),
			"built type registry from explicit table"
		);
		Ok(registry)
	}

	/// Build a registry by numbering type names from 1 in alphabetical order
	///
	/// The ordering does not depend on the order names are supplied in, but
	/// adding a name that sorts before existing ones renumbers them. Only
	/// explicit tables give codes that are stable for the life of a schema.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polytype::{RegistryScope, TypeCode, TypeRegistry};
	///
	/// let registry =
	///     TypeRegistry::from_type_names(RegistryScope::global("target"), ["Food", "Drink"])
	///         .unwrap();
	/// assert_eq!(registry.encode("Drink").unwrap(), TypeCode::new(1));
	/// assert_eq!(registry.encode("Food").unwrap(), TypeCode::new(2));
	/// ```
	pub fn from_type_names<I, N>(scope: RegistryScope, names: I) -> Result<Self>
	where
		I: IntoIterator<Item = N>,
		N: Into<String>,
	{
		let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
		names.sort();
		names.dedup();

		let mut registry = Self::new(scope);
		for (code, name) in (1_i32..).zip(names) {
			registry.register(code, name)?;
		}
		tracing::debug!(
			scope = %registry.scope,
			codes = registry.len(),
			"built type registry from alphabetical ordering"
		);
		Ok(registry)
	}

	/// Insert a bidirectional mapping
	///
	/// Re-registering an identical pair is a no-op. Mapping either side to a
	/// different counterpart fails.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polytype::{PolytypeError, RegistryScope, TypeRegistry};
	///
	/// let mut registry = TypeRegistry::new(RegistryScope::global("source"));
	/// registry.register(1, "Person").unwrap();
	/// registry.register(1, "Person").unwrap();
	///
	/// let err = registry.register(1, "Animal").unwrap_err();
	/// assert!(matches!(err, PolytypeError::DuplicateCode { .. }));
	/// ```
	pub fn register(&mut self, code: impl Into<TypeCode>, name: impl Into<String>) -> Result<()> {
		let code = code.into();
		let name = name.into();

		if let Some(existing) = self.by_code.get(&code) {
			if *existing == name {
				return Ok(());
			}
			return Err(PolytypeError::DuplicateCode {
				scope: self.scope.to_string(),
				code,
				existing: existing.clone(),
				name,
			});
		}
		if let Some(existing) = self.by_name.get(&name) {
			return Err(PolytypeError::DuplicateName {
				scope: self.scope.to_string(),
				name,
				existing: *existing,
				code,
			});
		}

		self.by_name.insert(name.clone(), code);
		self.by_code.insert(code, name);
		Ok(())
	}

	/// Look up the code for a canonical type name
	pub fn encode(&self, name: &str) -> Result<TypeCode> {
		self.by_name
			.get(name)
			.copied()
			.ok_or_else(|| PolytypeError::UnknownType {
				scope: self.scope.to_string(),
				name: name.to_string(),
			})
	}

	/// Look up the canonical type name for a code
	pub fn decode(&self, code: TypeCode) -> Result<&str> {
		self.by_code
			.get(&code)
			.map(String::as_str)
			.ok_or_else(|| PolytypeError::UnknownCode {
				scope: self.scope.to_string(),
				code,
			})
	}

	/// Ordered `code -> name` listing
	pub fn all_mappings(&self) -> &CodeTable {
		&self.by_code
	}

	pub fn scope(&self) -> &RegistryScope {
		&self.scope
	}

	pub fn contains_code(&self, code: TypeCode) -> bool {
		self.by_code.contains_key(&code)
	}

	pub fn contains_name(&self, name: &str) -> bool {
		self.by_name.contains_key(name)
	}

	/// Registered names in code order
	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.by_code.values().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.by_code.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_code.is_empty()
	}
}

/// Per-role registries shared by every association that uses the global table
#[derive(Debug, Clone, Default)]
pub struct GlobalRegistries {
	roles: IndexMap<String, Arc<TypeRegistry>>,
}

impl GlobalRegistries {
	pub fn builder() -> GlobalRegistriesBuilder {
		GlobalRegistriesBuilder::default()
	}

	/// Get the registry for a role
	pub fn role(&self, role: &str) -> Result<Arc<TypeRegistry>> {
		self.roles
			.get(role)
			.cloned()
			.ok_or_else(|| PolytypeError::UnknownRole(role.to_string()))
	}

	pub fn contains_role(&self, role: &str) -> bool {
		self.roles.contains_key(role)
	}

	/// Iterate over `(role, registry)` pairs in declaration order
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<TypeRegistry>)> {
		self.roles.iter().map(|(role, registry)| (role.as_str(), registry))
	}

	pub fn len(&self) -> usize {
		self.roles.len()
	}

	pub fn is_empty(&self) -> bool {
		self.roles.is_empty()
	}
}

/// Collects role wiring before the global registries are frozen
///
/// A role is defined either by an explicit code table or by the set of types
/// declared as participating in it. When both are present, every participant
/// must appear in the table.
///
/// # Examples
///
/// ```
/// use reinhardt_polytype::{GlobalRegistries, TypeCode};
///
/// let registries = GlobalRegistries::builder()
///     .role_table("source", [(1, "Person"), (2, "Animal")])
///     .participant("target", "Food")
///     .participant("target", "Drink")
///     .build()
///     .unwrap();
///
/// let source = registries.role("source").unwrap();
/// assert_eq!(source.encode("Animal").unwrap(), TypeCode::new(2));
/// assert_eq!(registries.role("target").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct GlobalRegistriesBuilder {
	tables: IndexMap<String, CodeEntries>,
	participants: IndexMap<String, Vec<String>>,
}

impl GlobalRegistriesBuilder {
	/// Declare the explicit code table for a role, replacing any earlier table
	pub fn role_table<I, C, N>(mut self, role: impl Into<String>, table: I) -> Self
	where
		I: IntoIterator<Item = (C, N)>,
		C: Into<TypeCode>,
		N: Into<String>,
	{
		self.tables.insert(role.into(), code_table(table));
		self
	}

	/// Declare that a type participates in a role
	pub fn participant(mut self, role: impl Into<String>, type_name: impl Into<String>) -> Self {
		self.participants
			.entry(role.into())
			.or_default()
			.push(type_name.into());
		self
	}

	/// Declare several participants at once
	pub fn participants<I, N>(mut self, role: impl Into<String>, type_names: I) -> Self
	where
		I: IntoIterator<Item = N>,
		N: Into<String>,
	{
		self.participants
			.entry(role.into())
			.or_default()
			.extend(type_names.into_iter().map(Into::into));
		self
	}

	/// Freeze the wiring into registries
	pub fn build(self) -> Result<GlobalRegistries> {
		let mut roles = IndexMap::new();

		for (role, table) in &self.tables {
			let registry = TypeRegistry::from_table(
				RegistryScope::global(role.as_str()),
				table.iter().cloned(),
			)?;
			if let Some(participants) = self.participants.get(role) {
				for name in participants {
					registry.encode(name)?;
				}
			}
			roles.insert(role.clone(), Arc::new(registry));
		}

		for (role, participants) in &self.participants {
			if roles.contains_key(role) {
				continue;
			}
			tracing::warn!(
				role = role.as_str(),
				types = participants.len(),
				"type codes derived from alphabetical ordering; declare an explicit table for stable codes"
			);
			let registry = TypeRegistry::from_type_names(
				RegistryScope::global(role.as_str()),
				participants.iter().cloned(),
			)?;
			roles.insert(role.clone(), Arc::new(registry));
		}

		Ok(GlobalRegistries { roles })
	}
}

static GLOBAL_REGISTRIES: OnceCell<GlobalRegistries> = OnceCell::new();

/// Install the process-wide registries
///
/// Must be called once during startup, before associations using the global
/// scope are declared with [`crate::AssociationBuilder::build`].
pub fn init_global_registries(registries: GlobalRegistries) -> Result<&'static GlobalRegistries> {
	GLOBAL_REGISTRIES
		.try_insert(registries)
		.map_err(|_| PolytypeError::AlreadyInitialized)
}

/// Get the process-wide registries, if installed
pub fn global_registries() -> Option<&'static GlobalRegistries> {
	GLOBAL_REGISTRIES.get()
}
