//! # Association Descriptors
//!
//! An [`AssociationDescriptor`] describes one declared polymorphic relation:
//! the owning table, the id and type columns backing it, the registry it
//! encodes through, and whether it is the owning (belongs-to) side or the
//! inverse (has-many "as") side.
//!
//! Descriptors are built once at declaration time and are immutable after
//! that. They are usually shared through an `Arc`.

use crate::error::{PolytypeError, Result};
use crate::normalize::{
	Normalizable, NormalizedTypeName, ObjectId, PolymorphicRecord, storage_name_for,
};
use crate::registry::{
	CodeEntries, CodeTable, GlobalRegistries, RegistryScope, TypeCode, TypeRegistry,
	global_registries,
};
use std::fmt;
use std::sync::Arc;

/// Which registry an association encodes through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrySource {
	/// The global registry for the association's role
	Global,
	/// A literal table scoped to this association only
	Table(CodeEntries),
	/// No integer coding: the type column stores the normalized name
	Names,
}

/// Direction of a declared association
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssociationKind {
	/// The owning side holding the id/type columns (`Link.source`)
	BelongsTo,
	/// The inverse side declared on a target type (`Animal.source_links`)
	HasManyAs { declared_on: String, name: String },
}

/// Value held in the type column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoredType {
	Code(TypeCode),
	Name(String),
}

impl StoredType {
	pub fn as_code(&self) -> Option<TypeCode> {
		match self {
			Self::Code(code) => Some(*code),
			Self::Name(_) => None,
		}
	}
}

impl fmt::Display for StoredType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Code(code) => write!(f, "{}", code),
			Self::Name(name) => write!(f, "{:?}", name),
		}
	}
}

impl From<TypeCode> for StoredType {
	fn from(code: TypeCode) -> Self {
		Self::Code(code)
	}
}

/// Physical `(id, type)` column pair as persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StoredReference {
	pub id: Option<ObjectId>,
	pub type_value: Option<StoredType>,
}

impl StoredReference {
	/// Both columns null
	pub const fn null() -> Self {
		Self {
			id: None,
			type_value: None,
		}
	}

	pub fn new(id: Option<ObjectId>, type_value: Option<StoredType>) -> Self {
		Self { id, type_value }
	}

	/// Shorthand for an integer-coded pair
	pub fn coded(id: ObjectId, code: impl Into<TypeCode>) -> Self {
		Self {
			id: Some(id),
			type_value: Some(StoredType::Code(code.into())),
		}
	}

	pub fn is_null(&self) -> bool {
		self.id.is_none() && self.type_value.is_none()
	}
}

/// A `(id, type name)` pair decoded from a [`StoredReference`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DecodedReference {
	pub id: ObjectId,
	pub type_name: NormalizedTypeName,
}

/// The three shapes a reference can be assigned from
#[derive(Debug, Clone, Copy)]
pub enum ReferenceInput<'a> {
	/// A live record; its storage name is normalized before encoding
	Record(&'a dyn PolymorphicRecord),
	/// An explicit id and canonical type name; no normalization is applied
	Raw { id: ObjectId, type_name: &'a str },
	/// Absent reference
	Null,
}

impl<'a> From<&'a dyn PolymorphicRecord> for ReferenceInput<'a> {
	fn from(record: &'a dyn PolymorphicRecord) -> Self {
		Self::Record(record)
	}
}

impl<'a, T: PolymorphicRecord> From<&'a T> for ReferenceInput<'a> {
	fn from(record: &'a T) -> Self {
		Self::Record(record)
	}
}

impl<'a> From<Option<&'a dyn PolymorphicRecord>> for ReferenceInput<'a> {
	fn from(record: Option<&'a dyn PolymorphicRecord>) -> Self {
		record.map_or(Self::Null, Self::Record)
	}
}

impl<'a> From<(ObjectId, &'a str)> for ReferenceInput<'a> {
	fn from((id, type_name): (ObjectId, &'a str)) -> Self {
		Self::Raw { id, type_name }
	}
}

/// One declared polymorphic relation
#[derive(Debug, Clone)]
pub struct AssociationDescriptor {
	owner: String,
	role: String,
	table: String,
	id_column: String,
	type_column: String,
	registry: Option<Arc<TypeRegistry>>,
	kind: AssociationKind,
}

impl AssociationDescriptor {
	/// Start declaring the owning side of a role
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polytype::{AssociationDescriptor, RegistrySource};
	///
	/// let source = AssociationDescriptor::belongs_to("InlineLink", "source")
	///     .table("links")
	///     .source(RegistrySource::Table(
	///         reinhardt_polytype::registry::code_table([(10, "Person"), (11, "InlineAnimal")]),
	///     ))
	///     .build()
	///     .unwrap();
	///
	/// assert_eq!(source.id_column(), "source_id");
	/// assert_eq!(source.type_column(), "source_type");
	/// assert_eq!(source.qualified_name(), "InlineLink.source");
	/// ```
	pub fn belongs_to(owner: impl Into<String>, role: impl Into<String>) -> AssociationBuilder {
		AssociationBuilder::new(owner, role)
	}

	/// Declare the inverse side of this association on a target type
	///
	/// The inverse shares the table, columns and registry of the owning side,
	/// so a reference written through the owning side is always found through
	/// the inverse.
	pub fn inverse_of(
		forward: &Arc<AssociationDescriptor>,
		declared_on: impl Into<String>,
		name: impl Into<String>,
	) -> Self {
		Self {
			kind: AssociationKind::HasManyAs {
				declared_on: declared_on.into(),
				name: name.into(),
			},
			..forward.as_ref().clone()
		}
	}

	/// Owning type name (`Link`)
	pub fn owner(&self) -> &str {
		&self.owner
	}

	/// Role name (`source`)
	pub fn role(&self) -> &str {
		&self.role
	}

	/// `Owner.role`
	pub fn qualified_name(&self) -> String {
		format!("{}.{}", self.owner, self.role)
	}

	/// Table holding the id/type columns
	pub fn table(&self) -> &str {
		&self.table
	}

	pub fn id_column(&self) -> &str {
		&self.id_column
	}

	pub fn type_column(&self) -> &str {
		&self.type_column
	}

	pub fn kind(&self) -> &AssociationKind {
		&self.kind
	}

	/// Registry in effect, `None` for string-typed associations
	pub fn registry(&self) -> Option<&Arc<TypeRegistry>> {
		self.registry.as_ref()
	}

	pub fn is_integer_coded(&self) -> bool {
		self.registry.is_some()
	}

	/// Ordered `code -> name` table in effect for this association
	pub fn type_mapping(&self) -> Option<&CodeTable> {
		self.registry.as_deref().map(TypeRegistry::all_mappings)
	}

	/// Encode the type half of a live record or type descriptor
	pub fn encode_type<'a>(&self, value: impl Into<Normalizable<'a>>) -> Result<StoredType> {
		let name = storage_name_for(value);
		self.encode_type_name(name.as_str())
	}

	/// Encode an already canonical type name
	pub fn encode_type_name(&self, type_name: &str) -> Result<StoredType> {
		match &self.registry {
			Some(registry) => registry.encode(type_name).map(StoredType::Code),
			None => Ok(StoredType::Name(type_name.to_string())),
		}
	}

	/// Decode a stored type value to its canonical name
	pub fn decode_type(&self, stored: &StoredType) -> Result<NormalizedTypeName> {
		match (&self.registry, stored) {
			(Some(registry), StoredType::Code(code)) => {
				registry.decode(*code).map(NormalizedTypeName::new)
			}
			(None, StoredType::Name(name)) => Ok(NormalizedTypeName::new(name.as_str())),
			(Some(_), StoredType::Name(name)) => Err(PolytypeError::UnsupportedStorage {
				association: self.qualified_name(),
				reason: format!("expected an integer type code, found name {:?}", name),
			}),
			(None, StoredType::Code(code)) => Err(PolytypeError::UnsupportedStorage {
				association: self.qualified_name(),
				reason: format!("expected a type name, found integer code {}", code),
			}),
		}
	}

	/// Encode any of the three input shapes into the stored column pair
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polytype::{
	///     AssociationDescriptor, GlobalRegistries, ReferenceInput, StoredReference,
	/// };
	///
	/// let globals = GlobalRegistries::builder()
	///     .role_table("source", [(1, "Person"), (2, "Animal")])
	///     .build()
	///     .unwrap();
	/// let source = AssociationDescriptor::belongs_to("Link", "source")
	///     .build_with(&globals)
	///     .unwrap();
	///
	/// let stored = source.encode_reference((7, "Animal")).unwrap();
	/// assert_eq!(stored, StoredReference::coded(7, 2));
	///
	/// let stored = source.encode_reference(ReferenceInput::Null).unwrap();
	/// assert!(stored.is_null());
	/// ```
	pub fn encode_reference<'a>(
		&self,
		input: impl Into<ReferenceInput<'a>>,
	) -> Result<StoredReference> {
		match input.into() {
			ReferenceInput::Null => Ok(StoredReference::null()),
			ReferenceInput::Raw { id, type_name } => Ok(StoredReference {
				id: Some(id),
				type_value: Some(self.encode_type_name(type_name)?),
			}),
			ReferenceInput::Record(record) => {
				let type_value = self.encode_type(record)?;
				match record.primary_key() {
					Some(id) => Ok(StoredReference {
						id: Some(id),
						type_value: Some(type_value),
					}),
					None => Err(self.inconsistent(None, Some(&type_value))),
				}
			}
		}
	}

	/// Decode a stored column pair
	///
	/// Returns `Ok(None)` for a fully null pair and an error when only one of
	/// the two columns is null.
	pub fn decode_reference(&self, stored: &StoredReference) -> Result<Option<DecodedReference>> {
		match (stored.id, &stored.type_value) {
			(None, None) => Ok(None),
			(Some(id), Some(type_value)) => Ok(Some(DecodedReference {
				id,
				type_name: self.decode_type(type_value)?,
			})),
			(id, type_value) => Err(self.inconsistent(id, type_value.as_ref())),
		}
	}

	/// Reject a partially null pair
	pub fn check_nullity(&self, stored: &StoredReference) -> Result<()> {
		match (stored.id, &stored.type_value) {
			(None, None) | (Some(_), Some(_)) => Ok(()),
			(id, type_value) => Err(self.inconsistent(id, type_value.as_ref())),
		}
	}

	/// Column pair an inverse lookup must match for `owner`
	pub fn inverse_key(&self, owner: &dyn PolymorphicRecord) -> Result<StoredReference> {
		self.encode_reference(owner)
	}

	/// Whether a stored pair points at `owner`
	pub fn references(
		&self,
		stored: &StoredReference,
		owner: &dyn PolymorphicRecord,
	) -> Result<bool> {
		self.check_nullity(stored)?;
		Ok(*stored == self.inverse_key(owner)?)
	}

	pub(crate) fn inconsistent(
		&self,
		id: Option<ObjectId>,
		type_value: Option<&StoredType>,
	) -> PolytypeError {
		PolytypeError::InconsistentNullity {
			association: self.qualified_name(),
			id,
			type_value: type_value.map_or_else(|| "null".to_string(), ToString::to_string),
		}
	}
}

/// Declaration-time builder for [`AssociationDescriptor`]
#[derive(Debug, Clone)]
pub struct AssociationBuilder {
	owner: String,
	role: String,
	table: Option<String>,
	id_column: Option<String>,
	type_column: Option<String>,
	source: RegistrySource,
}

impl AssociationBuilder {
	pub fn new(owner: impl Into<String>, role: impl Into<String>) -> Self {
		Self {
			owner: owner.into(),
			role: role.into(),
			table: None,
			id_column: None,
			type_column: None,
			source: RegistrySource::Global,
		}
	}

	/// Table holding the columns, defaults to the lowercased owner name
	pub fn table(mut self, table: impl Into<String>) -> Self {
		self.table = Some(table.into());
		self
	}

	/// Id column, defaults to `{role}_id`
	pub fn id_column(mut self, column: impl Into<String>) -> Self {
		self.id_column = Some(column.into());
		self
	}

	/// Type column, defaults to `{role}_type`
	pub fn type_column(mut self, column: impl Into<String>) -> Self {
		self.type_column = Some(column.into());
		self
	}

	pub fn source(mut self, source: RegistrySource) -> Self {
		self.source = source;
		self
	}

	/// Use a literal code table scoped to this association
	pub fn table_mapping<I, C, N>(self, table: I) -> Self
	where
		I: IntoIterator<Item = (C, N)>,
		C: Into<TypeCode>,
		N: Into<String>,
	{
		self.source(RegistrySource::Table(crate::registry::code_table(table)))
	}

	/// Keep storing type names instead of codes
	pub fn string_typed(self) -> Self {
		self.source(RegistrySource::Names)
	}

	/// Build against the process-wide registries
	pub fn build(self) -> Result<AssociationDescriptor> {
		match global_registries() {
			Some(globals) => self.build_with(globals),
			None => self.build_with(&GlobalRegistries::default()),
		}
	}

	/// Build against an explicit set of global registries
	pub fn build_with(self, globals: &GlobalRegistries) -> Result<AssociationDescriptor> {
		let qualified = format!("{}.{}", self.owner, self.role);
		let registry = match self.source {
			RegistrySource::Global => Some(globals.role(&self.role)?),
			RegistrySource::Table(table) => Some(Arc::new(TypeRegistry::from_table(
				RegistryScope::local(qualified.as_str()),
				table,
			)?)),
			RegistrySource::Names => None,
		};

		let scope = registry
			.as_ref()
			.map_or_else(|| "type names".to_string(), |r| r.scope().to_string());
		tracing::debug!(
			association = qualified.as_str(),
			scope = scope.as_str(),
			"declared polymorphic association"
		);

		Ok(AssociationDescriptor {
			table: self.table.unwrap_or_else(|| self.owner.to_lowercase()),
			id_column: self.id_column.unwrap_or_else(|| format!("{}_id", self.role)),
			type_column: self.type_column.unwrap_or_else(|| format!("{}_type", self.role)),
			owner: self.owner,
			role: self.role,
			registry,
			kind: AssociationKind::BelongsTo,
		})
	}
}
