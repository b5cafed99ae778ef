//! STI name normalization
//!
//! Types are identified by explicitly declared names rather than reflection.
//! A type that lives in a shared single-table-inheritance table declares the
//! table owner's name as its storage name, and that storage name is what gets
//! encoded, decoded and compared.

use std::any::Any;
use std::borrow::Borrow;
use std::fmt;

/// Primary key type of referenced records
pub type ObjectId = i64;

/// Static identity of a concrete record type
///
/// # Examples
///
/// ```
/// use reinhardt_polytype::TypeDescriptor;
///
/// const ANIMAL: TypeDescriptor = TypeDescriptor::new("Animal");
/// const DOG: TypeDescriptor = TypeDescriptor::new("Dog").stored_as("Animal");
///
/// assert_eq!(ANIMAL.canonical_storage_name(), "Animal");
/// assert_eq!(DOG.canonical_storage_name(), "Animal");
/// assert_eq!(DOG.name(), "Dog");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeDescriptor {
	name: &'static str,
	storage_name: Option<&'static str>,
}

impl TypeDescriptor {
	pub const fn new(name: &'static str) -> Self {
		Self {
			name,
			storage_name: None,
		}
	}

	/// Store this type under another type's name (STI subclass, renamed type)
	pub const fn stored_as(mut self, storage_name: &'static str) -> Self {
		self.storage_name = Some(storage_name);
		self
	}

	/// The type's own name
	pub const fn name(&self) -> &'static str {
		self.name
	}

	/// Name used for storage and registry lookup
	pub const fn canonical_storage_name(&self) -> &'static str {
		match self.storage_name {
			Some(storage_name) => storage_name,
			None => self.name,
		}
	}

	/// Whether the storage name differs from the type's own name
	pub fn is_redirected(&self) -> bool {
		self.storage_name.is_some_and(|storage| storage != self.name)
	}
}

/// Canonical name used as the registry key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedTypeName(String);

impl NormalizedTypeName {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn into_string(self) -> String {
		self.0
	}
}

impl fmt::Display for NormalizedTypeName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for NormalizedTypeName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for NormalizedTypeName {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl PartialEq<str> for NormalizedTypeName {
	fn eq(&self, other: &str) -> bool {
		self.0 == other
	}
}

impl PartialEq<&str> for NormalizedTypeName {
	fn eq(&self, other: &&str) -> bool {
		self.0 == *other
	}
}

/// A live record that can be the target of a polymorphic reference
///
/// # Examples
///
/// ```
/// use reinhardt_polytype::{ObjectId, PolymorphicRecord, TypeDescriptor};
///
/// #[derive(Debug)]
/// struct Dog {
///     id: Option<ObjectId>,
/// }
///
/// impl PolymorphicRecord for Dog {
///     fn type_descriptor(&self) -> TypeDescriptor {
///         TypeDescriptor::new("Dog").stored_as("Animal")
///     }
///
///     fn primary_key(&self) -> Option<ObjectId> {
///         self.id
///     }
/// }
///
/// let dog: &dyn PolymorphicRecord = &Dog { id: Some(3) };
/// assert!(dog.downcast_ref::<Dog>().is_some());
/// ```
pub trait PolymorphicRecord: Any + Send + Sync + fmt::Debug {
	/// Identity of the record's concrete type
	fn type_descriptor(&self) -> TypeDescriptor;

	/// Primary key, `None` while unsaved
	fn primary_key(&self) -> Option<ObjectId>;
}

impl dyn PolymorphicRecord {
	pub fn downcast_ref<T: PolymorphicRecord>(&self) -> Option<&T> {
		let any: &dyn Any = self;
		any.downcast_ref::<T>()
	}

	pub fn is<T: PolymorphicRecord>(&self) -> bool {
		self.downcast_ref::<T>().is_some()
	}

	/// `(concrete type name, primary key)`, used to compare records by identity
	pub fn record_identity(&self) -> (&'static str, Option<ObjectId>) {
		(self.type_descriptor().name(), self.primary_key())
	}
}

/// Anything that can be normalized to a storage name
#[derive(Debug, Clone, Copy)]
pub enum Normalizable<'a> {
	Record(&'a dyn PolymorphicRecord),
	Type(TypeDescriptor),
}

impl<'a> From<&'a dyn PolymorphicRecord> for Normalizable<'a> {
	fn from(record: &'a dyn PolymorphicRecord) -> Self {
		Self::Record(record)
	}
}

impl<'a, T: PolymorphicRecord> From<&'a T> for Normalizable<'a> {
	fn from(record: &'a T) -> Self {
		Self::Record(record)
	}
}

impl From<TypeDescriptor> for Normalizable<'_> {
	fn from(descriptor: TypeDescriptor) -> Self {
		Self::Type(descriptor)
	}
}

/// Storage name for a live record or a type descriptor
///
/// # Examples
///
/// ```
/// use reinhardt_polytype::{TypeDescriptor, storage_name_for};
///
/// let name = storage_name_for(TypeDescriptor::new("Dog").stored_as("Animal"));
/// assert_eq!(name, "Animal");
/// ```
pub fn storage_name_for<'a>(value: impl Into<Normalizable<'a>>) -> NormalizedTypeName {
	let descriptor = match value.into() {
		Normalizable::Record(record) => record.type_descriptor(),
		Normalizable::Type(descriptor) => descriptor,
	};
	NormalizedTypeName::new(descriptor.canonical_storage_name())
}

#[cfg(test)]
mod tests {
	use super::*;

	const ANIMAL: TypeDescriptor = TypeDescriptor::new("Animal");
	const DOG: TypeDescriptor = TypeDescriptor::new("Dog").stored_as("Animal");
	const NAMESPACED_ANIMAL: TypeDescriptor =
		TypeDescriptor::new("Namespaced::Animal").stored_as("Animal");

	#[derive(Debug)]
	struct Dog {
		id: ObjectId,
	}

	impl PolymorphicRecord for Dog {
		fn type_descriptor(&self) -> TypeDescriptor {
			DOG
		}

		fn primary_key(&self) -> Option<ObjectId> {
			Some(self.id)
		}
	}

	#[test]
	fn test_plain_type_uses_own_name() {
		assert_eq!(storage_name_for(ANIMAL), "Animal");
		assert!(!ANIMAL.is_redirected());
	}

	#[test]
	fn test_sti_leaf_uses_root_name() {
		let dog = Dog { id: 5 };

		assert_eq!(storage_name_for(&dog), "Animal");
		assert_eq!(storage_name_for(DOG), storage_name_for(NAMESPACED_ANIMAL));
		assert!(DOG.is_redirected());
	}

	#[test]
	fn test_record_and_type_normalize_identically() {
		let dog = Dog { id: 5 };
		let record: &dyn PolymorphicRecord = &dog;

		assert_eq!(storage_name_for(record), storage_name_for(DOG));
	}

	#[test]
	fn test_record_identity_and_downcast() {
		let dog = Dog { id: 9 };
		let record: &dyn PolymorphicRecord = &dog;

		assert_eq!(record.record_identity(), ("Dog", Some(9)));
		assert!(record.is::<Dog>());
		assert_eq!(record.downcast_ref::<Dog>().map(|d| d.id), Some(9));
	}
}
