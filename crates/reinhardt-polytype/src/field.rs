//! # Polymorphic Fields
//!
//! [`PolymorphicField`] is the typed accessor an owning record holds for each
//! declared polymorphic role. It keeps the raw `(id, type)` columns, exposes
//! the decoded type name rather than the stored code, and memoizes the
//! resolved target for the lifetime of the owning record.
//!
//! The [`polymorphic_accessors!`](crate::polymorphic_accessors) macro generates
//! role-named methods (`source_id`, `source_type`, `set_source`, ...) on the
//! owning record from its fields.

use crate::descriptor::{AssociationDescriptor, ReferenceInput, StoredReference, StoredType};
use crate::error::Result;
use crate::normalize::{NormalizedTypeName, ObjectId};
use crate::registry::TypeCode;
use crate::resolver::{RecordFetcher, RecordRef, Resolver};
use std::fmt;
use std::sync::Arc;

/// One polymorphic role on an owning record
pub struct PolymorphicField {
	association: Arc<AssociationDescriptor>,
	id: Option<ObjectId>,
	type_value: Option<StoredType>,
	// `Some(None)` memoizes a reference that resolved to no row
	target: Option<Option<RecordRef>>,
}

impl PolymorphicField {
	/// Create an unset field
	pub fn new(association: Arc<AssociationDescriptor>) -> Self {
		Self {
			association,
			id: None,
			type_value: None,
			target: None,
		}
	}

	/// Create a field from columns read out of storage
	///
	/// Fails when exactly one of the two columns is null.
	pub fn from_stored(
		association: Arc<AssociationDescriptor>,
		stored: StoredReference,
	) -> Result<Self> {
		let mut field = Self::new(association);
		field.assign_raw(stored)?;
		Ok(field)
	}

	pub fn association(&self) -> &Arc<AssociationDescriptor> {
		&self.association
	}

	/// Assign from a live record, an explicit `(id, type name)` pair or null
	///
	/// A live record is normalized before encoding. An unsaved record stores
	/// its type with a null id, so [`Self::type_name`] works but
	/// [`Self::stored`] and [`Self::load`] fail until an id is set.
	///
	/// # Examples
	///
	/// ```
	/// use std::sync::Arc;
	/// use reinhardt_polytype::{
	///     AssociationDescriptor, GlobalRegistries, PolymorphicField, TypeCode,
	/// };
	///
	/// let globals = GlobalRegistries::builder()
	///     .role_table("source", [(1, "Person"), (2, "Animal")])
	///     .build()
	///     .unwrap();
	/// let source = Arc::new(
	///     AssociationDescriptor::belongs_to("Link", "source")
	///         .build_with(&globals)
	///         .unwrap(),
	/// );
	///
	/// let mut field = PolymorphicField::new(source);
	/// field.set((7, "Animal")).unwrap();
	///
	/// assert_eq!(field.id(), Some(7));
	/// assert_eq!(field.type_name().unwrap().unwrap(), "Animal");
	/// assert_eq!(field.raw_type_code(), Some(TypeCode::new(2)));
	/// ```
	pub fn set<'a>(&mut self, input: impl Into<ReferenceInput<'a>>) -> Result<()> {
		let (id, type_value) = match input.into() {
			ReferenceInput::Null => (None, None),
			ReferenceInput::Raw { id, type_name } => {
				(Some(id), Some(self.association.encode_type_name(type_name)?))
			}
			ReferenceInput::Record(record) => {
				(record.primary_key(), Some(self.association.encode_type(record)?))
			}
		};
		self.id = id;
		self.type_value = type_value;
		self.target = None;
		Ok(())
	}

	/// Assign a live record and memoize it as the resolved target
	pub fn set_record(&mut self, record: RecordRef) -> Result<()> {
		self.set(&*record)?;
		self.target = Some(Some(record));
		Ok(())
	}

	/// Replace only the id column
	pub fn set_id(&mut self, id: Option<ObjectId>) {
		self.id = id;
		self.target = None;
	}

	/// Replace only the type column from a canonical type name
	///
	/// The name is encoded as given, without normalization.
	pub fn set_type_name(&mut self, type_name: Option<&str>) -> Result<()> {
		self.type_value = type_name
			.map(|name| self.association.encode_type_name(name))
			.transpose()?;
		self.target = None;
		Ok(())
	}

	/// Replace both columns with values read from storage
	pub fn assign_raw(&mut self, stored: StoredReference) -> Result<()> {
		self.association.check_nullity(&stored)?;
		self.id = stored.id;
		self.type_value = stored.type_value;
		self.target = None;
		Ok(())
	}

	pub fn id(&self) -> Option<ObjectId> {
		self.id
	}

	/// Decoded type name, never the stored code
	pub fn type_name(&self) -> Result<Option<NormalizedTypeName>> {
		self.type_value
			.as_ref()
			.map(|stored| self.association.decode_type(stored))
			.transpose()
	}

	/// Physical value of the type column
	pub fn raw_type(&self) -> Option<&StoredType> {
		self.type_value.as_ref()
	}

	/// Physical type code, `None` when null or string-typed
	pub fn raw_type_code(&self) -> Option<TypeCode> {
		self.type_value.as_ref().and_then(StoredType::as_code)
	}

	/// Both columns, rejecting a partially null pair
	pub fn stored(&self) -> Result<StoredReference> {
		let stored = StoredReference::new(self.id, self.type_value.clone());
		self.association.check_nullity(&stored)?;
		Ok(stored)
	}

	pub fn is_null(&self) -> bool {
		self.id.is_none() && self.type_value.is_none()
	}

	/// Resolve the target, memoizing the result
	pub async fn load<F>(&mut self, fetcher: &F) -> Result<Option<RecordRef>>
	where
		F: RecordFetcher + ?Sized,
	{
		if let Some(target) = &self.target {
			return Ok(target.clone());
		}
		let stored = self.stored()?;
		let target = Resolver::new(&self.association, fetcher)
			.resolve_one(&stored)
			.await?;
		self.target = Some(target.clone());
		Ok(target)
	}

	/// Memoized target, if loaded and present
	pub fn cached(&self) -> Option<&RecordRef> {
		self.target.as_ref().and_then(Option::as_ref)
	}

	pub fn is_loaded(&self) -> bool {
		self.target.is_some()
	}

	/// Drop the memoized target
	pub fn reset(&mut self) {
		self.target = None;
	}

	pub(crate) fn fill_cache(&mut self, target: Option<RecordRef>) {
		self.target = Some(target);
	}
}

impl Clone for PolymorphicField {
	/// Clones the columns only; the memoized target stays with the original
	fn clone(&self) -> Self {
		Self {
			association: Arc::clone(&self.association),
			id: self.id,
			type_value: self.type_value.clone(),
			target: None,
		}
	}
}

impl fmt::Debug for PolymorphicField {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PolymorphicField")
			.field("association", &self.association.qualified_name())
			.field("id", &self.id)
			.field("type_value", &self.type_value)
			.field("loaded", &self.is_loaded())
			.finish()
	}
}

/// Generate role-named accessors on an owning record
///
/// Each listed role must be a [`PolymorphicField`] field of the record. For a
/// role `source` this generates `source_id`, `source_type` (decoded name),
/// `raw_source_type`, `source_type_mapping`, `set_source`, `set_source_id`,
/// `set_source_type` and `load_source`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use reinhardt_polytype::{
///     AssociationDescriptor, GlobalRegistries, PolymorphicField, polymorphic_accessors,
/// };
///
/// struct Link {
///     source: PolymorphicField,
/// }
///
/// polymorphic_accessors!(Link { source });
///
/// let globals = GlobalRegistries::builder()
///     .role_table("source", [(1, "Person"), (2, "Animal")])
///     .build()
///     .unwrap();
/// let source = AssociationDescriptor::belongs_to("Link", "source")
///     .build_with(&globals)
///     .unwrap();
/// let mut link = Link {
///     source: PolymorphicField::new(Arc::new(source)),
/// };
///
/// link.set_source((7, "Animal")).unwrap();
/// assert_eq!(link.source_id(), Some(7));
/// assert_eq!(link.source_type().unwrap().unwrap(), "Animal");
/// assert_eq!(link.source_type_mapping().unwrap().len(), 2);
/// ```
#[macro_export]
macro_rules! polymorphic_accessors {
	($owner:ty { $($role:ident),+ $(,)? }) => {
		$crate::paste::paste! {
			impl $owner {
				$(
					pub fn [<$role _id>](&self) -> ::std::option::Option<$crate::ObjectId> {
						self.$role.id()
					}

					pub fn [<$role _type>](
						&self,
					) -> $crate::Result<::std::option::Option<$crate::NormalizedTypeName>> {
						self.$role.type_name()
					}

					pub fn [<raw_ $role _type>](
						&self,
					) -> ::std::option::Option<&$crate::StoredType> {
						self.$role.raw_type()
					}

					pub fn [<$role _type_mapping>](
						&self,
					) -> ::std::option::Option<&$crate::CodeTable> {
						self.$role.association().type_mapping()
					}

					pub fn [<set_ $role>]<'a>(
						&mut self,
						input: impl ::std::convert::Into<$crate::ReferenceInput<'a>>,
					) -> $crate::Result<()> {
						self.$role.set(input)
					}

					pub fn [<set_ $role _id>](
						&mut self,
						id: ::std::option::Option<$crate::ObjectId>,
					) {
						self.$role.set_id(id)
					}

					pub fn [<set_ $role _type>](
						&mut self,
						type_name: ::std::option::Option<&str>,
					) -> $crate::Result<()> {
						self.$role.set_type_name(type_name)
					}

					pub async fn [<load_ $role>]<F>(
						&mut self,
						fetcher: &F,
					) -> $crate::Result<::std::option::Option<$crate::RecordRef>>
					where
						F: $crate::RecordFetcher + ?Sized,
					{
						self.$role.load(fetcher).await
					}
				)+
			}
		}
	};
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::PolytypeError;
	use crate::normalize::{PolymorphicRecord, TypeDescriptor};
	use crate::registry::GlobalRegistries;
	use async_trait::async_trait;
	use rstest::{fixture, rstest};
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Debug)]
	struct Animal {
		id: Option<ObjectId>,
	}

	impl PolymorphicRecord for Animal {
		fn type_descriptor(&self) -> TypeDescriptor {
			TypeDescriptor::new("Animal")
		}

		fn primary_key(&self) -> Option<ObjectId> {
			self.id
		}
	}

	#[derive(Default)]
	struct CountingFetcher {
		fetches: AtomicUsize,
	}

	#[async_trait]
	impl RecordFetcher for CountingFetcher {
		async fn fetch_one(
			&self,
			_type_name: &NormalizedTypeName,
			id: ObjectId,
		) -> anyhow::Result<Option<RecordRef>> {
			self.fetches.fetch_add(1, Ordering::SeqCst);
			Ok(Some(Arc::new(Animal { id: Some(id) })))
		}

		async fn fetch_many(
			&self,
			_type_name: &NormalizedTypeName,
			ids: &[ObjectId],
		) -> anyhow::Result<Vec<RecordRef>> {
			self.fetches.fetch_add(1, Ordering::SeqCst);
			Ok(ids
				.iter()
				.map(|id| Arc::new(Animal { id: Some(*id) }) as RecordRef)
				.collect())
		}
	}

	#[fixture]
	fn field() -> PolymorphicField {
		let globals = GlobalRegistries::builder()
			.role_table("source", [(1, "Person"), (2, "Animal")])
			.build()
			.unwrap();
		let source = AssociationDescriptor::belongs_to("Link", "source")
			.build_with(&globals)
			.unwrap();
		PolymorphicField::new(Arc::new(source))
	}

	#[rstest]
	fn test_set_record_stores_code(mut field: PolymorphicField) {
		let animal = Animal { id: Some(7) };

		field.set(&animal).unwrap();

		assert_eq!(field.stored().unwrap(), StoredReference::coded(7, 2));
		assert_eq!(field.type_name().unwrap().unwrap(), "Animal");
		assert_eq!(field.raw_type_code(), Some(TypeCode::new(2)));
	}

	#[rstest]
	fn test_unsaved_record_keeps_type(mut field: PolymorphicField) {
		let animal = Animal { id: None };

		field.set(&animal).unwrap();

		assert_eq!(field.id(), None);
		assert_eq!(field.type_name().unwrap().unwrap(), "Animal");
		assert!(matches!(
			field.stored(),
			Err(PolytypeError::InconsistentNullity { .. })
		));
	}

	#[rstest]
	fn test_set_null_clears_both_columns(mut field: PolymorphicField) {
		field.set((7, "Animal")).unwrap();

		field.set(ReferenceInput::Null).unwrap();

		assert!(field.is_null());
		assert_eq!(field.type_name().unwrap(), None);
		assert!(field.stored().unwrap().is_null());
	}

	#[rstest]
	fn test_unknown_type_leaves_field_untouched(mut field: PolymorphicField) {
		field.set((7, "Animal")).unwrap();

		let err = field.set((8, "Robot")).unwrap_err();

		assert!(matches!(err, PolytypeError::UnknownType { .. }));
		assert_eq!(field.stored().unwrap(), StoredReference::coded(7, 2));
	}

	#[rstest]
	fn test_assign_raw_rejects_partial_null(mut field: PolymorphicField) {
		let err = field
			.assign_raw(StoredReference::new(Some(7), None))
			.unwrap_err();

		assert!(matches!(err, PolytypeError::InconsistentNullity { .. }));
		assert!(field.is_null());
	}

	#[rstest]
	#[tokio::test]
	async fn test_load_memoizes(mut field: PolymorphicField) {
		// Arrange
		let fetcher = CountingFetcher::default();
		field.set((7, "Animal")).unwrap();

		// Act
		let first = field.load(&fetcher).await.unwrap().unwrap();
		let second = field.load(&fetcher).await.unwrap().unwrap();

		// Assert
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 1);
		assert!(field.cached().is_some());
	}

	#[rstest]
	#[tokio::test]
	async fn test_reassignment_drops_memo(mut field: PolymorphicField) {
		let fetcher = CountingFetcher::default();
		field.set((7, "Animal")).unwrap();
		field.load(&fetcher).await.unwrap();

		field.set_id(Some(8));
		let target = field.load(&fetcher).await.unwrap().unwrap();

		assert_eq!(target.primary_key(), Some(8));
		assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 2);
	}

	#[rstest]
	#[tokio::test]
	async fn test_set_record_is_memoized(mut field: PolymorphicField) {
		let fetcher = CountingFetcher::default();
		let animal: RecordRef = Arc::new(Animal { id: Some(3) });

		field.set_record(Arc::clone(&animal)).unwrap();
		let loaded = field.load(&fetcher).await.unwrap().unwrap();

		assert!(Arc::ptr_eq(&animal, &loaded));
		assert_eq!(fetcher.fetches.load(Ordering::SeqCst), 0);
	}

	#[rstest]
	#[tokio::test]
	async fn test_clone_does_not_share_memo(mut field: PolymorphicField) {
		let fetcher = CountingFetcher::default();
		field.set((7, "Animal")).unwrap();
		field.load(&fetcher).await.unwrap();

		let copy = field.clone();

		assert!(field.is_loaded());
		assert!(!copy.is_loaded());
		assert_eq!(copy.stored().unwrap(), field.stored().unwrap());
	}

	#[rstest]
	fn test_set_type_name_is_not_normalized(mut field: PolymorphicField) {
		let err = field.set_type_name(Some("Dog")).unwrap_err();

		assert!(matches!(err, PolytypeError::UnknownType { .. }));
	}
}
