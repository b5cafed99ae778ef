//! # Reference Resolution
//!
//! Turns stored `(id, type)` pairs into live records through a persistence
//! collaborator implementing [`RecordFetcher`].
//!
//! Single reads decode and fetch one record. Batch reads decode every pair
//! first, group ids by resolved type name and issue one `fetch_many` per
//! distinct type, then reattach each returned record to the rows that
//! referenced it by primary key.

use crate::descriptor::{AssociationDescriptor, DecodedReference, StoredReference};
use crate::error::{PolytypeError, Result};
use crate::field::PolymorphicField;
use crate::normalize::{NormalizedTypeName, ObjectId, PolymorphicRecord};
use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::sync::Arc;

/// Shared handle to a resolved record
pub type RecordRef = Arc<dyn PolymorphicRecord>;

/// Persistence collaborator used to load referenced records
///
/// `type_name` is always a canonical storage name. For STI hierarchies the
/// collaborator may return any member of the hierarchy stored under that
/// name.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use reinhardt_polytype::{NormalizedTypeName, ObjectId, RecordFetcher, RecordRef};
///
/// struct NoRows;
///
/// #[async_trait]
/// impl RecordFetcher for NoRows {
///     async fn fetch_one(
///         &self,
///         _type_name: &NormalizedTypeName,
///         _id: ObjectId,
///     ) -> anyhow::Result<Option<RecordRef>> {
///         Ok(None)
///     }
///
///     async fn fetch_many(
///         &self,
///         _type_name: &NormalizedTypeName,
///         _ids: &[ObjectId],
///     ) -> anyhow::Result<Vec<RecordRef>> {
///         Ok(Vec::new())
///     }
/// }
/// ```
#[async_trait]
pub trait RecordFetcher: Send + Sync {
	/// Load one record of `type_name` by primary key
	async fn fetch_one(
		&self,
		type_name: &NormalizedTypeName,
		id: ObjectId,
	) -> anyhow::Result<Option<RecordRef>>;

	/// Load every record of `type_name` whose primary key is in `ids`
	///
	/// Order of the returned records is not significant.
	async fn fetch_many(
		&self,
		type_name: &NormalizedTypeName,
		ids: &[ObjectId],
	) -> anyhow::Result<Vec<RecordRef>>;
}

/// Resolves references of one association through a fetcher
pub struct Resolver<'a, F: RecordFetcher + ?Sized> {
	association: &'a AssociationDescriptor,
	fetcher: &'a F,
}

impl<'a, F: RecordFetcher + ?Sized> Resolver<'a, F> {
	pub fn new(association: &'a AssociationDescriptor, fetcher: &'a F) -> Self {
		Self {
			association,
			fetcher,
		}
	}

	pub fn association(&self) -> &AssociationDescriptor {
		self.association
	}

	/// Resolve one stored pair
	///
	/// A null pair resolves to `None` without touching the fetcher.
	pub async fn resolve_one(&self, stored: &StoredReference) -> Result<Option<RecordRef>> {
		let Some(DecodedReference { id, type_name }) = self.association.decode_reference(stored)?
		else {
			return Ok(None);
		};

		tracing::trace!(
			association = %self.association.qualified_name(),
			type_name = type_name.as_str(),
			id,
			"resolving polymorphic reference"
		);

		self.fetcher
			.fetch_one(&type_name, id)
			.await
			.map_err(PolytypeError::Persistence)
	}

	/// Resolve many stored pairs with one fetch per distinct type
	///
	/// The result has one slot per input, in input order. Null pairs and ids
	/// the fetcher did not return resolve to `None`. Every pair is decoded
	/// before the first fetch, so a bad code fails the whole batch without
	/// any I/O.
	pub async fn resolve_many(&self, stored: &[StoredReference]) -> Result<Vec<Option<RecordRef>>> {
		let decoded = stored
			.iter()
			.map(|pair| self.association.decode_reference(pair))
			.collect::<Result<Vec<_>>>()?;

		let mut groups: IndexMap<NormalizedTypeName, IndexSet<ObjectId>> = IndexMap::new();
		for reference in decoded.iter().flatten() {
			groups
				.entry(reference.type_name.clone())
				.or_default()
				.insert(reference.id);
		}

		let mut loaded: HashMap<(NormalizedTypeName, ObjectId), RecordRef> = HashMap::new();
		for (type_name, ids) in &groups {
			let ids: Vec<ObjectId> = ids.iter().copied().collect();
			tracing::debug!(
				association = %self.association.qualified_name(),
				type_name = type_name.as_str(),
				ids = ids.len(),
				"batch loading polymorphic references"
			);

			let records = self
				.fetcher
				.fetch_many(type_name, &ids)
				.await
				.map_err(PolytypeError::Persistence)?;
			for record in records {
				if let Some(pk) = record.primary_key() {
					loaded.insert((type_name.clone(), pk), record);
				}
			}
		}

		Ok(decoded
			.into_iter()
			.map(|reference| {
				reference.and_then(|DecodedReference { id, type_name }| {
					loaded.get(&(type_name, id)).cloned()
				})
			})
			.collect())
	}

	/// Eager load a set of fields in place
	///
	/// Every field must belong to this resolver's association, loaded or not.
	/// Fields that already hold a memoized target are not fetched again.
	pub async fn preload<'f, I>(&self, fields: I) -> Result<()>
	where
		I: IntoIterator<Item = &'f mut PolymorphicField>,
	{
		let mut pending: Vec<&'f mut PolymorphicField> = Vec::new();
		for field in fields {
			if field.association().qualified_name() != self.association.qualified_name() {
				return Err(PolytypeError::AssociationMismatch {
					expected: self.association.qualified_name(),
					found: field.association().qualified_name(),
				});
			}
			if !field.is_loaded() {
				pending.push(field);
			}
		}

		let stored = pending
			.iter()
			.map(|field| field.stored())
			.collect::<Result<Vec<_>>>()?;
		let resolved = self.resolve_many(&stored).await?;

		for (field, record) in pending.into_iter().zip(resolved) {
			field.fill_cache(record);
		}
		Ok(())
	}
}
