//! Query building for polymorphic columns
//!
//! Builds `sea-query` conditions and statements that go through the same
//! encode and normalize path as assignment, so filtering by a live record and
//! filtering by its raw `(id, encoded type)` pair produce the same predicate.
//! Executing the statements is left to the caller.

use crate::descriptor::{AssociationDescriptor, ReferenceInput, StoredReference, StoredType};
use crate::error::Result;
use crate::normalize::{Normalizable, ObjectId, PolymorphicRecord};
use sea_query::{Alias, Asterisk, Condition, Expr, ExprTrait, Query, SelectStatement, Value};

/// Predicate builder for one association
#[derive(Debug, Clone, Copy)]
pub struct ReferenceQuery<'a> {
	association: &'a AssociationDescriptor,
}

impl<'a> ReferenceQuery<'a> {
	pub fn new(association: &'a AssociationDescriptor) -> Self {
		Self { association }
	}

	/// `WHERE role = value` for a live record, raw pair or null
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polytype::{AssociationDescriptor, GlobalRegistries, ReferenceQuery};
	/// use sea_query::{Alias, Asterisk, PostgresQueryBuilder, Query};
	///
	/// let globals = GlobalRegistries::builder()
	///     .role_table("source", [(1, "Person"), (2, "Animal")])
	///     .build()
	///     .unwrap();
	/// let source = AssociationDescriptor::belongs_to("Link", "source")
	///     .table("links")
	///     .build_with(&globals)
	///     .unwrap();
	///
	/// let cond = ReferenceQuery::new(&source).filter_by((7, "Animal")).unwrap();
	/// let sql = Query::select()
	///     .column(Asterisk)
	///     .from(Alias::new("links"))
	///     .cond_where(cond)
	///     .to_owned()
	///     .to_string(PostgresQueryBuilder);
	///
	/// assert!(sql.contains(r#""links"."source_id" = 7"#));
	/// assert!(sql.contains(r#""links"."source_type" = 2"#));
	/// ```
	pub fn filter_by<'r>(&self, value: impl Into<ReferenceInput<'r>>) -> Result<Condition> {
		let stored = self.association.encode_reference(value)?;
		self.filter_by_raw(&stored)
	}

	/// `WHERE role = stored pair`, with the type already encoded
	pub fn filter_by_raw(&self, stored: &StoredReference) -> Result<Condition> {
		self.association.check_nullity(stored)?;

		let cond = match (stored.id, &stored.type_value) {
			(Some(id), Some(type_value)) => Condition::all()
				.add(self.id_column().eq(id))
				.add(self.type_column().eq(type_value_of(type_value))),
			_ => Condition::all()
				.add(self.id_column().is_null())
				.add(self.type_column().is_null()),
		};
		Ok(cond)
	}

	/// `WHERE role_type = encode(normalize(value))`, any id
	pub fn filter_by_type<'r>(&self, value: impl Into<Normalizable<'r>>) -> Result<Condition> {
		let type_value = self.association.encode_type(value)?;
		Ok(Condition::all().add(self.type_column().eq(type_value_of(&type_value))))
	}

	/// Rows of the association's table that reference `owner`
	///
	/// Used by the inverse (has-many "as") side. The pair is encoded exactly
	/// like a forward assignment of `owner`.
	pub fn inverse_filter(&self, owner: &dyn PolymorphicRecord) -> Result<Condition> {
		let stored = self.association.inverse_key(owner)?;
		self.filter_by_raw(&stored)
	}

	/// `SELECT * FROM table WHERE <inverse filter>`
	pub fn select_inverse(&self, owner: &dyn PolymorphicRecord) -> Result<SelectStatement> {
		Ok(Query::select()
			.column(Asterisk)
			.from(Alias::new(self.association.table()))
			.cond_where(self.inverse_filter(owner)?)
			.to_owned())
	}

	/// `SELECT * FROM table WHERE pk IN (ids)` for one batch fetch group
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_polytype::ReferenceQuery;
	/// use sea_query::PostgresQueryBuilder;
	///
	/// let sql = ReferenceQuery::select_targets("animals", "id", &[7, 8])
	///     .to_string(PostgresQueryBuilder);
	/// assert_eq!(sql, r#"SELECT * FROM "animals" WHERE "id" IN (7, 8)"#);
	/// ```
	pub fn select_targets(table: &str, pk_column: &str, ids: &[ObjectId]) -> SelectStatement {
		Query::select()
			.column(Asterisk)
			.from(Alias::new(table))
			.and_where(Expr::col(Alias::new(pk_column)).is_in(ids.iter().copied()))
			.to_owned()
	}

	fn id_column(&self) -> Expr {
		Expr::col((
			Alias::new(self.association.table()),
			Alias::new(self.association.id_column()),
		))
	}

	fn type_column(&self) -> Expr {
		Expr::col((
			Alias::new(self.association.table()),
			Alias::new(self.association.type_column()),
		))
	}
}

fn type_value_of(stored: &StoredType) -> Value {
	match stored {
		StoredType::Code(code) => code.get().into(),
		StoredType::Name(name) => name.clone().into(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::PolytypeError;
	use crate::normalize::TypeDescriptor;
	use crate::registry::GlobalRegistries;
	use rstest::{fixture, rstest};
	use sea_query::PostgresQueryBuilder;

	#[derive(Debug)]
	struct Pet {
		descriptor: TypeDescriptor,
		id: ObjectId,
	}

	impl PolymorphicRecord for Pet {
		fn type_descriptor(&self) -> TypeDescriptor {
			self.descriptor
		}

		fn primary_key(&self) -> Option<ObjectId> {
			Some(self.id)
		}
	}

	#[fixture]
	fn source() -> AssociationDescriptor {
		let globals = GlobalRegistries::builder()
			.role_table("source", [(1, "Person"), (2, "Animal")])
			.build()
			.unwrap();
		AssociationDescriptor::belongs_to("Link", "source")
			.table("links")
			.build_with(&globals)
			.unwrap()
	}

	fn render(cond: Condition) -> String {
		Query::select()
			.column(Asterisk)
			.from(Alias::new("links"))
			.cond_where(cond)
			.to_owned()
			.to_string(PostgresQueryBuilder)
	}

	#[rstest]
	fn test_filter_by_record_matches_raw_pair(source: AssociationDescriptor) {
		// Arrange
		let query = ReferenceQuery::new(&source);
		let dog = Pet {
			descriptor: TypeDescriptor::new("Dog").stored_as("Animal"),
			id: 7,
		};

		// Act
		let by_record = render(query.filter_by(&dog).unwrap());
		let by_raw = render(query.filter_by_raw(&StoredReference::coded(7, 2)).unwrap());

		// Assert
		assert_eq!(by_record, by_raw);
		assert_eq!(
			by_record,
			r#"SELECT * FROM "links" WHERE "links"."source_id" = 7 AND "links"."source_type" = 2"#
		);
	}

	#[rstest]
	fn test_filter_by_null(source: AssociationDescriptor) {
		let sql = render(
			ReferenceQuery::new(&source)
				.filter_by(ReferenceInput::Null)
				.unwrap(),
		);

		assert!(sql.contains(r#""links"."source_id" IS NULL"#));
		assert!(sql.contains(r#""links"."source_type" IS NULL"#));
	}

	#[rstest]
	fn test_filter_by_unknown_type_fails_before_query(source: AssociationDescriptor) {
		let err = ReferenceQuery::new(&source)
			.filter_by((7, "Robot"))
			.unwrap_err();

		assert!(matches!(err, PolytypeError::UnknownType { .. }));
	}

	#[rstest]
	fn test_filter_by_type(source: AssociationDescriptor) {
		let sql = render(
			ReferenceQuery::new(&source)
				.filter_by_type(TypeDescriptor::new("Dog").stored_as("Animal"))
				.unwrap(),
		);

		assert!(sql.ends_with(r#"WHERE "links"."source_type" = 2"#));
		assert!(!sql.contains("source_id"));
	}

	#[rstest]
	fn test_select_inverse(source: AssociationDescriptor) {
		let person = Pet {
			descriptor: TypeDescriptor::new("Person"),
			id: 3,
		};

		let sql = ReferenceQuery::new(&source)
			.select_inverse(&person)
			.unwrap()
			.to_string(PostgresQueryBuilder);

		assert_eq!(
			sql,
			r#"SELECT * FROM "links" WHERE "links"."source_id" = 3 AND "links"."source_type" = 1"#
		);
	}

	#[test]
	fn test_string_typed_filter_binds_name() {
		let target = AssociationDescriptor::belongs_to("InlineLink", "normal_target")
			.table("links")
			.string_typed()
			.build_with(&GlobalRegistries::default())
			.unwrap();

		let sql = render(
			ReferenceQuery::new(&target)
				.filter_by((4, "InlineDrink"))
				.unwrap(),
		);

		assert!(sql.contains(r#""links"."normal_target_type" = 'InlineDrink'"#));
	}

	#[test]
	fn test_select_targets() {
		let sql = ReferenceQuery::select_targets("people", "id", &[1, 4, 9])
			.to_string(PostgresQueryBuilder);

		assert_eq!(sql, r#"SELECT * FROM "people" WHERE "id" IN (1, 4, 9)"#);
	}
}
