//! # Reinhardt Polytype
//!
//! Integer-coded polymorphic references for Reinhardt models.
//!
//! A polymorphic reference points at a row whose type is chosen per row. It is
//! persisted as two columns: the target's primary key and a small integer
//! type code standing in for the target's type name. This crate owns the
//! mapping between the two representations:
//!
//! - **Registries** (`registry` module): bidirectional `code <-> name` tables,
//!   either global per role or local to one association
//! - **Normalization** (`normalize` module): STI subtypes are stored under
//!   their hierarchy's canonical name
//! - **Descriptors** (`descriptor` module): one declared association with its
//!   columns and registry, encoding and decoding stored pairs
//! - **Resolver** (`resolver` module): single and batched loading through a
//!   persistence collaborator, one fetch per distinct type
//! - **Fields** (`field` module): typed per-role accessor with memoization
//!   and the [`polymorphic_accessors!`] macro
//! - **Queries** (`query` module): `sea-query` predicates built through the
//!   same encode path as assignment
//! - **Configuration** (`config` module): code tables loaded from TOML
//! - **Inspection** (`inspect` module): listing, validation and reports
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use reinhardt_polytype::{
//!     AssociationDescriptor, GlobalRegistries, ObjectId, PolymorphicField, PolymorphicRecord,
//!     StoredReference, TypeDescriptor, polymorphic_accessors,
//! };
//!
//! #[derive(Debug)]
//! struct Dog {
//!     id: ObjectId,
//! }
//!
//! impl PolymorphicRecord for Dog {
//!     fn type_descriptor(&self) -> TypeDescriptor {
//!         TypeDescriptor::new("Dog").stored_as("Animal")
//!     }
//!
//!     fn primary_key(&self) -> Option<ObjectId> {
//!         Some(self.id)
//!     }
//! }
//!
//! struct Link {
//!     source: PolymorphicField,
//! }
//!
//! polymorphic_accessors!(Link { source });
//!
//! let globals = GlobalRegistries::builder()
//!     .role_table("source", [(1, "Person"), (2, "Animal")])
//!     .build()
//!     .unwrap();
//! let source = Arc::new(
//!     AssociationDescriptor::belongs_to("Link", "source")
//!         .build_with(&globals)
//!         .unwrap(),
//! );
//!
//! let mut link = Link {
//!     source: PolymorphicField::new(source),
//! };
//! link.set_source(&Dog { id: 7 }).unwrap();
//!
//! assert_eq!(link.source_type().unwrap().unwrap(), "Animal");
//! assert_eq!(link.source.stored().unwrap(), StoredReference::coded(7, 2));
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod inspect;
pub mod normalize;
pub mod query;
pub mod registry;
pub mod resolver;

pub use config::{AssociationSettings, PolytypeSettings, RoleSettings};
pub use descriptor::{
	AssociationBuilder, AssociationDescriptor, AssociationKind, DecodedReference,
	ReferenceInput, RegistrySource, StoredReference, StoredType,
};
pub use error::{ConfigError, PolytypeError, Result};
pub use field::PolymorphicField;
pub use inspect::{InspectOptions, RegistryInspector, ScopeInfo};
pub use normalize::{
	Normalizable, NormalizedTypeName, ObjectId, PolymorphicRecord, TypeDescriptor,
	storage_name_for,
};
pub use query::ReferenceQuery;
pub use registry::{
	CodeEntries, CodeTable, GlobalRegistries, GlobalRegistriesBuilder, RegistryScope, TypeCode,
	TypeRegistry, global_registries, init_global_registries,
};
pub use resolver::{RecordFetcher, RecordRef, Resolver};

// Used by `polymorphic_accessors!`
#[doc(hidden)]
pub use paste;
