//! Registry inspection utilities
//!
//! Lists the code tables in effect for every global role and local
//! association, checks them for suspicious entries, and renders a text
//! report for management commands and debugging.
//!
//! # Example
//!
//! ```rust
//! use reinhardt_polytype::inspect::{RegistryInspector, InspectOptions};
//! use reinhardt_polytype::{AssociationDescriptor, GlobalRegistries};
//!
//! let globals = GlobalRegistries::builder()
//!     .role_table("source", [(1, "Person"), (2, "Animal")])
//!     .build()
//!     .unwrap();
//! let inline = AssociationDescriptor::belongs_to("InlineLink", "source")
//!     .table_mapping([(10, "Person"), (11, "InlineAnimal")])
//!     .build_with(&globals)
//!     .unwrap();
//!
//! let registries = RegistryInspector::collect(&globals, [&inline]);
//! let inspector = RegistryInspector::with_options(InspectOptions::new().sorted(true));
//!
//! assert_eq!(inspector.list(&registries).len(), 2);
//! assert!(inspector.validate(&registries).is_empty());
//! ```

use crate::descriptor::AssociationDescriptor;
use crate::registry::{GlobalRegistries, RegistryScope, TypeCode, TypeRegistry};
use std::sync::Arc;

/// Options for inspection operations
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct InspectOptions {
	/// Whether to sort results by scope label
	pub sorted: bool,
	/// Only include global role scopes
	pub globals_only: bool,
	/// Optional type name filter (substring match)
	pub filter_name_pattern: Option<String>,
}

impl InspectOptions {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn sorted(mut self, sorted: bool) -> Self {
		self.sorted = sorted;
		self
	}

	#[must_use]
	pub fn globals_only(mut self, globals_only: bool) -> Self {
		self.globals_only = globals_only;
		self
	}

	/// Keep only mappings whose name contains `pattern`
	#[must_use]
	pub fn filter_name_pattern(mut self, pattern: impl Into<String>) -> Self {
		self.filter_name_pattern = Some(pattern.into());
		self
	}
}

/// Summary of one registry scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeInfo {
	pub scope: RegistryScope,
	/// Display label of the scope
	pub label: String,
	/// `(code, name)` pairs in code order
	pub mappings: Vec<(TypeCode, String)>,
}

impl ScopeInfo {
	#[must_use]
	pub fn from_registry(registry: &TypeRegistry) -> Self {
		Self {
			scope: registry.scope().clone(),
			label: registry.scope().to_string(),
			mappings: registry
				.all_mappings()
				.iter()
				.map(|(code, name)| (*code, name.clone()))
				.collect(),
		}
	}

	pub fn is_global(&self) -> bool {
		matches!(self.scope, RegistryScope::Global { .. })
	}
}

/// Counts across all inspected scopes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectStats {
	pub global_scopes: usize,
	pub local_scopes: usize,
	pub total_codes: usize,
}

/// Handles inspection of type registries
#[derive(Debug, Clone, Default)]
pub struct RegistryInspector {
	options: InspectOptions,
}

impl RegistryInspector {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with_options(options: InspectOptions) -> Self {
		Self { options }
	}

	/// Gather the global registries plus the local registry of each association
	///
	/// Registries shared between associations are listed once.
	#[must_use]
	pub fn collect<'d, I>(globals: &GlobalRegistries, associations: I) -> Vec<Arc<TypeRegistry>>
	where
		I: IntoIterator<Item = &'d AssociationDescriptor>,
	{
		let mut registries: Vec<Arc<TypeRegistry>> = globals
			.iter()
			.map(|(_, registry)| Arc::clone(registry))
			.collect();
		for association in associations {
			let Some(registry) = association.registry() else {
				continue;
			};
			if !registries.iter().any(|known| Arc::ptr_eq(known, registry)) {
				registries.push(Arc::clone(registry));
			}
		}
		registries
	}

	/// List scopes, applying the configured filters
	#[must_use]
	pub fn list(&self, registries: &[Arc<TypeRegistry>]) -> Vec<ScopeInfo> {
		let mut results: Vec<ScopeInfo> = registries
			.iter()
			.map(|registry| ScopeInfo::from_registry(registry))
			.filter(|info| !self.options.globals_only || info.is_global())
			.map(|mut info| {
				if let Some(pattern) = &self.options.filter_name_pattern {
					info.mappings.retain(|(_, name)| name.contains(pattern.as_str()));
				}
				info
			})
			.collect();

		if self.options.sorted {
			results.sort_by(|a, b| a.label.cmp(&b.label));
		}

		results
	}

	/// Every `(scope label, code)` a type name is registered under
	#[must_use]
	pub fn find_by_name(
		&self,
		registries: &[Arc<TypeRegistry>],
		name: &str,
	) -> Vec<(String, TypeCode)> {
		registries
			.iter()
			.filter_map(|registry| {
				registry
					.encode(name)
					.ok()
					.map(|code| (registry.scope().to_string(), code))
			})
			.collect()
	}

	#[must_use]
	pub fn stats(&self, registries: &[Arc<TypeRegistry>]) -> InspectStats {
		let mut stats = InspectStats::default();
		for registry in registries {
			match registry.scope() {
				RegistryScope::Global { .. } => stats.global_scopes += 1,
				RegistryScope::Local { .. } => stats.local_scopes += 1,
			}
			stats.total_codes += registry.len();
		}
		stats
	}

	/// Validate every mapping
	///
	/// Flags empty registries, empty or whitespace-containing names, and codes
	/// below 1. Registries accept any `i32`, but codes are numbered from 1 by
	/// convention (alphabetical defaults start there), so zero and negative
	/// codes are reported as suspicious rather than rejected.
	///
	/// Returns a list of validation errors (if any).
	#[must_use]
	pub fn validate(&self, registries: &[Arc<TypeRegistry>]) -> Vec<String> {
		let mut errors = Vec::new();

		for registry in registries {
			let scope = registry.scope();
			if registry.is_empty() {
				errors.push(format!("{} has no type codes", scope));
			}
			for (code, name) in registry.all_mappings() {
				if name.is_empty() {
					errors.push(format!("{}: code {} maps to an empty type name", scope, code));
				} else if name.contains(char::is_whitespace) {
					errors.push(format!(
						"{}: type name {:?} (code {}) contains whitespace",
						scope, name, code
					));
				}
				if code.get() <= 0 {
					errors.push(format!("{}: code {} for `{}` is not positive", scope, code, name));
				}
			}
		}

		errors
	}

	/// Generates a summary report of the registries
	#[must_use]
	pub fn generate_report(&self, registries: &[Arc<TypeRegistry>]) -> String {
		let stats = self.stats(registries);
		let validation_errors = self.validate(registries);

		let mut report = String::new();
		report.push_str("=== Polymorphic Type Registry Report ===\n\n");
		report.push_str(&format!("Global roles: {}\n", stats.global_scopes));
		report.push_str(&format!("Local tables: {}\n", stats.local_scopes));
		report.push_str(&format!("Total type codes: {}\n", stats.total_codes));

		for info in self.list(registries) {
			report.push_str(&format!("\n--- {} ---\n", info.label));
			for (code, name) in &info.mappings {
				report.push_str(&format!("  {:>4} => {}\n", code, name));
			}
		}

		if !validation_errors.is_empty() {
			report.push_str("\n--- Validation Errors ---\n");
			for error in &validation_errors {
				report.push_str(&format!("  - {}\n", error));
			}
		} else {
			report.push_str("\n--- Validation: OK ---\n");
		}

		report
	}
}

/// Convenience function to validate a set of registries
#[must_use]
pub fn validate(registries: &[Arc<TypeRegistry>]) -> Vec<String> {
	RegistryInspector::new().validate(registries)
}

/// Convenience function to render a sorted report
#[must_use]
pub fn generate_report(registries: &[Arc<TypeRegistry>]) -> String {
	RegistryInspector::with_options(InspectOptions::new().sorted(true)).generate_report(registries)
}
