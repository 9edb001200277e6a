//! # Core Module
//!
//! The validation and derived-property engine for atomistic structures.
//!
//! ## Architecture
//!
//! - **Schema** ([`schema`]) - Raw construction/dump record types, the
//!   single-pass aggregating validator, and the field-partition
//!   introspection interface.
//! - **Models** ([`models`]) - The [`models::site::Site`] record, the
//!   frozen [`models::structure::Structure`], and the editable
//!   [`models::builder::StructureBuilder`].
//! - **Derived properties** ([`properties`]) - Pure calculators for
//!   formula, cell volume, dimensionality, composition, and automatic
//!   kind detection.
//! - **Adapters** ([`adapters`]) - The collaborator boundary to external
//!   geometry libraries and the legacy-representation reshape.
//! - **Utilities** ([`utils`]) - The static atomic-mass table and cell
//!   geometry helpers.
//!
//! All operations are synchronous, bounded, in-memory computations; the
//! only process-wide resource is the compile-time atomic-mass table,
//! which is immutable and safe for unsynchronized concurrent reads.

pub mod adapters;
pub mod error;
pub mod models;
pub mod properties;
pub mod schema;
pub mod utils;
