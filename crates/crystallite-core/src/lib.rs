//! # Crystallite Core Library
//!
//! A validated, serializable data model for periodic and finite atomistic
//! structures.
//!
//! ## Architectural Philosophy
//!
//! The library is built around one strict split: an **immutable, fully
//! validated** [`core::models::structure::Structure`] that is created in a
//! single all-or-nothing validation pass and never mutated afterwards, and
//! a **mutable, unvalidated** [`core::models::builder::StructureBuilder`]
//! that accepts any edits and defers every semantic check to the moment it
//! is converted into a fresh frozen structure. The two forms round-trip
//! losslessly.
//!
//! On top of the frozen state, a set of pure calculators derives the
//! canonical aggregate properties: chemical formula, cell volume,
//! dimensionality, per-site projections, alloy/vacancy detection, and
//! automatic kind (distinct-species-group) assignment.
//!
//! Persistence, provenance, and third-party geometry libraries stay
//! outside this crate; the adapter traits in [`core::adapters`] define the
//! boundary they plug into.

pub mod core;
