//! Collaborator boundary to third-party geometry representations.
//!
//! An external library's in-memory object is adapted by implementing
//! [`GeometrySource`] (import) or [`GeometrySink`] (export); the adapters
//! translate native objects to and from the raw construction mapping and
//! the dump representation, and the engine stays unaware of any library
//! specifics. The [`legacy`] module reshapes the dump into the older,
//! kind-table based representation.

pub mod legacy;

use crate::core::error::StructureError;
use crate::core::models::site::KindPolicy;
use crate::core::models::structure::{Structure, StructureDump};
use crate::core::schema::{RawSite, RawStructure};

/// An importable third-party geometry object.
///
/// Implementations translate the native object into raw records of the
/// construction interface. When the native representation carries a
/// grouping tag for a site (a label, a species tag), it should be mapped
/// to `kind_name`; kind detection can be requested at import time to
/// derive names instead.
pub trait GeometrySource {
    fn cell(&self) -> Option<[[f64; 3]; 3]>;
    fn pbc(&self) -> Option<[bool; 3]>;
    fn sites(&self) -> Vec<RawSite>;
    fn tot_charge(&self) -> Option<f64> {
        None
    }
    fn tot_magnetization(&self) -> Option<f64> {
        None
    }
}

/// An exportable third-party geometry object, built from the dump
/// representation.
pub trait GeometrySink: Sized {
    fn from_dump(dump: &StructureDump) -> Self;
}

impl Structure {
    /// Imports a third-party geometry object through its adapter.
    ///
    /// # Arguments
    ///
    /// * `source` - The adapted library-native object.
    /// * `detect_kinds` - When true, automatic kind detection (default
    ///   policy) runs after validation and the generated names are pinned
    ///   on the imported sites, overriding library-native tags only where
    ///   no explicit `kind_name` was mapped.
    ///
    /// # Errors
    ///
    /// The same aggregated validation error as direct construction.
    pub fn from_geometry<S: GeometrySource>(
        source: &S,
        detect_kinds: bool,
    ) -> Result<Structure, StructureError> {
        let raw = RawStructure {
            cell: source.cell(),
            pbc: source.pbc(),
            sites: source.sites(),
            tot_charge: source.tot_charge(),
            tot_magnetization: source.tot_magnetization(),
            custom: None,
        };
        let mut structure = Structure::from_raw(&raw)?;
        if detect_kinds {
            let kinds = structure.detect_kinds(KindPolicy::default());
            structure.assign_kind_names(&kinds);
        }
        Ok(structure)
    }

    /// Exports this structure through a sink adapter, feeding it the dump
    /// representation (without running kind detection).
    pub fn to_geometry<T: GeometrySink>(&self) -> T {
        T::from_dump(&self.to_dict(false))
    }
}
