use crate::core::error::StructureError;
use crate::core::models::structure::{Structure, StructureDump, clamp_range};
use crate::core::schema::{RawSite, RawStructure};
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::RangeBounds;

/// A partial site update applied by [`StructureBuilder::update_site`].
///
/// Only the fields set to `Some` are merged into the existing record;
/// everything else is retained. A field cannot be unset through a patch.
#[derive(Debug, Clone, Default)]
pub struct SitePatch {
    pub symbol: Option<String>,
    pub position: Option<[f64; 3]>,
    pub kind_name: Option<String>,
    pub mass: Option<f64>,
    pub charge: Option<f64>,
    pub magmom: Option<[f64; 3]>,
    pub weights: Option<Vec<f64>>,
}

/// The editable companion of [`Structure`].
///
/// The builder stores the raw field state verbatim and enforces no
/// semantic invariant at assignment time: atoms can be added with unknown
/// species, inconsistent weights, or no cell, and nothing complains until
/// the state is converted to a frozen structure (or dumped with
/// validation). Bulk setters replace their field outright, last write
/// wins. Equality and hashing are deliberately not defined; builders are
/// identity-based working state.
#[derive(Debug, Clone, Default)]
pub struct StructureBuilder {
    raw: RawStructure,
}

impl StructureBuilder {
    /// Creates an empty builder: no cell, no pbc, no sites.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing raw mapping. Only the structural shape is
    /// guaranteed by the type; semantic validation is deferred.
    pub fn from_raw(raw: RawStructure) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &RawStructure {
        &self.raw
    }

    pub fn sites(&self) -> &[RawSite] {
        &self.raw.sites
    }

    pub fn len(&self) -> usize {
        self.raw.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.sites.is_empty()
    }

    // --- bulk field setters (replace outright) ---

    pub fn set_cell(&mut self, cell: [[f64; 3]; 3]) {
        self.raw.cell = Some(cell);
    }

    pub fn set_pbc(&mut self, pbc: [bool; 3]) {
        self.raw.pbc = Some(pbc);
    }

    pub fn set_tot_charge(&mut self, tot_charge: f64) {
        self.raw.tot_charge = Some(tot_charge);
    }

    pub fn set_tot_magnetization(&mut self, tot_magnetization: f64) {
        self.raw.tot_magnetization = Some(tot_magnetization);
    }

    /// Replaces the opaque custom-property store. Values are accepted
    /// unconditionally; serializability is only checked at dump time.
    pub fn set_custom(&mut self, custom: BTreeMap<String, Value>) {
        self.raw.custom = Some(custom);
    }

    // --- site mutators ---

    /// Appends one site record. Only the structural shape is checked
    /// (which the [`RawSite`] type already guarantees); cross-site
    /// invariants and species validity are deferred to conversion.
    pub fn add_atom(&mut self, site: RawSite) {
        self.raw.sites.push(site);
    }

    /// Removes and returns the site at `index`.
    ///
    /// # Errors
    ///
    /// [`StructureError::IndexOutOfRange`] if `index` is out of range; the
    /// index is never clamped.
    pub fn pop_atom(&mut self, index: usize) -> Result<RawSite, StructureError> {
        if index >= self.raw.sites.len() {
            return Err(StructureError::IndexOutOfRange {
                index,
                len: self.raw.sites.len(),
            });
        }
        Ok(self.raw.sites.remove(index))
    }

    /// Merges the `Some` fields of `patch` into the site at `index`,
    /// retaining everything unspecified.
    ///
    /// # Errors
    ///
    /// [`StructureError::IndexOutOfRange`] if `index` is out of range.
    pub fn update_site(&mut self, index: usize, patch: SitePatch) -> Result<(), StructureError> {
        let len = self.raw.sites.len();
        let site = self
            .raw
            .sites
            .get_mut(index)
            .ok_or(StructureError::IndexOutOfRange { index, len })?;
        if let Some(symbol) = patch.symbol {
            site.symbol = symbol;
        }
        if let Some(position) = patch.position {
            site.position = position;
        }
        if let Some(kind_name) = patch.kind_name {
            site.kind_name = Some(kind_name);
        }
        if let Some(mass) = patch.mass {
            site.mass = Some(mass);
        }
        if let Some(charge) = patch.charge {
            site.charge = Some(charge);
        }
        if let Some(magmom) = patch.magmom {
            site.magmom = Some(magmom);
        }
        if let Some(weights) = patch.weights {
            site.weights = Some(weights);
        }
        Ok(())
    }

    /// Empties the site sequence; every other field is retained.
    pub fn clear_sites(&mut self) {
        self.raw.sites.clear();
    }

    // --- positional bulk setters (one value per site) ---

    pub fn set_kind_names(&mut self, kind_names: Vec<String>) -> Result<(), StructureError> {
        self.apply_per_site(kind_names, |site, name| site.kind_name = Some(name))
    }

    pub fn set_charges(&mut self, charges: Vec<f64>) -> Result<(), StructureError> {
        self.apply_per_site(charges, |site, charge| site.charge = Some(charge))
    }

    pub fn set_masses(&mut self, masses: Vec<f64>) -> Result<(), StructureError> {
        self.apply_per_site(masses, |site, mass| site.mass = Some(mass))
    }

    pub fn set_magmoms(&mut self, magmoms: Vec<[f64; 3]>) -> Result<(), StructureError> {
        self.apply_per_site(magmoms, |site, magmom| site.magmom = Some(magmom))
    }

    pub fn set_positions(&mut self, positions: Vec<[f64; 3]>) -> Result<(), StructureError> {
        self.apply_per_site(positions, |site, position| site.position = position)
    }

    pub fn set_weights(&mut self, weights: Vec<Vec<f64>>) -> Result<(), StructureError> {
        self.apply_per_site(weights, |site, w| site.weights = Some(w))
    }

    /// Applies one value per site positionally. The length is checked
    /// before anything is written, so a mismatch leaves the builder
    /// untouched.
    fn apply_per_site<T>(
        &mut self,
        values: Vec<T>,
        apply: impl Fn(&mut RawSite, T),
    ) -> Result<(), StructureError> {
        if values.len() != self.raw.sites.len() {
            return Err(StructureError::LengthMismatch {
                expected: self.raw.sites.len(),
                actual: values.len(),
            });
        }
        for (site, value) in self.raw.sites.iter_mut().zip(values) {
            apply(site, value);
        }
        Ok(())
    }

    /// Returns a new builder containing only the selected sites, with
    /// `cell`, `pbc`, `custom`, and the aggregate overrides copied
    /// verbatim (even though the aggregates may no longer match the
    /// reduced site set; they are not recomputed). Out-of-range bounds
    /// are clamped.
    pub fn subsequence<R: RangeBounds<usize>>(&self, range: R) -> StructureBuilder {
        let (start, end) = clamp_range(&range, self.raw.sites.len());
        let mut raw = self.raw.clone();
        raw.sites = self.raw.sites[start..end].to_vec();
        Self { raw }
    }

    // --- conversion ---

    /// A verbatim snapshot of the raw field state, without validation.
    pub fn to_raw(&self) -> RawStructure {
        self.raw.clone()
    }

    /// Snapshots the current state, runs the full validation pass, and
    /// constructs a new frozen [`Structure`]. Never partially succeeds:
    /// either every constraint holds and a structure is returned, or the
    /// aggregated violation report is.
    ///
    /// # Errors
    ///
    /// [`StructureError::Validation`] listing all violated constraints.
    pub fn to_structure(&self) -> Result<Structure, StructureError> {
        Structure::from_raw(&self.raw)
    }

    /// Dump-with-validation: validates the current state and returns the
    /// resolved dump representation.
    ///
    /// # Errors
    ///
    /// [`StructureError::Validation`] if the deferred semantic checks fail.
    pub fn to_dict(&self) -> Result<StructureDump, StructureError> {
        Ok(self.to_structure()?.to_dict(false))
    }
}
