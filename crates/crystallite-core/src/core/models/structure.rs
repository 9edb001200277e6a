use crate::core::error::StructureError;
use crate::core::models::builder::StructureBuilder;
use crate::core::models::site::{KindPolicy, Site};
use crate::core::properties::{self, CompositionMode, Dimensionality};
use crate::core::schema::{self, ProvidedFields, RawSite, RawStructure};
use crate::core::utils::geometry;
use nalgebra::{Matrix3, Point3, Vector3};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::{Bound, RangeBounds};

/// The dump-interface representation: the construction fields with every
/// optional resolved, plus all derived properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructureDump {
    pub cell: [[f64; 3]; 3],
    pub pbc: [bool; 3],
    pub sites: Vec<RawSite>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tot_charge: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tot_magnetization: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<BTreeMap<String, Value>>,
    pub formula: String,
    pub cell_volume: f64,
    pub dimensionality: Dimensionality,
    pub kinds: Vec<String>,
    pub symbols: Vec<String>,
    pub masses: Vec<f64>,
    pub charges: Vec<f64>,
    pub magmoms: Vec<Option<[f64; 3]>>,
    pub positions: Vec<[f64; 3]>,
    pub is_alloy: bool,
    pub has_vacancies: bool,
}

/// An immutable, validated structure.
///
/// A `Structure` is created only by validating a complete raw mapping or
/// by converting a [`StructureBuilder`] snapshot; every field is frozen
/// after construction and all mutation goes through a builder followed by
/// a fresh construction. Derived properties are pure functions of the
/// frozen state.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    cell: Matrix3<f64>,
    pbc: [bool; 3],
    sites: Vec<Site>,
    tot_charge: Option<f64>,
    tot_magnetization: Option<f64>,
    custom: Option<BTreeMap<String, Value>>,
    provided: ProvidedFields,
}

impl Structure {
    /// Validates a raw mapping and constructs a frozen structure.
    ///
    /// All constraints are enforced in a single pass; the error aggregates
    /// every violation. A missing `cell` is substituted with the identity
    /// placeholder (with a warning signal) rather than rejected, and a
    /// missing `pbc` defaults to fully periodic.
    ///
    /// # Errors
    ///
    /// [`StructureError::Validation`] listing all violated constraints. No
    /// partially constructed structure is ever observable.
    pub fn from_raw(raw: &RawStructure) -> Result<Self, StructureError> {
        let fields = schema::validate(raw)?;
        Ok(Self {
            cell: fields.cell,
            pbc: fields.pbc,
            sites: fields.sites,
            tot_charge: fields.tot_charge,
            tot_magnetization: fields.tot_magnetization,
            custom: fields.custom,
            provided: fields.provided,
        })
    }

    pub fn cell(&self) -> &Matrix3<f64> {
        &self.cell
    }

    pub fn pbc(&self) -> [bool; 3] {
        self.pbc
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn site(&self, index: usize) -> Option<&Site> {
        self.sites.get(index)
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn tot_charge(&self) -> Option<f64> {
        self.tot_charge
    }

    pub fn tot_magnetization(&self) -> Option<f64> {
        self.tot_magnetization
    }

    pub fn custom(&self) -> Option<&BTreeMap<String, Value>> {
        self.custom.as_ref()
    }

    /// Which direct fields were supplied at construction, as opposed to
    /// defaulted (see the schema's field partition for the class-level
    /// view).
    pub fn provided_fields(&self) -> ProvidedFields {
        self.provided
    }

    // --- derived properties ---

    pub fn formula(&self) -> String {
        properties::formula(self.sites.iter().map(Site::symbol))
    }

    pub fn cell_volume(&self) -> f64 {
        properties::cell_volume(&self.cell)
    }

    pub fn cell_lengths(&self) -> [f64; 3] {
        properties::cell_lengths(&self.cell)
    }

    pub fn cell_angles(&self) -> [f64; 3] {
        properties::cell_angles(&self.cell)
    }

    pub fn dimensionality(&self) -> Dimensionality {
        properties::dimensionality(&self.pbc, &self.cell)
    }

    /// Per-site kind names, in site order (a projection, not deduplicated).
    pub fn kinds(&self) -> Vec<String> {
        self.sites
            .iter()
            .map(|s| s.effective_kind_name().to_string())
            .collect()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.sites.iter().map(|s| s.symbol().to_string()).collect()
    }

    pub fn masses(&self) -> Vec<f64> {
        self.sites.iter().map(Site::mass).collect()
    }

    pub fn charges(&self) -> Vec<f64> {
        self.sites.iter().map(Site::charge).collect()
    }

    pub fn magmoms(&self) -> Vec<Option<Vector3<f64>>> {
        self.sites.iter().map(|s| s.magmom().copied()).collect()
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.sites.iter().map(|s| *s.position()).collect()
    }

    /// Whether any site carries more than one weighted species.
    pub fn is_alloy(&self) -> bool {
        self.sites.iter().any(Site::is_alloy)
    }

    /// Whether any site's occupancy weights sum to less than one.
    pub fn has_vacancies(&self) -> bool {
        self.sites.iter().any(Site::has_vacancies)
    }

    pub fn composition(&self, mode: CompositionMode) -> BTreeMap<String, f64> {
        properties::composition(self.sites.iter().map(Site::symbol), mode)
    }

    /// Runs automatic kind detection and returns one name per site; sites
    /// with an explicit kind name keep it (see the calculator for the
    /// grouping and numbering rules). The structure itself is not changed.
    pub fn detect_kinds(&self, policy: KindPolicy) -> Vec<String> {
        properties::detect_kinds(&self.sites, policy)
    }

    // --- conversion and dumping ---

    /// Reconstructs the raw mapping exactly as supplied at construction:
    /// defaulted fields (cell, pbc, per-site optionals) are emitted as
    /// absent again, so `Structure::from_raw(&s.to_raw())` is lossless.
    pub fn to_raw(&self) -> RawStructure {
        RawStructure {
            cell: self
                .provided
                .cell
                .then(|| geometry::cell_to_array(&self.cell)),
            pbc: self.provided.pbc.then_some(self.pbc),
            sites: self.sites.iter().map(Site::to_raw).collect(),
            tot_charge: self.tot_charge,
            tot_magnetization: self.tot_magnetization,
            custom: self.custom.clone(),
        }
    }

    /// Produces the dump representation: the raw fields fully resolved
    /// plus every derived property.
    ///
    /// # Arguments
    ///
    /// * `detect_kinds` - When true, automatic kind detection (under the
    ///   default policy) is run first and the detected names are used for
    ///   the dumped sites and the `kinds` projection; otherwise each site
    ///   reports its effective kind name.
    pub fn to_dict(&self, detect_kinds: bool) -> StructureDump {
        let kinds = if detect_kinds {
            self.detect_kinds(KindPolicy::default())
        } else {
            self.kinds()
        };
        StructureDump {
            cell: geometry::cell_to_array(&self.cell),
            pbc: self.pbc,
            sites: self
                .sites
                .iter()
                .zip(&kinds)
                .map(|(site, kind)| site.resolved_raw(kind))
                .collect(),
            tot_charge: self.tot_charge,
            tot_magnetization: self.tot_magnetization,
            custom: self.custom.clone(),
            formula: self.formula(),
            cell_volume: self.cell_volume(),
            dimensionality: self.dimensionality(),
            symbols: self.symbols(),
            masses: self.masses(),
            charges: self.charges(),
            magmoms: self
                .sites
                .iter()
                .map(|s| s.magmom().map(|m| [m.x, m.y, m.z]))
                .collect(),
            positions: self
                .sites
                .iter()
                .map(|s| [s.position().x, s.position().y, s.position().z])
                .collect(),
            is_alloy: self.is_alloy(),
            has_vacancies: self.has_vacancies(),
            kinds,
        }
    }

    /// Serializes the dump to JSON. Custom-property values are accepted at
    /// assignment without checks; a value that cannot be serialized only
    /// surfaces here, at the dump boundary.
    ///
    /// # Errors
    ///
    /// [`StructureError::Serialization`] naming the offending payload.
    pub fn to_json(&self, detect_kinds: bool) -> Result<String, StructureError> {
        serde_json::to_string(&self.to_dict(detect_kinds)).map_err(|err| {
            StructureError::Serialization {
                key: "custom".to_string(),
                message: err.to_string(),
            }
        })
    }

    /// Produces an editable builder holding a deep, independent copy of
    /// every field; mutating it never affects this structure.
    pub fn to_builder(&self) -> StructureBuilder {
        StructureBuilder::from_raw(self.to_raw())
    }

    /// Returns a new frozen structure containing only the selected sites,
    /// with `cell`, `pbc`, and `custom` copied verbatim. The aggregate
    /// overrides (`tot_charge`, `tot_magnetization`) are also copied
    /// verbatim even though they may no longer be consistent with the
    /// reduced site set; they are not recomputed. Out-of-range bounds are
    /// clamped to the site count.
    pub fn subsequence<R: RangeBounds<usize>>(&self, range: R) -> Structure {
        let (start, end) = clamp_range(&range, self.sites.len());
        let sites = self.sites[start..end].to_vec();
        let provided = ProvidedFields {
            sites: !sites.is_empty(),
            ..self.provided
        };
        Structure {
            cell: self.cell,
            pbc: self.pbc,
            sites,
            tot_charge: self.tot_charge,
            tot_magnetization: self.tot_magnetization,
            custom: self.custom.clone(),
            provided,
        }
    }

    pub(crate) fn assign_kind_names(&mut self, names: &[String]) {
        for (site, name) in self.sites.iter_mut().zip(names) {
            site.set_kind_name(name.clone());
        }
    }
}

impl TryFrom<&RawStructure> for Structure {
    type Error = StructureError;

    fn try_from(raw: &RawStructure) -> Result<Self, Self::Error> {
        Structure::from_raw(raw)
    }
}

pub(crate) fn clamp_range<R: RangeBounds<usize>>(range: &R, len: usize) -> (usize, usize) {
    let start = match range.start_bound() {
        Bound::Included(&s) => s,
        Bound::Excluded(&s) => s + 1,
        Bound::Unbounded => 0,
    }
    .min(len);
    let end = match range.end_bound() {
        Bound::Included(&e) => e + 1,
        Bound::Excluded(&e) => e,
        Bound::Unbounded => len,
    }
    .min(len);
    (start, end.max(start))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_site_raw() -> RawStructure {
        RawStructure {
            cell: Some([[2.75, 2.75, 0.0], [0.0, 2.75, 2.75], [2.75, 0.0, 2.75]]),
            pbc: Some([true, true, true]),
            sites: vec![
                RawSite {
                    symbol: "Si".to_string(),
                    position: [0.0, 0.0, 0.0],
                    ..RawSite::default()
                },
                RawSite {
                    symbol: "Si".to_string(),
                    position: [1.375, 1.375, 1.375],
                    ..RawSite::default()
                },
            ],
            ..RawStructure::default()
        }
    }

    #[test]
    fn derived_per_site_sequences_share_the_site_count() {
        let s = Structure::from_raw(&two_site_raw()).unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s.kinds().len(), 2);
        assert_eq!(s.symbols().len(), 2);
        assert_eq!(s.masses().len(), 2);
        assert_eq!(s.charges().len(), 2);
        assert_eq!(s.magmoms().len(), 2);
        assert_eq!(s.positions().len(), 2);
    }

    #[test]
    fn cell_volume_for_the_fcc_like_cell() {
        let s = Structure::from_raw(&two_site_raw()).unwrap();
        assert!((s.cell_volume() - 41.59375).abs() < 1e-9);
    }

    #[test]
    fn formula_counts_whole_sites() {
        let s = Structure::from_raw(&two_site_raw()).unwrap();
        assert_eq!(s.formula(), "Si2");
    }

    #[test]
    fn alloy_and_vacancy_flags_follow_the_sites() {
        let mut raw = two_site_raw();
        raw.sites[0].symbol = "CuAl".to_string();
        raw.sites[0].weights = Some(vec![0.5, 0.5]);
        let s = Structure::from_raw(&raw).unwrap();
        assert!(s.is_alloy());
        assert!(!s.has_vacancies());

        let mut raw = two_site_raw();
        raw.sites[1].weights = Some(vec![0.5]);
        let s = Structure::from_raw(&raw).unwrap();
        assert!(!s.is_alloy());
        assert!(s.has_vacancies());
    }

    #[test]
    fn missing_cell_is_defaulted_not_fatal() {
        let mut raw = two_site_raw();
        raw.cell = None;
        let s = Structure::from_raw(&raw).unwrap();
        assert_eq!(*s.cell(), Matrix3::identity());
        assert!(s.cell_volume() > 0.0);
        assert!(s.provided_fields().defaulted().contains(&"cell"));
    }

    #[test]
    fn dump_contains_every_input_field_unchanged() {
        let mut raw = two_site_raw();
        raw.tot_charge = Some(1.0);
        let mut custom = BTreeMap::new();
        custom.insert("origin".to_string(), Value::String("relaxed".to_string()));
        raw.custom = Some(custom.clone());

        let dump = Structure::from_raw(&raw).unwrap().to_dict(false);
        assert_eq!(Some(dump.cell), raw.cell);
        assert_eq!(Some(dump.pbc), raw.pbc);
        assert_eq!(dump.tot_charge, Some(1.0));
        assert_eq!(dump.custom, Some(custom));
        assert_eq!(dump.sites.len(), raw.sites.len());
        for (dumped, input) in dump.sites.iter().zip(&raw.sites) {
            assert_eq!(dumped.symbol, input.symbol);
            assert_eq!(dumped.position, input.position);
            // resolved fields are filled, never left absent
            assert!(dumped.mass.is_some());
            assert!(dumped.kind_name.is_some());
            assert!(dumped.weights.is_some());
        }
    }

    #[test]
    fn dump_with_kind_detection_uses_generated_names() {
        let mut raw = two_site_raw();
        raw.sites[1].charge = Some(2.0);
        let dump = Structure::from_raw(&raw).unwrap().to_dict(true);
        assert_eq!(dump.kinds, ["Si0", "Si1"]);
        assert_eq!(dump.sites[0].kind_name.as_deref(), Some("Si0"));
        assert_eq!(dump.sites[1].kind_name.as_deref(), Some("Si1"));
    }

    #[test]
    fn to_raw_is_lossless_for_defaulted_fields() {
        let mut raw = two_site_raw();
        raw.cell = None;
        raw.pbc = None;
        let s = Structure::from_raw(&raw).unwrap();
        assert_eq!(s.to_raw(), raw);
    }

    #[test]
    fn subsequence_keeps_first_site_and_global_fields_verbatim() {
        let mut raw = two_site_raw();
        raw.tot_charge = Some(3.0);
        let s = Structure::from_raw(&raw).unwrap();
        let head = s.subsequence(..1);
        assert_eq!(head.len(), 1);
        assert_eq!(head.sites()[0], s.sites()[0]);
        assert_eq!(head.cell(), s.cell());
        assert_eq!(head.pbc(), s.pbc());
        // aggregate override copied verbatim, not recomputed
        assert_eq!(head.tot_charge(), Some(3.0));
    }

    #[test]
    fn subsequence_clamps_out_of_range_bounds() {
        let s = Structure::from_raw(&two_site_raw()).unwrap();
        assert_eq!(s.subsequence(..10).len(), 2);
        assert_eq!(s.subsequence(5..).len(), 0);
    }

    #[test]
    fn subsequence_recomputes_the_sites_provided_flag() {
        let s = Structure::from_raw(&two_site_raw()).unwrap();
        assert!(s.provided_fields().sites);
        assert!(s.subsequence(..1).provided_fields().sites);
        let emptied = s.subsequence(2..);
        assert!(!emptied.provided_fields().sites);
        assert!(!emptied.provided_fields().provided().contains(&"sites"));
    }

    #[test]
    fn empty_structure_has_empty_projections() {
        let raw = RawStructure {
            cell: Some([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            ..RawStructure::default()
        };
        let s = Structure::from_raw(&raw).unwrap();
        assert!(s.is_empty());
        assert_eq!(s.formula(), "");
        assert!(!s.is_alloy());
        assert!(!s.has_vacancies());
    }

    #[test]
    fn to_json_serializes_the_dump() {
        let s = Structure::from_raw(&two_site_raw()).unwrap();
        let json = s.to_json(false).unwrap();
        assert!(json.contains("\"formula\":\"Si2\""));
        assert!(json.contains("\"dimensionality\""));
    }

    #[test]
    fn round_trip_through_builder_preserves_all_fields() {
        let mut raw = two_site_raw();
        raw.sites[0].magmom = Some([0.0, 0.0, 1.5]);
        raw.tot_magnetization = Some(3.0);
        let s = Structure::from_raw(&raw).unwrap();
        let rebuilt = s.to_builder().to_structure().unwrap();
        assert_eq!(rebuilt.to_raw(), s.to_raw());
        assert_eq!(rebuilt.to_dict(false), s.to_dict(false));
    }
}
