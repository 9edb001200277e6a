use crate::core::error::{StructureError, Violation};
use crate::core::models::site::Site;
use crate::core::utils::geometry;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// One raw site record of the construction interface.
///
/// Only `symbol` and `position` are mandatory; every other field is
/// resolved during validation (see [`Site`]). The same shape, fully
/// resolved, is reused by the dump interface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSite {
    pub symbol: String,
    pub position: [f64; 3],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charge: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magmom: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
}

/// The raw mapping accepted by the construction interface.
///
/// This is the lossless, unvalidated form shared by the builder (which
/// stores it verbatim and defers all semantic checks) and the frozen
/// structure (which validates it in full on construction). Deserializing
/// into this type performs the structural shape coercion; everything
/// beyond shape is the validator's job.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawStructure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<[[f64; 3]; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pbc: Option<[bool; 3]>,
    #[serde(default)]
    pub sites: Vec<RawSite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tot_charge: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tot_magnetization: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<BTreeMap<String, Value>>,
}

/// Classification of a field name within the structure schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// User-settable on the structure itself.
    Direct,
    /// Derived, read-only, recomputed from the direct fields.
    Computed,
    /// Settable per site.
    SiteLevel,
}

pub const DIRECT_FIELDS: &[&str] = &[
    "cell",
    "pbc",
    "sites",
    "tot_charge",
    "tot_magnetization",
    "custom",
];

pub const COMPUTED_FIELDS: &[&str] = &[
    "formula",
    "cell_volume",
    "dimensionality",
    "kinds",
    "symbols",
    "masses",
    "charges",
    "magmoms",
    "positions",
    "is_alloy",
    "has_vacancies",
];

pub const SITE_FIELDS: &[&str] = &[
    "symbol",
    "position",
    "kind_name",
    "mass",
    "charge",
    "magmom",
    "weights",
];

/// Looks up the classification of a field name, or `None` if the name is
/// not part of the schema.
pub fn field_kind(name: &str) -> Option<FieldKind> {
    if DIRECT_FIELDS.contains(&name) {
        Some(FieldKind::Direct)
    } else if COMPUTED_FIELDS.contains(&name) {
        Some(FieldKind::Computed)
    } else if SITE_FIELDS.contains(&name) {
        Some(FieldKind::SiteLevel)
    } else {
        None
    }
}

/// Records which direct fields of an instance were actually supplied by
/// the caller, as opposed to filled in from defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProvidedFields {
    pub cell: bool,
    pub pbc: bool,
    pub sites: bool,
    pub tot_charge: bool,
    pub tot_magnetization: bool,
    pub custom: bool,
}

impl ProvidedFields {
    pub fn from_raw(raw: &RawStructure) -> Self {
        Self {
            cell: raw.cell.is_some(),
            pbc: raw.pbc.is_some(),
            sites: !raw.sites.is_empty(),
            tot_charge: raw.tot_charge.is_some(),
            tot_magnetization: raw.tot_magnetization.is_some(),
            custom: raw.custom.is_some(),
        }
    }

    /// The direct fields that were supplied by the caller.
    pub fn provided(&self) -> Vec<&'static str> {
        self.partition(true)
    }

    /// The direct fields that were filled in from defaults.
    pub fn defaulted(&self) -> Vec<&'static str> {
        self.partition(false)
    }

    fn partition(&self, given: bool) -> Vec<&'static str> {
        [
            ("cell", self.cell),
            ("pbc", self.pbc),
            ("sites", self.sites),
            ("tot_charge", self.tot_charge),
            ("tot_magnetization", self.tot_magnetization),
            ("custom", self.custom),
        ]
        .iter()
        .filter(|(_, flag)| *flag == given)
        .map(|(name, _)| *name)
        .collect()
    }
}

/// The subset of site-level fields supplied on at least one site.
pub fn provided_site_fields(raw: &RawStructure) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if !raw.sites.is_empty() {
        fields.push("symbol");
        fields.push("position");
    }
    let any = |f: fn(&RawSite) -> bool| raw.sites.iter().any(f);
    if any(|s| s.kind_name.is_some()) {
        fields.push("kind_name");
    }
    if any(|s| s.mass.is_some()) {
        fields.push("mass");
    }
    if any(|s| s.charge.is_some()) {
        fields.push("charge");
    }
    if any(|s| s.magmom.is_some()) {
        fields.push("magmom");
    }
    if any(|s| s.weights.is_some()) {
        fields.push("weights");
    }
    fields
}

/// The validated, normalized field set produced by the immutable path.
#[derive(Debug, Clone)]
pub(crate) struct ValidatedFields {
    pub cell: Matrix3<f64>,
    pub pbc: [bool; 3],
    pub sites: Vec<Site>,
    pub tot_charge: Option<f64>,
    pub tot_magnetization: Option<f64>,
    pub custom: Option<BTreeMap<String, Value>>,
    pub provided: ProvidedFields,
}

/// Validates a raw mapping in a single pass, aggregating every violated
/// constraint into one report.
///
/// A missing `cell` is the only constraint repaired instead of rejected:
/// the identity placeholder is substituted and a warning is emitted, and
/// the substitution stays observable through [`ProvidedFields`]. A missing
/// `pbc` defaults to fully periodic. An empty site list is legal (the
/// "empty structure" state used by the builder).
pub(crate) fn validate(raw: &RawStructure) -> Result<ValidatedFields, StructureError> {
    let mut violations = Vec::new();
    let provided = ProvidedFields::from_raw(raw);

    let cell = match &raw.cell {
        Some(cell) => {
            if cell.iter().flatten().any(|x| !x.is_finite()) {
                violations.push(Violation::new("cell", "entries must be finite numbers"));
            }
            geometry::cell_from_array(cell)
        }
        None => {
            warn!("no cell supplied; substituting the identity placeholder cell");
            Matrix3::identity()
        }
    };

    let pbc = raw.pbc.unwrap_or([true, true, true]);

    let mut sites = Vec::with_capacity(raw.sites.len());
    for (index, raw_site) in raw.sites.iter().enumerate() {
        match Site::from_raw(raw_site) {
            Ok(site) => sites.push(site),
            Err(site_violations) => {
                let scope = format!("sites[{index}]");
                violations.extend(site_violations.iter().map(|v| v.scoped(&scope)));
            }
        }
    }

    if let Some(tot_charge) = raw.tot_charge {
        if !tot_charge.is_finite() {
            violations.push(Violation::new("tot_charge", "must be a finite number"));
        }
    }
    if let Some(tot_magnetization) = raw.tot_magnetization {
        if !tot_magnetization.is_finite() {
            violations.push(Violation::new(
                "tot_magnetization",
                "must be a finite number",
            ));
        }
    }

    if !violations.is_empty() {
        return Err(StructureError::Validation(violations));
    }

    Ok(ValidatedFields {
        cell,
        pbc,
        sites,
        tot_charge: raw.tot_charge,
        tot_magnetization: raw.tot_magnetization,
        custom: raw.custom.clone(),
        provided,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_raw() -> RawStructure {
        RawStructure {
            cell: Some([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]),
            pbc: Some([true, true, true]),
            sites: vec![RawSite {
                symbol: "Si".to_string(),
                position: [0.0, 0.0, 0.0],
                ..RawSite::default()
            }],
            ..RawStructure::default()
        }
    }

    #[test]
    fn validate_accepts_a_minimal_structure() {
        let fields = validate(&minimal_raw()).unwrap();
        assert_eq!(fields.sites.len(), 1);
        assert_eq!(fields.pbc, [true, true, true]);
        assert!(fields.provided.cell);
    }

    #[test]
    fn missing_cell_is_repaired_with_identity_and_flagged_as_defaulted() {
        let mut raw = minimal_raw();
        raw.cell = None;
        let fields = validate(&raw).unwrap();
        assert_eq!(fields.cell, Matrix3::identity());
        assert!(!fields.provided.cell);
        assert!(fields.provided.defaulted().contains(&"cell"));
    }

    #[test]
    fn missing_pbc_defaults_to_fully_periodic() {
        let mut raw = minimal_raw();
        raw.pbc = None;
        let fields = validate(&raw).unwrap();
        assert_eq!(fields.pbc, [true, true, true]);
        assert!(!fields.provided.pbc);
    }

    #[test]
    fn empty_site_list_is_legal() {
        let mut raw = minimal_raw();
        raw.sites.clear();
        let fields = validate(&raw).unwrap();
        assert!(fields.sites.is_empty());
        assert!(!fields.provided.sites);
    }

    #[test]
    fn violations_from_every_site_are_aggregated_with_scoped_paths() {
        let mut raw = minimal_raw();
        raw.sites.push(RawSite {
            symbol: "Xx".to_string(),
            position: [0.0, 0.0, 0.0],
            ..RawSite::default()
        });
        raw.sites.push(RawSite {
            symbol: "CuAl".to_string(),
            position: [0.5, 0.5, 0.5],
            ..RawSite::default()
        });
        let err = validate(&raw).unwrap_err();
        match err {
            StructureError::Validation(violations) => {
                assert!(violations.iter().any(|v| v.field == "sites[1].symbol"));
                assert!(violations.iter().any(|v| v.field == "sites[2].weights"));
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn non_finite_cell_and_aggregates_are_violations() {
        let mut raw = minimal_raw();
        raw.cell = Some([[f64::NAN, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        raw.tot_charge = Some(f64::INFINITY);
        let err = validate(&raw).unwrap_err();
        match err {
            StructureError::Validation(violations) => {
                assert!(violations.iter().any(|v| v.field == "cell"));
                assert!(violations.iter().any(|v| v.field == "tot_charge"));
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn field_kind_partitions_the_schema() {
        assert_eq!(field_kind("cell"), Some(FieldKind::Direct));
        assert_eq!(field_kind("formula"), Some(FieldKind::Computed));
        assert_eq!(field_kind("magmom"), Some(FieldKind::SiteLevel));
        assert_eq!(field_kind("nonsense"), None);
    }

    #[test]
    fn provided_site_fields_reports_fields_present_on_any_site() {
        let mut raw = minimal_raw();
        raw.sites[0].charge = Some(1.0);
        let fields = provided_site_fields(&raw);
        assert!(fields.contains(&"symbol"));
        assert!(fields.contains(&"charge"));
        assert!(!fields.contains(&"magmom"));
    }

    #[test]
    fn raw_structure_round_trips_through_json() {
        let raw = minimal_raw();
        let json = serde_json::to_string(&raw).unwrap();
        let back: RawStructure = serde_json::from_str(&json).unwrap();
        assert_eq!(raw, back);
    }

    #[test]
    fn raw_structure_serialization_omits_absent_fields() {
        let raw = RawStructure::default();
        let json = serde_json::to_string(&raw).unwrap();
        assert_eq!(json, r#"{"sites":[]}"#);
    }
}
