//! Conversion to the older, kind-table based structure representation.
//!
//! The legacy format stores one deduplicated kind record per kind name
//! (species components, weights, mass) and thin sites that only reference
//! a kind and carry a position. Converting is renaming and reshaping of
//! the dump representation; nothing is recomputed.

use crate::core::models::structure::StructureDump;
use crate::core::utils::elements;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyKind {
    pub name: String,
    pub symbols: Vec<String>,
    pub weights: Vec<f64>,
    pub mass: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacySite {
    pub kind_name: String,
    pub position: [f64; 3],
}

/// The older representation: per-direction periodicity flags and a kind
/// table referenced by name from the sites.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyStructure {
    pub cell: [[f64; 3]; 3],
    pub pbc1: bool,
    pub pbc2: bool,
    pub pbc3: bool,
    pub kinds: Vec<LegacyKind>,
    pub sites: Vec<LegacySite>,
}

/// Reshapes a dump into the legacy representation. Kinds are deduplicated
/// by name in order of first appearance; the first site carrying a name
/// defines its kind record.
pub fn to_legacy(dump: &StructureDump) -> LegacyStructure {
    let mut kinds: Vec<LegacyKind> = Vec::new();
    let mut sites = Vec::with_capacity(dump.sites.len());

    for site in &dump.sites {
        let kind_name = site
            .kind_name
            .clone()
            .unwrap_or_else(|| site.symbol.clone());
        if !kinds.iter().any(|k| k.name == kind_name) {
            kinds.push(LegacyKind {
                name: kind_name.clone(),
                symbols: elements::split_symbols(&site.symbol),
                weights: site.weights.clone().unwrap_or_else(|| vec![1.0]),
                mass: site.mass.unwrap_or(0.0),
            });
        }
        sites.push(LegacySite {
            kind_name,
            position: site.position,
        });
    }

    LegacyStructure {
        cell: dump.cell,
        pbc1: dump.pbc[0],
        pbc2: dump.pbc[1],
        pbc3: dump.pbc[2],
        kinds,
        sites,
    }
}
