//! Pure functions deriving aggregate properties from `cell`, `pbc`, and the
//! site sequence. None of these mutate their input; identical input yields
//! bit-identical output.

use crate::core::models::site::{KindPolicy, Site};
use crate::core::utils::geometry;
use nalgebra::Matrix3;
use serde::Serialize;
use std::collections::BTreeMap;

/// Count and measure of the periodic directions of a structure.
///
/// `dim` is the number of periodic lattice directions; `value` is the
/// corresponding measure (volume, area, or length of the periodic
/// sub-cell), with zero for an isolated system.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimensionality {
    pub dim: usize,
    pub label: &'static str,
    pub value: f64,
}

/// Normalization applied to a per-symbol composition count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompositionMode {
    /// Raw counts.
    #[default]
    Full,
    /// Counts divided by their greatest common divisor.
    Reduced,
    /// Counts normalized so that they sum to one.
    Fractional,
}

/// The absolute value of the scalar triple product of the lattice vectors.
/// Zero is legal for lower-dimensional systems.
pub fn cell_volume(cell: &Matrix3<f64>) -> f64 {
    cell.determinant().abs()
}

/// Lengths of the three lattice vectors.
pub fn cell_lengths(cell: &Matrix3<f64>) -> [f64; 3] {
    [
        geometry::lattice_vector(cell, 0).norm(),
        geometry::lattice_vector(cell, 1).norm(),
        geometry::lattice_vector(cell, 2).norm(),
    ]
}

/// Angles between the lattice vectors in degrees, in the conventional
/// order: (b, c), (a, c), (a, b).
pub fn cell_angles(cell: &Matrix3<f64>) -> [f64; 3] {
    let a = geometry::lattice_vector(cell, 0);
    let b = geometry::lattice_vector(cell, 1);
    let c = geometry::lattice_vector(cell, 2);
    let angle = |u: &nalgebra::Vector3<f64>, v: &nalgebra::Vector3<f64>| {
        (u.dot(v) / (u.norm() * v.norm())).clamp(-1.0, 1.0).acos().to_degrees()
    };
    [angle(&b, &c), angle(&a, &c), angle(&a, &b)]
}

/// Classifies the periodicity of the structure and measures the periodic
/// sub-cell: volume for 3 periodic directions, area for 2, length for 1,
/// and zero for an isolated system.
pub fn dimensionality(pbc: &[bool; 3], cell: &Matrix3<f64>) -> Dimensionality {
    let periodic: Vec<usize> = (0..3).filter(|&i| pbc[i]).collect();
    let (label, value) = match periodic.as_slice() {
        [] => ("atom", 0.0),
        [i] => ("line", geometry::lattice_vector(cell, *i).norm()),
        [i, j] => (
            "surface",
            geometry::lattice_vector(cell, *i)
                .cross(&geometry::lattice_vector(cell, *j))
                .norm(),
        ),
        _ => ("volume", cell_volume(cell)),
    };
    Dimensionality {
        dim: periodic.len(),
        label,
        value,
    }
}

/// Builds the chemical formula by counting whole sites per composite
/// symbol string, ordered by first appearance; a count of one is omitted.
/// Grouping is by `symbol`, never by kind name, so an alloy site such as
/// `"CuAl"` counts as one unit of its own symbol string.
pub fn formula<'a, I>(symbols: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut order = Vec::new();
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for symbol in symbols {
        if !counts.contains_key(symbol) {
            order.push(symbol);
        }
        *counts.entry(symbol).or_insert(0) += 1;
    }
    let mut out = String::new();
    for symbol in order {
        out.push_str(symbol);
        let count = counts[symbol];
        if count > 1 {
            out.push_str(&count.to_string());
        }
    }
    out
}

/// Per-symbol site counts under the requested normalization, keyed by the
/// composite symbol string.
pub fn composition<'a, I>(symbols: I, mode: CompositionMode) -> BTreeMap<String, f64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for symbol in symbols {
        *counts.entry(symbol.to_string()).or_insert(0) += 1;
    }
    let divisor = match mode {
        CompositionMode::Full => 1.0,
        CompositionMode::Reduced => counts.values().copied().fold(0, gcd) as f64,
        CompositionMode::Fractional => counts.values().sum::<usize>() as f64,
    };
    counts
        .into_iter()
        .map(|(symbol, count)| (symbol, count as f64 / divisor.max(1.0)))
        .collect()
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Assigns a canonical kind name to every site.
///
/// Sites carrying an explicit `kind_name` keep it untouched and are
/// excluded from the auto-numbering pool. The remaining sites are grouped
/// by pairwise kind equality under `policy` (O(n^2) in the worst case) and
/// each group is labelled `<symbol><index>`, where the index is a 0-based
/// counter scoped to the symbol and assigned in order of first appearance.
/// Counters are local to one detection pass. Manually chosen names that
/// reuse the `<symbol><index>` pattern can collide with generated ones;
/// this is a documented caveat, not enforced.
pub fn detect_kinds(sites: &[Site], policy: KindPolicy) -> Vec<String> {
    let mut names: Vec<Option<String>> = sites
        .iter()
        .map(|s| s.kind_name().map(str::to_string))
        .collect();
    let mut counters: BTreeMap<&str, usize> = BTreeMap::new();
    // (representative index, assigned name) per discovered group
    let mut groups: Vec<(usize, String)> = Vec::new();

    for i in 0..sites.len() {
        if names[i].is_some() {
            continue;
        }
        let existing = groups
            .iter()
            .find(|(rep, _)| sites[*rep].same_kind_as(&sites[i], policy));
        let name = match existing {
            Some((_, name)) => name.clone(),
            None => {
                let counter = counters.entry(sites[i].symbol()).or_insert(0);
                let name = format!("{}{}", sites[i].symbol(), *counter);
                *counter += 1;
                groups.push((i, name.clone()));
                name
            }
        };
        names[i] = Some(name);
    }

    names.into_iter().map(Option::unwrap).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::RawSite;

    fn site(symbol: &str) -> Site {
        Site::from_raw(&RawSite {
            symbol: symbol.to_string(),
            position: [0.0, 0.0, 0.0],
            ..RawSite::default()
        })
        .unwrap()
    }

    fn site_with(raw: RawSite) -> Site {
        Site::from_raw(&raw).unwrap()
    }

    fn fcc_like_cell() -> Matrix3<f64> {
        crate::core::utils::geometry::cell_from_array(&[
            [2.75, 2.75, 0.0],
            [0.0, 2.75, 2.75],
            [2.75, 0.0, 2.75],
        ])
    }

    #[test]
    fn cell_volume_matches_scalar_triple_product() {
        assert!((cell_volume(&fcc_like_cell()) - 41.59375).abs() < 1e-9);
    }

    #[test]
    fn cell_volume_is_zero_for_degenerate_cells() {
        let cell = crate::core::utils::geometry::cell_from_array(&[
            [1.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
        ]);
        assert_eq!(cell_volume(&cell), 0.0);
    }

    #[test]
    fn cell_lengths_and_angles_for_cubic_cell() {
        let cell = Matrix3::identity() * 2.0;
        assert_eq!(cell_lengths(&cell), [2.0, 2.0, 2.0]);
        for angle in cell_angles(&cell) {
            assert!((angle - 90.0).abs() < 1e-9);
        }
    }

    #[test]
    fn dimensionality_labels_cover_all_periodicities() {
        let cell = Matrix3::identity() * 2.0;
        let bulk = dimensionality(&[true, true, true], &cell);
        assert_eq!((bulk.dim, bulk.label), (3, "volume"));
        assert!((bulk.value - 8.0).abs() < 1e-12);

        let slab = dimensionality(&[true, true, false], &cell);
        assert_eq!((slab.dim, slab.label), (2, "surface"));
        assert!((slab.value - 4.0).abs() < 1e-12);

        let wire = dimensionality(&[false, false, true], &cell);
        assert_eq!((wire.dim, wire.label), (1, "line"));
        assert!((wire.value - 2.0).abs() < 1e-12);

        let cluster = dimensionality(&[false, false, false], &cell);
        assert_eq!((cluster.dim, cluster.label, cluster.value), (0, "atom", 0.0));
    }

    #[test]
    fn formula_counts_symbols_in_first_appearance_order() {
        let symbols = ["Ba", "Ti", "O", "O", "O", "Ba", "Ti", "O", "O", "O"];
        assert_eq!(formula(symbols), "Ba2Ti2O6");
    }

    #[test]
    fn formula_omits_unit_counts_and_keeps_alloy_symbols_whole() {
        assert_eq!(formula(["Si", "Si"]), "Si2");
        assert_eq!(formula(["CuAl", "CuAl", "O"]), "CuAl2O");
        assert_eq!(formula([]), "");
    }

    #[test]
    fn composition_modes_normalize_counts() {
        let symbols = ["Ba", "Ba", "O", "O", "O", "O"];
        let full = composition(symbols, CompositionMode::Full);
        assert_eq!(full["Ba"], 2.0);
        assert_eq!(full["O"], 4.0);

        let reduced = composition(symbols, CompositionMode::Reduced);
        assert_eq!(reduced["Ba"], 1.0);
        assert_eq!(reduced["O"], 2.0);

        let fractional = composition(symbols, CompositionMode::Fractional);
        assert!((fractional["Ba"] - 2.0 / 6.0).abs() < 1e-12);
        assert!((fractional["O"] - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn detect_kinds_groups_equal_sites_under_one_name() {
        let sites = vec![site("Fe"), site("Fe"), site("O")];
        assert_eq!(detect_kinds(&sites, KindPolicy::default()), ["Fe0", "Fe0", "O0"]);
    }

    #[test]
    fn detect_kinds_numbers_distinct_groups_per_symbol() {
        let mut charged = RawSite {
            symbol: "Fe".to_string(),
            position: [0.5, 0.5, 0.5],
            ..RawSite::default()
        };
        charged.charge = Some(2.0);
        let sites = vec![site("Fe"), site_with(charged), site("Fe")];
        assert_eq!(detect_kinds(&sites, KindPolicy::default()), ["Fe0", "Fe1", "Fe0"]);
    }

    #[test]
    fn detect_kinds_policy_branches_on_magmom() {
        let mut up = RawSite {
            symbol: "Fe".to_string(),
            position: [0.0, 0.0, 0.0],
            ..RawSite::default()
        };
        up.magmom = Some([0.0, 0.0, 2.0]);
        let mut down = up.clone();
        down.magmom = Some([0.0, 0.0, -2.0]);
        let sites = vec![site_with(up), site_with(down)];

        // default policy: chemically identical, magnetically distinct -> one kind
        assert_eq!(detect_kinds(&sites, KindPolicy::ExcludeMagmom), ["Fe0", "Fe0"]);
        // opt-in policy: the differing moments split the group
        assert_eq!(detect_kinds(&sites, KindPolicy::IncludeMagmom), ["Fe0", "Fe1"]);
    }

    #[test]
    fn detect_kinds_leaves_explicit_names_untouched() {
        let tagged = Site::from_raw(&RawSite {
            symbol: "Fe".to_string(),
            position: [0.0, 0.0, 0.0],
            kind_name: Some("Fe_surface".to_string()),
            ..RawSite::default()
        })
        .unwrap();
        let sites = vec![tagged, site("Fe")];
        let kinds = detect_kinds(&sites, KindPolicy::default());
        assert_eq!(kinds, ["Fe_surface", "Fe0"]);
    }

    #[test]
    fn detect_kinds_counters_reset_between_passes() {
        let sites = vec![site("Cu")];
        assert_eq!(detect_kinds(&sites, KindPolicy::default()), ["Cu0"]);
        assert_eq!(detect_kinds(&sites, KindPolicy::default()), ["Cu0"]);
    }
}
