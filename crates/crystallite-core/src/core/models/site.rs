use crate::core::error::Violation;
use crate::core::schema::RawSite;
use crate::core::utils::elements;
use nalgebra::{Point3, Vector3};

/// Tolerance under which an occupancy weight sum is considered equal to one.
pub(crate) const WEIGHT_SUM_THRESHOLD: f64 = 1.0e-6;
/// Tolerance for mass comparison during kind grouping.
pub(crate) const MASS_KIND_THRESHOLD: f64 = 1.0e-3;
/// Tolerance for charge comparison during kind grouping.
pub(crate) const CHARGE_KIND_THRESHOLD: f64 = 0.1;
/// Tolerance for per-component magnetic moment comparison during kind grouping.
pub(crate) const MAGMOM_KIND_THRESHOLD: f64 = 1.0e-2;

/// Controls which per-site properties participate in kind equality.
///
/// Two sites belong to the same kind when their species composition,
/// occupancy weights, mass, and charge agree within fixed tolerances.
/// The magnetic moment is excluded by default, since magnetic structure
/// often varies within one chemical kind; `IncludeMagmom` opts it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindPolicy {
    /// Compare symbol composition, weights, mass, and charge only.
    #[default]
    ExcludeMagmom,
    /// Additionally require magnetic moments to agree (absence is
    /// distinct from an explicit zero vector).
    IncludeMagmom,
}

/// A single occupancy position in a structure.
///
/// A site may be composite (an alloy, more than one weighted species) or
/// partially occupied (a vacancy, weights summing below one). All fields
/// are resolved at construction: the mass is inferred from the standard
/// atomic-mass table when not supplied, weights default to `(1.0,)` for
/// single-species sites, and the charge defaults to zero. Absence of a
/// magnetic moment is preserved and is not the same as an explicit zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    symbol: String,
    symbols: Vec<String>,
    kind_name: Option<String>,
    position: Point3<f64>,
    mass: f64,
    charge: f64,
    magmom: Option<Vector3<f64>>,
    weights: Vec<f64>,
    explicit_mass: bool,
    explicit_charge: bool,
    explicit_weights: bool,
}

impl Site {
    /// Validates a raw site record and resolves every unspecified field.
    ///
    /// # Arguments
    ///
    /// * `raw` - The raw site record from the construction interface.
    ///
    /// # Errors
    ///
    /// Returns the full list of violated constraints (unknown species,
    /// weight shape/range errors, non-finite numbers) rather than stopping
    /// at the first; field paths in the violations are site-local and are
    /// scoped by the caller.
    pub fn from_raw(raw: &RawSite) -> Result<Self, Vec<Violation>> {
        let mut violations = Vec::new();

        let symbol = raw.symbol.trim().to_string();
        let symbols = elements::split_symbols(&symbol);
        if symbols.is_empty() {
            violations.push(Violation::new(
                "symbol",
                "must contain at least one element symbol",
            ));
        }
        for component in &symbols {
            if let Err(err) = elements::require_atomic_mass(component) {
                violations.push(Violation::new("symbol", err.to_string()));
            }
        }

        if raw.position.iter().any(|x| !x.is_finite()) {
            violations.push(Violation::new("position", "components must be finite"));
        }

        let explicit_weights = raw.weights.is_some();
        let weights = match &raw.weights {
            Some(weights) => {
                if !symbols.is_empty() && weights.len() != symbols.len() {
                    violations.push(Violation::new(
                        "weights",
                        format!(
                            "length {} does not match {} symbol component(s)",
                            weights.len(),
                            symbols.len()
                        ),
                    ));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    violations.push(Violation::new(
                        "weights",
                        "each weight must be a finite non-negative number",
                    ));
                }
                let sum: f64 = weights.iter().sum();
                if sum <= WEIGHT_SUM_THRESHOLD {
                    violations.push(Violation::new("weights", "sum must be positive"));
                } else if sum > 1.0 + WEIGHT_SUM_THRESHOLD {
                    violations.push(Violation::new("weights", "sum must not exceed one"));
                }
                weights.clone()
            }
            None if symbols.len() > 1 => {
                violations.push(Violation::new(
                    "weights",
                    "required for a composite (multi-species) symbol",
                ));
                Vec::new()
            }
            None => vec![1.0],
        };

        let explicit_mass = raw.mass.is_some();
        let mass = match raw.mass {
            Some(mass) => {
                if !mass.is_finite() || mass <= 0.0 {
                    violations.push(Violation::new("mass", "must be a positive finite number"));
                }
                mass
            }
            None => {
                let mut inferred = 0.0;
                for (component, weight) in symbols.iter().zip(&weights) {
                    match elements::atomic_mass(component) {
                        Some(m) => inferred += m * weight,
                        // unknown species already recorded above
                        None => break,
                    }
                }
                inferred
            }
        };

        let explicit_charge = raw.charge.is_some();
        let charge = raw.charge.unwrap_or(0.0);
        if !charge.is_finite() {
            violations.push(Violation::new("charge", "must be a finite number"));
        }

        let magmom = raw.magmom.map(|m| Vector3::new(m[0], m[1], m[2]));
        if let Some(m) = &magmom {
            if m.iter().any(|x| !x.is_finite()) {
                violations.push(Violation::new("magmom", "components must be finite"));
            }
        }

        let kind_name = raw.kind_name.as_ref().map(|n| n.trim().to_string());
        if let Some(name) = &kind_name {
            if name.is_empty() {
                violations.push(Violation::new("kind_name", "must not be empty"));
            }
        }

        if !violations.is_empty() {
            return Err(violations);
        }

        Ok(Self {
            symbol,
            symbols,
            kind_name,
            position: Point3::new(raw.position[0], raw.position[1], raw.position[2]),
            mass,
            charge,
            magmom,
            weights,
            explicit_mass,
            explicit_charge,
            explicit_weights,
        })
    }

    /// The composite species string, e.g. `"Si"` or `"CuAl"`.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The parsed species components, in the order they appear in `symbol`.
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// The explicitly supplied kind name, if any.
    pub fn kind_name(&self) -> Option<&str> {
        self.kind_name.as_deref()
    }

    /// The kind name used for projections: the explicit name when given,
    /// otherwise the composite symbol itself.
    pub fn effective_kind_name(&self) -> &str {
        self.kind_name.as_deref().unwrap_or(&self.symbol)
    }

    /// The site position. Treated as opaque real coordinates; no
    /// Cartesian/fractional conversion is performed by this engine.
    pub fn position(&self) -> &Point3<f64> {
        &self.position
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn charge(&self) -> f64 {
        self.charge
    }

    pub fn magmom(&self) -> Option<&Vector3<f64>> {
        self.magmom.as_ref()
    }

    /// The occupancy weights, one per symbol component.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn weight_sum(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Whether this site carries more than one weighted species.
    pub fn is_alloy(&self) -> bool {
        self.symbols.len() > 1
    }

    /// Whether the occupancy weights sum to less than one.
    pub fn has_vacancies(&self) -> bool {
        self.weight_sum() < 1.0 - WEIGHT_SUM_THRESHOLD
    }

    /// Whether this site and `other` belong to the same kind under the
    /// given policy.
    ///
    /// Compares symbol composition exactly, weights within `1e-6`, mass
    /// within `1e-3`, and charge within `0.1`. Magnetic moments take part
    /// only under [`KindPolicy::IncludeMagmom`], where a missing moment
    /// never matches an explicit one.
    pub fn same_kind_as(&self, other: &Site, policy: KindPolicy) -> bool {
        if self.symbol != other.symbol || self.weights.len() != other.weights.len() {
            return false;
        }
        let weights_match = self
            .weights
            .iter()
            .zip(&other.weights)
            .all(|(a, b)| (a - b).abs() < WEIGHT_SUM_THRESHOLD);
        if !weights_match
            || (self.mass - other.mass).abs() >= MASS_KIND_THRESHOLD
            || (self.charge - other.charge).abs() >= CHARGE_KIND_THRESHOLD
        {
            return false;
        }
        match policy {
            KindPolicy::ExcludeMagmom => true,
            KindPolicy::IncludeMagmom => match (&self.magmom, &other.magmom) {
                (None, None) => true,
                (Some(a), Some(b)) => {
                    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < MAGMOM_KIND_THRESHOLD)
                }
                _ => false,
            },
        }
    }

    /// Reconstructs the raw record exactly as it was supplied: fields that
    /// were resolved from defaults (mass, charge, weights, kind name) are
    /// emitted as absent again, so raw round trips are lossless. The one
    /// canonicalization is that `symbol` and `kind_name` are emitted in
    /// trimmed form, with any surrounding whitespace from the input gone.
    pub fn to_raw(&self) -> RawSite {
        RawSite {
            symbol: self.symbol.clone(),
            position: [self.position.x, self.position.y, self.position.z],
            kind_name: self.kind_name.clone(),
            mass: self.explicit_mass.then_some(self.mass),
            charge: self.explicit_charge.then_some(self.charge),
            magmom: self.magmom.map(|m| [m.x, m.y, m.z]),
            weights: self.explicit_weights.then(|| self.weights.clone()),
        }
    }

    /// Pins an explicit kind name on the site. Used when an import runs
    /// kind detection before the structure is handed out.
    pub(crate) fn set_kind_name(&mut self, name: String) {
        self.kind_name = Some(name);
    }

    /// Produces a fully resolved raw record for the dump interface, with
    /// every optional field filled in and the given kind name applied.
    pub fn resolved_raw(&self, kind_name: &str) -> RawSite {
        RawSite {
            symbol: self.symbol.clone(),
            position: [self.position.x, self.position.y, self.position.z],
            kind_name: Some(kind_name.to_string()),
            mass: Some(self.mass),
            charge: Some(self.charge),
            magmom: self.magmom.map(|m| [m.x, m.y, m.z]),
            weights: Some(self.weights.clone()),
        }
    }
}
