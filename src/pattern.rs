//! TOML pattern-file loader.
//!
//! spec.md §1 names the pattern parser an external collaborator and leaves
//! its format unspecified ("populates the simulation ... via the setup API
//! of §6"). The corpus has no parser precedent from the teacher, so this
//! bridges the gap the way `other_examples/a-samea-vicseksim-rs` configures
//! its simulations: a `serde`-derived document deserialized with the `toml`
//! crate, one field per setup-API call.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SimError};
use crate::rule::{Action, ChangeTarget, Parameter, Predicate, Rule};
use crate::simulation::Simulation;

#[derive(Debug, Deserialize)]
pub struct PatternFile {
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_time_step")]
    pub time_step: f32,
    #[serde(default)]
    pub division_limit: u32,
    #[serde(default)]
    pub domain: Option<DomainSpec>,
    #[serde(default)]
    pub packed_domain: Option<PackedDomainSpec>,
    #[serde(default)]
    pub stop_at: Option<i64>,
    #[serde(default)]
    pub detect_stability: bool,
    #[serde(default)]
    pub tracked_id: Option<usize>,
    #[serde(default)]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub chemicals: Vec<ChemicalSpec>,
    #[serde(default)]
    pub mirror_pairs: Vec<(usize, usize)>,
    #[serde(default)]
    pub cell_defaults: Vec<CellDefaultsSpec>,
    #[serde(default)]
    pub layouts: Vec<LayoutSpec>,
    #[serde(default)]
    pub cells: Vec<CellSpec>,
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

fn default_time_step() -> f32 {
    1.0
}

#[derive(Debug, Deserialize)]
pub struct DomainSpec {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Deserialize)]
pub struct PackedDomainSpec {
    pub factor: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChemicalSpec {
    pub name: String,
    pub limit: f32,
    #[serde(default)]
    pub anisotropic: bool,
}

/// Sets the `use_*` defaults applied to every cell created after this entry,
/// mirroring the original's ordering dependency: defaults are file-static and
/// apply forward-only.
#[derive(Debug, Deserialize)]
pub struct CellDefaultsSpec {
    #[serde(default)]
    pub polarity: Option<(f32, f32)>,
    #[serde(default)]
    pub concentration: Vec<(usize, f32, f32)>,
    #[serde(default)]
    pub diffusion: Vec<(usize, f32, f32)>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutSpec {
    SquareGrid {
        count_x: usize,
        count_y: usize,
        #[serde(default)]
        center_x: f32,
        #[serde(default)]
        center_y: f32,
        #[serde(default)]
        dev: f32,
        #[serde(default)]
        fixed: bool,
        #[serde(default)]
        wrap: bool,
    },
    SquareCircle {
        count: usize,
        #[serde(default)]
        center_x: f32,
        #[serde(default)]
        center_y: f32,
        #[serde(default)]
        dev: f32,
        #[serde(default)]
        fixed: bool,
    },
    HexagonalGrid {
        count_x: usize,
        count_y: usize,
        #[serde(default)]
        center_x: f32,
        #[serde(default)]
        center_y: f32,
        #[serde(default)]
        dev: f32,
        #[serde(default)]
        fixed: bool,
    },
    HexagonalCircle {
        count: i64,
        #[serde(default)]
        center_x: f32,
        #[serde(default)]
        center_y: f32,
        #[serde(default)]
        dev: f32,
        #[serde(default)]
        fixed: bool,
    },
}

#[derive(Debug, Deserialize)]
pub struct CellSpec {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub fixed: bool,
}

#[derive(Debug, Deserialize)]
pub struct RuleSpec {
    #[serde(default)]
    pub from: i64,
    #[serde(default = "default_until")]
    pub until: i64,
    pub predicate: PredicateSpec,
    pub action: ActionSpec,
}

fn default_until() -> i64 {
    i64::MAX
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamSpec {
    Constant { value: f32 },
    Neighbors,
    Age,
    Birth,
    Conc { index: usize },
    Diff { index: usize },
    Mapping { slot: usize },
}

impl From<&ParamSpec> for Parameter {
    fn from(p: &ParamSpec) -> Self {
        match *p {
            ParamSpec::Constant { value } => Parameter::Constant(value),
            ParamSpec::Neighbors => Parameter::Neighbors,
            ParamSpec::Age => Parameter::Age,
            ParamSpec::Birth => Parameter::Birth,
            ParamSpec::Conc { index } => Parameter::Conc(index),
            ParamSpec::Diff { index } => Parameter::Diff(index),
            ParamSpec::Mapping { slot } => Parameter::Mapping(slot),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PredicateSpec {
    Always,
    IfEqual { a: ParamSpec, b: ParamSpec },
    IfNotEqual { a: ParamSpec, b: ParamSpec },
    IfLessThan { a: ParamSpec, b: ParamSpec },
    IfLessEqual { a: ParamSpec, b: ParamSpec },
    IfGreaterThan { a: ParamSpec, b: ParamSpec },
    IfGreaterEqual { a: ParamSpec, b: ParamSpec },
    IfInInterval { v: ParamSpec, lo: ParamSpec, hi: ParamSpec },
    Probability { p: ParamSpec },
}

impl From<&PredicateSpec> for Predicate {
    fn from(p: &PredicateSpec) -> Self {
        match p {
            PredicateSpec::Always => Predicate::Always,
            PredicateSpec::IfEqual { a, b } => Predicate::IfEqual(a.into(), b.into()),
            PredicateSpec::IfNotEqual { a, b } => Predicate::IfNotEqual(a.into(), b.into()),
            PredicateSpec::IfLessThan { a, b } => Predicate::IfLessThan(a.into(), b.into()),
            PredicateSpec::IfLessEqual { a, b } => Predicate::IfLessEqual(a.into(), b.into()),
            PredicateSpec::IfGreaterThan { a, b } => Predicate::IfGreaterThan(a.into(), b.into()),
            PredicateSpec::IfGreaterEqual { a, b } => Predicate::IfGreaterEqual(a.into(), b.into()),
            PredicateSpec::IfInInterval { v, lo, hi } => {
                Predicate::IfInInterval(v.into(), lo.into(), hi.into())
            }
            PredicateSpec::Probability { p } => Predicate::Probability(p.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpec {
    And,
    ReactGs { u: usize, v: usize, s: ParamSpec, f: ParamSpec, k: ParamSpec },
    ReactTu { u: usize, v: usize, s: ParamSpec, alpha: ParamSpec, beta: ParamSpec },
    ReactLi { u: usize, s: ParamSpec, a: ParamSpec, b: ParamSpec },
    ReactCu { u: usize, s: ParamSpec, a: ParamSpec, b: ParamSpec, c: ParamSpec },
    ChangeConcentration { index: usize, val: ParamSpec, dev: ParamSpec },
    ChangeDiffusion { index: usize, val: ParamSpec, dev: ParamSpec },
    Map { input: ParamSpec, lo: f32, hi: f32, out_lo: f32, out_hi: f32, slot: usize },
    Polarize { source: usize },
    Divide { dir: ParamSpec, dev: ParamSpec },
    Move { val: ParamSpec, dev: ParamSpec },
}

impl From<&ActionSpec> for Action {
    fn from(a: &ActionSpec) -> Self {
        match a {
            ActionSpec::And => Action::And,
            ActionSpec::ReactGs { u, v, s, f, k } => Action::ReactGs {
                u: *u,
                v: *v,
                s: s.into(),
                f: f.into(),
                k: k.into(),
            },
            ActionSpec::ReactTu { u, v, s, alpha, beta } => Action::ReactTu {
                u: *u,
                v: *v,
                s: s.into(),
                alpha: alpha.into(),
                beta: beta.into(),
            },
            ActionSpec::ReactLi { u, s, a, b } => Action::ReactLi {
                u: *u,
                s: s.into(),
                a: a.into(),
                b: b.into(),
            },
            ActionSpec::ReactCu { u, s, a, b, c } => Action::ReactCu {
                u: *u,
                s: s.into(),
                a: a.into(),
                b: b.into(),
                c: c.into(),
            },
            ActionSpec::ChangeConcentration { index, val, dev } => Action::Change {
                target: ChangeTarget::Concentration(*index),
                val: val.into(),
                dev: dev.into(),
            },
            ActionSpec::ChangeDiffusion { index, val, dev } => Action::Change {
                target: ChangeTarget::Diffusion(*index),
                val: val.into(),
                dev: dev.into(),
            },
            ActionSpec::Map { input, lo, hi, out_lo, out_hi, slot } => {
                Action::map(input.into(), *lo, *hi, *out_lo, *out_hi, *slot)
            }
            ActionSpec::Polarize { source } => Action::Polarize { source: *source },
            ActionSpec::Divide { dir, dev } => Action::Divide {
                dir: dir.into(),
                dev: dev.into(),
            },
            ActionSpec::Move { val, dev } => Action::Move {
                val: val.into(),
                dev: dev.into(),
            },
        }
    }
}

/// Loads a `.pat` (TOML) file and drives the setup API to build a
/// [`Simulation`], in the order spec.md §6's API implies: chemicals, domain,
/// cell defaults, layouts/cells, then rules.
pub fn load_pattern(path: impl AsRef<Path>) -> Result<Simulation> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| SimError::PatternRead {
        path: path.display().to_string(),
        source,
    })?;
    let doc: PatternFile = toml::from_str(&text).map_err(|source| SimError::PatternParse {
        path: path.display().to_string(),
        source,
    })?;

    let capacity = doc.capacity.unwrap_or(16_384);
    let mut sim = Simulation::new(capacity);

    sim.use_seed(doc.seed);
    sim.define_time_step(doc.time_step);
    sim.define_division_limit(doc.division_limit);
    if let Some(domain) = &doc.domain {
        sim.define_domain(domain.width, domain.height);
    }
    if let Some(packed) = &doc.packed_domain {
        sim.define_packed_domain(packed.factor);
    }
    sim.stop_at = doc.stop_at;
    sim.detect_stability = doc.detect_stability;
    if let Some(id) = doc.tracked_id {
        sim.track_cell(id);
    }

    for chem in &doc.chemicals {
        let index = sim.define_chemical(chem.name.clone(), chem.limit, chem.anisotropic);
        if index >= crate::cell::MAX_CHEMICALS {
            return Err(SimError::TooManyChemicals(doc.chemicals.len(), crate::cell::MAX_CHEMICALS));
        }
    }
    for &(a, b) in &doc.mirror_pairs {
        sim.define_mirror_pair(a, b);
    }

    for defaults in &doc.cell_defaults {
        if let Some((angle, dev)) = defaults.polarity {
            sim.use_polarity(angle, dev);
        }
        for &(ch, val, dev) in &defaults.concentration {
            validate_chemical(ch, doc.chemicals.len())?;
            sim.use_chemical_concentration(ch, val, dev);
        }
        for &(ch, val, dev) in &defaults.diffusion {
            validate_chemical(ch, doc.chemicals.len())?;
            sim.use_chemical_diffusion(ch, val, dev);
        }
    }

    for layout in &doc.layouts {
        match layout {
            LayoutSpec::SquareGrid { count_x, count_y, center_x, center_y, dev, fixed, wrap } => {
                sim.create_square_grid(*count_x, *count_y, *center_x, *center_y, *dev, *fixed, *wrap);
            }
            LayoutSpec::SquareCircle { count, center_x, center_y, dev, fixed } => {
                sim.create_square_circle(*count, *center_x, *center_y, *dev, *fixed);
            }
            LayoutSpec::HexagonalGrid { count_x, count_y, center_x, center_y, dev, fixed } => {
                sim.create_hexagonal_grid(*count_x, *count_y, *center_x, *center_y, *dev, *fixed);
            }
            LayoutSpec::HexagonalCircle { count, center_x, center_y, dev, fixed } => {
                sim.create_hexagonal_circle(*count, *center_x, *center_y, *dev, *fixed);
            }
        }
    }
    for cell in &doc.cells {
        sim.create_cell(cell.x, cell.y, cell.fixed);
    }

    for rule in &doc.rules {
        sim.add_rule(Rule {
            from: rule.from,
            until: rule.until,
            predicate: (&rule.predicate).into(),
            action: (&rule.action).into(),
        });
    }

    Ok(sim)
}

fn validate_chemical(index: usize, n_chemicals: usize) -> Result<()> {
    if index >= n_chemicals {
        Err(SimError::UnknownChemical { index, n_chemicals })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_pattern(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_minimal_pattern() {
        let file = write_pattern(
            r#"
            seed = 42
            time_step = 1.0

            [[chemicals]]
            name = "u"
            limit = 1.0

            [[cells]]
            x = 0.0
            y = 0.0
            "#,
        );
        let sim = load_pattern(file.path()).unwrap();
        assert_eq!(sim.n_cells(), 1);
        assert_eq!(sim.n_chemicals(), 1);
    }

    #[test]
    fn loads_rule_with_react_li() {
        let file = write_pattern(
            r#"
            [[chemicals]]
            name = "u"
            limit = 10.0

            [[cells]]
            x = 0.0
            y = 0.0

            [[rules]]
            predicate = { kind = "always" }
            action = { kind = "react_li", u = 0, s = { kind = "constant", value = 1.0 }, a = { kind = "constant", value = 0.5 }, b = { kind = "constant", value = 0.1 } }
            "#,
        );
        let sim = load_pattern(file.path()).unwrap();
        assert_eq!(sim.rules.len(), 1);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_pattern("/nonexistent/path.pat").unwrap_err();
        assert!(matches!(err, SimError::PatternRead { .. }));
    }
}
