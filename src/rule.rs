//! Rule evaluator (spec.md §4.3, component C5).
//!
//! The teacher has no direct rule-interpreter analogue; this module follows
//! `original_source/simulation.cpp`'s `get_parameter`/`simulation_single_step`
//! rule loop, translating its tagged-union parameter dispatch into enums the
//! way the rest of this crate translates the teacher's C-style sentinels into
//! `Option`/`enum` (see `cell::CellStore::create_cell`).

use crate::cell::Cell;
use crate::geometry::SimRng;

/// A resolvable rule operand: a literal, a derived cell property, a
/// chemical/diffusion slot, or a process-wide mapping register.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Parameter {
    Constant(f32),
    Neighbors,
    Age,
    Birth,
    Conc(usize),
    Diff(usize),
    /// Index into the simulation's mapping-slot array, written by `MAP`
    /// actions and readable by later rules in the same iteration.
    Mapping(usize),
}

impl Parameter {
    #[inline]
    pub fn resolve(&self, cell: &Cell, iteration: i64, mappings: &[f32]) -> f32 {
        match *self {
            Parameter::Constant(v) => v,
            Parameter::Neighbors => cell.neighbors as f32,
            Parameter::Age => (iteration - cell.birth) as f32,
            Parameter::Birth => cell.birth as f32,
            Parameter::Conc(i) => cell.conc[i],
            Parameter::Diff(i) => cell.diff[i],
            Parameter::Mapping(i) => mappings.get(i).copied().unwrap_or(0.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Predicate {
    Always,
    IfEqual(Parameter, Parameter),
    IfNotEqual(Parameter, Parameter),
    IfLessThan(Parameter, Parameter),
    IfLessEqual(Parameter, Parameter),
    IfGreaterThan(Parameter, Parameter),
    IfGreaterEqual(Parameter, Parameter),
    /// `low <= v <= high`.
    IfInInterval(Parameter, Parameter, Parameter),
    /// Active iff `uniform[0,1] <= operand`.
    Probability(Parameter),
}

/// Target of a `CHANGE` action: a concentration or a diffusion-rate slot.
/// Replaces the original's single combined index (`< MAX_CHEMICALS` vs not)
/// with a tagged enum — same semantics, no magic-number comparison at call
/// sites.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ChangeTarget {
    Concentration(usize),
    Diffusion(usize),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Action {
    /// Defers the predicate result to gate the *next* rule (logical AND).
    And,
    ReactGs {
        u: usize,
        v: usize,
        s: Parameter,
        f: Parameter,
        k: Parameter,
    },
    ReactTu {
        u: usize,
        v: usize,
        s: Parameter,
        alpha: Parameter,
        beta: Parameter,
    },
    ReactLi {
        u: usize,
        s: Parameter,
        a: Parameter,
        b: Parameter,
    },
    ReactCu {
        u: usize,
        s: Parameter,
        a: Parameter,
        b: Parameter,
        c: Parameter,
    },
    Change {
        target: ChangeTarget,
        val: Parameter,
        dev: Parameter,
    },
    /// Piecewise-linear remap, `slope` precomputed at load time (spec.md §9
    /// design notes: "precompute the MAP action's linear coefficients once
    /// at load time").
    Map {
        input: Parameter,
        lo: f32,
        hi: f32,
        out_lo: f32,
        out_hi: f32,
        slope: f32,
        slot: usize,
    },
    Polarize {
        source: usize,
    },
    Divide {
        dir: Parameter,
        dev: Parameter,
    },
    Move {
        val: Parameter,
        dev: Parameter,
    },
}

impl Action {
    /// Constructs a `MAP` action, precomputing the linear coefficient once
    /// instead of on every evaluation.
    pub fn map(input: Parameter, lo: f32, hi: f32, out_lo: f32, out_hi: f32, slot: usize) -> Self {
        let slope = if hi > lo {
            (out_hi - out_lo) / (hi - lo)
        } else {
            0.0
        };
        Action::Map {
            input,
            lo,
            hi,
            out_lo,
            out_hi,
            slope,
            slot,
        }
    }
}

/// An ordered (predicate, action) pair with a bounded iteration window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rule {
    pub from: i64,
    pub until: i64,
    pub predicate: Predicate,
    pub action: Action,
}

/// Result of evaluating the whole rule list against one cell: the updated
/// cell (before neighbor interaction), whether a `POLARIZE` action fired
/// (and for which chemical), and a pending division request.
#[derive(Clone, Copy, Debug, Default)]
pub struct RuleOutcome {
    pub next: Cell,
    pub polarity_source: Option<usize>,
    /// `(direction_degrees, deviation_degrees)`, already resolved against the
    /// *current* cell — division capacity/bookkeeping is the step driver's
    /// job (it owns the cell store).
    pub divide: Option<(f32, f32)>,
}

/// Evaluates the ordered rule list against `curr_id`/`curr_cell` for the
/// given `iteration`, starting `next` as a copy of `curr_cell` (spec.md
/// §4.3/§4.4: "copy current cell values as base for next cell").
pub fn evaluate_cell(
    rules: &[Rule],
    curr_cell: &Cell,
    iteration: i64,
    dt: f32,
    mappings: &mut [f32],
    rng: &mut SimRng,
) -> RuleOutcome {
    let mut next = *curr_cell;
    next.marker = false;

    let mut polarity_source = None;
    let mut divide = None;

    let mut pending_and: Option<bool> = None;

    for rule in rules {
        if iteration < rule.from || rule.until < iteration {
            // Outside the window: a pending AND must still be started so the
            // next rule sees a false gate (spec.md §4.3 step 1).
            if rule.action == Action::And {
                pending_and = Some(false);
            }
            continue;
        }

        let mut is_active = eval_predicate(&rule.predicate, curr_cell, iteration, mappings, rng);

        if let Some(pending) = pending_and.take() {
            is_active = pending && is_active;
        }

        if rule.action == Action::And {
            pending_and = Some(is_active);
            continue;
        }

        if !is_active {
            continue;
        }

        apply_action(
            &rule.action,
            curr_cell,
            &mut next,
            iteration,
            dt,
            mappings,
            rng,
            &mut polarity_source,
            &mut divide,
        );
    }

    RuleOutcome {
        next,
        polarity_source,
        divide,
    }
}

fn eval_predicate(
    predicate: &Predicate,
    curr: &Cell,
    iteration: i64,
    mappings: &[f32],
    rng: &mut SimRng,
) -> bool {
    let r = |p: &Parameter| p.resolve(curr, iteration, mappings);
    match *predicate {
        Predicate::Always => true,
        Predicate::IfEqual(a, b) => r(&a) == r(&b),
        Predicate::IfNotEqual(a, b) => r(&a) != r(&b),
        Predicate::IfLessThan(a, b) => r(&a) < r(&b),
        Predicate::IfLessEqual(a, b) => r(&a) <= r(&b),
        Predicate::IfGreaterThan(a, b) => r(&a) > r(&b),
        Predicate::IfGreaterEqual(a, b) => r(&a) >= r(&b),
        Predicate::IfInInterval(v, lo, hi) => {
            let v = r(&v);
            r(&lo) <= v && v <= r(&hi)
        }
        Predicate::Probability(p) => rng.uniform01() <= r(&p),
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_action(
    action: &Action,
    curr: &Cell,
    next: &mut Cell,
    iteration: i64,
    dt: f32,
    mappings: &mut [f32],
    rng: &mut SimRng,
    polarity_source: &mut Option<usize>,
    divide: &mut Option<(f32, f32)>,
) {
    let r = |p: &Parameter, mappings: &[f32]| p.resolve(curr, iteration, mappings);
    match *action {
        Action::And => unreachable!("AND is consumed before reaching apply_action"),
        Action::ReactGs { u, v, s, f, k } => {
            let uu = curr.conc[u];
            let vv = curr.conc[v];
            let s = r(&s, mappings);
            let f = r(&f, mappings);
            let k = r(&k, mappings);
            next.conc[u] += s * (-uu * vv * vv + f * (1.0 - uu)) * dt;
            next.conc[v] += s * (uu * vv * vv - (f + k) * vv) * dt;
        }
        Action::ReactTu {
            u,
            v,
            s,
            alpha,
            beta,
        } => {
            let uu = curr.conc[u];
            let vv = curr.conc[v];
            let s = r(&s, mappings);
            let alpha = r(&alpha, mappings);
            let beta = r(&beta, mappings);
            next.conc[u] += s * (alpha - uu * vv) * dt;
            next.conc[v] += s * (uu * vv - vv - beta) * dt;
        }
        Action::ReactLi { u, s, a, b } => {
            let uu = curr.conc[u];
            let s = r(&s, mappings);
            let a = r(&a, mappings);
            let b = r(&b, mappings);
            next.conc[u] += s * (a * uu - b) * dt;
        }
        Action::ReactCu { u, s, a, b, c } => {
            let uu = curr.conc[u];
            let s = r(&s, mappings);
            let a = r(&a, mappings);
            let b = r(&b, mappings);
            let c = r(&c, mappings);
            next.conc[u] += s * (uu - a) * (uu - b) * (uu - c) * dt;
        }
        Action::Change { target, val, dev } => {
            let val = r(&val, mappings);
            let dev = r(&dev, mappings);
            let delta = rng.deviate(val, dev);
            match target {
                ChangeTarget::Concentration(i) => next.conc[i] += delta,
                ChangeTarget::Diffusion(i) => {
                    next.diff[i] += delta;
                    // Invariant 5, checked right after the CHANGE that can
                    // violate it (spec.md §9 open question: once per CHANGE,
                    // not every step — this is the cheaper, spec-sanctioned
                    // choice, see DESIGN.md).
                    if next.diff[i] < 0.0 {
                        next.diff[i] = 0.0;
                    }
                }
            }
        }
        Action::Map {
            input,
            lo,
            hi,
            out_lo,
            out_hi,
            slope,
            slot,
        } => {
            let val = r(&input, mappings);
            let mapped = if val < lo {
                out_lo
            } else if val > hi {
                out_hi
            } else {
                (val - lo) * slope + out_lo
            };
            if let Some(m) = mappings.get_mut(slot) {
                *m = mapped;
            }
        }
        Action::Polarize { source } => {
            *polarity_source = Some(source);
            next.px = 0.0;
            next.py = 0.0;
        }
        Action::Divide { dir, dev } => {
            let dir = r(&dir, mappings);
            let dev = r(&dev, mappings);
            *divide = Some((dir, dev));
        }
        Action::Move { val, dev } => {
            let val = r(&val, mappings);
            let dev = r(&dev, mappings);
            let offset = rng.deviate(val, dev);
            next.x += curr.px * offset;
            next.y += curr.py * offset;
        }
    }
}

/// Computes a divided child's fields from its parent, following
/// `original_source/simulation.cpp::divide_cell` exactly: the child is
/// offset from the parent by one unit radius along a direction derived from
/// the parent's current polarity angle, deviated by `(dir, dev)` degrees.
pub fn divide_cell(parent: &Cell, iteration: i64, dir: f32, dev: f32, rng: &mut SimRng) -> Cell {
    let base_angle = parent.py.atan2(parent.px);
    let angle = base_angle + std::f32::consts::PI * rng.deviate(dir, dev) / 180.0;
    let dx = angle.cos();
    let dy = angle.sin();

    let mut child = *parent;
    child.birth = iteration + 1;
    child.neighbors = 0;
    child.x = parent.x + dx;
    child.y = parent.y + dy;
    child.px = dx;
    child.py = dy;
    child.fixed = false;
    child.marker = false;
    child
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell_with_conc(u: f32, v: f32) -> Cell {
        let mut c = Cell::default();
        c.conc[0] = u;
        c.conc[1] = v;
        c
    }

    #[test]
    fn always_predicate_react_li_matches_closed_form() {
        // Scenario S2: u_n = 0.2 * (1.5^n - 1), dt folded into `s` by the caller.
        let rules = [Rule {
            from: 0,
            until: i64::MAX,
            predicate: Predicate::Always,
            action: Action::ReactLi {
                u: 0,
                s: Parameter::Constant(1.0),
                a: Parameter::Constant(0.5),
                b: Parameter::Constant(0.1),
            },
        }];
        let mut mappings = [0.0f32; 1];
        let mut rng = SimRng::new(1);
        let mut cell = cell_with_conc(0.0, 0.0);
        for _ in 0..5 {
            let outcome = evaluate_cell(&rules, &cell, 0, 1.0, &mut mappings, &mut rng);
            cell = outcome.next;
        }
        let expected = 0.2 * (1.5f32.powi(5) - 1.0);
        assert!((cell.conc[0] - expected).abs() < 1e-4);
    }

    #[test]
    fn and_gates_next_rule() {
        // IF_LESS_THAN(age,5) AND ALWAYS -> DIVIDE; rule should stop firing at age>=5.
        let rules = [
            Rule {
                from: 0,
                until: i64::MAX,
                predicate: Predicate::IfLessThan(Parameter::Age, Parameter::Constant(5.0)),
                action: Action::And,
            },
            Rule {
                from: 0,
                until: i64::MAX,
                predicate: Predicate::Always,
                action: Action::Divide {
                    dir: Parameter::Constant(0.0),
                    dev: Parameter::Constant(0.0),
                },
            },
        ];
        let mut mappings = [0.0f32; 1];
        let mut rng = SimRng::new(1);
        let mut young = Cell::default();
        young.birth = 0;
        let outcome = evaluate_cell(&rules, &young, 4, 1.0, &mut mappings, &mut rng);
        assert!(outcome.divide.is_some());

        let mut old = Cell::default();
        old.birth = 0;
        let outcome = evaluate_cell(&rules, &old, 5, 1.0, &mut mappings, &mut rng);
        assert!(outcome.divide.is_none());
    }

    #[test]
    fn probability_zero_never_fires_one_always_fires() {
        let rules_zero = [Rule {
            from: 0,
            until: i64::MAX,
            predicate: Predicate::Probability(Parameter::Constant(0.0)),
            action: Action::Change {
                target: ChangeTarget::Concentration(0),
                val: Parameter::Constant(1.0),
                dev: Parameter::Constant(0.0),
            },
        }];
        let rules_one = [Rule {
            from: 0,
            until: i64::MAX,
            predicate: Predicate::Probability(Parameter::Constant(1.0)),
            action: Action::Change {
                target: ChangeTarget::Concentration(0),
                val: Parameter::Constant(1.0),
                dev: Parameter::Constant(0.0),
            },
        }];
        let mut mappings = [0.0f32; 1];
        let mut rng = SimRng::new(99);
        let cell = Cell::default();

        let out = evaluate_cell(&rules_zero, &cell, 0, 1.0, &mut mappings, &mut rng);
        assert_eq!(out.next.conc[0], 0.0);

        let out = evaluate_cell(&rules_one, &cell, 0, 1.0, &mut mappings, &mut rng);
        assert_eq!(out.next.conc[0], 1.0);
    }

    #[test]
    fn map_action_clamps_and_interpolates() {
        let action = Action::map(Parameter::Conc(0), 0.0, 10.0, 0.0, 1.0, 0);
        let rules = [Rule {
            from: 0,
            until: i64::MAX,
            predicate: Predicate::Always,
            action,
        }];
        let mut mappings = [0.0f32; 1];
        let mut rng = SimRng::new(1);

        let mut cell = Cell::default();
        cell.conc[0] = -5.0;
        evaluate_cell(&rules, &cell, 0, 1.0, &mut mappings, &mut rng);
        assert_eq!(mappings[0], 0.0);

        cell.conc[0] = 5.0;
        evaluate_cell(&rules, &cell, 0, 1.0, &mut mappings, &mut rng);
        assert!((mappings[0] - 0.5).abs() < 1e-6);

        cell.conc[0] = 50.0;
        evaluate_cell(&rules, &cell, 0, 1.0, &mut mappings, &mut rng);
        assert_eq!(mappings[0], 1.0);
    }
}
