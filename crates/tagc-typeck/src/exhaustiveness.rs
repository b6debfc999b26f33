//! Exhaustiveness and redundancy checking for match expressions.
//!
//! Each arm denotes a "box" of scrutinee values: per scrutinee position
//! either one variant or every variant. The checker unions the boxes of the
//! arms that count toward coverage and asks whether the union is the whole
//! domain. Both questions, and the enumeration of what is missing, are
//! answered by recursive partitioning of the domain, splitting a position
//! only where some box distinguishes its variants. Variants no box
//! mentions are handled as one class, so the cross product of a tuple
//! match is never materialized.
//!
//! An arm with a guard counts only when the guard is the literal `true`.
//! Arms whose field sub-patterns can fail (`Wrap(Pending)`) still split the
//! domain like any other arm, but whether they cover a region is decided by
//! Maranget's usefulness predicate over their nested patterns.

use tagc_ast::{
    FieldMismatch, Literal, MatchArm, MatchExpression, Pattern, Scrutinee, SumTypeDecl,
    VariantPattern,
};
use tagc_common::{LowerConfig, LowerError, Span};

use crate::service::{field_types, SumTypeRef, TypeService};
use crate::ty::Ty;

/// One coverage cell per scrutinee position: a variant ordinal, or `None`
/// for every variant.
pub type Cube = Vec<Option<usize>>;

/// The uncovered part of a domain: the first combinations in lexicographic
/// declaration order, plus the exact number of uncovered combinations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Missing {
    pub sample: Vec<Vec<usize>>,
    pub total: usize,
}

impl Missing {
    pub fn remaining(&self) -> usize {
        self.total - self.sample.len()
    }
}

/// A pattern reduced to what usefulness cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum Pat {
    /// A wildcard or a binding.
    Wild,
    Ctor {
        ordinal: usize,
        /// Variant count of the declaration.
        siblings: usize,
        /// One pattern per declared field.
        fields: Vec<Pat>,
    },
    Lit(Literal),
    Tuple(Vec<Pat>),
}

impl Pat {
    pub fn is_irrefutable(&self) -> bool {
        match self {
            Pat::Wild => true,
            Pat::Tuple(elems) => elems.iter().all(Pat::is_irrefutable),
            Pat::Ctor { .. } | Pat::Lit(_) => false,
        }
    }
}

/// The head constructor of a pattern column.
#[derive(Debug, Clone, PartialEq)]
enum Head {
    Variant { ordinal: usize, siblings: usize, arity: usize },
    Tuple(usize),
    Lit(Literal),
}

impl Head {
    fn of(pat: &Pat) -> Option<Head> {
        match pat {
            Pat::Wild => None,
            Pat::Ctor {
                ordinal,
                siblings,
                fields,
            } => Some(Head::Variant {
                ordinal: *ordinal,
                siblings: *siblings,
                arity: fields.len(),
            }),
            Pat::Tuple(elems) => Some(Head::Tuple(elems.len())),
            Pat::Lit(l) => Some(Head::Lit(l.clone())),
        }
    }

    fn arity(&self) -> usize {
        match self {
            Head::Variant { arity, .. } => *arity,
            Head::Tuple(n) => *n,
            Head::Lit(_) => 0,
        }
    }
}

/// Whether `heads` (distinct) name every constructor of their type.
fn is_complete(heads: &[Head]) -> bool {
    match heads.first() {
        None => false,
        Some(Head::Variant { siblings, .. }) => heads.len() == *siblings,
        Some(Head::Tuple(_)) => true,
        Some(Head::Lit(Literal::Bool(_))) => {
            [true, false]
                .iter()
                .all(|b| heads.contains(&Head::Lit(Literal::Bool(*b))))
        }
        Some(Head::Lit(_)) => false,
    }
}

/// `row` with its first column replaced by the sub-patterns under `head`,
/// or `None` if the first column cannot match `head`.
fn specialize(row: &[Pat], head: &Head) -> Option<Vec<Pat>> {
    let (first, rest) = row.split_first()?;
    let mut out: Vec<Pat> = match (first, head) {
        (Pat::Wild, _) => vec![Pat::Wild; head.arity()],
        (Pat::Ctor { ordinal, fields, .. }, Head::Variant { ordinal: want, .. })
            if ordinal == want =>
        {
            fields.clone()
        }
        (Pat::Tuple(elems), Head::Tuple(n)) if elems.len() == *n => elems.clone(),
        (Pat::Lit(l), Head::Lit(want)) if l == want => Vec::new(),
        _ => return None,
    };
    out.extend_from_slice(rest);
    Some(out)
}

/// Whether some value matched by `row` is matched by no row of `matrix`
/// (Maranget's algorithm U).
pub fn is_useful(matrix: &[Vec<Pat>], row: &[Pat]) -> bool {
    let Some((first, rest)) = row.split_first() else {
        return matrix.is_empty();
    };
    if let Some(head) = Head::of(first) {
        let sub: Vec<Vec<Pat>> = matrix.iter().filter_map(|r| specialize(r, &head)).collect();
        return specialize(row, &head).is_some_and(|q| is_useful(&sub, &q));
    }

    let mut heads: Vec<Head> = Vec::new();
    for h in matrix.iter().filter_map(|r| r.first().and_then(Head::of)) {
        if !heads.contains(&h) {
            heads.push(h);
        }
    }
    if is_complete(&heads) {
        return heads.iter().any(|head| {
            let sub: Vec<Vec<Pat>> = matrix.iter().filter_map(|r| specialize(r, head)).collect();
            specialize(row, head).is_some_and(|q| is_useful(&sub, &q))
        });
    }
    let default: Vec<Vec<Pat>> = matrix
        .iter()
        .filter(|r| matches!(r.first(), Some(Pat::Wild)))
        .map(|r| r[1..].to_vec())
        .collect();
    is_useful(&default, rest)
}

/// The set of variant combinations covered so far in one match.
#[derive(Debug, Clone)]
pub struct CoverageSet {
    domains: Vec<usize>,
    cubes: Vec<Cube>,
    /// Cubes of arms with refutable field sub-patterns, with the field
    /// patterns per position (`Pat::Tuple` of the fields, or `Wild`).
    partial: Vec<(Cube, Vec<Pat>)>,
}

fn contains(cube: &[Option<usize>], region: &[Option<usize>]) -> bool {
    cube.iter()
        .zip(region)
        .all(|(c, r)| c.is_none() || c == r)
}

fn intersects(cube: &[Option<usize>], region: &[Option<usize>]) -> bool {
    cube.iter()
        .zip(region)
        .all(|(c, r)| c.is_none() || r.is_none() || c == r)
}

impl CoverageSet {
    /// `domains[i]` is the variant count at scrutinee position `i`.
    pub fn new(domains: Vec<usize>) -> Self {
        CoverageSet {
            domains,
            cubes: Vec::new(),
            partial: Vec::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.domains.len()
    }

    pub fn insert(&mut self, cube: Cube) {
        debug_assert_eq!(cube.len(), self.domains.len());
        self.cubes.push(cube);
    }

    /// Record an arm that covers only part of `cube`, as `fields` says.
    pub fn insert_partial(&mut self, cube: Cube, fields: Vec<Pat>) {
        debug_assert_eq!(cube.len(), self.domains.len());
        self.partial.push((cube, fields));
    }

    pub fn mark_full(&mut self) {
        self.cubes.push(vec![None; self.domains.len()]);
    }

    pub fn is_full(&self) -> bool {
        self.covers(&vec![None; self.domains.len()])
    }

    /// Whether every combination in `cube` is already covered.
    pub fn covers(&self, cube: &[Option<usize>]) -> bool {
        self.covered(cube.to_vec())
    }

    /// Cubes, full or partial, that touch `region`.
    fn live(&self, region: &[Option<usize>]) -> Vec<&Cube> {
        self.cubes
            .iter()
            .chain(self.partial.iter().map(|(c, _)| c))
            .filter(|c| intersects(c, region))
            .collect()
    }

    fn contained(&self, region: &[Option<usize>]) -> bool {
        self.cubes.iter().any(|c| contains(c, region))
    }

    /// Whether the partial arms together cover `region`. Only asked once no
    /// live cube distinguishes the variants at `region`'s open positions.
    fn nested_covers(&self, region: &[Option<usize>]) -> bool {
        let matrix: Vec<Vec<Pat>> = self
            .partial
            .iter()
            .filter(|(c, _)| intersects(c, region))
            .map(|(_, fields)| fields.clone())
            .collect();
        !matrix.is_empty() && !is_useful(&matrix, &vec![Pat::Wild; region.len()])
    }

    /// Variants at `pos` that some live cube singles out, ascending.
    fn mentioned(live: &[&Cube], pos: usize) -> Vec<usize> {
        let mut vs: Vec<usize> = live.iter().filter_map(|c| c[pos]).collect();
        vs.sort_unstable();
        vs.dedup();
        vs
    }

    fn covered(&self, region: Cube) -> bool {
        if self.contained(&region) {
            return true;
        }
        let live = self.live(&region);
        let split = (0..region.len())
            .find(|&p| region[p].is_none() && live.iter().any(|c| c[p].is_some()));
        let Some(pos) = split else {
            // Only partial arms can cover the region now, unless it is empty.
            return region
                .iter()
                .enumerate()
                .any(|(p, r)| r.is_none() && self.domains[p] == 0)
                || self.nested_covers(&region);
        };
        let mentioned = Self::mentioned(&live, pos);
        let rest = (0..self.domains[pos]).find(|v| mentioned.binary_search(v).is_err());
        mentioned.into_iter().chain(rest).all(|v| {
            let mut child = region.clone();
            child[pos] = Some(v);
            self.covered(child)
        })
    }

    /// The uncovered combinations, sampled to `limit` entries.
    pub fn missing(&self, limit: usize) -> Missing {
        self.missing_in(vec![None; self.domains.len()], limit)
    }

    fn missing_in(&self, region: Cube, limit: usize) -> Missing {
        if self.contained(&region) {
            return Missing::default();
        }
        let live = self.live(&region);
        // Split on the lowest unconstrained position to keep the
        // enumeration in lexicographic order.
        let Some(pos) = region.iter().position(Option::is_none) else {
            if self.nested_covers(&region) {
                return Missing::default();
            }
            let point = region.iter().map(|c| c.unwrap_or(0)).collect();
            return Missing {
                sample: if limit > 0 { vec![point] } else { Vec::new() },
                total: 1,
            };
        };
        if live.is_empty() {
            return self.enumerate(&region, limit);
        }

        let mentioned = Self::mentioned(&live, pos);
        let mut rest: Option<(usize, Missing)> = None;
        let mut out = Missing::default();
        for v in 0..self.domains[pos] {
            let child = if mentioned.binary_search(&v).is_ok() {
                let mut sub = region.clone();
                sub[pos] = Some(v);
                self.missing_in(sub, limit)
            } else {
                // Unmentioned variants see the same cubes; solve once and relabel.
                let (rep, solved) = rest.get_or_insert_with(|| {
                    let mut sub = region.clone();
                    sub[pos] = Some(v);
                    (v, self.missing_in(sub, limit))
                });
                let rep = *rep;
                Missing {
                    sample: solved
                        .sample
                        .iter()
                        .map(|combo| {
                            let mut c = combo.clone();
                            if c[pos] == rep {
                                c[pos] = v;
                            }
                            c
                        })
                        .collect(),
                    total: solved.total,
                }
            };
            out.total = out.total.saturating_add(child.total);
            let room = limit.saturating_sub(out.sample.len());
            out.sample.extend(child.sample.into_iter().take(room));
        }
        out
    }

    /// Every combination in an uncovered region, lexicographically.
    fn enumerate(&self, region: &[Option<usize>], limit: usize) -> Missing {
        let free: Vec<usize> = (0..region.len()).filter(|&p| region[p].is_none()).collect();
        let total = free
            .iter()
            .fold(1usize, |acc, &p| acc.saturating_mul(self.domains[p]));
        let mut sample = Vec::new();
        if total == 0 || limit == 0 {
            return Missing { sample, total };
        }
        let mut cur: Vec<usize> = region.iter().map(|c| c.unwrap_or(0)).collect();
        loop {
            sample.push(cur.clone());
            if sample.len() >= limit {
                break;
            }
            let mut advanced = false;
            for &p in free.iter().rev() {
                cur[p] += 1;
                if cur[p] < self.domains[p] {
                    advanced = true;
                    break;
                }
                cur[p] = 0;
            }
            if !advanced {
                break;
            }
        }
        Missing { sample, total }
    }
}

/// The outcome of checking one match.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub diagnostics: Vec<LowerError>,
}

impl CheckReport {
    /// No fatal diagnostic: the match may be compiled.
    pub fn passed(&self) -> bool {
        !self.diagnostics.iter().any(LowerError::is_fatal)
    }

    pub fn errors(&self) -> impl Iterator<Item = &LowerError> {
        self.diagnostics.iter().filter(|d| d.is_fatal())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LowerError> {
        self.diagnostics.iter().filter(|d| !d.is_fatal())
    }
}

/// An arm reduced to what coverage cares about: one pattern per
/// scrutinee position, each `Wild` or a `Ctor`.
struct ArmRow {
    pats: Vec<Pat>,
}

impl ArmRow {
    fn cells(&self) -> Cube {
        self.pats
            .iter()
            .map(|p| match p {
                Pat::Ctor { ordinal, .. } => Some(*ordinal),
                _ => None,
            })
            .collect()
    }

    /// The field patterns under each position's variant.
    fn fields(&self) -> Vec<Pat> {
        self.pats
            .iter()
            .map(|p| match p {
                Pat::Ctor { fields, .. } => Pat::Tuple(fields.clone()),
                other => other.clone(),
            })
            .collect()
    }

    /// Some field sub-pattern can fail, so the arm may not match every
    /// value its cells denote.
    fn refutable(&self) -> bool {
        self.pats.iter().any(|p| match p {
            Pat::Ctor { fields, .. } => !fields.iter().all(Pat::is_irrefutable),
            other => !other.is_irrefutable(),
        })
    }
}

struct Checker<'a> {
    service: &'a dyn TypeService,
    errors: Vec<LowerError>,
}

fn literal_fits(lit: &Literal, ty: &Ty) -> bool {
    match ty {
        Ty::Param(_) | Ty::Never => true,
        _ => match lit {
            Literal::Int(_) => ty.is_numeric(),
            Literal::Float(_) => *ty == Ty::float(),
            Literal::Bool(_) => *ty == Ty::bool(),
            Literal::String(_) => *ty == Ty::string(),
        },
    }
}

impl Checker<'_> {
    fn invalid(&mut self, reason: String, span: Span) {
        self.errors.push(LowerError::InvalidPattern { reason, span });
    }

    /// Validate a variant pattern against `decl`.
    fn variant(&mut self, vp: &VariantPattern, decl: &SumTypeDecl, args: &[Ty]) -> Option<Pat> {
        if let Some(q) = &vp.type_name {
            if *q != decl.name {
                self.invalid(
                    format!(
                        "pattern `{}.{}` cannot match a value of type `{}`",
                        q, vp.variant, decl.name
                    ),
                    vp.span,
                );
                return None;
            }
        }
        let Some((ordinal, variant)) = decl.variant(&vp.variant) else {
            self.errors.push(LowerError::UnknownVariant {
                type_name: decl.name.clone(),
                variant: vp.variant.clone(),
                span: vp.span,
            });
            return None;
        };
        let aligned = match vp.align(variant) {
            Ok(aligned) => aligned,
            Err(FieldMismatch::Arity { expected, found }) => {
                self.errors.push(LowerError::Arity {
                    subject: format!("pattern `{}.{}`", decl.name, vp.variant),
                    expected,
                    found,
                    span: vp.span,
                });
                return None;
            }
            Err(FieldMismatch::UnknownField { field, span }) => {
                self.errors.push(LowerError::UnknownField {
                    type_name: decl.name.clone(),
                    variant: vp.variant.clone(),
                    field,
                    span,
                });
                return None;
            }
        };

        let before = self.errors.len();
        let ftys = field_types(decl, variant, args);
        let fields = aligned
            .iter()
            .zip(&ftys)
            .map(|(p, fty)| match p {
                Some(p) => self.nested(p, fty),
                None => Pat::Wild,
            })
            .collect();
        (self.errors.len() == before).then_some(Pat::Ctor {
            ordinal,
            siblings: decl.variants.len(),
            fields,
        })
    }

    /// A field sub-pattern. Invalid ones are reported and stand in as `Wild`.
    fn nested(&mut self, pattern: &Pattern, ty: &Ty) -> Pat {
        match pattern {
            Pattern::Wildcard(_) | Pattern::Binding(_) => Pat::Wild,
            Pattern::Literal(l) => {
                if !literal_fits(&l.value, ty) {
                    self.invalid(
                        format!("literal `{}` cannot match a value of type `{}`", l.value, ty),
                        l.span,
                    );
                }
                Pat::Lit(l.value.clone())
            }
            Pattern::Tuple(t) => match ty {
                Ty::Tuple(elems) if elems.len() == t.elements.len() => Pat::Tuple(
                    t.elements
                        .iter()
                        .zip(elems)
                        .map(|(p, ety)| self.nested(p, ety))
                        .collect(),
                ),
                Ty::Tuple(elems) => {
                    self.errors.push(LowerError::Arity {
                        subject: format!("tuple pattern for `{}`", ty),
                        expected: elems.len(),
                        found: t.elements.len(),
                        span: t.span,
                    });
                    Pat::Wild
                }
                _ => {
                    self.invalid(
                        format!("a tuple pattern cannot match a value of type `{}`", ty),
                        t.span,
                    );
                    Pat::Wild
                }
            },
            Pattern::Variant(vp) => {
                let service = self.service;
                match ty.head_name().and_then(|n| service.sum_decl(n)) {
                    Some(decl) => self.variant(vp, decl, ty.args()).unwrap_or(Pat::Wild),
                    None => {
                        self.invalid(
                            format!(
                                "variant pattern `{}` cannot match a value of type `{}`",
                                vp.variant, ty
                            ),
                            vp.span,
                        );
                        Pat::Wild
                    }
                }
            }
        }
    }

    /// A pattern in scrutinee position `sref`: `Wild` or a `Ctor`.
    fn position(&mut self, pattern: &Pattern, sref: &SumTypeRef<'_>) -> Option<Pat> {
        match pattern {
            Pattern::Wildcard(_) | Pattern::Binding(_) => Some(Pat::Wild),
            Pattern::Variant(vp) => self.variant(vp, sref.decl, &sref.args),
            Pattern::Literal(l) => {
                self.invalid(
                    format!("literal `{}` cannot match a value of sum type `{}`", l.value, sref),
                    l.span,
                );
                None
            }
            Pattern::Tuple(t) => {
                self.invalid(
                    format!("a tuple pattern cannot match a value of sum type `{}`", sref),
                    t.span,
                );
                None
            }
        }
    }

    fn arm(&mut self, arm: &MatchArm, scrutinee: &Scrutinee, srefs: &[SumTypeRef<'_>]) -> Option<ArmRow> {
        if !scrutinee.is_tuple() {
            let pat = self.position(&arm.pattern, &srefs[0])?;
            return Some(ArmRow { pats: vec![pat] });
        }
        match &arm.pattern {
            Pattern::Wildcard(_) | Pattern::Binding(_) => Some(ArmRow {
                pats: vec![Pat::Wild; srefs.len()],
            }),
            Pattern::Tuple(t) if t.elements.len() == srefs.len() => {
                let pats: Vec<Option<Pat>> = t
                    .elements
                    .iter()
                    .zip(srefs)
                    .map(|(p, sref)| self.position(p, sref))
                    .collect();
                pats.into_iter()
                    .collect::<Option<Vec<_>>>()
                    .map(|pats| ArmRow { pats })
            }
            Pattern::Tuple(t) => {
                self.errors.push(LowerError::Arity {
                    subject: format!("the tuple pattern of a match on {}", describe(srefs)),
                    expected: srefs.len(),
                    found: t.elements.len(),
                    span: t.span,
                });
                None
            }
            other => {
                self.invalid(
                    format!(
                        "a match on {} needs a tuple pattern with {} elements",
                        describe(srefs),
                        srefs.len()
                    ),
                    other.span(),
                );
                None
            }
        }
    }
}

fn describe(srefs: &[SumTypeRef<'_>]) -> String {
    let names: Vec<String> = srefs.iter().map(|s| s.to_string()).collect();
    format!("({})", names.join(", "))
}

fn scrutinee_name(scrutinee: &Scrutinee, srefs: &[SumTypeRef<'_>]) -> String {
    if scrutinee.is_tuple() {
        describe(srefs)
    } else {
        srefs[0].to_string()
    }
}

fn combo_name(combo: &[usize], scrutinee: &Scrutinee, srefs: &[SumTypeRef<'_>]) -> String {
    let names: Vec<&str> = combo
        .iter()
        .zip(srefs)
        .map(|(&v, s)| s.decl.variants[v].name.as_str())
        .collect();
    if scrutinee.is_tuple() {
        format!("({})", names.join(", "))
    } else {
        names.concat()
    }
}

/// Check one match: scrutinee resolution, the tuple arity cap, pattern
/// validation, then coverage.
///
/// Validation failures are fatal and skip the coverage scan. Coverage
/// failures produce one `Exhaustiveness` diagnostic naming what is missing.
/// Redundant arms produce warnings only.
#[tracing::instrument(level = "debug", skip_all, fields(arms = m.arms.len(), scrutinees = m.scrutinee.arity()))]
pub fn check_match(m: &MatchExpression, service: &dyn TypeService, config: &LowerConfig) -> CheckReport {
    let mut report = CheckReport::default();

    let mut srefs = Vec::with_capacity(m.scrutinee.arity());
    for e in m.scrutinee.exprs() {
        match service.resolve_scrutinee_type(e) {
            Ok(sref) => srefs.push(sref),
            Err(err) => report.diagnostics.push(err.into()),
        }
    }
    if !report.diagnostics.is_empty() {
        return report;
    }

    if m.scrutinee.is_tuple() && srefs.len() > config.max_tuple_arity {
        report.diagnostics.push(LowerError::TupleArityExceeded {
            found: srefs.len(),
            max: config.max_tuple_arity,
            span: m.span,
        });
        return report;
    }

    let mut checker = Checker {
        service,
        errors: Vec::new(),
    };
    let rows: Vec<Option<ArmRow>> = m
        .arms
        .iter()
        .map(|arm| checker.arm(arm, &m.scrutinee, &srefs))
        .collect();
    if !checker.errors.is_empty() {
        report.diagnostics.extend(checker.errors);
        return report;
    }
    let Some(rows) = rows.into_iter().collect::<Option<Vec<_>>>() else {
        return report;
    };

    let mut coverage = CoverageSet::new(srefs.iter().map(|s| s.decl.variants.len()).collect());
    // Every counted arm so far, for the nested redundancy question.
    let mut counted: Vec<Vec<Pat>> = Vec::new();
    for (index, (arm, row)) in m.arms.iter().zip(&rows).enumerate() {
        if arm.has_nontrivial_guard() {
            continue;
        }
        let cells = row.cells();
        let refutable = row.refutable();
        let catch_all = !refutable && cells.iter().all(Option::is_none);
        if catch_all {
            if coverage.is_full() {
                report.diagnostics.push(LowerError::RedundantWildcard {
                    arm_index: index,
                    span: arm.pattern.span(),
                });
            }
            coverage.mark_full();
            break;
        }
        let redundant =
            coverage.covers(&cells) || (refutable && !is_useful(&counted, &row.pats));
        if redundant {
            report.diagnostics.push(LowerError::RedundantArm {
                arm_index: index,
                span: arm.pattern.span(),
            });
        } else if refutable {
            coverage.insert_partial(cells, row.fields());
        } else {
            coverage.insert(cells);
        }
        counted.push(row.pats.clone());
    }

    if !coverage.is_full() {
        let missing = coverage.missing(config.missing_sample_limit);
        report.diagnostics.push(LowerError::Exhaustiveness {
            scrutinee: scrutinee_name(&m.scrutinee, &srefs),
            missing: missing
                .sample
                .iter()
                .map(|combo| combo_name(combo, &m.scrutinee, &srefs))
                .collect(),
            remaining: missing.remaining(),
            span: m.span,
        });
    }

    tracing::debug!(
        passed = report.passed(),
        diagnostics = report.diagnostics.len(),
        "checked match"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_position_missing_in_declaration_order() {
        let mut cov = CoverageSet::new(vec![4]);
        cov.insert(vec![Some(1)]);
        cov.insert(vec![Some(3)]);
        assert!(!cov.is_full());
        let missing = cov.missing(10);
        assert_eq!(missing.sample, vec![vec![0], vec![2]]);
        assert_eq!(missing.total, 2);
        cov.insert(vec![Some(0)]);
        cov.insert(vec![Some(2)]);
        assert!(cov.is_full());
    }

    #[test]
    fn wildcard_cells_cover_whole_rows() {
        // (A, _), (_, X) over 2 x 2 leaves only (B, Y).
        let mut cov = CoverageSet::new(vec![2, 2]);
        cov.insert(vec![Some(0), None]);
        cov.insert(vec![None, Some(0)]);
        let missing = cov.missing(10);
        assert_eq!(missing.sample, vec![vec![1, 1]]);
        assert_eq!(missing.total, 1);
        assert!(cov.covers(&[Some(0), Some(1)]));
        assert!(!cov.covers(&[Some(1), None]));
    }

    #[test]
    fn large_domains_are_sampled_without_enumeration() {
        // Six positions of 10 variants: a million combinations, one covered.
        let mut cov = CoverageSet::new(vec![10; 6]);
        cov.insert(vec![Some(0); 6]);
        let missing = cov.missing(10);
        assert_eq!(missing.total, 999_999);
        assert_eq!(missing.sample.len(), 10);
        assert_eq!(missing.sample[0], vec![0, 0, 0, 0, 0, 1]);
        assert_eq!(missing.sample[9], vec![0, 0, 0, 0, 1, 0]);
        assert_eq!(missing.remaining(), 999_989);
    }

    #[test]
    fn unmentioned_variants_are_relabelled_in_order() {
        let mut cov = CoverageSet::new(vec![3, 2]);
        cov.insert(vec![Some(1), Some(0)]);
        let missing = cov.missing(10);
        assert_eq!(
            missing.sample,
            vec![vec![0, 0], vec![0, 1], vec![1, 1], vec![2, 0], vec![2, 1]]
        );
        assert_eq!(missing.total, 5);
    }

    #[test]
    fn empty_domain_is_trivially_full() {
        let cov = CoverageSet::new(vec![0]);
        assert!(cov.is_full());
        assert_eq!(cov.missing(10).total, 0);
    }

    fn ctor(ordinal: usize, siblings: usize, fields: Vec<Pat>) -> Pat {
        Pat::Ctor {
            ordinal,
            siblings,
            fields,
        }
    }

    #[test]
    fn nested_constructors_complete_a_variant() {
        // Some(A), Some(B), None over Option<{A, B}>.
        let rows = vec![
            vec![ctor(0, 2, vec![ctor(0, 2, vec![])])],
            vec![ctor(0, 2, vec![ctor(1, 2, vec![])])],
            vec![ctor(1, 2, vec![])],
        ];
        assert!(!is_useful(&rows, &[Pat::Wild]));
        assert!(is_useful(&rows[..2], &[Pat::Wild]));
        assert!(!is_useful(&rows, &[ctor(0, 2, vec![Pat::Wild])]));
    }

    #[test]
    fn literals_need_a_default_unless_boolean() {
        let ints = vec![vec![Pat::Lit(Literal::Int(1))], vec![Pat::Lit(Literal::Int(2))]];
        assert!(is_useful(&ints, &[Pat::Wild]));
        let bools = vec![
            vec![Pat::Lit(Literal::Bool(true))],
            vec![Pat::Lit(Literal::Bool(false))],
        ];
        assert!(!is_useful(&bools, &[Pat::Wild]));
    }

    #[test]
    fn partial_arms_together_fill_a_region() {
        // Wrap(P), Wrap(A), Wrap(R) over Boxed = {Wrap(Status), Empty}.
        let mut cov = CoverageSet::new(vec![2]);
        for inner in 0..3 {
            assert!(!cov.covers(&[Some(0)]));
            cov.insert_partial(vec![Some(0)], vec![Pat::Tuple(vec![ctor(inner, 3, vec![])])]);
        }
        assert!(cov.covers(&[Some(0)]));
        let missing = cov.missing(10);
        assert_eq!(missing.sample, vec![vec![1]]);
        cov.insert(vec![Some(1)]);
        assert!(cov.is_full());
    }

    #[test]
    fn partial_arms_across_positions() {
        // (Wrap(P), A), (Wrap(Q), A), (_, B): only (Empty, A) is open.
        let mut cov = CoverageSet::new(vec![2, 2]);
        cov.insert_partial(
            vec![Some(0), Some(0)],
            vec![Pat::Tuple(vec![ctor(0, 2, vec![])]), Pat::Tuple(vec![])],
        );
        cov.insert_partial(
            vec![Some(0), Some(0)],
            vec![Pat::Tuple(vec![ctor(1, 2, vec![])]), Pat::Tuple(vec![])],
        );
        cov.insert(vec![None, Some(1)]);
        let missing = cov.missing(10);
        assert_eq!(missing.sample, vec![vec![1, 0]]);
        assert_eq!(missing.total, 1);
    }

    #[test]
    fn zero_sample_limit_still_counts() {
        let cov = CoverageSet::new(vec![3]);
        let missing = cov.missing(0);
        assert!(missing.sample.is_empty());
        assert_eq!(missing.total, 3);
    }
}
