//! Pattern matrix to decision tree compiler.
//!
//! Implements Maranget's algorithm for compiling pattern matrices into
//! decision trees. The algorithm works by:
//!
//! 1. Representing match arms as a pattern matrix (rows = arms, columns = positions)
//! 2. Selecting the column with the most constructor diversity
//! 3. Specializing the matrix for each constructor
//! 4. Recursing on specialized sub-matrices
//! 5. Producing Leaf nodes when all patterns are wildcards/variables
//!
//! Multi-scrutinee matches do not feed their positions into one matrix,
//! since nested switches over independent positions multiply. Each
//! position instead gets one `Narrow` switch. The `Narrow` nodes run one
//! after another, not nested inside each other's cases, and each records
//! the arms still possible for its position. A final `Select` then tries
//! the arms in order against those sets; only the per-arm residue (nested
//! fields, guard, bindings) goes through the matrix.

use tagc_ast::{FieldMismatch, Literal, MatchExpression, Pattern, VariantPattern};
use tagc_common::LowerError;
use tagc_typeck::{field_types, SumTypeRef, Ty, TypeService};

use crate::pattern::{AccessPath, Binding, ConstructorTag, DecisionTree, SelectRow};

// ── Patterns ────────────────────────────────────────────────────────

/// A pattern resolved against its column type: variant patterns carry
/// their declaration ordinal and a full, positional field list.
#[derive(Debug, Clone, PartialEq)]
enum Pat {
    Wild,
    Bind(String),
    Ctor { tag: ConstructorTag, fields: Vec<Pat> },
    Lit(Literal),
    Tuple(Vec<Pat>),
}

// ── Pattern Matrix ──────────────────────────────────────────────────

/// A row in the pattern matrix: one pattern per column, with metadata
/// from the original match arm.
#[derive(Debug, Clone)]
struct PatRow {
    patterns: Vec<Pat>,
    /// Original arm index (preserved through expansion).
    arm_index: usize,
    /// Whether the arm has a guard that must be evaluated at runtime.
    guarded: bool,
    /// Accumulated variable bindings collected so far.
    bindings: Vec<Binding>,
}

/// The pattern matrix: rows of patterns with access paths for each column.
#[derive(Debug, Clone)]
struct PatMatrix {
    rows: Vec<PatRow>,
    column_paths: Vec<AccessPath>,
    column_types: Vec<Ty>,
}

/// A "head constructor" found in a pattern column -- either a literal value
/// or a sum type constructor.
#[derive(Debug, Clone)]
enum HeadCtor {
    Literal(Literal),
    Constructor(ConstructorTag),
}

// ── Public API ──────────────────────────────────────────────────────

/// Compile a match against the resolved types of its scrutinee(s).
pub fn compile(
    m: &MatchExpression,
    scrutinees: &[SumTypeRef<'_>],
    service: &dyn TypeService,
) -> Result<DecisionTree, Vec<LowerError>> {
    match (m.scrutinee.is_tuple(), scrutinees) {
        (false, [single]) => compile_match(m, single, service),
        _ => compile_tuple_match(m, scrutinees, service),
    }
}

/// Compile a single-scrutinee match into a decision tree.
pub fn compile_match(
    m: &MatchExpression,
    scrutinee: &SumTypeRef<'_>,
    service: &dyn TypeService,
) -> Result<DecisionTree, Vec<LowerError>> {
    check_reachability(m)?;
    let compiler = Compiler { service };
    let ty = scrutinee.to_ty();

    let mut rows = Vec::with_capacity(m.arms.len());
    let mut errors = Vec::new();
    for (arm_index, arm) in m.arms.iter().enumerate() {
        match compiler.resolve(&arm.pattern, &ty) {
            Ok(pat) => rows.push(PatRow {
                patterns: vec![pat],
                arm_index,
                guarded: arm.has_nontrivial_guard(),
                bindings: Vec::new(),
            }),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let matrix = PatMatrix {
        rows,
        column_paths: vec![AccessPath::Scrutinee(0)],
        column_types: vec![ty],
    };
    Ok(compiler.compile_matrix(matrix))
}

/// Compile a multi-scrutinee match.
///
/// The tree is built right to left: the innermost node is the ordered
/// `Select` over all arms, and each position from last to first wraps it
/// in a `Narrow` that switches on that position's tag once.
pub fn compile_tuple_match(
    m: &MatchExpression,
    scrutinees: &[SumTypeRef<'_>],
    service: &dyn TypeService,
) -> Result<DecisionTree, Vec<LowerError>> {
    check_reachability(m)?;
    let compiler = Compiler { service };
    let width = scrutinees.len();
    let types: Vec<Ty> = scrutinees.iter().map(SumTypeRef::to_ty).collect();

    let mut rows: Vec<PatRow> = Vec::with_capacity(m.arms.len());
    let mut errors = Vec::new();
    for (arm_index, arm) in m.arms.iter().enumerate() {
        let mut bindings = Vec::new();
        let cells = match &arm.pattern {
            Pattern::Tuple(t) if t.elements.len() == width => t
                .elements
                .iter()
                .zip(&types)
                .map(|(p, ty)| compiler.resolve(p, ty))
                .collect::<Result<Vec<_>, _>>(),
            Pattern::Wildcard(_) => Ok(vec![Pat::Wild; width]),
            Pattern::Binding(b) => {
                bindings.push(Binding {
                    name: b.name.clone(),
                    ty: Ty::Tuple(types.clone()),
                    path: AccessPath::ScrutineeTuple,
                });
                Ok(vec![Pat::Wild; width])
            }
            other => Err(LowerError::InvalidPattern {
                reason: format!(
                    "a match on {} scrutinees needs a tuple pattern with {} elements",
                    width, width
                ),
                span: other.span(),
            }),
        };
        match cells {
            Ok(patterns) => rows.push(PatRow {
                patterns,
                arm_index,
                guarded: arm.has_nontrivial_guard(),
                bindings,
            }),
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let select_rows = rows
        .iter()
        .map(|row| compiler.select_row(row, &types))
        .collect();
    let mut tree = DecisionTree::Select { rows: select_rows };

    for position in (0..width).rev() {
        let mut cases: Vec<(ConstructorTag, Vec<usize>)> = Vec::new();
        for row in &rows {
            if let Pat::Ctor { tag, .. } = &row.patterns[position] {
                match cases.iter_mut().find(|(t, _)| t.tag == tag.tag) {
                    Some((_, arms)) => arms.push(row.arm_index),
                    None => cases.push((tag.clone(), vec![row.arm_index])),
                }
            }
        }
        if cases.is_empty() {
            continue;
        }
        cases.sort_by_key(|(t, _)| t.tag);
        tree = DecisionTree::Narrow {
            position,
            cases,
            next: Box::new(tree),
        };
    }

    Ok(tree)
}

/// Every arm after the first unguarded catch-all can never run.
fn check_reachability(m: &MatchExpression) -> Result<(), Vec<LowerError>> {
    let Some(catch_all) = m
        .arms
        .iter()
        .position(|a| !a.has_nontrivial_guard() && a.pattern.is_irrefutable())
    else {
        return Ok(());
    };
    let catch_all_span = m.arms[catch_all].pattern.span();
    let errors: Vec<LowerError> = m
        .arms
        .iter()
        .enumerate()
        .skip(catch_all + 1)
        .map(|(arm_index, arm)| LowerError::UnreachablePattern {
            arm_index,
            catch_all: catch_all_span,
            span: arm.pattern.span(),
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

// ── Core compilation ────────────────────────────────────────────────

struct Compiler<'a> {
    service: &'a dyn TypeService,
}

impl Compiler<'_> {
    /// Resolve a source pattern against the type of the value it matches.
    fn resolve(&self, pattern: &Pattern, ty: &Ty) -> Result<Pat, LowerError> {
        match pattern {
            Pattern::Wildcard(_) => Ok(Pat::Wild),
            Pattern::Binding(b) => Ok(Pat::Bind(b.name.clone())),
            Pattern::Literal(l) => Ok(Pat::Lit(l.value.clone())),
            Pattern::Tuple(t) => match ty {
                Ty::Tuple(elems) if elems.len() == t.elements.len() => t
                    .elements
                    .iter()
                    .zip(elems)
                    .map(|(p, ty)| self.resolve(p, ty))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Pat::Tuple),
                _ => Err(LowerError::InvalidPattern {
                    reason: format!(
                        "a tuple pattern with {} elements cannot match a value of type `{}`",
                        t.elements.len(),
                        ty
                    ),
                    span: t.span,
                }),
            },
            Pattern::Variant(vp) => self.resolve_variant(vp, ty),
        }
    }

    fn resolve_variant(&self, vp: &VariantPattern, ty: &Ty) -> Result<Pat, LowerError> {
        let decl = ty
            .head_name()
            .and_then(|name| self.service.sum_decl(name))
            .ok_or_else(|| LowerError::InvalidPattern {
                reason: format!(
                    "variant pattern `{}` cannot match a value of type `{}`",
                    vp.variant, ty
                ),
                span: vp.span,
            })?;
        let (ordinal, variant) =
            decl.variant(&vp.variant)
                .ok_or_else(|| LowerError::UnknownVariant {
                    type_name: decl.name.clone(),
                    variant: vp.variant.clone(),
                    span: vp.span,
                })?;
        let aligned = vp.align(variant).map_err(|mismatch| match mismatch {
            FieldMismatch::Arity { expected, found } => LowerError::Arity {
                subject: format!("pattern `{}.{}`", decl.name, variant.name),
                expected,
                found,
                span: vp.span,
            },
            FieldMismatch::UnknownField { field, span } => LowerError::UnknownField {
                type_name: decl.name.clone(),
                variant: variant.name.clone(),
                field,
                span,
            },
        })?;
        let tys = field_types(decl, variant, ty.args());
        let fields = aligned
            .iter()
            .zip(&tys)
            .map(|(p, fty)| match p {
                Some(p) => self.resolve(p, fty),
                None => Ok(Pat::Wild),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Pat::Ctor {
            tag: ConstructorTag {
                type_name: decl.name.clone(),
                variant_name: variant.name.clone(),
                tag: ordinal,
                arity: variant.arity(),
            },
            fields,
        })
    }

    /// Field types of `ctor` under the instantiation in `column_ty`.
    fn ctor_field_types(&self, column_ty: &Ty, ctor: &ConstructorTag) -> Vec<Ty> {
        self.service
            .sum_decl(&ctor.type_name)
            .and_then(|decl| decl.variants.get(ctor.tag).map(|v| (decl, v)))
            .map(|(decl, v)| field_types(decl, v, column_ty.args()))
            .unwrap_or_else(|| vec![Ty::Never; ctor.arity])
    }

    fn variant_count(&self, type_name: &str) -> Option<usize> {
        self.service.sum_decl(type_name).map(|d| d.variants.len())
    }

    /// Compile a pattern matrix into a decision tree (Maranget's algorithm).
    fn compile_matrix(&self, matrix: PatMatrix) -> DecisionTree {
        // No rows: match failure.
        if matrix.rows.is_empty() {
            return DecisionTree::Fail;
        }

        // First row is all wildcards/variables (or has no columns left): it matches.
        if row_is_all_wildcards(&matrix.rows[0]) {
            return self.leaf_or_guard(matrix);
        }

        let col = select_column(&matrix);

        // Tuples are structural: decompose instead of testing.
        if column_has_tuples(&matrix, col) {
            let expanded = expand_tuple_column(&matrix, col);
            return self.compile_matrix(expanded);
        }

        let head_ctors = collect_head_constructors(&matrix, col);
        if head_ctors.is_empty() {
            let reduced = remove_wildcard_column(&matrix, col);
            return self.compile_matrix(reduced);
        }

        let has_constructors = head_ctors
            .iter()
            .any(|c| matches!(c, HeadCtor::Constructor(_)));
        if has_constructors {
            self.compile_constructor_switch(&matrix, col, &head_ctors)
        } else {
            self.compile_literal_tests(&matrix, col, &head_ctors)
        }
    }

    /// The first row matches. Without a guard it is a leaf; with one, a
    /// false guard continues with the remaining rows against the same
    /// columns.
    fn leaf_or_guard(&self, mut matrix: PatMatrix) -> DecisionTree {
        let mut row = matrix.rows.remove(0);
        collect_bindings_from_row(&mut row, &matrix.column_paths, &matrix.column_types);
        let leaf = DecisionTree::Leaf {
            arm_index: row.arm_index,
            bindings: row.bindings.clone(),
        };
        if !row.guarded {
            return leaf;
        }
        let failure = self.compile_matrix(matrix);
        DecisionTree::Guard {
            arm_index: row.arm_index,
            bindings: row.bindings,
            success: Box::new(leaf),
            failure: Box::new(failure),
        }
    }

    fn compile_constructor_switch(
        &self,
        matrix: &PatMatrix,
        col: usize,
        head_ctors: &[HeadCtor],
    ) -> DecisionTree {
        let path = matrix.column_paths[col].clone();
        let mut ctors: Vec<&ConstructorTag> = head_ctors
            .iter()
            .filter_map(|hc| match hc {
                HeadCtor::Constructor(tag) => Some(tag),
                HeadCtor::Literal(_) => None,
            })
            .collect();
        ctors.sort_by_key(|t| t.tag);

        let cases: Vec<(ConstructorTag, DecisionTree)> = ctors
            .iter()
            .map(|tag| {
                let specialized = self.specialize_for_constructor(matrix, col, tag);
                (ConstructorTag::clone(tag), self.compile_matrix(specialized))
            })
            .collect();

        let complete = ctors
            .first()
            .and_then(|t| self.variant_count(&t.type_name))
            .is_some_and(|total| cases.len() >= total);
        let default = if complete {
            None
        } else {
            Some(Box::new(self.compile_matrix(default_matrix(matrix, col))))
        };

        DecisionTree::Switch {
            path,
            cases,
            default,
        }
    }

    /// Rows matching `target` have its fields expanded as new columns;
    /// wildcard rows are padded with wildcards.
    fn specialize_for_constructor(
        &self,
        matrix: &PatMatrix,
        col: usize,
        target: &ConstructorTag,
    ) -> PatMatrix {
        let parent_path = &matrix.column_paths[col];
        let mut new_rows = Vec::new();

        for row in &matrix.rows {
            let mut new_bindings = row.bindings.clone();
            let mut new_pats: Vec<Pat> = match &row.patterns[col] {
                Pat::Ctor { tag, fields } if tag.tag == target.tag => fields.clone(),
                Pat::Wild => vec![Pat::Wild; target.arity],
                Pat::Bind(name) => {
                    new_bindings.push(Binding {
                        name: name.clone(),
                        ty: matrix.column_types[col].clone(),
                        path: parent_path.clone(),
                    });
                    vec![Pat::Wild; target.arity]
                }
                // Different constructor.
                _ => continue,
            };
            new_pats.extend(without_column(&row.patterns, col));
            new_rows.push(PatRow {
                patterns: new_pats,
                arm_index: row.arm_index,
                guarded: row.guarded,
                bindings: new_bindings,
            });
        }

        let mut new_paths: Vec<AccessPath> = (0..target.arity)
            .map(|index| AccessPath::VariantField {
                base: Box::new(parent_path.clone()),
                type_name: target.type_name.clone(),
                variant: target.variant_name.clone(),
                index,
            })
            .collect();
        let mut new_types = self.ctor_field_types(&matrix.column_types[col], target);
        new_paths.extend(without_column(&matrix.column_paths, col));
        new_types.extend(without_column(&matrix.column_types, col));

        PatMatrix {
            rows: new_rows,
            column_paths: new_paths,
            column_types: new_types,
        }
    }

    /// A chain of `Test` nodes, built from the last literal to the first;
    /// the final failure is the default matrix.
    fn compile_literal_tests(
        &self,
        matrix: &PatMatrix,
        col: usize,
        head_ctors: &[HeadCtor],
    ) -> DecisionTree {
        let path = matrix.column_paths[col].clone();
        let literals: Vec<&Literal> = head_ctors
            .iter()
            .filter_map(|hc| match hc {
                HeadCtor::Literal(lit) => Some(lit),
                HeadCtor::Constructor(_) => None,
            })
            .collect();

        let mut failure_tree = self.compile_matrix(default_matrix(matrix, col));
        for lit in literals.iter().rev() {
            let specialized = specialize_for_literal(matrix, col, lit);
            let success_tree = self.compile_matrix(specialized);
            failure_tree = DecisionTree::Test {
                path: path.clone(),
                value: Literal::clone(lit),
                success: Box::new(success_tree),
                failure: Box::new(failure_tree),
            };
        }
        failure_tree
    }

    /// The `Select` row for one arm of a multi-scrutinee match: the
    /// positions it narrows on plus a residual tree over its variant
    /// fields, with the position-level bindings already attached.
    fn select_row(&self, row: &PatRow, types: &[Ty]) -> SelectRow {
        let mut narrowed = Vec::new();
        let mut patterns = Vec::new();
        let mut paths = Vec::new();
        let mut column_types = Vec::new();
        let mut bindings = row.bindings.clone();

        for (position, cell) in row.patterns.iter().enumerate() {
            let ty = &types[position];
            match cell {
                Pat::Wild => {}
                Pat::Bind(name) => bindings.push(Binding {
                    name: name.clone(),
                    ty: ty.clone(),
                    path: AccessPath::Scrutinee(position),
                }),
                Pat::Ctor { tag, fields } => {
                    narrowed.push(position);
                    patterns.extend(fields.iter().cloned());
                    paths.extend((0..tag.arity).map(|index| AccessPath::VariantField {
                        base: Box::new(AccessPath::Scrutinee(position)),
                        type_name: tag.type_name.clone(),
                        variant: tag.variant_name.clone(),
                        index,
                    }));
                    column_types.extend(self.ctor_field_types(ty, tag));
                }
                Pat::Lit(_) | Pat::Tuple(_) => {
                    patterns.push(cell.clone());
                    paths.push(AccessPath::Scrutinee(position));
                    column_types.push(ty.clone());
                }
            }
        }

        let residual = self.compile_matrix(PatMatrix {
            rows: vec![PatRow {
                patterns,
                arm_index: row.arm_index,
                guarded: row.guarded,
                bindings,
            }],
            column_paths: paths,
            column_types,
        });
        SelectRow {
            arm_index: row.arm_index,
            narrowed,
            residual,
        }
    }
}

// ── Row analysis ────────────────────────────────────────────────────

fn is_wildcard_like(p: &Pat) -> bool {
    matches!(p, Pat::Wild | Pat::Bind(_))
}

fn row_is_all_wildcards(row: &PatRow) -> bool {
    row.patterns.iter().all(is_wildcard_like)
}

fn collect_bindings_from_row(row: &mut PatRow, column_paths: &[AccessPath], column_types: &[Ty]) {
    for (i, pat) in row.patterns.iter().enumerate() {
        if let Pat::Bind(name) = pat {
            row.bindings.push(Binding {
                name: name.clone(),
                ty: column_types[i].clone(),
                path: column_paths[i].clone(),
            });
        }
    }
}

fn without_column<T: Clone>(items: &[T], col: usize) -> impl Iterator<Item = T> + '_ {
    items
        .iter()
        .enumerate()
        .filter(move |(i, _)| *i != col)
        .map(|(_, item)| item.clone())
}

// ── Column selection ────────────────────────────────────────────────

/// Select the column with the most constructor diversity.
fn select_column(matrix: &PatMatrix) -> usize {
    let mut best_col = 0;
    let mut best_score = 0usize;

    for col in 0..matrix.column_paths.len() {
        let mut seen: Vec<String> = Vec::new();
        for row in &matrix.rows {
            if let Some(key) = head_ctor_key(&row.patterns[col]) {
                if !seen.contains(&key) {
                    seen.push(key);
                }
            }
        }
        if seen.len() > best_score {
            best_score = seen.len();
            best_col = col;
        }
    }

    best_col
}

fn head_ctor_key(p: &Pat) -> Option<String> {
    match p {
        Pat::Lit(lit) => Some(format!("lit:{}", literal_key(lit))),
        Pat::Ctor { tag, .. } => Some(format!("ctor:{}", tag.tag)),
        Pat::Tuple(elems) => Some(format!("tuple:{}", elems.len())),
        Pat::Wild | Pat::Bind(_) => None,
    }
}

fn literal_key(lit: &Literal) -> String {
    match lit {
        Literal::Int(n) => format!("int:{}", n),
        Literal::Float(f) => format!("float:{}", f.to_bits()),
        Literal::Bool(b) => format!("bool:{}", b),
        Literal::String(s) => format!("str:{}", s),
    }
}

fn collect_head_constructors(matrix: &PatMatrix, col: usize) -> Vec<HeadCtor> {
    let mut result: Vec<HeadCtor> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    for row in &matrix.rows {
        let pat = &row.patterns[col];
        let Some(key) = head_ctor_key(pat) else {
            continue;
        };
        if seen.contains(&key) {
            continue;
        }
        match pat {
            Pat::Lit(lit) => result.push(HeadCtor::Literal(lit.clone())),
            Pat::Ctor { tag, .. } => result.push(HeadCtor::Constructor(tag.clone())),
            // Tuples are expanded rather than switched on.
            _ => continue,
        }
        seen.push(key);
    }

    result
}

// ── Literal specialization ──────────────────────────────────────────

fn specialize_for_literal(matrix: &PatMatrix, col: usize, target: &Literal) -> PatMatrix {
    let mut new_rows = Vec::new();

    for row in &matrix.rows {
        let mut new_bindings = row.bindings.clone();
        match &row.patterns[col] {
            Pat::Lit(lit) if literals_equal(lit, target) => {}
            Pat::Wild => {}
            Pat::Bind(name) => new_bindings.push(Binding {
                name: name.clone(),
                ty: matrix.column_types[col].clone(),
                path: matrix.column_paths[col].clone(),
            }),
            _ => continue,
        }
        new_rows.push(PatRow {
            patterns: without_column(&row.patterns, col).collect(),
            arm_index: row.arm_index,
            guarded: row.guarded,
            bindings: new_bindings,
        });
    }

    PatMatrix {
        rows: new_rows,
        column_paths: without_column(&matrix.column_paths, col).collect(),
        column_types: without_column(&matrix.column_types, col).collect(),
    }
}

/// Literal equality as the runtime test sees it; floats compare by bits.
fn literals_equal(a: &Literal, b: &Literal) -> bool {
    match (a, b) {
        (Literal::Int(x), Literal::Int(y)) => x == y,
        (Literal::Float(x), Literal::Float(y)) => x.to_bits() == y.to_bits(),
        (Literal::Bool(x), Literal::Bool(y)) => x == y,
        (Literal::String(x), Literal::String(y)) => x == y,
        _ => false,
    }
}

// ── Default matrix ──────────────────────────────────────────────────

/// Rows with a wildcard/variable in `col`, with that column removed.
fn default_matrix(matrix: &PatMatrix, col: usize) -> PatMatrix {
    let rows = matrix
        .rows
        .iter()
        .filter(|row| is_wildcard_like(&row.patterns[col]))
        .cloned()
        .collect();
    remove_wildcard_column(
        &PatMatrix {
            rows,
            column_paths: matrix.column_paths.clone(),
            column_types: matrix.column_types.clone(),
        },
        col,
    )
}

/// Remove a column whose patterns are all wildcards/variables, keeping
/// their bindings.
fn remove_wildcard_column(matrix: &PatMatrix, col: usize) -> PatMatrix {
    let rows = matrix
        .rows
        .iter()
        .map(|row| {
            let mut bindings = row.bindings.clone();
            if let Pat::Bind(name) = &row.patterns[col] {
                bindings.push(Binding {
                    name: name.clone(),
                    ty: matrix.column_types[col].clone(),
                    path: matrix.column_paths[col].clone(),
                });
            }
            PatRow {
                patterns: without_column(&row.patterns, col).collect(),
                arm_index: row.arm_index,
                guarded: row.guarded,
                bindings,
            }
        })
        .collect();

    PatMatrix {
        rows,
        column_paths: without_column(&matrix.column_paths, col).collect(),
        column_types: without_column(&matrix.column_types, col).collect(),
    }
}

// ── Tuple expansion ─────────────────────────────────────────────────

fn column_has_tuples(matrix: &PatMatrix, col: usize) -> bool {
    matrix
        .rows
        .iter()
        .any(|row| matches!(&row.patterns[col], Pat::Tuple(_)))
}

/// Expand a tuple column into its element columns. Wildcards and
/// variables become wildcard elements; a variable binds the whole tuple.
fn expand_tuple_column(matrix: &PatMatrix, col: usize) -> PatMatrix {
    let arity = matrix
        .rows
        .iter()
        .find_map(|row| match &row.patterns[col] {
            Pat::Tuple(elems) => Some(elems.len()),
            _ => None,
        })
        .unwrap_or(0);

    let parent_path = &matrix.column_paths[col];
    let parent_type = &matrix.column_types[col];
    let sub_types: Vec<Ty> = match parent_type {
        Ty::Tuple(elems) if elems.len() == arity => elems.clone(),
        _ => vec![Ty::Never; arity],
    };

    let rows = matrix
        .rows
        .iter()
        .map(|row| {
            let mut bindings = row.bindings.clone();
            let mut patterns = match &row.patterns[col] {
                Pat::Tuple(elems) => elems.clone(),
                Pat::Bind(name) => {
                    bindings.push(Binding {
                        name: name.clone(),
                        ty: parent_type.clone(),
                        path: parent_path.clone(),
                    });
                    vec![Pat::Wild; arity]
                }
                _ => vec![Pat::Wild; arity],
            };
            patterns.extend(without_column(&row.patterns, col));
            PatRow {
                patterns,
                arm_index: row.arm_index,
                guarded: row.guarded,
                bindings,
            }
        })
        .collect();

    let mut column_paths: Vec<AccessPath> = (0..arity)
        .map(|i| AccessPath::TupleField(Box::new(parent_path.clone()), i))
        .collect();
    let mut column_types = sub_types;
    column_paths.extend(without_column(&matrix.column_paths, col));
    column_types.extend(without_column(&matrix.column_types, col));

    PatMatrix {
        rows,
        column_paths,
        column_types,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagc_ast::{AstBuilder, Expr, ExprKind, MatchContext, SumTypeDecl, TypeRef};
    use tagc_typeck::TypeServiceError;

    struct Decls(Vec<SumTypeDecl>);

    impl TypeService for Decls {
        fn type_of(&self, expr: &Expr) -> Result<Ty, TypeServiceError> {
            Err(TypeServiceError::Unknown(expr.id))
        }

        fn sum_decl(&self, name: &str) -> Option<&SumTypeDecl> {
            self.0.iter().find(|d| d.name == name)
        }
    }

    fn fixture() -> (AstBuilder, Decls) {
        let mut b = AstBuilder::new();
        let v = vec![
            b.unit_variant("Pending"),
            b.unit_variant("Approved"),
            b.unit_variant("Rejected"),
        ];
        let status = b.sum_type("Status", &[], v);
        let v = vec![
            b.tuple_variant("Some", vec![TypeRef::named("T")]),
            b.unit_variant("None"),
        ];
        let option = b.sum_type("Option", &["T"], v);
        let v = vec![
            b.tuple_variant("Num", vec![TypeRef::named("Int")]),
            b.tuple_variant(
                "Pair",
                vec![TypeRef::Tuple(vec![TypeRef::named("Int"), TypeRef::named("Int")])],
            ),
        ];
        let value = b.sum_type("Value", &[], v);
        (b, Decls(vec![status, option, value]))
    }

    fn scrut<'a>(service: &'a Decls, name: &str, args: Vec<Ty>) -> SumTypeRef<'a> {
        SumTypeRef {
            decl: service.sum_decl(name).unwrap(),
            args,
        }
    }

    fn as_match(expr: Expr) -> MatchExpression {
        match expr.kind {
            ExprKind::Match(m) => *m,
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_constructor_switch_uses_declaration_ordinals() {
        let (mut b, service) = fixture();
        let s = b.var("s");
        let arms = vec![
            {
                let p = b.p_variant("Rejected", vec![]);
                let body = b.int(2);
                b.arm(p, None, body)
            },
            {
                let p = b.p_variant("Pending", vec![]);
                let body = b.int(0);
                b.arm(p, None, body)
            },
            {
                let p = b.p_variant("Approved", vec![]);
                let body = b.int(1);
                b.arm(p, None, body)
            },
        ];
        let m = as_match(b.match_expr(s, arms, MatchContext::Expression));
        let tree = compile_match(&m, &scrut(&service, "Status", vec![]), &service).unwrap();

        let DecisionTree::Switch { cases, default, .. } = &tree else {
            panic!("expected a switch, got {}", tree);
        };
        let tags: Vec<(usize, &str)> = cases
            .iter()
            .map(|(t, _)| (t.tag, t.variant_name.as_str()))
            .collect();
        assert_eq!(tags, [(0, "Pending"), (1, "Approved"), (2, "Rejected")]);
        assert!(default.is_none(), "all variants covered, no default expected");
        assert!(!tree.can_fail());
    }

    #[test]
    fn test_wildcard_becomes_default() {
        let (mut b, service) = fixture();
        let s = b.var("s");
        let arms = vec![
            {
                let p = b.p_variant("Pending", vec![]);
                let body = b.int(0);
                b.arm(p, None, body)
            },
            {
                let p = b.p_wild();
                let body = b.int(1);
                b.arm(p, None, body)
            },
        ];
        let m = as_match(b.match_expr(s, arms, MatchContext::Expression));
        let tree = compile_match(&m, &scrut(&service, "Status", vec![]), &service).unwrap();
        insta::assert_snapshot!(tree.to_string(), @r"
        switch s0
          case Status.Pending
            arm 0
          default
            arm 1
        ");
    }

    #[test]
    fn test_variable_binding_in_payload() {
        let (mut b, service) = fixture();
        let s = b.var("s");
        let arms = vec![
            {
                let x = b.p_bind("x");
                let p = b.p_variant("Some", vec![x]);
                let body = b.var("x");
                b.arm(p, None, body)
            },
            {
                let p = b.p_variant("None", vec![]);
                let body = b.int(0);
                b.arm(p, None, body)
            },
        ];
        let m = as_match(b.match_expr(s, arms, MatchContext::Expression));
        let tree = compile_match(&m, &scrut(&service, "Option", vec![Ty::int()]), &service).unwrap();
        insta::assert_snapshot!(tree.to_string(), @r"
        switch s0
          case Option.Some
            arm 0 [x = s0.Some.0]
          case Option.None
            arm 1
        ");

        let DecisionTree::Switch { cases, .. } = &tree else {
            panic!("expected a switch");
        };
        let DecisionTree::Leaf { bindings, .. } = &cases[0].1 else {
            panic!("expected a leaf");
        };
        assert_eq!(bindings[0].ty, Ty::int());
    }

    #[test]
    fn test_guard_falls_through_to_remaining_rows() {
        let (mut b, service) = fixture();
        let s = b.var("s");
        let arms = vec![
            {
                let p = b.p_variant("Approved", vec![]);
                let g = b.var("flag");
                let body = b.int(0);
                b.arm(p, Some(g), body)
            },
            {
                let p = b.p_variant("Approved", vec![]);
                let body = b.int(1);
                b.arm(p, None, body)
            },
            {
                let p = b.p_bind("other");
                let body = b.int(2);
                b.arm(p, None, body)
            },
        ];
        let m = as_match(b.match_expr(s, arms, MatchContext::Expression));
        let tree = compile_match(&m, &scrut(&service, "Status", vec![]), &service).unwrap();
        insta::assert_snapshot!(tree.to_string(), @r"
        switch s0
          case Status.Approved
            guard arm 0
              then
                arm 0
              else
                arm 1
          default
            arm 2 [other = s0]
        ");
    }

    #[test]
    fn test_literal_true_guard_is_not_emitted() {
        let (mut b, service) = fixture();
        let s = b.var("s");
        let p = b.p_wild();
        let g = b.bool(true);
        let body = b.int(0);
        let arms = vec![b.arm(p, Some(g), body)];
        let m = as_match(b.match_expr(s, arms, MatchContext::Expression));
        let tree = compile_match(&m, &scrut(&service, "Status", vec![]), &service).unwrap();
        assert_eq!(
            tree,
            DecisionTree::Leaf {
                arm_index: 0,
                bindings: vec![]
            }
        );
    }

    #[test]
    fn test_literals_and_tuple_payload() {
        let (mut b, service) = fixture();
        let s = b.var("s");
        let arms = vec![
            {
                let zero = b.p_lit(Literal::Int(0));
                let y = b.p_bind("y");
                let t = b.p_tuple(vec![zero, y]);
                let p = b.p_variant("Pair", vec![t]);
                let body = b.var("y");
                b.arm(p, None, body)
            },
            {
                let w = b.p_wild();
                let p = b.p_variant("Pair", vec![w]);
                let body = b.int(1);
                b.arm(p, None, body)
            },
            {
                let n = b.p_bind("n");
                let p = b.p_variant("Num", vec![n]);
                let body = b.var("n");
                b.arm(p, None, body)
            },
        ];
        let m = as_match(b.match_expr(s, arms, MatchContext::Expression));
        let tree = compile_match(&m, &scrut(&service, "Value", vec![]), &service).unwrap();
        insta::assert_snapshot!(tree.to_string(), @r"
        switch s0
          case Value.Num
            arm 2 [n = s0.Num.0]
          case Value.Pair
            test s0.Pair.0.0 == 0
              then
                arm 0 [y = s0.Pair.0.1]
              else
                arm 1
        ");
    }

    #[test]
    fn test_arm_after_catch_all_is_unreachable() {
        let (mut b, service) = fixture();
        let s = b.var("s");
        let arms = vec![
            {
                let p = b.p_wild();
                let body = b.int(0);
                b.arm(p, None, body)
            },
            {
                let p = b.p_variant("Pending", vec![]);
                let body = b.int(1);
                b.arm(p, None, body)
            },
        ];
        let m = as_match(b.match_expr(s, arms, MatchContext::Expression));
        let errs = compile_match(&m, &scrut(&service, "Status", vec![]), &service).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(matches!(
            errs[0],
            LowerError::UnreachablePattern { arm_index: 1, .. }
        ));
    }

    #[test]
    fn test_tuple_match_narrows_each_position_once() {
        let (mut b, service) = fixture();
        let x = b.var("x");
        let y = b.var("y");
        let arms = vec![
            {
                let p0 = b.p_variant("Pending", vec![]);
                let p1 = b.p_wild();
                let p = b.p_tuple(vec![p0, p1]);
                let body = b.int(0);
                b.arm(p, None, body)
            },
            {
                let p0 = b.p_wild();
                let p1 = b.p_variant("Rejected", vec![]);
                let p = b.p_tuple(vec![p0, p1]);
                let body = b.int(1);
                b.arm(p, None, body)
            },
            {
                let p = b.p_bind("both");
                let body = b.int(2);
                b.arm(p, None, body)
            },
        ];
        let m = as_match(b.match_tuple(vec![x, y], arms, MatchContext::Expression));
        let status = scrut(&service, "Status", vec![]);
        let tree = compile_tuple_match(&m, &[status.clone(), status], &service).unwrap();
        insta::assert_snapshot!(tree.to_string(), @r"
        narrow s0: Status.Pending -> [0]
        narrow s1: Status.Rejected -> [1]
        select
          arm 0 if s0
            arm 0
          arm 1 if s1
            arm 1
          arm 2
            arm 2 [both = s*]
        ");
        assert!(!tree.can_fail());
    }
}
