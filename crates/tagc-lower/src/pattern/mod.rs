//! Pattern match compilation to decision trees.
//!
//! Single-scrutinee matches use Maranget-style compilation over a pattern
//! matrix. Multi-scrutinee matches are composed right to left from one
//! narrowing switch per position and a final ordered selection, which
//! keeps the branch count at the sum of the per-position variant counts.
//!
//! ## Decision Tree Nodes
//!
//! - `Leaf` -- execute an arm body with variable bindings
//! - `Switch` -- switch on a sum type constructor tag
//! - `Test` -- test literal equality
//! - `Guard` -- evaluate an arm's guard, falling through on false
//! - `Fail` -- no arm applies (only reachable through guards)
//! - `Narrow` -- switch once on one scrutinee position's tag and record
//!   which arms remain candidates
//! - `Select` -- try the candidate arms in order

pub mod compile;
pub mod dispatch;

use std::fmt;

use tagc_ast::Literal;
use tagc_typeck::Ty;

// ── AccessPath ──────────────────────────────────────────────────────

/// Describes how to reach a sub-value of the scrutinee(s).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AccessPath {
    /// Scrutinee position N (0 for a single-scrutinee match).
    Scrutinee(usize),
    /// All scrutinees of a multi-scrutinee match, as one tuple.
    ScrutineeTuple,
    /// Field N of a tuple.
    TupleField(Box<AccessPath>, usize),
    /// Field N of a variant's payload.
    VariantField {
        base: Box<AccessPath>,
        type_name: String,
        variant: String,
        index: usize,
    },
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPath::Scrutinee(i) => write!(f, "s{}", i),
            AccessPath::ScrutineeTuple => write!(f, "s*"),
            AccessPath::TupleField(base, i) => write!(f, "{}.{}", base, i),
            AccessPath::VariantField {
                base,
                variant,
                index,
                ..
            } => write!(f, "{}.{}.{}", base, variant, index),
        }
    }
}

// ── ConstructorTag ──────────────────────────────────────────────────

/// A tag identifying a sum type constructor variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstructorTag {
    /// The sum type name (e.g., "Shape").
    pub type_name: String,
    /// The variant name (e.g., "Circle").
    pub variant_name: String,
    /// Declaration ordinal of the variant.
    pub tag: usize,
    /// Number of fields this constructor carries.
    pub arity: usize,
}

impl fmt::Display for ConstructorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.type_name, self.variant_name)
    }
}

/// A pattern variable and where its value lives.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub name: String,
    pub ty: Ty,
    pub path: AccessPath,
}

// ── DecisionTree ────────────────────────────────────────────────────

/// A compiled decision tree for pattern matching.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionTree {
    /// Execute the arm body at `arm_index` with the given variable bindings.
    Leaf {
        arm_index: usize,
        bindings: Vec<Binding>,
    },
    /// Switch on a sum type constructor tag. `default` is present only when
    /// the cases do not cover every declared variant.
    Switch {
        path: AccessPath,
        cases: Vec<(ConstructorTag, DecisionTree)>,
        default: Option<Box<DecisionTree>>,
    },
    /// Test a literal value for equality.
    Test {
        path: AccessPath,
        value: Literal,
        success: Box<DecisionTree>,
        failure: Box<DecisionTree>,
    },
    /// Evaluate the guard of `arm_index` with its bindings in scope.
    Guard {
        arm_index: usize,
        bindings: Vec<Binding>,
        success: Box<DecisionTree>,
        failure: Box<DecisionTree>,
    },
    /// No arm applies.
    Fail,
    /// Switch on the tag of scrutinee `position`, recording for each
    /// variant the arms whose pattern at that position names it.
    Narrow {
        position: usize,
        cases: Vec<(ConstructorTag, Vec<usize>)>,
        next: Box<DecisionTree>,
    },
    /// Try each row in order; the first whose narrowed positions all list
    /// its arm and whose residual tree reaches a leaf wins.
    Select { rows: Vec<SelectRow> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectRow {
    pub arm_index: usize,
    /// Positions whose candidate set must contain `arm_index`.
    pub narrowed: Vec<usize>,
    /// Nested tests, the guard and the leaf. `Fail` falls through to the
    /// next row.
    pub residual: DecisionTree,
}

impl DecisionTree {
    /// Whether a `Fail` node is reachable.
    pub fn can_fail(&self) -> bool {
        match self {
            DecisionTree::Leaf { .. } => false,
            DecisionTree::Fail => true,
            DecisionTree::Switch { cases, default, .. } => {
                cases.iter().any(|(_, t)| t.can_fail()) || default.as_deref().is_some_and(Self::can_fail)
            }
            DecisionTree::Test {
                success, failure, ..
            }
            | DecisionTree::Guard {
                success, failure, ..
            } => success.can_fail() || failure.can_fail(),
            DecisionTree::Narrow { next, .. } => next.can_fail(),
            DecisionTree::Select { rows } => rows
                .last()
                .map_or(true, |r| !r.narrowed.is_empty() || r.residual.can_fail()),
        }
    }

    fn write_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self {
            DecisionTree::Leaf {
                arm_index,
                bindings,
            } => writeln!(f, "{}arm {}{}", pad, arm_index, BindingList(bindings)),
            DecisionTree::Switch {
                path,
                cases,
                default,
            } => {
                writeln!(f, "{}switch {}", pad, path)?;
                for (tag, tree) in cases {
                    writeln!(f, "{}  case {}", pad, tag)?;
                    tree.write_indented(f, depth + 2)?;
                }
                if let Some(default) = default {
                    writeln!(f, "{}  default", pad)?;
                    default.write_indented(f, depth + 2)?;
                }
                Ok(())
            }
            DecisionTree::Test {
                path,
                value,
                success,
                failure,
            } => {
                writeln!(f, "{}test {} == {}", pad, path, value)?;
                writeln!(f, "{}  then", pad)?;
                success.write_indented(f, depth + 2)?;
                writeln!(f, "{}  else", pad)?;
                failure.write_indented(f, depth + 2)
            }
            DecisionTree::Guard {
                arm_index,
                bindings,
                success,
                failure,
            } => {
                writeln!(f, "{}guard arm {}{}", pad, arm_index, BindingList(bindings))?;
                writeln!(f, "{}  then", pad)?;
                success.write_indented(f, depth + 2)?;
                writeln!(f, "{}  else", pad)?;
                failure.write_indented(f, depth + 2)
            }
            DecisionTree::Fail => writeln!(f, "{}fail", pad),
            DecisionTree::Narrow {
                position,
                cases,
                next,
            } => {
                write!(f, "{}narrow s{}:", pad, position)?;
                for (i, (tag, arms)) in cases.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{}{} -> {:?}", sep, tag, arms)?;
                }
                writeln!(f)?;
                next.write_indented(f, depth)
            }
            DecisionTree::Select { rows } => {
                writeln!(f, "{}select", pad)?;
                for row in rows {
                    write!(f, "{}  arm {}", pad, row.arm_index)?;
                    if !row.narrowed.is_empty() {
                        let positions: Vec<String> =
                            row.narrowed.iter().map(|p| format!("s{}", p)).collect();
                        write!(f, " if {}", positions.join(", "))?;
                    }
                    writeln!(f)?;
                    row.residual.write_indented(f, depth + 2)?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for DecisionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_indented(f, 0)
    }
}

struct BindingList<'a>(&'a [Binding]);

impl fmt::Display for BindingList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        write!(f, " [")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", b.name, b.path)?;
        }
        write!(f, "]")
    }
}
