//! Decision tree to LIR.
//!
//! Access paths become slot loads on the carrier. A slot load is only ever
//! emitted under a switch case (or narrowed condition) that established
//! the variant's tag, so unwrapping the optional slot is safe.
//!
//! An arm can be reached through several leaves of a tree. Its code is
//! emitted at each of them, and every copy after the first gets fresh
//! synthesized names.

use rustc_hash::FxHashSet;
use tagc_ast::BinOp;
use tagc_common::{LowerError, SourcePos, Span};

use crate::lift::ResultSink;
use crate::lir::{
    Fragment, LExpr, LExprKind, LStmt, LStmtKind, LType, LoweredSumType, TagRef,
};
use crate::naming::UnitCtx;
use crate::pattern::{AccessPath, Binding, ConstructorTag, DecisionTree};
use crate::sum_type::TAG_FIELD;

/// The lowered code of one arm.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmCode {
    /// Present only for guards that must be evaluated at runtime.
    pub guard: Option<Fragment>,
    pub body: Fragment,
}

/// Everything dispatch emission reads.
#[derive(Debug, Clone, Copy)]
pub struct DispatchInput<'a> {
    /// The local holding each scrutinee position.
    pub scrutinees: &'a [String],
    pub arms: &'a [ArmCode],
    pub sink: &'a ResultSink,
    pub layouts: &'a [LoweredSumType],
    pub span: Span,
}

/// Emit the statements implementing `tree`.
pub fn emit_dispatch(
    tree: &DecisionTree,
    input: &DispatchInput<'_>,
    ctx: &mut UnitCtx,
) -> Result<Vec<LStmt>, LowerError> {
    let mut emitter = Emitter {
        input,
        ctx,
        pos: SourcePos::At(input.span),
        candidates: vec![None; input.scrutinees.len()],
        done: None,
        emitted: FxHashSet::default(),
    };
    emitter.emit(tree)
}

struct Emitter<'a, 'c> {
    input: &'a DispatchInput<'a>,
    ctx: &'c mut UnitCtx,
    pos: SourcePos,
    /// Candidate-set local per narrowed position.
    candidates: Vec<Option<String>>,
    /// Inside a `Select`: the flag a leaf sets, and the reason `Fail` falls
    /// through instead of trapping.
    done: Option<String>,
    emitted: FxHashSet<(usize, ArmPart)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ArmPart {
    Guard,
    Body,
}

impl<'a> Emitter<'a, '_> {
    fn emit(&mut self, tree: &DecisionTree) -> Result<Vec<LStmt>, LowerError> {
        match tree {
            DecisionTree::Leaf {
                arm_index,
                bindings,
            } => Ok(vec![self.leaf(*arm_index, bindings)?]),

            DecisionTree::Switch {
                path,
                cases,
                default,
            } => {
                let subject = self.path_expr(path)?.field(TAG_FIELD);
                let mut lowered_cases = Vec::with_capacity(cases.len());
                for (ctor, subtree) in cases {
                    lowered_cases.push((self.tag_ref(ctor)?, self.emit(subtree)?));
                }
                let default = match default {
                    Some(d) => Some(self.emit(d)?),
                    None => None,
                };
                Ok(vec![self.stmt(LStmtKind::Switch {
                    subject,
                    cases: lowered_cases,
                    default,
                })])
            }

            DecisionTree::Test {
                path,
                value,
                success,
                failure,
            } => {
                let cond = LExpr::synth(LExprKind::Binary {
                    op: BinOp::Eq,
                    lhs: Box::new(self.path_expr(path)?),
                    rhs: Box::new(LExpr::synth(LExprKind::Lit(value.clone()))),
                });
                let then_body = self.emit(success)?;
                let else_body = self.emit(failure)?;
                Ok(vec![self.stmt(LStmtKind::If {
                    cond,
                    then_body,
                    else_body,
                })])
            }

            DecisionTree::Guard {
                arm_index,
                bindings,
                success,
                failure,
            } => {
                let Some(guard) = self.arm(*arm_index)?.guard.as_ref() else {
                    return self.emit(success);
                };
                let guard = self.copy_of(*arm_index, ArmPart::Guard, guard);
                let flag = self.ctx.fresh("guard");
                let mut scratch = self.binding_lets(bindings)?;
                scratch.extend(guard.stmts);
                scratch.push(LStmt::synth(LStmtKind::Assign {
                    name: flag.clone(),
                    value: guard.value,
                }));
                let then_body = self.emit(success)?;
                let else_body = self.emit(failure)?;
                Ok(vec![
                    LStmt::synth(LStmtKind::Declare {
                        name: flag.clone(),
                        ty: LType::Bool,
                        init: None,
                    }),
                    LStmt::synth(LStmtKind::Scope(scratch)),
                    self.stmt(LStmtKind::If {
                        cond: LExpr::var(flag),
                        then_body,
                        else_body,
                    }),
                ])
            }

            DecisionTree::Fail => Ok(match self.done {
                Some(_) => Vec::new(),
                None => vec![LStmt::synth(LStmtKind::Unreachable(
                    "no match arm applies".to_string(),
                ))],
            }),

            DecisionTree::Narrow {
                position,
                cases,
                next,
            } => {
                let subject = self.scrutinee(*position)?.field(TAG_FIELD);
                let declared = match cases.first() {
                    Some((ctor, _)) => self.layout(&ctor.type_name)?.variants.len(),
                    None => 0,
                };
                let set = self.ctx.fresh("cand");
                let mut lowered_cases = Vec::with_capacity(cases.len());
                for (ctor, arms) in cases {
                    lowered_cases.push((
                        self.tag_ref(ctor)?,
                        vec![LStmt::synth(LStmtKind::Assign {
                            name: set.clone(),
                            value: LExpr::synth(LExprKind::ArmSet(arms.clone())),
                        })],
                    ));
                }
                let mut out = vec![LStmt::synth(LStmtKind::Declare {
                    name: set.clone(),
                    ty: LType::ArmSet,
                    init: Some(LExpr::synth(LExprKind::ArmSet(Vec::new()))),
                })];
                // Variants no arm names here leave the candidate set empty.
                let default = (lowered_cases.len() < declared).then(Vec::new);
                out.push(self.stmt(LStmtKind::Switch {
                    subject,
                    cases: lowered_cases,
                    default,
                }));
                if let Some(slot) = self.candidates.get_mut(*position) {
                    *slot = Some(set);
                }
                out.extend(self.emit(next)?);
                Ok(out)
            }

            DecisionTree::Select { rows } => {
                let done = self.ctx.fresh("done");
                let outer = self.done.replace(done.clone());
                let mut out = vec![LStmt::synth(LStmtKind::Declare {
                    name: done.clone(),
                    ty: LType::Bool,
                    init: Some(LExpr::bool(false)),
                })];
                for row in rows {
                    let mut cond = LExpr::var(done.clone()).not();
                    for position in &row.narrowed {
                        let set = self
                            .candidates
                            .get(*position)
                            .cloned()
                            .flatten()
                            .ok_or_else(|| self.internal("a narrowed scrutinee position"))?;
                        cond = cond.and(LExpr::synth(LExprKind::ArmSetContains {
                            set: Box::new(LExpr::var(set)),
                            arm: row.arm_index,
                        }));
                    }
                    let body = self.emit(&row.residual)?;
                    out.push(self.stmt(LStmtKind::If {
                        cond,
                        then_body: body,
                        else_body: Vec::new(),
                    }));
                }
                if tree.can_fail() {
                    out.push(LStmt::synth(LStmtKind::If {
                        cond: LExpr::var(done).not(),
                        then_body: vec![LStmt::synth(LStmtKind::Unreachable(
                            "no match arm applies".to_string(),
                        ))],
                        else_body: Vec::new(),
                    }));
                }
                self.done = outer;
                Ok(out)
            }
        }
    }

    /// Bindings, body, and the hand-off of the arm's value, in one scope.
    fn leaf(&mut self, arm_index: usize, bindings: &[Binding]) -> Result<LStmt, LowerError> {
        let body = self.arm(arm_index)?;
        let body = self.copy_of(arm_index, ArmPart::Body, &body.body);
        let mut stmts = self.binding_lets(bindings)?;
        stmts.extend(body.stmts);
        match self.input.sink {
            ResultSink::Assign(name) => stmts.push(LStmt::synth(LStmtKind::Assign {
                name: name.clone(),
                value: body.value,
            })),
            ResultSink::Discard => {
                if !body.value.is_pure() {
                    let pos = body.value.pos;
                    stmts.push(LStmt::new(LStmtKind::Expr(body.value), pos));
                }
            }
        }
        if let Some(done) = &self.done {
            stmts.push(LStmt::synth(LStmtKind::Assign {
                name: done.clone(),
                value: LExpr::bool(true),
            }));
        }
        Ok(LStmt::synth(LStmtKind::Scope(stmts)))
    }

    fn copy_of(&mut self, arm_index: usize, part: ArmPart, fragment: &Fragment) -> Fragment {
        if self.emitted.insert((arm_index, part)) {
            fragment.clone()
        } else {
            self.ctx.refresh(fragment)
        }
    }

    fn binding_lets(&self, bindings: &[Binding]) -> Result<Vec<LStmt>, LowerError> {
        bindings
            .iter()
            .map(|b| {
                Ok(LStmt::synth(LStmtKind::Let {
                    name: b.name.clone(),
                    ty: LType::from_ty(&b.ty),
                    value: self.path_expr(&b.path)?,
                }))
            })
            .collect()
    }

    fn path_expr(&self, path: &AccessPath) -> Result<LExpr, LowerError> {
        match path {
            AccessPath::Scrutinee(i) => self.scrutinee(*i),
            AccessPath::ScrutineeTuple => Ok(LExpr::synth(LExprKind::Tuple(
                self.input
                    .scrutinees
                    .iter()
                    .map(|s| LExpr::var(s.clone()))
                    .collect(),
            ))),
            AccessPath::TupleField(base, index) => Ok(LExpr::synth(LExprKind::TupleField {
                base: Box::new(self.path_expr(base)?),
                index: *index,
            })),
            AccessPath::VariantField {
                base,
                type_name,
                variant,
                index,
            } => {
                let layout = self.layout(type_name)?;
                let slot = layout
                    .carrier
                    .slot(variant, *index)
                    .ok_or_else(|| self.internal(&format!("slot {} of `{}.{}`", index, type_name, variant)))?;
                let load = LExpr::synth(LExprKind::Unwrap(Box::new(
                    self.path_expr(base)?.field(slot.name.clone()),
                )));
                Ok(if slot.boxed {
                    LExpr::synth(LExprKind::Unbox(Box::new(load)))
                } else {
                    load
                })
            }
        }
    }

    fn scrutinee(&self, position: usize) -> Result<LExpr, LowerError> {
        self.input
            .scrutinees
            .get(position)
            .map(|name| LExpr::var(name.clone()))
            .ok_or_else(|| self.internal(&format!("scrutinee {}", position)))
    }

    fn tag_ref(&self, ctor: &ConstructorTag) -> Result<TagRef, LowerError> {
        self.layout(&ctor.type_name)?
            .variants
            .get(ctor.tag)
            .map(|v| v.tag.clone())
            .ok_or_else(|| self.internal(&format!("the tag of `{}`", ctor)))
    }

    fn layout(&self, type_name: &str) -> Result<&LoweredSumType, LowerError> {
        self.input
            .layouts
            .iter()
            .find(|l| l.decl_name == type_name)
            .ok_or_else(|| LowerError::UnresolvedType {
                what: format!("the lowered layout of `{}`", type_name),
                span: self.input.span,
            })
    }

    fn arm(&self, arm_index: usize) -> Result<&'a ArmCode, LowerError> {
        let arms: &'a [ArmCode] = self.input.arms;
        arms.get(arm_index)
            .ok_or_else(|| self.internal(&format!("arm {}", arm_index)))
    }

    fn internal(&self, what: &str) -> LowerError {
        LowerError::UnresolvedType {
            what: what.to_string(),
            span: self.input.span,
        }
    }

    fn stmt(&self, kind: LStmtKind) -> LStmt {
        LStmt::new(kind, self.pos)
    }
}
