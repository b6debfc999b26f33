//! Function bodies to LIR.
//!
//! Expressions lower to a [`Fragment`]: the statements that must run first
//! and the value that replaces the expression. Matches are the main source
//! of hoisted statements, and they can appear anywhere an expression can.

use tagc_ast::{
    BinOp, Block, Expr, ExprKind, Function, MatchContext, MatchExpression, Stmt, UnaryOp,
};
use tagc_common::{SourcePos, Span};
use tagc_typeck::{check_match, Ty, TypeService};

use crate::lift::{lift, result_sink, unify_arm_types};
use crate::lir::{
    count_branches, Fragment, LExpr, LExprKind, LFunction, LParam, LStmt, LStmtKind, LType,
    LoweredSumType,
};
use crate::naming::UnitCtx;
use crate::pattern::compile::compile;
use crate::pattern::dispatch::{emit_dispatch, ArmCode, DispatchInput};
use crate::sum_type::check_constructor_call;

pub struct FnLowerer<'a> {
    ctx: &'a mut UnitCtx,
    service: &'a dyn TypeService,
    /// Every sum type of the unit that lowered successfully.
    layouts: &'a [LoweredSumType],
}

impl<'a> FnLowerer<'a> {
    pub fn new(
        ctx: &'a mut UnitCtx,
        service: &'a dyn TypeService,
        layouts: &'a [LoweredSumType],
    ) -> Self {
        FnLowerer {
            ctx,
            service,
            layouts,
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(function = %function.name))]
    pub fn lower_function(&mut self, function: &Function) -> LFunction {
        let params = function
            .params
            .iter()
            .map(|p| LParam {
                name: p.name.clone(),
                ty: LType::from_ty(&Ty::from_type_ref(&p.ty, &[])),
            })
            .collect();
        let ret = function
            .ret
            .as_ref()
            .map_or(LType::Unit, |r| LType::from_ty(&Ty::from_type_ref(r, &[])));

        let mut body = self.lower_stmts(&function.body.stmts);
        if let Some(tail) = &function.body.tail {
            let tail_frag = self.lower_expr(tail);
            body.extend(tail_frag.stmts);
            body.push(LStmt::new(
                LStmtKind::Return(Some(tail_frag.value)),
                SourcePos::At(tail.span),
            ));
        }

        LFunction {
            name: function.name.clone(),
            type_params: Vec::new(),
            receiver: None,
            params,
            ret,
            body,
            pos: SourcePos::At(function.span),
        }
    }

    fn lower_stmts(&mut self, stmts: &[Stmt]) -> Vec<LStmt> {
        let mut out = Vec::new();
        for stmt in stmts {
            match stmt {
                Stmt::Let {
                    name,
                    ty,
                    value,
                    span,
                } => {
                    let ty = match ty {
                        Some(t) => LType::from_ty(&Ty::from_type_ref(t, &[])),
                        None => self.ltype_of(value),
                    };
                    let frag = self.lower_expr(value);
                    out.extend(frag.stmts);
                    out.push(LStmt::new(
                        LStmtKind::Let {
                            name: name.clone(),
                            ty,
                            value: frag.value,
                        },
                        SourcePos::At(*span),
                    ));
                }
                Stmt::Expr(expr) => {
                    let frag = self.lower_expr(expr);
                    out.extend(frag.stmts);
                    if !frag.value.is_pure() {
                        let pos = frag.value.pos;
                        out.push(LStmt::new(LStmtKind::Expr(frag.value), pos));
                    }
                }
                Stmt::Return { value, span } => {
                    let value = value.as_ref().map(|v| {
                        let frag = self.lower_expr(v);
                        out.extend(frag.stmts);
                        frag.value
                    });
                    out.push(LStmt::new(LStmtKind::Return(value), SourcePos::At(*span)));
                }
            }
        }
        out
    }

    pub fn lower_expr(&mut self, expr: &Expr) -> Fragment {
        let pos = SourcePos::At(expr.span);
        match &expr.kind {
            ExprKind::Lit(lit) => Fragment::pure(LExpr::new(LExprKind::Lit(lit.clone()), pos)),
            ExprKind::Var(name) => Fragment::pure(LExpr::new(LExprKind::Var(name.clone()), pos)),
            ExprKind::Binary { op, lhs, rhs } if op.is_short_circuit() => {
                self.lower_short_circuit(*op, lhs, rhs, pos)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (stmts, mut values) = self.lower_sequence(&[&**lhs, &**rhs]);
                let rhs = values.pop();
                let lhs = values.pop();
                match (lhs, rhs) {
                    (Some(lhs), Some(rhs)) => Fragment {
                        stmts,
                        value: LExpr::new(
                            LExprKind::Binary {
                                op: *op,
                                lhs: Box::new(lhs),
                                rhs: Box::new(rhs),
                            },
                            pos,
                        ),
                    },
                    _ => Fragment {
                        stmts,
                        value: LExpr::unit(pos),
                    },
                }
            }
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand, pos),
            ExprKind::Call { callee, args } => {
                let (stmts, args) = self.lower_sequence(&args.iter().collect::<Vec<_>>());
                Fragment {
                    stmts,
                    value: LExpr::new(
                        LExprKind::Call {
                            callee: callee.clone(),
                            args,
                        },
                        pos,
                    ),
                }
            }
            ExprKind::Construct {
                type_name,
                variant,
                args,
            } => self.lower_construct(type_name, variant, args, expr.span),
            ExprKind::Tuple(elems) => {
                let (stmts, elems) = self.lower_sequence(&elems.iter().collect::<Vec<_>>());
                Fragment {
                    stmts,
                    value: LExpr::new(LExprKind::Tuple(elems), pos),
                }
            }
            ExprKind::Match(m) => self.lower_match(m),
            ExprKind::Block(block) => self.lower_block_expr(block, expr),
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr, pos: SourcePos) -> Fragment {
        let inner = self.lower_expr(operand);
        Fragment {
            stmts: inner.stmts,
            value: LExpr::new(
                LExprKind::Unary {
                    op,
                    operand: Box::new(inner.value),
                },
                pos,
            ),
        }
    }

    /// Lower operands that evaluate left to right.
    ///
    /// When an operand hoists statements, every impure operand before it is
    /// spilled into a temporary so it still runs first.
    fn lower_sequence(&mut self, exprs: &[&Expr]) -> (Vec<LStmt>, Vec<LExpr>) {
        let frags: Vec<Fragment> = exprs.iter().map(|e| self.lower_expr(e)).collect();
        let last_prelude = frags.iter().rposition(|f| !f.stmts.is_empty());

        let mut stmts = Vec::new();
        let mut values = Vec::with_capacity(frags.len());
        for (i, (frag, expr)) in frags.into_iter().zip(exprs).enumerate() {
            stmts.extend(frag.stmts);
            let spill = last_prelude.is_some_and(|last| i < last) && !frag.value.is_pure();
            if spill {
                let tmp = self.ctx.fresh("tmp");
                let pos = frag.value.pos;
                stmts.push(LStmt::new(
                    LStmtKind::Let {
                        name: tmp.clone(),
                        ty: self.ltype_of(expr),
                        value: frag.value,
                    },
                    pos,
                ));
                values.push(LExpr::new(LExprKind::Var(tmp), pos));
            } else {
                values.push(frag.value);
            }
        }
        (stmts, values)
    }

    /// `a && b` where `b` hoists statements: those statements may only run
    /// when `a` does not already decide the result.
    fn lower_short_circuit(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, pos: SourcePos) -> Fragment {
        let lhs = self.lower_expr(lhs);
        let rhs = self.lower_expr(rhs);
        if rhs.stmts.is_empty() {
            return Fragment {
                stmts: lhs.stmts,
                value: LExpr::new(
                    LExprKind::Binary {
                        op,
                        lhs: Box::new(lhs.value),
                        rhs: Box::new(rhs.value),
                    },
                    pos,
                ),
            };
        }

        let flag = self.ctx.fresh("cond");
        let mut stmts = lhs.stmts;
        stmts.push(LStmt::synth(LStmtKind::Declare {
            name: flag.clone(),
            ty: LType::Bool,
            init: Some(lhs.value),
        }));
        let mut then_body = rhs.stmts;
        then_body.push(LStmt::synth(LStmtKind::Assign {
            name: flag.clone(),
            value: rhs.value,
        }));
        let cond = match op {
            BinOp::Or => LExpr::var(flag.clone()).not(),
            _ => LExpr::var(flag.clone()),
        };
        stmts.push(LStmt::new(
            LStmtKind::If {
                cond,
                then_body,
                else_body: Vec::new(),
            },
            pos,
        ));
        Fragment {
            stmts,
            value: LExpr::new(LExprKind::Var(flag), pos),
        }
    }

    fn lower_construct(&mut self, type_name: &str, variant: &str, args: &[Expr], span: Span) -> Fragment {
        let pos = SourcePos::At(span);
        if let Err(err) = check_constructor_call(self.service, type_name, variant, args.len(), span) {
            self.ctx.report(err);
            return poisoned(pos, "invalid constructor call");
        }
        let callee = self
            .ctx
            .registry
            .ident_for(type_name, variant)
            .unwrap_or(variant)
            .to_string();
        let (stmts, args) = self.lower_sequence(&args.iter().collect::<Vec<_>>());
        Fragment {
            stmts,
            value: LExpr::new(LExprKind::Call { callee, args }, pos),
        }
    }

    fn lower_block_expr(&mut self, block: &Block, expr: &Expr) -> Fragment {
        let pos = SourcePos::At(expr.span);
        if block.stmts.is_empty() {
            return match &block.tail {
                Some(tail) => self.lower_expr(tail),
                None => Fragment::pure(LExpr::unit(pos)),
            };
        }

        let Some(tail) = &block.tail else {
            let body = self.lower_stmts(&block.stmts);
            return Fragment {
                stmts: vec![LStmt::new(LStmtKind::Scope(body), pos)],
                value: LExpr::unit(pos),
            };
        };

        let name = self.ctx.fresh("block");
        let mut body = self.lower_stmts(&block.stmts);
        let tail = self.lower_expr(tail);
        body.extend(tail.stmts);
        body.push(LStmt::synth(LStmtKind::Assign {
            name: name.clone(),
            value: tail.value,
        }));
        Fragment {
            stmts: vec![
                LStmt::synth(LStmtKind::Declare {
                    name: name.clone(),
                    ty: self.ltype_of(expr),
                    init: None,
                }),
                LStmt::new(LStmtKind::Scope(body), pos),
            ],
            value: LExpr::new(LExprKind::Var(name), pos),
        }
    }

    /// Check, compile, emit and lift one match. Any fatal diagnostic on the
    /// way poisons this match only.
    fn lower_match(&mut self, m: &MatchExpression) -> Fragment {
        let pos = SourcePos::At(m.span);
        let service = self.service;

        let report = check_match(m, service, &self.ctx.config);
        let passed = report.passed();
        self.ctx.report_all(report.diagnostics);

        // Scrutinees run once, before any arm.
        let (mut stmts, values) = self.lower_sequence(&m.scrutinee.exprs().iter().collect::<Vec<_>>());
        let mut scrutinees = Vec::with_capacity(values.len());
        for (value, expr) in values.into_iter().zip(m.scrutinee.exprs()) {
            let name = self.ctx.fresh("scrut");
            let value_pos = value.pos;
            stmts.push(LStmt::new(
                LStmtKind::Let {
                    name: name.clone(),
                    ty: self.ltype_of(expr),
                    value,
                },
                value_pos,
            ));
            scrutinees.push(name);
        }

        let arms: Vec<ArmCode> = m
            .arms
            .iter()
            .map(|arm| ArmCode {
                guard: match &arm.guard {
                    Some(g) if arm.has_nontrivial_guard() => Some(self.lower_expr(g)),
                    _ => None,
                },
                body: self.lower_expr(&arm.body),
            })
            .collect();

        if !passed {
            return poisoned(pos, "match rejected during lowering");
        }

        let result_ty = match m.context {
            MatchContext::Statement => LType::Unit,
            MatchContext::Expression => {
                let arm_types: Vec<(Option<Ty>, Span)> = m
                    .arms
                    .iter()
                    .map(|a| (service.type_of(&a.body).ok(), a.body.span))
                    .collect();
                match unify_arm_types(&arm_types, service, m.span) {
                    Ok(ty) => LType::from_ty(&ty),
                    Err(err) => {
                        self.ctx.report(err);
                        return poisoned(pos, "match arms have no common type");
                    }
                }
            }
        };

        let mut resolved = Vec::with_capacity(scrutinees.len());
        for expr in m.scrutinee.exprs() {
            match service.resolve_scrutinee_type(expr) {
                Ok(r) => resolved.push(r),
                Err(err) => {
                    self.ctx.report(err.into());
                    return poisoned(pos, "match scrutinee has no sum type");
                }
            }
        }

        let tree = match compile(m, &resolved, service) {
            Ok(tree) => tree,
            Err(errors) => {
                self.ctx.report_all(errors);
                return poisoned(pos, "match rejected during lowering");
            }
        };
        tracing::trace!(tree = %tree, "compiled decision tree");

        let sink = result_sink(m.context, self.ctx);
        let input = DispatchInput {
            scrutinees: &scrutinees,
            arms: &arms,
            sink: &sink,
            layouts: self.layouts,
            span: m.span,
        };
        let dispatch = match emit_dispatch(&tree, &input, self.ctx) {
            Ok(d) => d,
            Err(err) => {
                self.ctx.report(err);
                return poisoned(pos, "match rejected during lowering");
            }
        };
        tracing::debug!(
            arms = m.arms.len(),
            scrutinees = scrutinees.len(),
            branches = count_branches(&dispatch),
            "lowered match"
        );

        let lifted = lift(dispatch, &sink, result_ty, pos);
        stmts.extend(lifted.stmts);
        Fragment {
            stmts,
            value: lifted.value.unwrap_or_else(|| LExpr::unit(pos)),
        }
    }

    /// Types the service cannot supply were already reported by it.
    fn ltype_of(&self, expr: &Expr) -> LType {
        self.service
            .type_of(expr)
            .map_or(LType::Never, |ty| LType::from_ty(&ty))
    }
}

/// Code standing in for a construct that failed to lower. Compilation
/// has already failed with a diagnostic, so it never runs.
fn poisoned(pos: SourcePos, reason: &str) -> Fragment {
    Fragment {
        stmts: vec![LStmt::new(LStmtKind::Unreachable(reason.to_string()), pos)],
        value: LExpr::unit(pos),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagc_ast::{AstBuilder, CompilationUnit, Literal, TypeRef};
    use tagc_common::{LowerConfig, LowerError};
    use tagc_typeck::infer_unit;

    fn lower(unit: &CompilationUnit) -> (Vec<LFunction>, Vec<LowerError>) {
        let typeck = infer_unit(unit);
        let mut ctx = UnitCtx::new(unit, &LowerConfig::default());
        let functions = {
            let mut lowerer = FnLowerer::new(&mut ctx, &typeck, &[]);
            unit.functions.iter().map(|f| lowerer.lower_function(f)).collect()
        };
        (functions, ctx.into_diagnostics())
    }

    fn single_fn(b: &mut AstBuilder, body: Block) -> CompilationUnit {
        let x = b.var("x");
        let helper = b.function(
            "id",
            vec![("x", TypeRef::named("Int"))],
            Some(TypeRef::named("Int")),
            Block {
                stmts: vec![],
                tail: Some(Box::new(x)),
            },
        );
        let f = b.function("main", vec![], Some(TypeRef::named("Int")), body);
        CompilationUnit {
            name: "t".to_string(),
            decls: vec![],
            functions: vec![helper, f],
        }
    }

    #[test]
    fn tail_becomes_return() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let unit = single_fn(
            &mut b,
            Block {
                stmts: vec![],
                tail: Some(Box::new(one)),
            },
        );
        let (functions, diagnostics) = lower(&unit);
        assert!(diagnostics.is_empty());
        let main = &functions[1];
        assert_eq!(main.ret, LType::Int);
        assert!(matches!(
            main.body.as_slice(),
            [LStmt {
                kind: LStmtKind::Return(Some(LExpr {
                    kind: LExprKind::Lit(Literal::Int(1)),
                    ..
                })),
                ..
            }]
        ));
    }

    #[test]
    fn block_expression_binds_its_tail() {
        let mut b = AstBuilder::new();
        let two = b.int(2);
        let let_y = b.let_stmt("y", two);
        let y = b.var("y");
        let inner = b.block_expr(vec![let_y], Some(y));
        let call = b.call("id", vec![inner]);
        let unit = single_fn(
            &mut b,
            Block {
                stmts: vec![],
                tail: Some(Box::new(call)),
            },
        );
        let (functions, _) = lower(&unit);
        let main = &functions[1];
        assert!(matches!(
            &main.body[0].kind,
            LStmtKind::Declare { name, ty: LType::Int, .. } if name == "__block_0"
        ));
        assert!(matches!(main.body[1].kind, LStmtKind::Scope(_)));
    }

    #[test]
    fn earlier_calls_spill_before_hoisted_operands() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let first = b.call("id", vec![one]);
        let three = b.int(3);
        let let_z = b.let_stmt("z", three);
        let z = b.var("z");
        let second = b.block_expr(vec![let_z], Some(z));
        let sum = b.binary(BinOp::Add, first, second);
        let unit = single_fn(
            &mut b,
            Block {
                stmts: vec![],
                tail: Some(Box::new(sum)),
            },
        );
        let (functions, _) = lower(&unit);
        let main = &functions[1];
        // The call to `id` is bound before the block's statements run.
        assert!(matches!(
            &main.body[0].kind,
            LStmtKind::Let { name, value: LExpr { kind: LExprKind::Call { .. }, .. }, .. }
                if name == "__tmp_1"
        ));
        assert!(matches!(
            &main.body[1].kind,
            LStmtKind::Declare { name, .. } if name == "__block_0"
        ));
    }

    #[test]
    fn invalid_constructor_is_poisoned() {
        let mut b = AstBuilder::new();
        let call = b.construct("Missing", "Thing", vec![]);
        let unit = single_fn(
            &mut b,
            Block {
                stmts: vec![],
                tail: Some(Box::new(call)),
            },
        );
        let (functions, diagnostics) = lower(&unit);
        assert!(matches!(
            diagnostics.as_slice(),
            [LowerError::UnresolvedType { .. }]
        ));
        assert!(matches!(
            functions[1].body[0].kind,
            LStmtKind::Unreachable(_)
        ));
    }
}
