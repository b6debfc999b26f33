//! Context lifting: how a lowered match hands its result to the code
//! around it.
//!
//! A match in expression context gets one synthesized result binding,
//! declared ahead of a scope holding the dispatch; every leaf assigns to it
//! and the original expression site reads it. A match in statement context
//! is spliced in as bare dispatch.

use tagc_ast::MatchContext;
use tagc_common::{ArmType, LowerError, SourcePos, Span};
use tagc_typeck::{Ty, TypeService};

use crate::lir::{LExpr, LExprKind, LStmt, LStmtKind, LType};
use crate::naming::UnitCtx;

/// Where the leaves of a dispatch deliver their arm's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultSink {
    /// Assign to the synthesized result binding.
    Assign(String),
    /// Statement context: the value is dropped.
    Discard,
}

/// Pick the sink for a match before its dispatch is emitted. Expression
/// context draws a fresh binding name from the unit counter.
pub fn result_sink(context: MatchContext, ctx: &mut UnitCtx) -> ResultSink {
    match context {
        MatchContext::Expression => ResultSink::Assign(ctx.fresh("match")),
        MatchContext::Statement => ResultSink::Discard,
    }
}

/// A match after lifting.
#[derive(Debug, Clone, PartialEq)]
pub struct Lifted {
    pub stmts: Vec<LStmt>,
    /// The reference replacing the match expression; `None` in statement
    /// context.
    pub value: Option<LExpr>,
}

/// Wrap emitted dispatch according to `sink`.
pub fn lift(dispatch: Vec<LStmt>, sink: &ResultSink, result_ty: LType, pos: SourcePos) -> Lifted {
    match sink {
        ResultSink::Assign(name) => Lifted {
            stmts: vec![
                LStmt::new(
                    LStmtKind::Declare {
                        name: name.clone(),
                        ty: result_ty,
                        init: None,
                    },
                    SourcePos::Synthesized,
                ),
                LStmt::new(LStmtKind::Scope(dispatch), pos),
            ],
            value: Some(LExpr::new(LExprKind::Var(name.clone()), pos)),
        },
        ResultSink::Discard => Lifted {
            stmts: dispatch,
            value: None,
        },
    }
}

/// The common type of every arm body.
///
/// Arms whose type the service could not supply are given as `None` and
/// skipped; the service has already reported them. Any arm that does not
/// unify with the running result is a conflict, reported together with
/// the first arm.
pub fn unify_arm_types(
    arms: &[(Option<Ty>, Span)],
    service: &dyn TypeService,
    match_span: Span,
) -> Result<Ty, LowerError> {
    let mut known = arms
        .iter()
        .enumerate()
        .filter_map(|(i, (ty, span))| ty.as_ref().map(|ty| (i, ty, *span)));

    let Some((first_index, first_ty, first_span)) = known.next() else {
        return Err(LowerError::UnresolvedType {
            what: "the result of this match (no arm has a known type)".to_string(),
            span: match_span,
        });
    };

    let mut result = first_ty.clone();
    let mut conflicts = Vec::new();
    for (i, ty, span) in known {
        match service.unify(&result, ty) {
            Ok(common) => result = common,
            Err(_) => conflicts.push(ArmType {
                arm_index: i,
                ty: ty.to_string(),
                span,
            }),
        }
    }

    if conflicts.is_empty() {
        return Ok(result);
    }
    conflicts.insert(
        0,
        ArmType {
            arm_index: first_index,
            ty: first_ty.to_string(),
            span: first_span,
        },
    );
    Err(LowerError::TypeUnification {
        conflicts,
        span: match_span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagc_ast::{CompilationUnit, Expr, SumTypeDecl};
    use tagc_common::LowerConfig;
    use tagc_typeck::TypeServiceError;

    struct NoTypes;

    impl TypeService for NoTypes {
        fn type_of(&self, expr: &Expr) -> Result<Ty, TypeServiceError> {
            Err(TypeServiceError::Unknown(expr.id))
        }

        fn sum_decl(&self, _name: &str) -> Option<&SumTypeDecl> {
            None
        }
    }

    fn span(n: u32) -> Span {
        Span::new(n, n + 1)
    }

    #[test]
    fn numeric_arms_widen() {
        let arms = [
            (Some(Ty::float()), span(0)),
            (Some(Ty::int()), span(1)),
            (Some(Ty::Never), span(2)),
        ];
        assert_eq!(unify_arm_types(&arms, &NoTypes, span(9)), Ok(Ty::float()));
    }

    #[test]
    fn conflicts_name_every_arm() {
        let arms = [
            (Some(Ty::string()), span(0)),
            (Some(Ty::string()), span(1)),
            (Some(Ty::bool()), span(2)),
        ];
        let err = unify_arm_types(&arms, &NoTypes, span(9)).unwrap_err();
        let LowerError::TypeUnification { conflicts, .. } = err else {
            panic!("expected a unification error");
        };
        let summary: Vec<(usize, &str)> = conflicts
            .iter()
            .map(|c| (c.arm_index, c.ty.as_str()))
            .collect();
        assert_eq!(summary, [(0, "String"), (2, "Bool")]);
    }

    #[test]
    fn unknown_arms_are_skipped() {
        let arms = [(None, span(0)), (Some(Ty::int()), span(1))];
        assert_eq!(unify_arm_types(&arms, &NoTypes, span(9)), Ok(Ty::int()));
        assert!(unify_arm_types(&[(None, span(0))], &NoTypes, span(9)).is_err());
    }

    #[test]
    fn expression_context_binds_once() {
        let unit = CompilationUnit::default();
        let mut ctx = UnitCtx::new(&unit, &LowerConfig::default());
        let sink = result_sink(MatchContext::Expression, &mut ctx);
        let lifted = lift(Vec::new(), &sink, LType::Int, SourcePos::At(span(4)));
        assert_eq!(lifted.stmts.len(), 2);
        assert!(matches!(
            &lifted.stmts[0].kind,
            LStmtKind::Declare { name, .. } if name == "__match_0"
        ));
        assert!(matches!(
            lifted.value,
            Some(LExpr { kind: LExprKind::Var(ref n), .. }) if n == "__match_0"
        ));

        let again = result_sink(MatchContext::Expression, &mut ctx);
        assert_eq!(again, ResultSink::Assign("__match_1".to_string()));
    }

    #[test]
    fn statement_context_is_spliced() {
        let unit = CompilationUnit::default();
        let mut ctx = UnitCtx::new(&unit, &LowerConfig::default());
        let sink = result_sink(MatchContext::Statement, &mut ctx);
        let stmt = LStmt::synth(LStmtKind::Unreachable("x".to_string()));
        let lifted = lift(vec![stmt.clone()], &sink, LType::Unit, SourcePos::Synthesized);
        assert_eq!(lifted.stmts, vec![stmt]);
        assert!(lifted.value.is_none());
    }
}
