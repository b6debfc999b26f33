//! Programmatic construction of syntax trees.
//!
//! The builder hands out fresh `ExprId`s and, unless a span is given
//! explicitly, distinct one-byte spans so every node stays addressable in
//! diagnostics.

use tagc_common::Span;

use crate::decl::{Field, Function, Param, SumTypeDecl, TypeRef, Variant, VariantKind};
use crate::expr::{
    BinOp, Block, Expr, ExprId, ExprKind, Literal, MatchArm, MatchContext, MatchExpression,
    Scrutinee, Stmt, UnaryOp,
};
use crate::pattern::{
    BindingPattern, FieldPattern, LiteralPattern, Pattern, TuplePattern, VariantFields,
    VariantPattern,
};

#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: u32,
    next_pos: u32,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn span(&mut self) -> Span {
        let span = Span::new(self.next_pos, self.next_pos + 1);
        self.next_pos += 1;
        span
    }

    fn id(&mut self) -> ExprId {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        id
    }

    // ── Expressions ─────────────────────────────────────────────────

    pub fn expr_at(&mut self, kind: ExprKind, span: Span) -> Expr {
        Expr {
            id: self.id(),
            kind,
            span,
        }
    }

    pub fn expr(&mut self, kind: ExprKind) -> Expr {
        let span = self.span();
        self.expr_at(kind, span)
    }

    pub fn int(&mut self, n: i64) -> Expr {
        self.expr(ExprKind::Lit(Literal::Int(n)))
    }

    pub fn float(&mut self, x: f64) -> Expr {
        self.expr(ExprKind::Lit(Literal::Float(x)))
    }

    pub fn bool(&mut self, b: bool) -> Expr {
        self.expr(ExprKind::Lit(Literal::Bool(b)))
    }

    pub fn string(&mut self, s: &str) -> Expr {
        self.expr(ExprKind::Lit(Literal::String(s.to_string())))
    }

    pub fn var(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Var(name.to_string()))
    }

    pub fn binary(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        let span = lhs.span.merge(rhs.span);
        self.expr_at(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        )
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn call(&mut self, callee: &str, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            callee: callee.to_string(),
            args,
        })
    }

    pub fn construct(&mut self, type_name: &str, variant: &str, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Construct {
            type_name: type_name.to_string(),
            variant: variant.to_string(),
            args,
        })
    }

    pub fn tuple(&mut self, elems: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Tuple(elems))
    }

    pub fn block_expr(&mut self, stmts: Vec<Stmt>, tail: Option<Expr>) -> Expr {
        self.expr(ExprKind::Block(Block {
            stmts,
            tail: tail.map(Box::new),
        }))
    }

    pub fn match_expr(&mut self, scrutinee: Expr, arms: Vec<MatchArm>, context: MatchContext) -> Expr {
        self.match_on(Scrutinee::Single(scrutinee), arms, context)
    }

    pub fn match_tuple(
        &mut self,
        scrutinees: Vec<Expr>,
        arms: Vec<MatchArm>,
        context: MatchContext,
    ) -> Expr {
        self.match_on(Scrutinee::Tuple(scrutinees), arms, context)
    }

    fn match_on(&mut self, scrutinee: Scrutinee, arms: Vec<MatchArm>, context: MatchContext) -> Expr {
        let span = self.span();
        self.expr_at(
            ExprKind::Match(Box::new(MatchExpression {
                scrutinee,
                arms,
                context,
                span,
            })),
            span,
        )
    }

    pub fn arm(&mut self, pattern: Pattern, guard: Option<Expr>, body: Expr) -> MatchArm {
        let span = pattern.span().merge(body.span);
        MatchArm {
            pattern,
            guard,
            body,
            span,
        }
    }

    // ── Patterns ────────────────────────────────────────────────────

    /// `Circle(p0, p1, ..)`, or bare `Point` when `fields` is empty.
    pub fn p_variant(&mut self, variant: &str, fields: Vec<Pattern>) -> Pattern {
        let fields = if fields.is_empty() {
            VariantFields::None
        } else {
            VariantFields::Positional(fields)
        };
        Pattern::Variant(VariantPattern {
            type_name: None,
            variant: variant.to_string(),
            fields,
            span: self.span(),
        })
    }

    /// `Rectangle { width, height }`: each named field bound to its own name.
    pub fn p_named(&mut self, variant: &str, fields: &[&str]) -> Pattern {
        let fields = fields
            .iter()
            .map(|f| {
                let bind = self.p_bind(f);
                (*f, bind)
            })
            .collect();
        self.p_named_with(variant, fields)
    }

    pub fn p_named_with(&mut self, variant: &str, fields: Vec<(&str, Pattern)>) -> Pattern {
        let fields = fields
            .into_iter()
            .map(|(name, pattern)| FieldPattern {
                name: name.to_string(),
                span: pattern.span(),
                pattern,
            })
            .collect();
        Pattern::Variant(VariantPattern {
            type_name: None,
            variant: variant.to_string(),
            fields: VariantFields::Named(fields),
            span: self.span(),
        })
    }

    pub fn p_wild(&mut self) -> Pattern {
        Pattern::Wildcard(self.span())
    }

    pub fn p_bind(&mut self, name: &str) -> Pattern {
        Pattern::Binding(BindingPattern {
            name: name.to_string(),
            span: self.span(),
        })
    }

    pub fn p_lit(&mut self, value: Literal) -> Pattern {
        Pattern::Literal(LiteralPattern {
            value,
            span: self.span(),
        })
    }

    pub fn p_tuple(&mut self, elements: Vec<Pattern>) -> Pattern {
        Pattern::Tuple(TuplePattern {
            elements,
            span: self.span(),
        })
    }

    // ── Statements and items ────────────────────────────────────────

    pub fn let_stmt(&mut self, name: &str, value: Expr) -> Stmt {
        Stmt::Let {
            name: name.to_string(),
            ty: None,
            span: value.span,
            value,
        }
    }

    pub fn function(
        &mut self,
        name: &str,
        params: Vec<(&str, TypeRef)>,
        ret: Option<TypeRef>,
        body: Block,
    ) -> Function {
        let params = params
            .into_iter()
            .map(|(n, ty)| Param {
                name: n.to_string(),
                ty,
                span: self.span(),
            })
            .collect();
        Function {
            name: name.to_string(),
            params,
            ret,
            body,
            span: self.span(),
        }
    }

    pub fn sum_type(&mut self, name: &str, type_params: &[&str], variants: Vec<Variant>) -> SumTypeDecl {
        SumTypeDecl {
            name: name.to_string(),
            type_params: type_params.iter().map(|p| p.to_string()).collect(),
            variants,
            span: self.span(),
        }
    }

    pub fn unit_variant(&mut self, name: &str) -> Variant {
        Variant {
            name: name.to_string(),
            kind: VariantKind::Unit,
            fields: Vec::new(),
            span: self.span(),
        }
    }

    pub fn tuple_variant(&mut self, name: &str, tys: Vec<TypeRef>) -> Variant {
        let fields = tys
            .into_iter()
            .map(|ty| Field {
                name: None,
                ty,
                span: self.span(),
            })
            .collect();
        Variant {
            name: name.to_string(),
            kind: VariantKind::Tuple,
            fields,
            span: self.span(),
        }
    }

    pub fn struct_variant(&mut self, name: &str, fields: Vec<(&str, TypeRef)>) -> Variant {
        let fields = fields
            .into_iter()
            .map(|(n, ty)| Field {
                name: Some(n.to_string()),
                ty,
                span: self.span(),
            })
            .collect();
        Variant {
            name: name.to_string(),
            kind: VariantKind::Struct,
            fields,
            span: self.span(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_and_spans_are_fresh() {
        let mut b = AstBuilder::new();
        let x = b.int(1);
        let y = b.int(2);
        assert_ne!(x.id, y.id);
        assert_ne!(x.span, y.span);
        let sum = b.binary(BinOp::Add, x.clone(), y.clone());
        assert_eq!(sum.span, x.span.merge(y.span));
    }

    #[test]
    fn empty_variant_pattern_is_bare() {
        let mut b = AstBuilder::new();
        match b.p_variant("Point", vec![]) {
            Pattern::Variant(v) => assert_eq!(v.fields, VariantFields::None),
            other => panic!("expected variant pattern, got {:?}", other),
        }
    }
}
