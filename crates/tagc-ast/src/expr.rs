//! Expressions, statements and match expressions.

use std::fmt;

use tagc_common::Span;

use crate::decl::TypeRef;
use crate::pattern::Pattern;

/// Stable identity of an expression node, assigned by the front end.
/// The type service keys its answers on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(n) => write!(f, "{}", n),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::String(s) => write!(f, "{:?}", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    /// `&&` and `||` skip their right operand.
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    /// The literal constant `true`, the only guard counted as trivially true.
    pub fn is_literal_true(&self) -> bool {
        matches!(self.kind, ExprKind::Lit(Literal::Bool(true)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Lit(Literal),
    Var(String),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Call of a unit-level function.
    Call { callee: String, args: Vec<Expr> },
    /// `Shape.Circle(1.0)`
    Construct {
        type_name: String,
        variant: String,
        args: Vec<Expr>,
    },
    Tuple(Vec<Expr>),
    Match(Box<MatchExpression>),
    Block(Block),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        ty: Option<TypeRef>,
        value: Expr,
        span: Span,
    },
    Expr(Expr),
    Return { value: Option<Expr>, span: Span },
}

/// Where a match appears, as decided by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchContext {
    /// The match produces a value.
    Expression,
    /// The match's value is discarded.
    Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scrutinee {
    Single(Expr),
    /// `match (a, b) ...`: one pattern position per expression.
    Tuple(Vec<Expr>),
}

impl Scrutinee {
    pub fn exprs(&self) -> &[Expr] {
        match self {
            Scrutinee::Single(e) => std::slice::from_ref(e),
            Scrutinee::Tuple(es) => es,
        }
    }

    pub fn arity(&self) -> usize {
        self.exprs().len()
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Scrutinee::Tuple(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
    pub span: Span,
}

impl MatchArm {
    /// A guard that cannot be proven true statically. Only the literal
    /// constant `true` counts as trivially true.
    pub fn has_nontrivial_guard(&self) -> bool {
        self.guard.as_ref().is_some_and(|g| !g.is_literal_true())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchExpression {
    pub scrutinee: Scrutinee,
    pub arms: Vec<MatchArm>,
    pub context: MatchContext,
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(id: u32, l: Literal) -> Expr {
        Expr {
            id: ExprId(id),
            kind: ExprKind::Lit(l),
            span: Span::default(),
        }
    }

    #[test]
    fn only_literal_true_is_trivial() {
        let arm = |guard| MatchArm {
            pattern: Pattern::Wildcard(Span::default()),
            guard,
            body: lit(0, Literal::Int(1)),
            span: Span::default(),
        };
        assert!(!arm(None).has_nontrivial_guard());
        assert!(!arm(Some(lit(1, Literal::Bool(true)))).has_nontrivial_guard());
        assert!(arm(Some(lit(2, Literal::Bool(false)))).has_nontrivial_guard());
        let var = Expr {
            id: ExprId(3),
            kind: ExprKind::Var("ok".to_string()),
            span: Span::default(),
        };
        assert!(arm(Some(var)).has_nontrivial_guard());
    }

    #[test]
    fn scrutinee_arity() {
        let s = Scrutinee::Tuple(vec![lit(0, Literal::Int(1)), lit(1, Literal::Int(2))]);
        assert_eq!(s.arity(), 2);
        assert!(s.is_tuple());
        assert_eq!(Scrutinee::Single(lit(2, Literal::Int(3))).arity(), 1);
    }
}
