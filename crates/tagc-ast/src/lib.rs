//! Syntax tree shapes consumed by the tagc middle-end.
//!
//! The front end (lexing, parsing, name scoping) lives elsewhere; this crate
//! only defines the already-parsed nodes it hands over: sum type
//! declarations, functions, expressions with stable ids, match expressions
//! and patterns.

pub mod builder;
pub mod decl;
pub mod expr;
pub mod pattern;

pub use builder::AstBuilder;
pub use decl::{CompilationUnit, Field, Function, Param, SumTypeDecl, TypeRef, Variant, VariantKind};
pub use expr::{
    BinOp, Block, Expr, ExprId, ExprKind, Literal, MatchArm, MatchContext, MatchExpression,
    Scrutinee, Stmt, UnaryOp,
};
pub use pattern::{
    BindingPattern, FieldMismatch, FieldPattern, LiteralPattern, Pattern, TuplePattern,
    VariantFields, VariantPattern,
};
