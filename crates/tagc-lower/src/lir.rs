//! The lowered intermediate representation handed to the emission stage.
//!
//! Statement-oriented and target-neutral: tagged unions are explicit
//! (tag enumeration, carrier shape with optional slots, constructor and
//! predicate functions) and every match has become tag switches,
//! conditionals and slot loads. Every node carries a `SourcePos`; code with
//! no user-written counterpart is `SourcePos::Synthesized`.

use std::fmt;

use rustc_hash::FxHashMap;
use tagc_ast::{BinOp, Literal, UnaryOp};
use tagc_common::{LowerError, SourcePos};
use tagc_typeck::Ty;

// ── Types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LType {
    Int,
    Float,
    Bool,
    String,
    Unit,
    Named { name: String, args: Vec<LType> },
    Tuple(Vec<LType>),
    /// A nullable value. Every carrier slot is optional.
    Optional(Box<LType>),
    /// An owned pointer, used for slots that would make a carrier infinite.
    Boxed(Box<LType>),
    Param(String),
    Fun(Vec<LType>, Box<LType>),
    /// The set of arms still viable after a multi-scrutinee narrowing switch.
    ArmSet,
    Never,
}

impl LType {
    pub fn from_ty(ty: &Ty) -> LType {
        match ty {
            Ty::Con(c) => match c.name.as_str() {
                "Int" => LType::Int,
                "Float" => LType::Float,
                "Bool" => LType::Bool,
                "String" => LType::String,
                name => LType::Named {
                    name: name.to_string(),
                    args: Vec::new(),
                },
            },
            Ty::App(con, args) => LType::Named {
                name: con.head_name().unwrap_or("?").to_string(),
                args: args.iter().map(LType::from_ty).collect(),
            },
            Ty::Tuple(elems) if elems.is_empty() => LType::Unit,
            Ty::Tuple(elems) => LType::Tuple(elems.iter().map(LType::from_ty).collect()),
            Ty::Param(p) => LType::Param(p.clone()),
            Ty::Fun(params, ret) => LType::Fun(
                params.iter().map(LType::from_ty).collect(),
                Box::new(LType::from_ty(ret)),
            ),
            Ty::Never => LType::Never,
        }
    }
}

impl fmt::Display for LType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, items: &[LType]) -> fmt::Result {
            for (i, t) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", t)?;
            }
            Ok(())
        }
        match self {
            LType::Int => write!(f, "Int"),
            LType::Float => write!(f, "Float"),
            LType::Bool => write!(f, "Bool"),
            LType::String => write!(f, "String"),
            LType::Unit => write!(f, "()"),
            LType::Named { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    list(f, args)?;
                    write!(f, ">")?;
                }
                Ok(())
            }
            LType::Tuple(elems) => {
                write!(f, "(")?;
                list(f, elems)?;
                write!(f, ")")
            }
            LType::Optional(inner) => write!(f, "{}?", inner),
            LType::Boxed(inner) => write!(f, "Box<{}>", inner),
            LType::Param(p) => write!(f, "{}", p),
            LType::Fun(params, ret) => {
                write!(f, "(")?;
                list(f, params)?;
                write!(f, ") -> {}", ret)
            }
            LType::ArmSet => write!(f, "ArmSet"),
            LType::Never => write!(f, "Never"),
        }
    }
}

// ── Expressions ─────────────────────────────────────────────────────

/// A reference to one tag constant of a tag enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagRef {
    pub enum_name: String,
    pub ident: String,
    pub ordinal: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LExpr {
    pub kind: LExprKind,
    pub pos: SourcePos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LExprKind {
    Lit(Literal),
    Unit,
    Var(String),
    Binary {
        op: BinOp,
        lhs: Box<LExpr>,
        rhs: Box<LExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<LExpr>,
    },
    Call {
        callee: String,
        args: Vec<LExpr>,
    },
    /// A carrier method such as a predicate: `receiver.IsCircle()`.
    MethodCall {
        receiver: Box<LExpr>,
        method: String,
        args: Vec<LExpr>,
    },
    Tuple(Vec<LExpr>),
    TupleField {
        base: Box<LExpr>,
        index: usize,
    },
    /// A carrier field: the tag or a slot.
    Field {
        base: Box<LExpr>,
        field: String,
    },
    Tag(TagRef),
    /// A carrier literal listing every field in shape order.
    Carrier {
        type_name: String,
        fields: Vec<(String, LExpr)>,
    },
    /// A present optional value.
    Present(Box<LExpr>),
    /// An absent optional value.
    Absent,
    /// Read a present optional value. Only emitted where presence is
    /// established by a tag test.
    Unwrap(Box<LExpr>),
    MakeBox(Box<LExpr>),
    Unbox(Box<LExpr>),
    ArmSet(Vec<usize>),
    ArmSetContains {
        set: Box<LExpr>,
        arm: usize,
    },
}

impl LExpr {
    pub fn new(kind: LExprKind, pos: SourcePos) -> Self {
        LExpr { kind, pos }
    }

    pub fn synth(kind: LExprKind) -> Self {
        LExpr {
            kind,
            pos: SourcePos::Synthesized,
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        LExpr::synth(LExprKind::Var(name.into()))
    }

    pub fn unit(pos: SourcePos) -> Self {
        LExpr::new(LExprKind::Unit, pos)
    }

    pub fn bool(b: bool) -> Self {
        LExpr::synth(LExprKind::Lit(Literal::Bool(b)))
    }

    pub fn field(self, field: impl Into<String>) -> Self {
        LExpr::synth(LExprKind::Field {
            base: Box::new(self),
            field: field.into(),
        })
    }

    pub fn not(self) -> Self {
        LExpr::synth(LExprKind::Unary {
            op: UnaryOp::Not,
            operand: Box::new(self),
        })
    }

    pub fn and(self, rhs: LExpr) -> Self {
        LExpr::synth(LExprKind::Binary {
            op: BinOp::And,
            lhs: Box::new(self),
            rhs: Box::new(rhs),
        })
    }

    /// Literals, variables and the unit value: re-evaluating them is free
    /// and has no effect.
    pub fn is_pure(&self) -> bool {
        matches!(
            self.kind,
            LExprKind::Lit(_) | LExprKind::Unit | LExprKind::Var(_) | LExprKind::Tag(_)
        )
    }
}

// ── Statements ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct LStmt {
    pub kind: LStmtKind,
    pub pos: SourcePos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LStmtKind {
    /// Immutable binding.
    Let {
        name: String,
        ty: LType,
        value: LExpr,
    },
    /// Mutable local, optionally initialized.
    Declare {
        name: String,
        ty: LType,
        init: Option<LExpr>,
    },
    Assign {
        name: String,
        value: LExpr,
    },
    Expr(LExpr),
    If {
        cond: LExpr,
        then_body: Vec<LStmt>,
        else_body: Vec<LStmt>,
    },
    /// Dispatch on a carrier tag.
    Switch {
        subject: LExpr,
        cases: Vec<(TagRef, Vec<LStmt>)>,
        default: Option<Vec<LStmt>>,
    },
    /// A lexical scope; names declared inside do not escape.
    Scope(Vec<LStmt>),
    Return(Option<LExpr>),
    /// Control never reaches here in a checked program.
    Unreachable(String),
}

impl LStmt {
    pub fn new(kind: LStmtKind, pos: SourcePos) -> Self {
        LStmt { kind, pos }
    }

    pub fn synth(kind: LStmtKind) -> Self {
        LStmt {
            kind,
            pos: SourcePos::Synthesized,
        }
    }
}

/// A lowered expression: the statements that must run first, then the value.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub stmts: Vec<LStmt>,
    pub value: LExpr,
}

impl Fragment {
    pub fn pure(value: LExpr) -> Self {
        Fragment {
            stmts: Vec::new(),
            value,
        }
    }

    /// Every local the fragment's statements bind, at any depth, in order.
    pub fn bound_locals(&self) -> Vec<String> {
        fn walk(stmts: &[LStmt], out: &mut Vec<String>) {
            for stmt in stmts {
                match &stmt.kind {
                    LStmtKind::Let { name, .. } | LStmtKind::Declare { name, .. } => {
                        out.push(name.clone())
                    }
                    LStmtKind::If {
                        then_body,
                        else_body,
                        ..
                    } => {
                        walk(then_body, out);
                        walk(else_body, out);
                    }
                    LStmtKind::Switch { cases, default, .. } => {
                        for (_, body) in cases {
                            walk(body, out);
                        }
                        if let Some(d) = default {
                            walk(d, out);
                        }
                    }
                    LStmtKind::Scope(body) => walk(body, out),
                    LStmtKind::Assign { .. }
                    | LStmtKind::Expr(_)
                    | LStmtKind::Return(_)
                    | LStmtKind::Unreachable(_) => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.stmts, &mut out);
        out
    }

    /// A copy with every local in `renames` renamed, bindings and uses alike.
    pub fn renamed(&self, renames: &FxHashMap<String, String>) -> Fragment {
        let mut copy = self.clone();
        for stmt in &mut copy.stmts {
            rename_stmt(stmt, renames);
        }
        rename_expr(&mut copy.value, renames);
        copy
    }
}

fn rename(name: &mut String, renames: &FxHashMap<String, String>) {
    if let Some(new) = renames.get(name.as_str()) {
        *name = new.clone();
    }
}

fn rename_stmt(stmt: &mut LStmt, renames: &FxHashMap<String, String>) {
    match &mut stmt.kind {
        LStmtKind::Let { name, value, .. } => {
            rename(name, renames);
            rename_expr(value, renames);
        }
        LStmtKind::Declare { name, init, .. } => {
            rename(name, renames);
            if let Some(init) = init {
                rename_expr(init, renames);
            }
        }
        LStmtKind::Assign { name, value } => {
            rename(name, renames);
            rename_expr(value, renames);
        }
        LStmtKind::Expr(e) | LStmtKind::Return(Some(e)) => rename_expr(e, renames),
        LStmtKind::If {
            cond,
            then_body,
            else_body,
        } => {
            rename_expr(cond, renames);
            then_body
                .iter_mut()
                .chain(else_body.iter_mut())
                .for_each(|s| rename_stmt(s, renames));
        }
        LStmtKind::Switch {
            subject,
            cases,
            default,
        } => {
            rename_expr(subject, renames);
            for (_, body) in cases.iter_mut() {
                body.iter_mut().for_each(|s| rename_stmt(s, renames));
            }
            if let Some(d) = default {
                d.iter_mut().for_each(|s| rename_stmt(s, renames));
            }
        }
        LStmtKind::Scope(body) => body.iter_mut().for_each(|s| rename_stmt(s, renames)),
        LStmtKind::Return(None) | LStmtKind::Unreachable(_) => {}
    }
}

fn rename_expr(expr: &mut LExpr, renames: &FxHashMap<String, String>) {
    match &mut expr.kind {
        LExprKind::Var(name) => rename(name, renames),
        LExprKind::Binary { lhs, rhs, .. } => {
            rename_expr(lhs, renames);
            rename_expr(rhs, renames);
        }
        LExprKind::Unary { operand: inner, .. }
        | LExprKind::TupleField { base: inner, .. }
        | LExprKind::Field { base: inner, .. }
        | LExprKind::Present(inner)
        | LExprKind::Unwrap(inner)
        | LExprKind::MakeBox(inner)
        | LExprKind::Unbox(inner)
        | LExprKind::ArmSetContains { set: inner, .. } => rename_expr(inner, renames),
        LExprKind::Call { args, .. } | LExprKind::Tuple(args) => {
            args.iter_mut().for_each(|a| rename_expr(a, renames))
        }
        LExprKind::MethodCall { receiver, args, .. } => {
            rename_expr(receiver, renames);
            args.iter_mut().for_each(|a| rename_expr(a, renames));
        }
        LExprKind::Carrier { fields, .. } => {
            fields.iter_mut().for_each(|(_, v)| rename_expr(v, renames))
        }
        LExprKind::Lit(_)
        | LExprKind::Unit
        | LExprKind::Tag(_)
        | LExprKind::Absent
        | LExprKind::ArmSet(_) => {}
    }
}

// ── Items ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagVariant {
    pub ident: String,
    pub ordinal: usize,
}

/// The tag enumeration of one sum type; ordinals follow declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagEnum {
    pub name: String,
    pub variants: Vec<TagVariant>,
    pub pos: SourcePos,
}

/// One optional payload slot of a carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub name: String,
    pub variant: String,
    pub field_index: usize,
    pub field_name: Option<String>,
    /// Always `Optional`, wrapping `Boxed` when `boxed`.
    pub ty: LType,
    pub boxed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierShape {
    pub name: String,
    pub type_params: Vec<String>,
    pub tag_field: String,
    pub tag_enum: String,
    pub slots: Vec<Slot>,
    pub pos: SourcePos,
}

impl CarrierShape {
    pub fn slot(&self, variant: &str, field_index: usize) -> Option<&Slot> {
        self.slots
            .iter()
            .find(|s| s.variant == variant && s.field_index == field_index)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LParam {
    pub name: String,
    pub ty: LType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LFunction {
    pub name: String,
    pub type_params: Vec<String>,
    /// Set for carrier methods; the receiver is in scope as `self`.
    pub receiver: Option<LType>,
    pub params: Vec<LParam>,
    pub ret: LType,
    pub body: Vec<LStmt>,
    pub pos: SourcePos,
}

/// Per-variant names chosen during lowering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantLayout {
    pub name: String,
    pub ordinal: usize,
    /// Constructor function identifier.
    pub ctor: String,
    pub tag: TagRef,
    pub predicate: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoweredSumType {
    pub decl_name: String,
    pub tag_enum: TagEnum,
    pub carrier: CarrierShape,
    pub variants: Vec<VariantLayout>,
    pub constructors: Vec<LFunction>,
    pub predicates: Vec<LFunction>,
}

impl LoweredSumType {
    pub fn variant(&self, name: &str) -> Option<&VariantLayout> {
        self.variants.iter().find(|v| v.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoweredUnit {
    pub name: String,
    pub sum_types: Vec<LoweredSumType>,
    pub functions: Vec<LFunction>,
    /// Every diagnostic of the unit, in the order produced.
    pub diagnostics: Vec<LowerError>,
}

impl LoweredUnit {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(LowerError::is_fatal)
    }

    pub fn sum_type(&self, name: &str) -> Option<&LoweredSumType> {
        self.sum_types.iter().find(|s| s.decl_name == name)
    }

    pub fn function(&self, name: &str) -> Option<&LFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

// ── Queries ─────────────────────────────────────────────────────────

/// Number of tag-dispatch branches (switch cases, defaults included)
/// anywhere in `stmts`. Conditionals are not counted; see
/// [`count_conditionals`].
pub fn count_branches(stmts: &[LStmt]) -> usize {
    stmts.iter().map(stmt_branches).sum()
}

/// Number of `If` statements anywhere in `stmts`.
pub fn count_conditionals(stmts: &[LStmt]) -> usize {
    stmts
        .iter()
        .map(|stmt| match &stmt.kind {
            LStmtKind::If {
                then_body,
                else_body,
                ..
            } => 1 + count_conditionals(then_body) + count_conditionals(else_body),
            LStmtKind::Switch { cases, default, .. } => {
                cases.iter().map(|(_, body)| count_conditionals(body)).sum::<usize>()
                    + default.as_deref().map_or(0, count_conditionals)
            }
            LStmtKind::Scope(body) => count_conditionals(body),
            _ => 0,
        })
        .sum()
}

fn stmt_branches(stmt: &LStmt) -> usize {
    match &stmt.kind {
        LStmtKind::Switch { cases, default, .. } => {
            let own = cases.len() + usize::from(default.is_some());
            let nested: usize = cases.iter().map(|(_, body)| count_branches(body)).sum();
            own + nested + default.as_deref().map_or(0, count_branches)
        }
        LStmtKind::If {
            then_body,
            else_body,
            ..
        } => count_branches(then_body) + count_branches(else_body),
        LStmtKind::Scope(body) => count_branches(body),
        LStmtKind::Let { .. }
        | LStmtKind::Declare { .. }
        | LStmtKind::Assign { .. }
        | LStmtKind::Expr(_)
        | LStmtKind::Return(_)
        | LStmtKind::Unreachable(_) => 0,
    }
}

/// Every node position in `stmts` that claims a source location.
pub fn positioned_nodes(stmts: &[LStmt]) -> usize {
    fn stmt(s: &LStmt) -> usize {
        let own = usize::from(!s.pos.is_synthesized());
        own + match &s.kind {
            LStmtKind::If {
                then_body,
                else_body,
                ..
            } => positioned_nodes(then_body) + positioned_nodes(else_body),
            LStmtKind::Switch { cases, default, .. } => {
                cases.iter().map(|(_, b)| positioned_nodes(b)).sum::<usize>()
                    + default.as_deref().map_or(0, positioned_nodes)
            }
            LStmtKind::Scope(body) => positioned_nodes(body),
            _ => 0,
        }
    }
    stmts.iter().map(stmt).sum()
}
