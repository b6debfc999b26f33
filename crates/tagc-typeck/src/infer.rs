//! A minimal reference type service.
//!
//! Walks a compilation unit bottom-up and records one type per expression.
//! It exists so the middle-end can run end to end without the real front
//! end: there are no inference variables and no generalization. Generic
//! arguments of a constructor call are read off its argument types.

use rustc_hash::FxHashMap;
use tagc_ast::{
    BinOp, Block, CompilationUnit, Expr, ExprId, ExprKind, Function, Literal, MatchContext,
    MatchExpression, Pattern, Scrutinee, Stmt, SumTypeDecl, UnaryOp,
};

use crate::error::TypeError;
use crate::service::{field_types, unify, TypeService, TypeServiceError};
use crate::ty::Ty;

/// The outcome of typing one compilation unit.
#[derive(Debug, Default)]
pub struct TypeckResult {
    pub types: FxHashMap<ExprId, Ty>,
    pub decls: Vec<SumTypeDecl>,
    pub errors: Vec<TypeError>,
}

impl TypeService for TypeckResult {
    fn type_of(&self, expr: &Expr) -> Result<Ty, TypeServiceError> {
        self.types
            .get(&expr.id)
            .cloned()
            .ok_or(TypeServiceError::Unknown(expr.id))
    }

    fn sum_decl(&self, name: &str) -> Option<&SumTypeDecl> {
        self.decls.iter().find(|d| d.name == name)
    }
}

struct Signature {
    params: Vec<Ty>,
    ret: Option<Ty>,
}

struct Infer<'u> {
    decls: FxHashMap<&'u str, &'u SumTypeDecl>,
    fns: FxHashMap<&'u str, Signature>,
    scopes: Vec<FxHashMap<String, Ty>>,
    types: FxHashMap<ExprId, Ty>,
    errors: Vec<TypeError>,
}

/// Type every function of `unit`.
#[tracing::instrument(level = "debug", skip_all, fields(unit = %unit.name))]
pub fn infer_unit(unit: &CompilationUnit) -> TypeckResult {
    let mut cx = Infer {
        decls: unit.decls.iter().map(|d| (d.name.as_str(), d)).collect(),
        fns: unit
            .functions
            .iter()
            .map(|f| {
                let sig = Signature {
                    params: f.params.iter().map(|p| Ty::from_type_ref(&p.ty, &[])).collect(),
                    ret: f.ret.as_ref().map(|r| Ty::from_type_ref(r, &[])),
                };
                (f.name.as_str(), sig)
            })
            .collect(),
        scopes: Vec::new(),
        types: FxHashMap::default(),
        errors: Vec::new(),
    };
    for function in &unit.functions {
        cx.infer_function(function);
    }
    tracing::debug!(
        exprs = cx.types.len(),
        errors = cx.errors.len(),
        "typed compilation unit"
    );
    TypeckResult {
        types: cx.types,
        decls: unit.decls.clone(),
        errors: cx.errors,
    }
}

fn literal_ty(lit: &Literal) -> Ty {
    match lit {
        Literal::Int(_) => Ty::int(),
        Literal::Float(_) => Ty::float(),
        Literal::Bool(_) => Ty::bool(),
        Literal::String(_) => Ty::string(),
    }
}

/// Bind generic parameters in `pattern` to the matching parts of `actual`.
fn bind_params(pattern: &Ty, actual: &Ty, subst: &mut FxHashMap<String, Ty>) {
    match (pattern, actual) {
        (Ty::Param(p), _) => {
            if !matches!(actual, Ty::Param(_) | Ty::Never) {
                subst.entry(p.clone()).or_insert_with(|| actual.clone());
            }
        }
        (Ty::App(_, pa), Ty::App(_, aa)) | (Ty::Tuple(pa), Ty::Tuple(aa)) if pa.len() == aa.len() => {
            for (p, a) in pa.iter().zip(aa) {
                bind_params(p, a, subst);
            }
        }
        _ => {}
    }
}

impl<'u> Infer<'u> {
    fn lookup(&self, name: &str) -> Option<&Ty> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn bind(&mut self, name: &str, ty: Ty) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    fn infer_function(&mut self, function: &Function) {
        let mut scope = FxHashMap::default();
        for p in &function.params {
            scope.insert(p.name.clone(), Ty::from_type_ref(&p.ty, &[]));
        }
        self.scopes.push(scope);
        let body = self.infer_block(&function.body);
        self.scopes.pop();

        if let (Some(ret), Some(body)) = (&function.ret, body) {
            let ret = Ty::from_type_ref(ret, &[]);
            if unify(&ret, &body).is_err() {
                let span = function
                    .body
                    .tail
                    .as_ref()
                    .map_or(function.span, |t| t.span);
                self.errors.push(TypeError::Mismatch {
                    expected: ret,
                    found: body,
                    span,
                });
            }
        }
    }

    fn infer_block(&mut self, block: &Block) -> Option<Ty> {
        self.scopes.push(FxHashMap::default());
        let mut diverges = false;
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let {
                    name, ty, value, ..
                } => {
                    let found = self.infer_expr(value);
                    let declared = ty.as_ref().map(|t| Ty::from_type_ref(t, &[]));
                    if let (Some(d), Some(f)) = (&declared, &found) {
                        if unify(d, f).is_err() {
                            self.errors.push(TypeError::Mismatch {
                                expected: d.clone(),
                                found: f.clone(),
                                span: value.span,
                            });
                        }
                    }
                    // Unknown types bind as `Never` so one error does not cascade.
                    let ty = declared.or(found).unwrap_or(Ty::Never);
                    self.bind(name, ty);
                }
                Stmt::Expr(e) => {
                    self.infer_expr(e);
                }
                Stmt::Return { value, .. } => {
                    if let Some(v) = value {
                        self.infer_expr(v);
                    }
                    diverges = true;
                }
            }
        }
        let ty = match &block.tail {
            Some(tail) => self.infer_expr(tail),
            None if diverges => Some(Ty::Never),
            None => Some(Ty::unit()),
        };
        self.scopes.pop();
        ty
    }

    fn infer_expr(&mut self, expr: &Expr) -> Option<Ty> {
        let ty = match &expr.kind {
            ExprKind::Lit(lit) => Some(literal_ty(lit)),
            ExprKind::Var(name) => match self.lookup(name) {
                Some(ty) => Some(ty.clone()),
                None => {
                    self.errors.push(TypeError::UnboundVariable {
                        name: name.clone(),
                        span: expr.span,
                    });
                    None
                }
            },
            ExprKind::Binary { op, lhs, rhs } => self.infer_binary(*op, lhs, rhs),
            ExprKind::Unary { op, operand } => {
                let inner = self.infer_expr(operand);
                match op {
                    UnaryOp::Neg => inner,
                    UnaryOp::Not => Some(Ty::bool()),
                }
            }
            ExprKind::Call { callee, args } => self.infer_call(callee, args, expr),
            ExprKind::Construct {
                type_name,
                variant,
                args,
            } => self.infer_construct(type_name, variant, args, expr),
            ExprKind::Tuple(elems) => {
                let tys: Vec<Option<Ty>> = elems.iter().map(|e| self.infer_expr(e)).collect();
                tys.into_iter().collect::<Option<Vec<_>>>().map(Ty::Tuple)
            }
            ExprKind::Match(m) => self.infer_match(m),
            ExprKind::Block(block) => self.infer_block(block),
        };
        if let Some(t) = &ty {
            self.types.insert(expr.id, t.clone());
        }
        ty
    }

    fn infer_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr) -> Option<Ty> {
        let l = self.infer_expr(lhs);
        let r = self.infer_expr(rhs);
        if op.is_comparison() {
            return Some(Ty::bool());
        }
        if op.is_short_circuit() {
            for (side, e) in [(&l, lhs), (&r, rhs)] {
                if let Some(t) = side {
                    if unify(&Ty::bool(), t).is_err() {
                        self.errors.push(TypeError::Mismatch {
                            expected: Ty::bool(),
                            found: t.clone(),
                            span: e.span,
                        });
                    }
                }
            }
            return Some(Ty::bool());
        }
        let (l, r) = (l?, r?);
        match (&l, &r) {
            (Ty::Never, other) | (other, Ty::Never) => Some(other.clone()),
            _ if l.is_numeric() && r.is_numeric() => unify(&l, &r).ok(),
            _ if op == BinOp::Add && l == Ty::string() && r == Ty::string() => Some(Ty::string()),
            _ => {
                self.errors.push(TypeError::Mismatch {
                    expected: l.clone(),
                    found: r.clone(),
                    span: rhs.span,
                });
                None
            }
        }
    }

    fn infer_call(&mut self, callee: &str, args: &[Expr], expr: &Expr) -> Option<Ty> {
        for a in args {
            self.infer_expr(a);
        }
        let Some(sig) = self.fns.get(callee) else {
            self.errors.push(TypeError::UnknownFunction {
                name: callee.to_string(),
                span: expr.span,
            });
            return None;
        };
        if sig.params.len() != args.len() {
            self.errors.push(TypeError::ArgCount {
                name: callee.to_string(),
                expected: sig.params.len(),
                found: args.len(),
                span: expr.span,
            });
        }
        match &sig.ret {
            Some(ret) => Some(ret.clone()),
            None => {
                self.errors.push(TypeError::MissingReturnType {
                    name: callee.to_string(),
                    span: expr.span,
                });
                None
            }
        }
    }

    /// Unknown variants and argument-count mismatches are left untyped; the
    /// lowering reports them against the declaration.
    fn infer_construct(
        &mut self,
        type_name: &str,
        variant: &str,
        args: &[Expr],
        expr: &Expr,
    ) -> Option<Ty> {
        let arg_tys: Vec<Option<Ty>> = args.iter().map(|a| self.infer_expr(a)).collect();
        let Some(decl) = self.decls.get(type_name).copied() else {
            self.errors.push(TypeError::UnknownType {
                name: type_name.to_string(),
                span: expr.span,
            });
            return None;
        };
        let (_, v) = decl.variant(variant)?;
        if v.arity() != args.len() {
            return None;
        }
        let mut subst = FxHashMap::default();
        for (field, arg) in v.fields.iter().zip(&arg_tys) {
            if let Some(arg) = arg {
                let field_ty = Ty::from_type_ref(&field.ty, &decl.type_params);
                bind_params(&field_ty, arg, &mut subst);
            }
        }
        let targs = decl
            .type_params
            .iter()
            .map(|p| subst.get(p).cloned().unwrap_or_else(|| Ty::Param(p.clone())))
            .collect();
        Some(Ty::named(&decl.name, targs))
    }

    fn infer_match(&mut self, m: &MatchExpression) -> Option<Ty> {
        let scrutinee_ty = match &m.scrutinee {
            Scrutinee::Single(e) => self.infer_expr(e),
            Scrutinee::Tuple(es) => {
                let tys: Vec<Option<Ty>> = es.iter().map(|e| self.infer_expr(e)).collect();
                tys.into_iter().collect::<Option<Vec<_>>>().map(Ty::Tuple)
            }
        };

        let mut result: Option<Ty> = None;
        for arm in &m.arms {
            self.scopes.push(FxHashMap::default());
            self.bind_pattern(&arm.pattern, scrutinee_ty.as_ref());
            if let Some(guard) = &arm.guard {
                self.infer_expr(guard);
            }
            let body = self.infer_expr(&arm.body);
            self.scopes.pop();

            // On conflict keep the first arm's type; the context lifter
            // reports the disagreement with every arm's type in hand.
            result = match (result, body) {
                (None, b) => b,
                (Some(acc), Some(b)) => Some(unify(&acc, &b).unwrap_or(acc)),
                (Some(acc), None) => Some(acc),
            };
        }

        match m.context {
            MatchContext::Expression => result,
            MatchContext::Statement => Some(Ty::unit()),
        }
    }

    fn decl_for_pattern(&self, ty: Option<&Ty>, qualifier: Option<&str>, variant: &str) -> Option<&'u SumTypeDecl> {
        if let Some(d) = ty.and_then(Ty::head_name).and_then(|n| self.decls.get(n)) {
            return Some(*d);
        }
        if let Some(d) = qualifier.and_then(|n| self.decls.get(n)) {
            return Some(*d);
        }
        let mut owners = self.decls.values().filter(|d| d.variant(variant).is_some());
        match (owners.next(), owners.next()) {
            (Some(d), None) => Some(*d),
            _ => None,
        }
    }

    fn bind_pattern(&mut self, pattern: &Pattern, ty: Option<&Ty>) {
        match pattern {
            Pattern::Binding(b) => {
                let ty = ty.cloned().unwrap_or(Ty::Never);
                self.bind(&b.name, ty);
            }
            Pattern::Wildcard(_) | Pattern::Literal(_) => {}
            Pattern::Tuple(t) => {
                let elems = match ty {
                    Some(Ty::Tuple(elems)) if elems.len() == t.elements.len() => Some(elems.clone()),
                    _ => None,
                };
                for (i, p) in t.elements.iter().enumerate() {
                    self.bind_pattern(p, elems.as_ref().map(|e| &e[i]));
                }
            }
            Pattern::Variant(vp) => {
                let resolved = self
                    .decl_for_pattern(ty, vp.type_name.as_deref(), &vp.variant)
                    .and_then(|decl| {
                        let (_, v) = decl.variant(&vp.variant)?;
                        let args = ty.map(|t| t.args().to_vec()).unwrap_or_default();
                        let aligned = vp.align(v).ok()?;
                        Some((aligned, field_types(decl, v, &args)))
                    });
                match resolved {
                    Some((aligned, ftys)) => {
                        for (p, fty) in aligned.into_iter().zip(ftys) {
                            if let Some(p) = p {
                                self.bind_pattern(p, Some(&fty));
                            }
                        }
                    }
                    None => {
                        for name in pattern.bindings() {
                            self.bind(name, Ty::Never);
                        }
                    }
                }
            }
        }
    }
}
