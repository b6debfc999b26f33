//! The type-service query interface.
//!
//! The middle-end never infers types itself. It asks a `TypeService` for
//! the type of an expression, for the declaration behind a sum type name,
//! and for the common type of two arm results.

use std::fmt;

use rustc_hash::FxHashMap;
use tagc_ast::{Expr, ExprId, SumTypeDecl, Variant};
use tagc_common::{LowerError, Span};

use crate::ty::Ty;

/// A scrutinee's resolved sum type: the declaration plus the type arguments
/// it was instantiated with.
#[derive(Debug, Clone, PartialEq)]
pub struct SumTypeRef<'a> {
    pub decl: &'a SumTypeDecl,
    pub args: Vec<Ty>,
}

impl SumTypeRef<'_> {
    pub fn to_ty(&self) -> Ty {
        Ty::named(&self.decl.name, self.args.clone())
    }

    /// Field types of `variant` under this instantiation.
    pub fn field_types(&self, variant: &Variant) -> Vec<Ty> {
        field_types(self.decl, variant, &self.args)
    }
}

impl fmt::Display for SumTypeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeServiceError {
    /// The service holds no type for this expression.
    Unknown(ExprId),
}

impl fmt::Display for TypeServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeServiceError::Unknown(id) => write!(f, "no type recorded for expression #{}", id.0),
        }
    }
}

impl std::error::Error for TypeServiceError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoCommonTypeError {
    pub left: Ty,
    pub right: Ty,
}

impl fmt::Display for NoCommonTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` and `{}` have no common type", self.left, self.right)
    }
}

impl std::error::Error for NoCommonTypeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedTypeError {
    pub what: String,
    pub span: Span,
}

impl fmt::Display for UnresolvedTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot resolve the type of {}", self.what)
    }
}

impl std::error::Error for UnresolvedTypeError {}

impl From<UnresolvedTypeError> for LowerError {
    fn from(e: UnresolvedTypeError) -> Self {
        LowerError::UnresolvedType {
            what: e.what,
            span: e.span,
        }
    }
}

pub trait TypeService {
    /// The type of an already-checked expression.
    fn type_of(&self, expr: &Expr) -> Result<Ty, TypeServiceError>;

    /// The declaration behind a sum type name, if there is one.
    fn sum_decl(&self, name: &str) -> Option<&SumTypeDecl>;

    /// The common type of two types.
    fn unify(&self, a: &Ty, b: &Ty) -> Result<Ty, NoCommonTypeError> {
        unify(a, b)
    }

    /// Resolve a scrutinee expression to the sum type it ranges over.
    fn resolve_scrutinee_type(&self, expr: &Expr) -> Result<SumTypeRef<'_>, UnresolvedTypeError> {
        let ty = self.type_of(expr).map_err(|_| UnresolvedTypeError {
            what: "the match scrutinee".to_string(),
            span: expr.span,
        })?;
        let decl = ty
            .head_name()
            .and_then(|name| self.sum_decl(name))
            .ok_or_else(|| UnresolvedTypeError {
                what: format!("the match scrutinee as a sum type (found `{}`)", ty),
                span: expr.span,
            })?;
        Ok(SumTypeRef {
            decl,
            args: ty.args().to_vec(),
        })
    }
}

/// The common type of `a` and `b`.
///
/// Equal types unify to themselves, `Never` and generic parameters unify
/// with anything, and `Int` widens to `Float` at the top level. Applied
/// and tuple types unify structurally without numeric widening.
pub fn unify(a: &Ty, b: &Ty) -> Result<Ty, NoCommonTypeError> {
    unify_inner(a, b, true).ok_or_else(|| NoCommonTypeError {
        left: a.clone(),
        right: b.clone(),
    })
}

fn unify_inner(a: &Ty, b: &Ty, widen: bool) -> Option<Ty> {
    if a == b {
        return Some(a.clone());
    }
    match (a, b) {
        (Ty::Never, other) | (other, Ty::Never) => Some(other.clone()),
        (Ty::Param(_), other) | (other, Ty::Param(_)) => Some(other.clone()),
        (x, y) if widen && x.is_numeric() && y.is_numeric() => Some(Ty::float()),
        (Ty::App(ca, aa), Ty::App(cb, ab)) if aa.len() == ab.len() => {
            let con = unify_inner(ca, cb, false)?;
            let args = aa
                .iter()
                .zip(ab)
                .map(|(x, y)| unify_inner(x, y, false))
                .collect::<Option<Vec<_>>>()?;
            Some(Ty::App(Box::new(con), args))
        }
        (Ty::Tuple(xs), Ty::Tuple(ys)) if xs.len() == ys.len() => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| unify_inner(x, y, false))
            .collect::<Option<Vec<_>>>()
            .map(Ty::Tuple),
        (Ty::Fun(pa, ra), Ty::Fun(pb, rb)) if pa.len() == pb.len() => {
            let params = pa
                .iter()
                .zip(pb)
                .map(|(x, y)| unify_inner(x, y, false))
                .collect::<Option<Vec<_>>>()?;
            Some(Ty::fun(params, unify_inner(ra, rb, false)?))
        }
        _ => None,
    }
}

/// Field types of `variant`, with the declaration's generics substituted
/// by `type_args` (positionally). Missing arguments stay generic.
pub fn field_types(decl: &SumTypeDecl, variant: &Variant, type_args: &[Ty]) -> Vec<Ty> {
    let subst: FxHashMap<String, Ty> = decl
        .type_params
        .iter()
        .cloned()
        .zip(type_args.iter().cloned())
        .collect();
    variant
        .fields
        .iter()
        .map(|f| Ty::from_type_ref(&f.ty, &decl.type_params).substitute(&subst))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagc_ast::{AstBuilder, TypeRef};

    #[test]
    fn unify_equal_and_numeric() {
        assert_eq!(unify(&Ty::int(), &Ty::int()), Ok(Ty::int()));
        assert_eq!(unify(&Ty::int(), &Ty::float()), Ok(Ty::float()));
        assert_eq!(unify(&Ty::Never, &Ty::string()), Ok(Ty::string()));
    }

    #[test]
    fn unify_generic_application() {
        let none = Ty::named("Option", vec![Ty::Param("T".to_string())]);
        let some = Ty::named("Option", vec![Ty::int()]);
        assert_eq!(unify(&none, &some), Ok(some.clone()));
    }

    #[test]
    fn unify_does_not_widen_inside_containers() {
        let a = Ty::named("List", vec![Ty::int()]);
        let b = Ty::named("List", vec![Ty::float()]);
        let err = unify(&a, &b).unwrap_err();
        assert_eq!(err.to_string(), "`List<Int>` and `List<Float>` have no common type");
    }

    #[test]
    fn unify_mismatch() {
        assert!(unify(&Ty::string(), &Ty::int()).is_err());
        assert!(unify(&Ty::Tuple(vec![Ty::int()]), &Ty::Tuple(vec![])).is_err());
    }

    #[test]
    fn field_types_substitute_generics() {
        let mut b = AstBuilder::new();
        let some = b.tuple_variant("Some", vec![TypeRef::named("T")]);
        let none = b.unit_variant("None");
        let decl = b.sum_type("Option", &["T"], vec![some, none]);
        let (_, v) = decl.variant("Some").unwrap();
        assert_eq!(field_types(&decl, v, &[Ty::string()]), vec![Ty::string()]);
        assert_eq!(field_types(&decl, v, &[]), vec![Ty::Param("T".to_string())]);
    }
}
