//! Type representation.
//!
//! Types here are always ground or mention a declaration's generic
//! parameters by name (`Param`). There are no inference variables: the
//! middle-end consumes types, it does not solve for them.

use std::fmt;

use rustc_hash::FxHashMap;
use tagc_ast::TypeRef;

/// A type constructor -- a named type like `Int`, `Shape` or `Option`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyCon {
    pub name: String,
}

impl TyCon {
    pub fn new(name: impl Into<String>) -> Self {
        TyCon { name: name.into() }
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A type as seen by the middle-end.
///
/// - `Con`: a nullary constructor (`Int`, `Status`)
/// - `App`: a constructor applied to arguments (`Option<Int>`)
/// - `Tuple`: `(Int, String)`; the empty tuple is the unit type
/// - `Param`: a declaration's generic parameter, not yet substituted
/// - `Fun`: a function type
/// - `Never`: the type of expressions that never produce a value
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Con(TyCon),
    App(Box<Ty>, Vec<Ty>),
    Tuple(Vec<Ty>),
    Param(String),
    Fun(Vec<Ty>, Box<Ty>),
    Never,
}

impl Ty {
    pub fn int() -> Ty {
        Ty::Con(TyCon::new("Int"))
    }

    pub fn float() -> Ty {
        Ty::Con(TyCon::new("Float"))
    }

    pub fn string() -> Ty {
        Ty::Con(TyCon::new("String"))
    }

    pub fn bool() -> Ty {
        Ty::Con(TyCon::new("Bool"))
    }

    pub fn unit() -> Ty {
        Ty::Tuple(Vec::new())
    }

    pub fn fun(params: Vec<Ty>, ret: Ty) -> Ty {
        Ty::Fun(params, Box::new(ret))
    }

    /// A named type with optional arguments. Nullary names stay `Con`.
    pub fn named(name: &str, args: Vec<Ty>) -> Ty {
        if args.is_empty() {
            Ty::Con(TyCon::new(name))
        } else {
            Ty::App(Box::new(Ty::Con(TyCon::new(name))), args)
        }
    }

    /// The constructor name at the head of a named type.
    pub fn head_name(&self) -> Option<&str> {
        match self {
            Ty::Con(c) => Some(&c.name),
            Ty::App(con, _) => con.head_name(),
            _ => None,
        }
    }

    /// Arguments of an applied type; empty for everything else.
    pub fn args(&self) -> &[Ty] {
        match self {
            Ty::App(_, args) => args,
            _ => &[],
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.head_name(), Some("Int" | "Float")) && self.args().is_empty()
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Ty::Con(c) if matches!(c.name.as_str(), "Int" | "Float" | "Bool" | "String"))
    }

    /// Convert a written type, treating names in `type_params` as generics.
    pub fn from_type_ref(tr: &TypeRef, type_params: &[String]) -> Ty {
        match tr {
            TypeRef::Named { name, args } => {
                if args.is_empty() && type_params.iter().any(|p| p == name) {
                    return Ty::Param(name.clone());
                }
                let args = args
                    .iter()
                    .map(|a| Ty::from_type_ref(a, type_params))
                    .collect();
                Ty::named(name, args)
            }
            TypeRef::Tuple(elems) => Ty::Tuple(
                elems
                    .iter()
                    .map(|e| Ty::from_type_ref(e, type_params))
                    .collect(),
            ),
        }
    }

    /// Replace generic parameters by their bindings. Unbound parameters stay.
    pub fn substitute(&self, subst: &FxHashMap<String, Ty>) -> Ty {
        match self {
            Ty::Param(name) => subst.get(name).cloned().unwrap_or_else(|| self.clone()),
            Ty::Con(_) | Ty::Never => self.clone(),
            Ty::App(con, args) => Ty::App(
                Box::new(con.substitute(subst)),
                args.iter().map(|a| a.substitute(subst)).collect(),
            ),
            Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(|e| e.substitute(subst)).collect()),
            Ty::Fun(params, ret) => Ty::Fun(
                params.iter().map(|p| p.substitute(subst)).collect(),
                Box::new(ret.substitute(subst)),
            ),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Ty]) -> fmt::Result {
    for (i, t) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", t)?;
    }
    Ok(())
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Con(c) => write!(f, "{}", c),
            Ty::App(con, args) => {
                write!(f, "{}<", con)?;
                write_list(f, args)?;
                write!(f, ">")
            }
            Ty::Tuple(elems) => {
                write!(f, "(")?;
                write_list(f, elems)?;
                write!(f, ")")
            }
            Ty::Param(name) => write!(f, "{}", name),
            Ty::Fun(params, ret) => {
                write!(f, "(")?;
                write_list(f, params)?;
                write!(f, ") -> {}", ret)
            }
            Ty::Never => write!(f, "Never"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Ty::named("Option", vec![Ty::int()]).to_string(), "Option<Int>");
        assert_eq!(Ty::Tuple(vec![Ty::int(), Ty::string()]).to_string(), "(Int, String)");
        assert_eq!(Ty::unit().to_string(), "()");
        assert_eq!(Ty::fun(vec![Ty::int()], Ty::bool()).to_string(), "(Int) -> Bool");
    }

    #[test]
    fn from_type_ref_marks_generics() {
        let params = vec!["T".to_string()];
        let tr = TypeRef::app("List", vec![TypeRef::named("T")]);
        assert_eq!(
            Ty::from_type_ref(&tr, &params),
            Ty::named("List", vec![Ty::Param("T".to_string())])
        );
        assert_eq!(Ty::from_type_ref(&TypeRef::named("T"), &[]), Ty::named("T", vec![]));
    }

    #[test]
    fn substitute_replaces_bound_params_only() {
        let mut subst = FxHashMap::default();
        subst.insert("T".to_string(), Ty::int());
        let ty = Ty::Tuple(vec![Ty::Param("T".to_string()), Ty::Param("U".to_string())]);
        assert_eq!(
            ty.substitute(&subst),
            Ty::Tuple(vec![Ty::int(), Ty::Param("U".to_string())])
        );
    }

    #[test]
    fn head_name_sees_through_application() {
        let ty = Ty::named("Tree", vec![Ty::int()]);
        assert_eq!(ty.head_name(), Some("Tree"));
        assert_eq!(ty.args(), &[Ty::int()]);
        assert!(Ty::float().is_numeric());
        assert!(!Ty::string().is_numeric());
    }
}
