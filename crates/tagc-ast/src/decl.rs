//! Declarations: sum types, functions, and the compilation unit.

use std::fmt;

use tagc_common::Span;

use crate::expr::Block;

/// A reference to a type as written in source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// `Int`, `Shape`, `Option<T>`, `T` (a generic parameter is a bare name).
    Named { name: String, args: Vec<TypeRef> },
    Tuple(Vec<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> TypeRef {
        TypeRef::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn app(name: impl Into<String>, args: Vec<TypeRef>) -> TypeRef {
        TypeRef::Named {
            name: name.into(),
            args,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named { name, args } => {
                write!(f, "{}", name)?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, a) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", a)?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            TypeRef::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// How a variant's payload was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    /// `Point`
    Unit,
    /// `Circle(Float)`
    Tuple,
    /// `Rectangle { width :: Float, height :: Float }`
    Struct,
}

/// One payload field of a variant. Tuple-variant fields are unnamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Option<String>,
    pub ty: TypeRef,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    pub kind: VariantKind,
    pub fields: Vec<Field>,
    pub span: Span,
}

impl Variant {
    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    /// Position of a named field.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.as_deref() == Some(name))
    }
}

/// A sum type declaration. Declaration order fixes tag ordinals: the
/// first variant is ordinal 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SumTypeDecl {
    pub name: String,
    pub type_params: Vec<String>,
    pub variants: Vec<Variant>,
    pub span: Span,
}

impl SumTypeDecl {
    /// Look up a variant by name, returning its ordinal alongside it.
    pub fn variant(&self, name: &str) -> Option<(usize, &Variant)> {
        self.variants
            .iter()
            .enumerate()
            .find(|(_, v)| v.name == name)
    }

    pub fn variant_names(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeRef,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<TypeRef>,
    pub body: Block,
    pub span: Span,
}

/// Everything the middle-end sees of one compilation unit. Declarations
/// in one unit are siblings sharing a single identifier scope.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompilationUnit {
    pub name: String,
    pub decls: Vec<SumTypeDecl>,
    pub functions: Vec<Function>,
}

impl CompilationUnit {
    pub fn decl(&self, name: &str) -> Option<&SumTypeDecl> {
        self.decls.iter().find(|d| d.name == name)
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> SumTypeDecl {
        SumTypeDecl {
            name: "Shape".to_string(),
            type_params: vec![],
            variants: vec![
                Variant {
                    name: "Circle".to_string(),
                    kind: VariantKind::Struct,
                    fields: vec![Field {
                        name: Some("radius".to_string()),
                        ty: TypeRef::named("Float"),
                        span: Span::default(),
                    }],
                    span: Span::default(),
                },
                Variant {
                    name: "Point".to_string(),
                    kind: VariantKind::Unit,
                    fields: vec![],
                    span: Span::default(),
                },
            ],
            span: Span::default(),
        }
    }

    #[test]
    fn variant_lookup_returns_ordinal() {
        let decl = shape();
        assert_eq!(decl.variant("Point").map(|(i, _)| i), Some(1));
        assert!(decl.variant("Square").is_none());
        assert_eq!(decl.variant_names().collect::<Vec<_>>(), ["Circle", "Point"]);
    }

    #[test]
    fn field_index_by_name() {
        let decl = shape();
        let (_, circle) = decl.variant("Circle").unwrap();
        assert_eq!(circle.field_index("radius"), Some(0));
        assert_eq!(circle.field_index("diameter"), None);
    }

    #[test]
    fn type_ref_display() {
        let t = TypeRef::app(
            "Result",
            vec![TypeRef::named("Int"), TypeRef::Tuple(vec![TypeRef::named("A"), TypeRef::named("B")])],
        );
        assert_eq!(t.to_string(), "Result<Int, (A, B)>");
    }
}
