//! Patterns.
//!
//! The pattern kinds form a closed set, so they are one enum and every
//! consumer matches on it exhaustively.

use tagc_common::Span;

use crate::decl::Variant;
use crate::expr::Literal;

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Variant(VariantPattern),
    /// One sub-pattern per scrutinee position (or per tuple element).
    Tuple(TuplePattern),
    Wildcard(Span),
    Literal(LiteralPattern),
    Binding(BindingPattern),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantPattern {
    /// `Shape.Circle` carries the type qualifier; a bare `Circle` does not.
    pub type_name: Option<String>,
    pub variant: String,
    pub fields: VariantFields,
    pub span: Span,
}

/// The payload part of a variant pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum VariantFields {
    /// `Point`: no payload written at all.
    None,
    /// `Circle(r)`
    Positional(Vec<Pattern>),
    /// `Rectangle { width, height: h }`. Omitted fields are wildcards.
    Named(Vec<FieldPattern>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldPattern {
    pub name: String,
    pub pattern: Pattern,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TuplePattern {
    pub elements: Vec<Pattern>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralPattern {
    pub value: Literal,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindingPattern {
    pub name: String,
    pub span: Span,
}

/// Why a variant pattern's payload does not line up with the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMismatch {
    Arity { expected: usize, found: usize },
    UnknownField { field: String, span: Span },
}

impl Pattern {
    pub fn span(&self) -> Span {
        match self {
            Pattern::Variant(v) => v.span,
            Pattern::Tuple(t) => t.span,
            Pattern::Wildcard(span) => *span,
            Pattern::Literal(l) => l.span,
            Pattern::Binding(b) => b.span,
        }
    }

    /// Matches every value: a wildcard, a binding, or a tuple of those.
    pub fn is_irrefutable(&self) -> bool {
        match self {
            Pattern::Wildcard(_) | Pattern::Binding(_) => true,
            Pattern::Tuple(t) => t.elements.iter().all(Pattern::is_irrefutable),
            Pattern::Variant(_) | Pattern::Literal(_) => false,
        }
    }

    /// Every name this pattern binds, left to right.
    pub fn bindings(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_bindings(&mut out);
        out
    }

    fn collect_bindings<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Pattern::Binding(b) => out.push(&b.name),
            Pattern::Tuple(t) => t.elements.iter().for_each(|p| p.collect_bindings(out)),
            Pattern::Variant(v) => match &v.fields {
                VariantFields::None => {}
                VariantFields::Positional(ps) => ps.iter().for_each(|p| p.collect_bindings(out)),
                VariantFields::Named(fs) => {
                    fs.iter().for_each(|f| f.pattern.collect_bindings(out))
                }
            },
            Pattern::Wildcard(_) | Pattern::Literal(_) => {}
        }
    }
}

impl VariantPattern {
    /// Align the written payload with the variant's declared fields.
    ///
    /// The result has exactly `variant.arity()` entries; `None` marks a
    /// field the pattern leaves unconstrained (omitted in a named pattern).
    /// Positional payloads must match the declared arity exactly, and a
    /// bare variant name is only allowed for a variant without fields.
    pub fn align<'p>(&'p self, variant: &Variant) -> Result<Vec<Option<&'p Pattern>>, FieldMismatch> {
        let expected = variant.arity();
        match &self.fields {
            VariantFields::None => {
                if expected == 0 {
                    Ok(Vec::new())
                } else {
                    Err(FieldMismatch::Arity { expected, found: 0 })
                }
            }
            VariantFields::Positional(pats) => {
                if pats.len() != expected {
                    return Err(FieldMismatch::Arity {
                        expected,
                        found: pats.len(),
                    });
                }
                Ok(pats.iter().map(Some).collect())
            }
            VariantFields::Named(named) => {
                let mut out: Vec<Option<&Pattern>> = vec![None; expected];
                for fp in named {
                    let idx = variant.field_index(&fp.name).ok_or_else(|| {
                        FieldMismatch::UnknownField {
                            field: fp.name.clone(),
                            span: fp.span,
                        }
                    })?;
                    // A repeated field keeps its first pattern.
                    if out[idx].is_none() {
                        out[idx] = Some(&fp.pattern);
                    }
                }
                Ok(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::{Field, TypeRef, VariantKind};

    fn rect() -> Variant {
        let field = |n: &str| Field {
            name: Some(n.to_string()),
            ty: TypeRef::named("Float"),
            span: Span::default(),
        };
        Variant {
            name: "Rectangle".to_string(),
            kind: VariantKind::Struct,
            fields: vec![field("width"), field("height")],
            span: Span::default(),
        }
    }

    fn bind(name: &str) -> Pattern {
        Pattern::Binding(BindingPattern {
            name: name.to_string(),
            span: Span::default(),
        })
    }

    fn vp(fields: VariantFields) -> VariantPattern {
        VariantPattern {
            type_name: None,
            variant: "Rectangle".to_string(),
            fields,
            span: Span::default(),
        }
    }

    #[test]
    fn named_fields_align_by_declaration_order() {
        let pat = vp(VariantFields::Named(vec![FieldPattern {
            name: "height".to_string(),
            pattern: bind("h"),
            span: Span::default(),
        }]));
        let aligned = pat.align(&rect()).unwrap();
        assert_eq!(aligned.len(), 2);
        assert!(aligned[0].is_none());
        assert_eq!(aligned[1], Some(&bind("h")));
    }

    #[test]
    fn unknown_named_field_is_reported() {
        let pat = vp(VariantFields::Named(vec![FieldPattern {
            name: "depth".to_string(),
            pattern: bind("d"),
            span: Span::new(3, 8),
        }]));
        assert_eq!(
            pat.align(&rect()),
            Err(FieldMismatch::UnknownField {
                field: "depth".to_string(),
                span: Span::new(3, 8),
            })
        );
    }

    #[test]
    fn positional_arity_must_match() {
        let pat = vp(VariantFields::Positional(vec![bind("w")]));
        assert_eq!(
            pat.align(&rect()),
            Err(FieldMismatch::Arity {
                expected: 2,
                found: 1
            })
        );
        let bare = vp(VariantFields::None);
        assert_eq!(
            bare.align(&rect()),
            Err(FieldMismatch::Arity {
                expected: 2,
                found: 0
            })
        );
    }

    #[test]
    fn irrefutability_and_bindings() {
        let tuple = Pattern::Tuple(TuplePattern {
            elements: vec![bind("a"), Pattern::Wildcard(Span::default())],
            span: Span::default(),
        });
        assert!(tuple.is_irrefutable());
        assert_eq!(tuple.bindings(), ["a"]);

        let nested = Pattern::Variant(vp(VariantFields::Positional(vec![bind("w"), bind("h")])));
        assert!(!nested.is_irrefutable());
        assert_eq!(nested.bindings(), ["w", "h"]);
    }
}
