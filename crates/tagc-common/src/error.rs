//! The middle-end's diagnostic taxonomy.
//!
//! Nothing in the lowering pipeline aborts on a user error. Every problem
//! becomes a `LowerError` attached to a source position and is batched with
//! the rest of the compilation unit's diagnostics. Fatal kinds stop the
//! lowering of the one declaration or match they concern; warnings never
//! stop anything.

use std::fmt;

use serde::Serialize;

use crate::span::{LineIndex, SourcePos, Span};

/// Coarse classification, one per taxonomy entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    Arity,
    UnknownVariant,
    UnknownField,
    DuplicateVariantName,
    UnreachablePattern,
    Exhaustiveness,
    TypeUnification,
    TupleArityExceeded,
    InvalidPattern,
    UnresolvedType,
    NamingCollision,
    RedundantWildcard,
    RedundantArm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// One arm participating in an arm-type conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArmType {
    /// 0-based arm index.
    pub arm_index: usize,
    /// The arm body's type, already rendered.
    pub ty: String,
    pub span: Span,
}

/// A diagnostic produced while checking or lowering a compilation unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LowerError {
    /// A constructor call or pattern supplies the wrong number of fields.
    Arity {
        subject: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    /// A pattern or constructor call names a variant the declaration lacks.
    UnknownVariant {
        type_name: String,
        variant: String,
        span: Span,
    },
    /// A named field pattern refers to a field the variant does not declare.
    UnknownField {
        type_name: String,
        variant: String,
        field: String,
        span: Span,
    },
    /// Two variants of one declaration share a name.
    DuplicateVariantName {
        type_name: String,
        variant: String,
        first: Span,
        second: Span,
    },
    /// An arm follows an unguarded catch-all and can never run.
    UnreachablePattern {
        arm_index: usize,
        catch_all: Span,
        span: Span,
    },
    /// The match does not cover every variant (or variant combination).
    Exhaustiveness {
        scrutinee: String,
        missing: Vec<String>,
        /// Uncovered cases beyond the listed sample.
        remaining: usize,
        span: Span,
    },
    /// Arm results in expression context share no common type.
    TypeUnification { conflicts: Vec<ArmType>, span: Span },
    /// A multi-scrutinee match exceeds the configured arity cap.
    TupleArityExceeded { found: usize, max: usize, span: Span },
    /// A pattern whose shape cannot match the scrutinee's type.
    InvalidPattern { reason: String, span: Span },
    /// The type service could not resolve a type the lowering needs.
    UnresolvedType { what: String, span: Span },
    /// A variant identifier was qualified to avoid a sibling collision.
    NamingCollision {
        type_name: String,
        variant: String,
        chosen: String,
        previous_owner: String,
        span: Span,
    },
    /// A catch-all arm after the arms above it already cover everything.
    RedundantWildcard { arm_index: usize, span: Span },
    /// An unguarded arm that matches nothing the arms above it miss.
    RedundantArm { arm_index: usize, span: Span },
}

impl LowerError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            LowerError::Arity { .. } => DiagnosticKind::Arity,
            LowerError::UnknownVariant { .. } => DiagnosticKind::UnknownVariant,
            LowerError::UnknownField { .. } => DiagnosticKind::UnknownField,
            LowerError::DuplicateVariantName { .. } => DiagnosticKind::DuplicateVariantName,
            LowerError::UnreachablePattern { .. } => DiagnosticKind::UnreachablePattern,
            LowerError::Exhaustiveness { .. } => DiagnosticKind::Exhaustiveness,
            LowerError::TypeUnification { .. } => DiagnosticKind::TypeUnification,
            LowerError::TupleArityExceeded { .. } => DiagnosticKind::TupleArityExceeded,
            LowerError::InvalidPattern { .. } => DiagnosticKind::InvalidPattern,
            LowerError::UnresolvedType { .. } => DiagnosticKind::UnresolvedType,
            LowerError::NamingCollision { .. } => DiagnosticKind::NamingCollision,
            LowerError::RedundantWildcard { .. } => DiagnosticKind::RedundantWildcard,
            LowerError::RedundantArm { .. } => DiagnosticKind::RedundantArm,
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            LowerError::NamingCollision { .. }
            | LowerError::RedundantWildcard { .. }
            | LowerError::RedundantArm { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Error
    }

    /// The primary source span of the diagnostic.
    pub fn span(&self) -> Span {
        match self {
            LowerError::Arity { span, .. }
            | LowerError::UnknownVariant { span, .. }
            | LowerError::UnknownField { span, .. }
            | LowerError::UnreachablePattern { span, .. }
            | LowerError::Exhaustiveness { span, .. }
            | LowerError::TypeUnification { span, .. }
            | LowerError::TupleArityExceeded { span, .. }
            | LowerError::InvalidPattern { span, .. }
            | LowerError::UnresolvedType { span, .. }
            | LowerError::NamingCollision { span, .. }
            | LowerError::RedundantWildcard { span, .. }
            | LowerError::RedundantArm { span, .. } => *span,
            LowerError::DuplicateVariantName { second, .. } => *second,
        }
    }

    pub fn position(&self) -> SourcePos {
        SourcePos::At(self.span())
    }

    /// A suggested fix, when one is plausible.
    pub fn help(&self) -> Option<String> {
        match self {
            LowerError::Arity {
                expected, found, ..
            } => Some(if expected > found {
                format!("supply {} more field(s)", expected - found)
            } else {
                format!("remove {} field(s)", found - expected)
            }),
            LowerError::UnknownVariant { type_name, .. } => {
                Some(format!("use one of the variants declared by `{}`", type_name))
            }
            LowerError::UnknownField { variant, .. } => {
                Some(format!("use a field declared by `{}`", variant))
            }
            LowerError::DuplicateVariantName { variant, .. } => {
                Some(format!("rename one of the `{}` variants", variant))
            }
            LowerError::UnreachablePattern { .. } => {
                Some("move this arm above the catch-all arm, or remove it".to_string())
            }
            LowerError::Exhaustiveness { missing, .. } => {
                let listed: Vec<String> = missing.iter().map(|m| format!("`{}`", m)).collect();
                let arms = if missing.len() == 1 { "an arm" } else { "arms" };
                Some(format!(
                    "add {} for {}, or add a wildcard `_` arm",
                    arms,
                    listed.join(", ")
                ))
            }
            LowerError::TypeUnification { .. } => {
                Some("make every arm produce the same type".to_string())
            }
            LowerError::TupleArityExceeded { max, .. } => Some(format!(
                "split the match into nested matches of at most {} scrutinees",
                max
            )),
            LowerError::InvalidPattern { .. } | LowerError::UnresolvedType { .. } => None,
            LowerError::NamingCollision { chosen, .. } => {
                Some(format!("refer to this variant as `{}` in generated code", chosen))
            }
            LowerError::RedundantWildcard { .. } | LowerError::RedundantArm { .. } => {
                Some("remove this arm".to_string())
            }
        }
    }

    /// Flatten into the record handed to the driver's reporting layer.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic {
            kind: self.kind(),
            message: self.to_string(),
            position: self.position(),
            severity: self.severity(),
            help: self.help(),
        }
    }
}

impl fmt::Display for LowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LowerError::Arity {
                subject,
                expected,
                found,
                ..
            } => write!(
                f,
                "{} expects {} field(s), found {}",
                subject, expected, found
            ),
            LowerError::UnknownVariant {
                type_name, variant, ..
            } => write!(f, "`{}` has no variant `{}`", type_name, variant),
            LowerError::UnknownField {
                type_name,
                variant,
                field,
                ..
            } => write!(
                f,
                "variant `{}.{}` has no field `{}`",
                type_name, variant, field
            ),
            LowerError::DuplicateVariantName {
                type_name, variant, ..
            } => write!(
                f,
                "variant `{}` is declared more than once in `{}`",
                variant, type_name
            ),
            LowerError::UnreachablePattern { arm_index, .. } => write!(
                f,
                "unreachable pattern: arm {} follows a catch-all arm",
                arm_index + 1
            ),
            LowerError::Exhaustiveness {
                scrutinee,
                missing,
                remaining,
                ..
            } => {
                write!(
                    f,
                    "non-exhaustive match on `{}`: missing {}",
                    scrutinee,
                    missing.join(", ")
                )?;
                if *remaining > 0 {
                    write!(f, " and {} more", remaining)?;
                }
                Ok(())
            }
            LowerError::TypeUnification { conflicts, .. } => {
                write!(f, "match arms have incompatible types: ")?;
                for (i, c) in conflicts.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "arm {} is `{}`", c.arm_index + 1, c.ty)?;
                }
                Ok(())
            }
            LowerError::TupleArityExceeded { found, max, .. } => write!(
                f,
                "match on {} scrutinees exceeds the maximum of {}",
                found, max
            ),
            LowerError::InvalidPattern { reason, .. } => write!(f, "invalid pattern: {}", reason),
            LowerError::UnresolvedType { what, .. } => {
                write!(f, "cannot resolve the type of {}", what)
            }
            LowerError::NamingCollision {
                type_name,
                variant,
                chosen,
                previous_owner,
                ..
            } => write!(
                f,
                "variant `{}.{}` collides with an identifier of `{}`; emitted as `{}`",
                type_name, variant, previous_owner, chosen
            ),
            LowerError::RedundantWildcard { arm_index, .. } => write!(
                f,
                "dead code: catch-all arm {} is never reached, every case is already covered",
                arm_index + 1
            ),
            LowerError::RedundantArm { arm_index, .. } => write!(
                f,
                "redundant arm {}: every case it matches is already covered",
                arm_index + 1
            ),
        }
    }
}

impl std::error::Error for LowerError {}

/// The flat `{kind, message, position, severity}` record consumed by the
/// driver's reporting layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub position: SourcePos,
    pub severity: Severity,
    pub help: Option<String>,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    #[serde(flatten)]
    diagnostic: &'a Diagnostic,
    line: Option<u32>,
    column: Option<u32>,
}

/// Serialize a batch of diagnostics as a JSON array, resolving each
/// position to a 1-based line/column against `source`.
pub fn diagnostics_to_json(diagnostics: &[Diagnostic], source: &str) -> serde_json::Result<String> {
    let index = LineIndex::new(source);
    let records: Vec<JsonDiagnostic<'_>> = diagnostics
        .iter()
        .map(|d| {
            let (line, column) = match d.position.span() {
                Some(span) => {
                    let (l, c) = index.line_col(span.start);
                    (Some(l), Some(c))
                }
                None => (None, None),
            };
            JsonDiagnostic {
                diagnostic: d,
                line,
                column,
            }
        })
        .collect();
    serde_json::to_string_pretty(&records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustiveness_message_lists_missing() {
        let err = LowerError::Exhaustiveness {
            scrutinee: "Status".to_string(),
            missing: vec!["Rejected".to_string()],
            remaining: 0,
            span: Span::new(0, 5),
        };
        assert_eq!(
            err.to_string(),
            "non-exhaustive match on `Status`: missing Rejected"
        );
        assert_eq!(
            err.help().unwrap(),
            "add an arm for `Rejected`, or add a wildcard `_` arm"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn exhaustiveness_message_counts_remainder() {
        let err = LowerError::Exhaustiveness {
            scrutinee: "(A, B)".to_string(),
            missing: vec!["(X, Y)".to_string(), "(X, Z)".to_string()],
            remaining: 7,
            span: Span::new(0, 1),
        };
        assert!(err.to_string().ends_with("missing (X, Y), (X, Z) and 7 more"));
    }

    #[test]
    fn warnings_are_not_fatal() {
        let w = LowerError::RedundantWildcard {
            arm_index: 3,
            span: Span::new(0, 1),
        };
        assert_eq!(w.severity(), Severity::Warning);
        assert!(!w.is_fatal());
        assert_eq!(w.kind(), DiagnosticKind::RedundantWildcard);
    }

    #[test]
    fn to_diagnostic_flattens() {
        let err = LowerError::Arity {
            subject: "constructor `Shape.Circle`".to_string(),
            expected: 1,
            found: 2,
            span: Span::new(4, 9),
        };
        let d = err.to_diagnostic();
        assert_eq!(d.kind, DiagnosticKind::Arity);
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.position, SourcePos::At(Span::new(4, 9)));
        assert_eq!(d.message, "constructor `Shape.Circle` expects 1 field(s), found 2");
        assert_eq!(d.help.as_deref(), Some("remove 1 field(s)"));
    }

    #[test]
    fn json_output_has_line_and_column() {
        let d = LowerError::UnknownVariant {
            type_name: "Shape".to_string(),
            variant: "Hexagon".to_string(),
            span: Span::new(6, 13),
        }
        .to_diagnostic();
        let json = diagnostics_to_json(&[d], "match\nHexagon").unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["kind"], "UnknownVariant");
        assert_eq!(value[0]["line"], 2);
        assert_eq!(value[0]["column"], 1);
    }
}
