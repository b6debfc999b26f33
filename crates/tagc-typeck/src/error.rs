//! Errors reported by the reference type service.

use std::fmt;

use tagc_common::{LowerError, Span};

use crate::ty::Ty;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeError {
    /// Two types that should agree do not.
    Mismatch { expected: Ty, found: Ty, span: Span },
    UnboundVariable { name: String, span: Span },
    UnknownFunction { name: String, span: Span },
    /// A constructor call names a type that is not a declared sum type.
    UnknownType { name: String, span: Span },
    ArgCount {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    /// Calls need the callee's return type up front.
    MissingReturnType { name: String, span: Span },
}

impl TypeError {
    pub fn span(&self) -> Span {
        match self {
            TypeError::Mismatch { span, .. }
            | TypeError::UnboundVariable { span, .. }
            | TypeError::UnknownFunction { span, .. }
            | TypeError::UnknownType { span, .. }
            | TypeError::ArgCount { span, .. }
            | TypeError::MissingReturnType { span, .. } => *span,
        }
    }

    /// Report through the middle-end taxonomy. Every type-service failure
    /// surfaces as an unresolved type at the offending expression.
    pub fn to_lower_error(&self) -> LowerError {
        let what = match self {
            TypeError::Mismatch {
                expected, found, ..
            } => format!("this expression (expected `{}`, found `{}`)", expected, found),
            TypeError::UnboundVariable { name, .. } => format!("`{}`, which is not bound", name),
            TypeError::UnknownFunction { name, .. } => {
                format!("a call to undeclared function `{}`", name)
            }
            TypeError::UnknownType { name, .. } => {
                format!("`{}`, which is not a declared sum type", name)
            }
            TypeError::ArgCount {
                name,
                expected,
                found,
                ..
            } => format!(
                "a call to `{}` with {} argument(s), expected {}",
                name, found, expected
            ),
            TypeError::MissingReturnType { name, .. } => {
                format!("a call to `{}`, which has no declared return type", name)
            }
        };
        LowerError::UnresolvedType {
            what,
            span: self.span(),
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch {
                expected, found, ..
            } => write!(f, "type mismatch: expected `{}`, found `{}`", expected, found),
            TypeError::UnboundVariable { name, .. } => write!(f, "unbound variable `{}`", name),
            TypeError::UnknownFunction { name, .. } => write!(f, "unknown function `{}`", name),
            TypeError::UnknownType { name, .. } => write!(f, "unknown type `{}`", name),
            TypeError::ArgCount {
                name,
                expected,
                found,
                ..
            } => write!(
                f,
                "`{}` expects {} argument(s), found {}",
                name, expected, found
            ),
            TypeError::MissingReturnType { name, .. } => {
                write!(f, "function `{}` has no declared return type", name)
            }
        }
    }
}

impl std::error::Error for TypeError {}
