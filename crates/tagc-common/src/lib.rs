//! Shared types for the tagc middle-end.
//!
//! - [`span`]: byte spans, line lookup and the `SourcePos` marker carried by
//!   every lowered node
//! - [`config`]: lowering policy (tuple arity cap, diagnostic sample size)
//! - [`error`]: the diagnostic taxonomy and the flat `Diagnostic` record
//! - [`diagnostics`]: ariadne rendering

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod span;

pub use config::LowerConfig;
pub use error::{ArmType, Diagnostic, DiagnosticKind, LowerError, Severity};
pub use span::{SourcePos, Span};
