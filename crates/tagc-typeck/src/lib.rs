//! Type-service interface and exhaustiveness checking.
//!
//! - [`ty`]: the `Ty` representation
//! - [`service`]: the `TypeService` query trait, `unify`, field type lookup
//! - [`infer`]: a minimal reference `TypeService` over a compilation unit
//! - [`exhaustiveness`]: coverage proof and redundancy warnings per match

pub mod error;
pub mod exhaustiveness;
pub mod infer;
pub mod service;
pub mod ty;

pub use error::TypeError;
pub use exhaustiveness::{check_match, is_useful, CheckReport, CoverageSet};
pub use infer::{infer_unit, TypeckResult};
pub use service::{
    field_types, unify, NoCommonTypeError, SumTypeRef, TypeService, TypeServiceError,
    UnresolvedTypeError,
};
pub use ty::{Ty, TyCon};
