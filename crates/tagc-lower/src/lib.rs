//! The tagc middle-end.
//!
//! Lowers a type-checked compilation unit to LIR for a target without
//! native sum types or pattern matching:
//!
//! - [`sum_type`]: declarations to tag enums, carriers, constructors and
//!   predicates
//! - [`pattern`]: matches to decision trees, and trees to tag dispatch
//! - [`lift`]: splicing a lowered match into expression or statement context
//! - [`body`]: function bodies, with nested matches hoisted in evaluation
//!   order
//! - [`eval`]: a reference evaluator for lowered units, used by tests

pub mod body;
pub mod eval;
pub mod lift;
pub mod lir;
pub mod naming;
pub mod pattern;
pub mod sum_type;

use tagc_ast::CompilationUnit;
use tagc_common::diagnostics::render_all;
use tagc_common::LowerConfig;
use tagc_typeck::{infer_unit, TypeService};

pub use body::FnLowerer;
pub use lir::{LoweredSumType, LoweredUnit};
pub use naming::UnitCtx;
pub use sum_type::lower_sum_type;

/// Lower every declaration, then every function, of `unit`.
///
/// A fatal diagnostic poisons only the declaration or match it belongs
/// to; lowering continues and the unit's diagnostics are returned in the
/// order they were produced.
#[tracing::instrument(level = "debug", skip_all, fields(unit = %unit.name))]
pub fn lower_unit(
    unit: &CompilationUnit,
    service: &dyn TypeService,
    config: &LowerConfig,
) -> LoweredUnit {
    let mut ctx = UnitCtx::new(unit, config);

    let mut sum_types = Vec::with_capacity(unit.decls.len());
    for decl in &unit.decls {
        match lower_sum_type(decl, &mut ctx, service) {
            Ok(lowered) => sum_types.push(lowered),
            Err(errors) => ctx.report_all(errors),
        }
    }

    let functions = {
        let mut lowerer = FnLowerer::new(&mut ctx, service, &sum_types);
        unit.functions
            .iter()
            .map(|f| lowerer.lower_function(f))
            .collect::<Vec<_>>()
    };

    let diagnostics = ctx.into_diagnostics();
    tracing::debug!(
        sum_types = sum_types.len(),
        functions = functions.len(),
        diagnostics = diagnostics.len(),
        "lowered compilation unit"
    );
    LoweredUnit {
        name: unit.name.clone(),
        sum_types,
        functions,
        diagnostics,
    }
}

/// Type `unit` with the reference type service, then lower it. Type
/// errors lead the diagnostic batch.
pub fn compile_unit(unit: &CompilationUnit, config: &LowerConfig) -> LoweredUnit {
    let typeck = infer_unit(unit);
    let mut lowered = lower_unit(unit, &typeck, config);
    let mut diagnostics: Vec<_> = typeck.errors.iter().map(|e| e.to_lower_error()).collect();
    diagnostics.append(&mut lowered.diagnostics);
    lowered.diagnostics = diagnostics;
    lowered
}

/// Render a unit's diagnostics against its source text.
pub fn render_diagnostics(unit: &LoweredUnit, source: &str, filename: &str) -> Vec<String> {
    render_all(&unit.diagnostics, source, filename)
}
