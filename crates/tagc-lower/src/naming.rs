//! Per-unit naming state: generated identifiers for variants and the
//! counter behind synthesized bindings.
//!
//! Both are scoped to one compilation unit and threaded explicitly through
//! lowering in a `UnitCtx`; nothing here is global.

use rustc_hash::FxHashMap;
use tagc_ast::{CompilationUnit, SumTypeDecl};
use tagc_common::{LowerConfig, LowerError};

use crate::lir::Fragment;

/// Generated identifiers claimed in the unit's shared scope.
#[derive(Debug, Default)]
pub struct NamingRegistry {
    /// Identifier -> human description of its owner.
    taken: FxHashMap<String, String>,
    /// (type, variant) -> chosen constructor identifier.
    variants: FxHashMap<(String, String), String>,
}

impl NamingRegistry {
    /// A registry whose scope already holds the unit's type and function
    /// names.
    pub fn for_unit(unit: &CompilationUnit) -> Self {
        let mut registry = NamingRegistry::default();
        for decl in &unit.decls {
            registry.claim(&decl.name, format!("type `{}`", decl.name));
            registry.claim(&tag_enum_name(&decl.name), format!("type `{}`", decl.name));
        }
        for func in &unit.functions {
            registry.claim(&func.name, format!("function `{}`", func.name));
        }
        registry
    }

    fn claim(&mut self, ident: &str, owner: String) {
        self.taken.entry(ident.to_string()).or_insert(owner);
    }

    /// The owner of `ident` or of its derived tag constant, if either is
    /// already claimed.
    fn owner_of(&self, ident: &str) -> Option<&String> {
        self.taken
            .get(ident)
            .or_else(|| self.taken.get(&tag_const_name(ident)))
    }

    /// Claim one identifier per variant of `decl`.
    ///
    /// Bare variant names are used unless already taken; a taken name is
    /// qualified with the owning type (`ShapeCircle`), then numerically
    /// suffixed if that is still taken. Each qualification yields a
    /// `NamingCollision` warning.
    pub fn register_variants(&mut self, decl: &SumTypeDecl) -> Vec<LowerError> {
        let mut warnings = Vec::new();
        for variant in &decl.variants {
            let key = (decl.name.clone(), variant.name.clone());
            if self.variants.contains_key(&key) {
                continue;
            }

            let chosen = match self.owner_of(&variant.name).cloned() {
                None => variant.name.clone(),
                Some(previous_owner) => {
                    let qualified = format!("{}{}", decl.name, variant.name);
                    let mut chosen = qualified.clone();
                    let mut n = 2;
                    while self.owner_of(&chosen).is_some() {
                        chosen = format!("{}{}", qualified, n);
                        n += 1;
                    }
                    warnings.push(LowerError::NamingCollision {
                        type_name: decl.name.clone(),
                        variant: variant.name.clone(),
                        chosen: chosen.clone(),
                        previous_owner,
                        span: variant.span,
                    });
                    chosen
                }
            };

            let owner = format!("variant `{}.{}`", decl.name, variant.name);
            self.claim(&chosen, owner.clone());
            self.claim(&tag_const_name(&chosen), owner);
            self.variants.insert(key, chosen);
        }
        warnings
    }

    pub fn ident_for(&self, type_name: &str, variant: &str) -> Option<&str> {
        self.variants
            .get(&(type_name.to_string(), variant.to_string()))
            .map(String::as_str)
    }
}

pub fn tag_enum_name(type_name: &str) -> String {
    format!("{}Tag", type_name)
}

pub fn tag_const_name(ident: &str) -> String {
    format!("{}Tag", ident)
}

pub fn predicate_name(variant: &str) -> String {
    format!("Is{}", variant)
}

/// The prefix of a name made by [`UnitCtx::fresh`].
pub fn fresh_prefix(name: &str) -> Option<&str> {
    let (prefix, n) = name.strip_prefix("__")?.rsplit_once('_')?;
    (!prefix.is_empty() && n.parse::<u32>().is_ok()).then_some(prefix)
}

/// Everything lowering shares across one compilation unit.
#[derive(Debug)]
pub struct UnitCtx {
    pub registry: NamingRegistry,
    pub config: LowerConfig,
    counter: u32,
    diagnostics: Vec<LowerError>,
}

impl UnitCtx {
    pub fn new(unit: &CompilationUnit, config: &LowerConfig) -> Self {
        UnitCtx {
            registry: NamingRegistry::for_unit(unit),
            config: config.clone(),
            counter: 0,
            diagnostics: Vec::new(),
        }
    }

    /// A synthesized name that is never handed out twice in this unit.
    /// The `__` prefix keeps it out of the user's namespace.
    pub fn fresh(&mut self, prefix: &str) -> String {
        let n = self.counter;
        self.counter += 1;
        format!("__{}_{}", prefix, n)
    }

    /// A copy of `fragment` whose synthesized locals are renamed, for code
    /// that is emitted more than once.
    pub fn refresh(&mut self, fragment: &Fragment) -> Fragment {
        let mut renames = FxHashMap::default();
        for name in fragment.bound_locals() {
            if renames.contains_key(&name) {
                continue;
            }
            if let Some(prefix) = fresh_prefix(&name) {
                let new = self.fresh(prefix);
                renames.insert(name, new);
            }
        }
        fragment.renamed(&renames)
    }

    pub fn report(&mut self, diagnostic: LowerError) {
        self.diagnostics.push(diagnostic);
    }

    pub fn report_all(&mut self, diagnostics: impl IntoIterator<Item = LowerError>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(LowerError::is_fatal)
    }

    pub fn diagnostics(&self) -> &[LowerError] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<LowerError> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagc_ast::{AstBuilder, Block, TypeRef};

    fn unit_with(decls: Vec<SumTypeDecl>) -> CompilationUnit {
        CompilationUnit {
            name: "test".to_string(),
            decls,
            functions: Vec::new(),
        }
    }

    #[test]
    fn bare_names_by_default() {
        let mut b = AstBuilder::new();
        let variants = vec![b.unit_variant("Red"), b.unit_variant("Green")];
        let color = b.sum_type("Color", &[], variants);
        let unit = unit_with(vec![color.clone()]);

        let mut registry = NamingRegistry::for_unit(&unit);
        assert!(registry.register_variants(&color).is_empty());
        assert_eq!(registry.ident_for("Color", "Red"), Some("Red"));
        assert_eq!(registry.ident_for("Color", "Green"), Some("Green"));
        assert_eq!(registry.ident_for("Color", "Blue"), None);
    }

    #[test]
    fn later_sibling_is_qualified() {
        let mut b = AstBuilder::new();
        let v = vec![b.unit_variant("Pending"), b.unit_variant("Done")];
        let status = b.sum_type("Status", &[], v);
        let v = vec![b.unit_variant("Pending"), b.unit_variant("Shipped")];
        let order = b.sum_type("Order", &[], v);
        let unit = unit_with(vec![status.clone(), order.clone()]);

        let mut registry = NamingRegistry::for_unit(&unit);
        assert!(registry.register_variants(&status).is_empty());
        let warnings = registry.register_variants(&order);
        assert_eq!(warnings.len(), 1);
        match &warnings[0] {
            LowerError::NamingCollision {
                chosen,
                previous_owner,
                ..
            } => {
                assert_eq!(chosen, "OrderPending");
                assert_eq!(previous_owner, "variant `Status.Pending`");
            }
            other => panic!("unexpected diagnostic: {:?}", other),
        }
        assert_eq!(registry.ident_for("Status", "Pending"), Some("Pending"));
        assert_eq!(registry.ident_for("Order", "Pending"), Some("OrderPending"));
        assert_eq!(registry.ident_for("Order", "Shipped"), Some("Shipped"));
    }

    #[test]
    fn collides_with_type_and_function_names() {
        let mut b = AstBuilder::new();
        let v = vec![b.tuple_variant("Point", vec![TypeRef::named("Int")])];
        let shape = b.sum_type("Shape", &[], v);
        let v = vec![b.unit_variant("X")];
        let point = b.sum_type("Point", &[], v);
        let mut unit = unit_with(vec![shape.clone(), point]);
        unit.functions
            .push(b.function("ShapePoint", vec![], None, Block::default()));

        let mut registry = NamingRegistry::for_unit(&unit);
        let warnings = registry.register_variants(&shape);
        assert_eq!(warnings.len(), 1);
        assert_eq!(registry.ident_for("Shape", "Point"), Some("ShapePoint2"));
    }

    #[test]
    fn fresh_names_never_repeat() {
        let unit = unit_with(vec![]);
        let mut ctx = UnitCtx::new(&unit, &LowerConfig::default());
        let a = ctx.fresh("match");
        let b = ctx.fresh("match");
        let c = ctx.fresh("scrut");
        assert_eq!(a, "__match_0");
        assert_eq!(b, "__match_1");
        assert_eq!(c, "__scrut_2");
    }

    #[test]
    fn refreshed_copies_rename_only_synthesized_locals() {
        use crate::lir::{LExpr, LStmt, LStmtKind, LType};

        let unit = unit_with(vec![]);
        let mut ctx = UnitCtx::new(&unit, &LowerConfig::default());
        let block = ctx.fresh("block");
        let fragment = Fragment {
            stmts: vec![
                LStmt::synth(LStmtKind::Declare {
                    name: block.clone(),
                    ty: LType::Int,
                    init: None,
                }),
                LStmt::synth(LStmtKind::Scope(vec![
                    LStmt::synth(LStmtKind::Let {
                        name: "n".to_string(),
                        ty: LType::Int,
                        value: LExpr::var("__scrut_9"),
                    }),
                    LStmt::synth(LStmtKind::Assign {
                        name: block.clone(),
                        value: LExpr::var("n"),
                    }),
                ])),
            ],
            value: LExpr::var(block),
        };

        let copy = ctx.refresh(&fragment);
        assert_eq!(copy.bound_locals(), ["__block_1", "n"]);
        assert_eq!(copy.value, LExpr::var("__block_1"));
        // Names bound outside the fragment are left alone.
        assert!(matches!(
            &copy.stmts[1].kind,
            LStmtKind::Scope(body) if matches!(
                &body[0].kind,
                LStmtKind::Let { value, .. } if *value == LExpr::var("__scrut_9")
            )
        ));
        assert_eq!(fresh_prefix("__guard_12"), Some("guard"));
        assert_eq!(fresh_prefix("radius"), None);
    }
}
